//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tidewater_core::{ImageRef, ResourceId};

/// Tidewater - GitOps release reconciliation
#[derive(Parser, Debug)]
#[command(name = "tidewater")]
#[command(version)]
#[command(about = "Release new images to the workloads declared in a manifest checkout")]
#[command(
    long_about = "Tidewater compares the workloads declared in a manifest checkout with the ones running in the cluster, selects those a release should touch, and rewrites their image references in place."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file layered over the global and project config
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Root of the manifest checkout
    #[arg(long, global = true, value_name = "DIR")]
    pub checkout: Option<PathBuf>,

    /// YAML snapshot of the running cluster
    #[arg(long, global = true, value_name = "SNAPSHOT")]
    pub cluster: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the workloads declared in the checkout
    Workloads {
        /// Output as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Release an image to the selected workloads
    Release(ReleaseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReleaseArgs {
    /// Image to release, e.g. registry.example.com/app/web:1.4
    #[arg(long, value_name = "REF")]
    pub image: ImageRef,

    /// Workload to release to, as namespace:kind/name (repeatable)
    #[arg(long = "workload", value_name = "ID", required_unless_present = "all")]
    pub workloads: Vec<ResourceId>,

    /// Release to every workload
    #[arg(long, default_value_t = false, conflicts_with = "workloads")]
    pub all: bool,

    /// Workload to leave out (repeatable)
    #[arg(long = "exclude", value_name = "ID")]
    pub excludes: Vec<ResourceId>,

    /// Release to locked workloads too
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Report what would change without writing
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
