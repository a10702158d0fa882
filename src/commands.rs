//! CLI command handlers.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;
use tidewater_core::{ImageRef, ResourceId};
use tidewater_release::{
    ExcludeFilter, IgnoreFilter, IncludeFilter, LocalCheckout, LockedFilter, ReleaseContext,
    ReleaseResult, SkipReason, SnapshotCluster, SpecificImageFilter, WorkloadFilter,
    WorkloadResult,
};
use tracing::info;

use crate::cli::{Commands, ReleaseArgs};
use crate::config::Config;

/// Execute a CLI command, writing its report to `out`.
///
/// # Errors
///
/// Fails if the release context cannot be built or the command aborts.
pub fn execute_command(command: &Commands, config: &Config, out: &mut dyn Write) -> Result<()> {
    let context = build_context(config, needs_cluster(command))?;
    match command {
        Commands::Workloads { json } => cmd_workloads(&context, *json, out)
            .context("listing workloads"),
        Commands::Release(args) => cmd_release(&context, args, out)
            .with_context(|| format!("releasing {}", args.image)),
    }
}

const fn needs_cluster(command: &Commands) -> bool {
    matches!(command, Commands::Release(_))
}

/// Wire a release context from configuration.
///
/// Without a cluster snapshot the context answers every query with "nothing
/// running"; commands that need the cluster pass `require_cluster`.
///
/// # Errors
///
/// Fails if a required snapshot is missing or unreadable.
pub fn build_context(config: &Config, require_cluster: bool) -> Result<ReleaseContext> {
    let cluster = match &config.cluster.snapshot {
        Some(path) => SnapshotCluster::load(path)?,
        None if require_cluster => {
            anyhow::bail!(
                "no cluster snapshot configured: pass --cluster or set [cluster] snapshot"
            )
        }
        None => SnapshotCluster::default(),
    };
    let checkout =
        LocalCheckout::new(&config.checkout.root).with_paths(config.checkout.paths.iter().cloned());

    Ok(ReleaseContext::builder()
        .with_cluster(Arc::new(cluster))
        .with_checkout(Arc::new(checkout))
        .build()?)
}

#[derive(Debug, Serialize)]
struct WorkloadListing {
    id: ResourceId,
    source: String,
    containers: Vec<ContainerListing>,
}

#[derive(Debug, Serialize)]
struct ContainerListing {
    name: String,
    image: ImageRef,
}

/// List declared workloads.
fn cmd_workloads(context: &ReleaseContext, json: bool, out: &mut dyn Write) -> Result<()> {
    let listings = context
        .workloads_for_update()?
        .into_values()
        .map(|update| WorkloadListing {
            id: update.resource_id,
            source: update.resource.source().to_string(),
            containers: update
                .resource
                .all_containers()
                .map(|c| ContainerListing {
                    name: c.name.clone(),
                    image: c.image.clone(),
                })
                .collect(),
        })
        .collect_vec();

    if json {
        serde_json::to_writer_pretty(&mut *out, &listings)?;
        writeln!(out)?;
        return Ok(());
    }

    if listings.is_empty() {
        writeln!(out, "No workloads found")?;
        return Ok(());
    }

    let width = listings
        .iter()
        .map(|l| l.id.to_string().len())
        .max()
        .unwrap_or_default();
    writeln!(out, "{:<width$}  SOURCE", "WORKLOAD")?;
    for listing in &listings {
        writeln!(out, "{:<width$}  {}", listing.id.to_string(), listing.source)?;
        for container in &listing.containers {
            writeln!(out, "{:<width$}    {}: {}", "", container.name, container.image)?;
        }
    }
    Ok(())
}

/// What a release should do, independent of how it was asked for.
#[derive(Debug, Clone)]
pub struct ReleaseSpec {
    pub image: ImageRef,
    /// `None` releases to every workload.
    pub include: Option<Vec<ResourceId>>,
    pub exclude: Vec<ResourceId>,
    pub force: bool,
    pub dry_run: bool,
}

impl From<&ReleaseArgs> for ReleaseSpec {
    fn from(args: &ReleaseArgs) -> Self {
        Self {
            image: args.image.clone(),
            include: (!args.all).then(|| args.workloads.clone()),
            exclude: args.excludes.clone(),
            force: args.force,
            dry_run: args.dry_run,
        }
    }
}

/// Run a release: select, plan, write, and record the outcome per workload.
///
/// # Errors
///
/// Fails if selection aborts or a manifest write fails.
pub fn release(context: &ReleaseContext, spec: &ReleaseSpec) -> tidewater_core::Result<ReleaseResult> {
    let include = spec.include.as_ref().map(|ids| IncludeFilter::new(ids.iter().cloned()));
    let exclude = ExcludeFilter::new(spec.exclude.iter().cloned());
    let specific = SpecificImageFilter::new(spec.image.clone());

    let mut prefilters: Vec<&dyn WorkloadFilter> = Vec::new();
    if let Some(include) = &include {
        prefilters.push(include);
    }
    prefilters.push(&exclude);
    prefilters.push(&IgnoreFilter);
    if !spec.force {
        prefilters.push(&LockedFilter);
    }

    let mut results = ReleaseResult::new();
    let selected = context.select_workloads(&mut results, &prefilters, &[&specific])?;

    let mut to_write = Vec::with_capacity(selected.len());
    for mut update in selected {
        update.updates = update.plan_image(&spec.image);
        if update.updates.is_empty() {
            results.record(
                update.resource_id.clone(),
                WorkloadResult::skipped(SkipReason::ImageUpToDate),
            );
        } else {
            to_write.push(update);
        }
    }

    if spec.dry_run {
        info!(updates = to_write.len(), "Dry run, not writing manifests");
    } else {
        context.write_updates(&to_write)?;
    }

    for update in to_write {
        results.record(
            update.resource_id,
            WorkloadResult::Success {
                per_container: update.updates,
            },
        );
    }

    info!(
        image = %spec.image,
        affected = results.affected_resources().len(),
        dry_run = spec.dry_run,
        "Release finished"
    );
    Ok(results)
}

fn cmd_release(context: &ReleaseContext, args: &ReleaseArgs, out: &mut dyn Write) -> Result<()> {
    let results = release(context, &ReleaseSpec::from(args))?;
    render_results(&results, args.json, out)
}

/// Print the ledger as a table or JSON.
///
/// # Errors
///
/// Fails if `out` cannot be written.
pub fn render_results(results: &ReleaseResult, json: bool, out: &mut dyn Write) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, results)?;
        writeln!(out)?;
        return Ok(());
    }

    let width = results
        .iter()
        .map(|(id, _)| id.to_string().len())
        .max()
        .unwrap_or_default()
        .max("WORKLOAD".len());
    writeln!(out, "{:<width$}  STATUS", "WORKLOAD")?;
    for (id, result) in results {
        writeln!(out, "{:<width$}  {result}", id.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_means_no_include_filter() -> tidewater_core::Result<()> {
        let args = ReleaseArgs {
            image: "app/web:2".parse()?,
            workloads: Vec::new(),
            all: true,
            excludes: Vec::new(),
            force: false,
            dry_run: false,
            json: false,
        };
        assert!(ReleaseSpec::from(&args).include.is_none());

        let args = ReleaseArgs {
            all: false,
            workloads: vec!["default:deployment/web".parse()?],
            ..args
        };
        assert_eq!(ReleaseSpec::from(&args).include.map(|ids| ids.len()), Some(1));
        Ok(())
    }

    #[test]
    fn test_render_table() -> Result<()> {
        let mut results = ReleaseResult::new();
        results.record(
            "default:deployment/web".parse()?,
            WorkloadResult::skipped(SkipReason::Locked),
        );

        let mut out = Vec::new();
        render_results(&results, false, &mut out)?;
        let text = String::from_utf8(out)?;
        assert!(text.starts_with("WORKLOAD"));
        assert!(text.contains("default:deployment/web  skipped (locked)"));
        Ok(())
    }

    #[test]
    fn test_release_without_snapshot_is_refused() {
        let result = build_context(&Config::default(), true);
        assert!(result.is_err_and(|e| e.to_string().contains("no cluster snapshot")));
    }
}
