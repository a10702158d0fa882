//! # tidewater-release
//!
//! Decides which declared workloads a release touches and writes the
//! decided image changes back into their manifests.
//!
//! A release run goes:
//!
//! 1. **Index**: load the declared workloads from the [`Checkout`]
//!    ([`ReleaseContext::workloads_for_update`]).
//! 2. **Pre-filter**: judge each declared workload; rejected ones never
//!    reach the cluster.
//! 3. **Query**: ask the [`Cluster`] about the survivors only.
//! 4. **Post-filter**: judge the survivors with their running state attached
//!    ([`ReleaseContext::select_workloads`]).
//! 5. **Write**: the caller fills in container updates (see
//!    [`WorkloadUpdate::plan_image`]) and hands them to
//!    [`ReleaseContext::write_updates`].
//!
//! Every verdict lands in a caller-owned [`ReleaseResult`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidewater_release::{
//!     ExcludeFilter, LocalCheckout, ReleaseContext, ReleaseResult, SnapshotCluster,
//!     SpecificImageFilter,
//! };
//!
//! let context = ReleaseContext::builder()
//!     .with_checkout(Arc::new(LocalCheckout::new("/work/config")))
//!     .with_cluster(Arc::new(SnapshotCluster::load("cluster.yaml".as_ref())?))
//!     .build()?;
//!
//! let target = "app/web:1.4".parse()?;
//! let exclude = ExcludeFilter::new(["default:deployment/legacy".parse()?]);
//! let image = SpecificImageFilter::new(target.clone());
//!
//! let mut results = ReleaseResult::new();
//! let mut selected = context.select_workloads(&mut results, &[&exclude], &[&image])?;
//! for update in &mut selected {
//!     update.updates = update.plan_image(&target);
//! }
//! context.write_updates(&selected)?;
//! ```

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::expect_used)]
#![forbid(clippy::panic)]

pub mod checkout;
pub mod cluster;
pub mod context;
pub mod filter;
pub mod types;

pub use checkout::{Checkout, LocalCheckout};
pub use cluster::{Cluster, RolloutStatus, SnapshotCluster, Workload, WorkloadStatus};
pub use context::{ReleaseContext, ReleaseContextBuilder};
pub use filter::{
    ExcludeFilter, IgnoreFilter, IncludeFilter, LockedFilter, SpecificImageFilter,
    WorkloadFilter, apply_filters,
};
pub use tidewater_core::{Error, Result};
pub use types::{ContainerUpdate, ReleaseResult, SkipReason, WorkloadResult, WorkloadUpdate};
