//! Core types for a release run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tidewater_core::{ImageRef, ResourceId};
use tidewater_manifests::PodController;

use crate::cluster::Workload;
use crate::filter::{WorkloadFilter, apply_filters};

/// Why a workload was left out of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NotInRepo,
    NotInCluster,
    Excluded,
    NotIncluded,
    Locked,
    Ignored,
    DifferentImage,
    ImageUpToDate,
    /// Reason given by a caller-defined filter.
    Custom(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInRepo => f.write_str("not found in repository"),
            Self::NotInCluster => f.write_str("not running in cluster"),
            Self::Excluded => f.write_str("excluded"),
            Self::NotIncluded => f.write_str("not included"),
            Self::Locked => f.write_str("locked"),
            Self::Ignored => f.write_str("ignored"),
            Self::DifferentImage => f.write_str("a different image"),
            Self::ImageUpToDate => f.write_str("image(s) up to date"),
            Self::Custom(reason) => f.write_str(reason),
        }
    }
}

/// The verdict recorded for one workload.
///
/// `Pending` is the empty verdict: nothing has rejected the workload yet.
/// Filters pass a workload by returning `Pending` or `Success`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkloadResult {
    #[default]
    Pending,
    Success {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        per_container: Vec<ContainerUpdate>,
    },
    Skipped {
        reason: SkipReason,
    },
    Ignored {
        reason: SkipReason,
    },
    Failed {
        error: String,
    },
}

impl WorkloadResult {
    #[must_use]
    pub const fn success() -> Self {
        Self::Success {
            per_container: Vec::new(),
        }
    }

    #[must_use]
    pub const fn skipped(reason: SkipReason) -> Self {
        Self::Skipped { reason }
    }

    #[must_use]
    pub const fn ignored(reason: SkipReason) -> Self {
        Self::Ignored { reason }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Skipped, ignored and failed verdicts stop a workload.
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Skipped { .. } | Self::Ignored { .. } | Self::Failed { .. }
        )
    }

    /// Whether a workload with this verdict stays in the release.
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Pending | Self::Success { .. })
    }

    pub const fn status(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success { .. } => "success",
            Self::Skipped { .. } => "skipped",
            Self::Ignored { .. } => "ignored",
            Self::Failed { .. } => "failed",
        }
    }

    pub const fn reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Skipped { reason } | Self::Ignored { reason } => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for WorkloadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped { reason } | Self::Ignored { reason } => {
                write!(f, "{} ({reason})", self.status())
            }
            Self::Failed { error } => write!(f, "failed ({error})"),
            Self::Success { per_container } if !per_container.is_empty() => {
                let changes = per_container
                    .iter()
                    .map(|c| format!("{}: {} -> {}", c.container, c.current, c.target))
                    .join(", ");
                write!(f, "success ({changes})")
            }
            _ => f.write_str(self.status()),
        }
    }
}

/// One container image change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUpdate {
    pub container: String,
    pub current: ImageRef,
    pub target: ImageRef,
}

/// A workload moving through a release: what is declared, what is running,
/// and the container changes to write.
#[derive(Debug, Clone)]
pub struct WorkloadUpdate {
    pub resource_id: ResourceId,
    /// The declared resource.
    pub resource: PodController,
    /// The running workload, once the cluster has reported it.
    pub workload: Option<Workload>,
    /// Absolute path of the file defining `resource`.
    pub manifest_path: PathBuf,
    /// Container changes, filled in by the caller before writing.
    pub updates: Vec<ContainerUpdate>,
}

impl WorkloadUpdate {
    pub fn new(resource: PodController, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            resource_id: resource.id().clone(),
            resource,
            workload: None,
            manifest_path: manifest_path.into(),
            updates: Vec::new(),
        }
    }

    /// Run `filters` in order; the first rejection wins.
    pub fn filter(&self, filters: &[&dyn WorkloadFilter]) -> WorkloadResult {
        apply_filters(self, filters)
    }

    /// Container changes that would move this workload onto `target`.
    ///
    /// Considers the running containers when the cluster has reported the
    /// workload, otherwise the declared ones; only containers that are also
    /// declared in the manifest and run a different version of the same image
    /// are included.
    pub fn plan_image(&self, target: &ImageRef) -> Vec<ContainerUpdate> {
        let running: Vec<_> = match &self.workload {
            Some(workload) => workload.containers.iter().collect(),
            None => self.resource.all_containers().collect(),
        };

        running
            .into_iter()
            .filter(|c| self.resource.container(&c.name).is_some())
            .filter(|c| c.image.same_image(target) && c.image != *target)
            .map(|c| ContainerUpdate {
                container: c.name.clone(),
                current: c.image.clone(),
                target: target.clone(),
            })
            .collect()
    }
}

/// The ledger of a release run: the latest verdict for every workload.
///
/// The caller owns it and passes it by `&mut` to each stage; a stage that
/// judges a workload again overwrites the earlier verdict. There is no
/// internal locking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseResult(BTreeMap<ResourceId, WorkloadResult>);

impl ReleaseResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verdict, returning the one it replaces.
    pub fn record(&mut self, id: ResourceId, result: WorkloadResult) -> Option<WorkloadResult> {
        self.0.insert(id, result)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&WorkloadResult> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &WorkloadResult)> {
        self.0.iter()
    }

    /// Workloads whose release succeeded.
    pub fn affected_resources(&self) -> Vec<ResourceId> {
        self.0
            .iter()
            .filter(|(_, result)| matches!(result, WorkloadResult::Success { .. }))
            .map(|(id, _)| id.clone())
            .collect_vec()
    }

    /// Summary of every failed workload, if any failed.
    pub fn error(&self) -> Option<String> {
        let failures = self
            .0
            .iter()
            .filter_map(|(id, result)| match result {
                WorkloadResult::Failed { error } => Some(format!("{id}: {error}")),
                _ => None,
            })
            .collect_vec();

        match failures.len() {
            0 => None,
            1 => failures.into_iter().next(),
            n => Some(format!("{n} workloads failed: {}", failures.join("; "))),
        }
    }
}

impl<'a> IntoIterator for &'a ReleaseResult {
    type Item = (&'a ResourceId, &'a WorkloadResult);
    type IntoIter = std::collections::btree_map::Iter<'a, ResourceId, WorkloadResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
