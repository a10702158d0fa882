//! The running side of a release.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tidewater_core::{Error, ResourceId, Result};
use tidewater_manifests::Container;
use tracing::debug;

/// Coarse health of a running workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadStatus {
    #[default]
    Ready,
    Updating,
    Error,
    Unknown,
}

/// Replica counts of a running workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutStatus {
    pub desired: u32,
    pub updated: u32,
    pub ready: u32,
    pub available: u32,
    pub outdated: u32,
}

/// A workload as the cluster reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: ResourceId,
    #[serde(default)]
    pub status: WorkloadStatus,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub rollout: RolloutStatus,
}

impl Workload {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            status: WorkloadStatus::default(),
            containers: Vec::new(),
            rollout: RolloutStatus::default(),
        }
    }

    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: WorkloadStatus) -> Self {
        self.status = status;
        self
    }
}

/// Access to the running cluster.
pub trait Cluster: Send + Sync {
    /// Report the running workloads among `ids`. Ids that are not running are
    /// left out of the result.
    ///
    /// # Errors
    ///
    /// Fails if the cluster cannot be queried.
    fn some_workloads(&self, ids: &[ResourceId]) -> Result<Vec<Workload>>;
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    workloads: Vec<Workload>,
}

/// A cluster answered from a fixed list of running workloads.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCluster {
    workloads: BTreeMap<ResourceId, Workload>,
}

impl SnapshotCluster {
    /// # Errors
    ///
    /// Fails if two workloads share an id.
    pub fn new(workloads: impl IntoIterator<Item = Workload>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for workload in workloads {
            let id = workload.id.clone();
            if by_id.insert(id.clone(), workload).is_some() {
                return Err(Error::cluster_query_failed(format!(
                    "workload {id} appears more than once in snapshot"
                )));
            }
        }
        Ok(Self { workloads: by_id })
    }

    /// Parse a snapshot of the form `workloads: [...]`.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or duplicate workloads.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_yaml::from_str(text)
            .map_err(|e| Error::cluster_query_failed(format!("invalid snapshot: {e}")))?;
        Self::new(snapshot.workloads)
    }

    /// # Errors
    ///
    /// Fails if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        let cluster = Self::from_yaml(&text)
            .map_err(|e| e.context(format!("loading cluster snapshot {}", path.display())))?;
        debug!(path = %path.display(), workloads = cluster.len(), "Loaded cluster snapshot");
        Ok(cluster)
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

impl Cluster for SnapshotCluster {
    fn some_workloads(&self, ids: &[ResourceId]) -> Result<Vec<Workload>> {
        let mut seen = BTreeSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.workloads.get(id))
            .cloned()
            .collect())
    }
}
