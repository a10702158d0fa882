//! Shared fixtures for release integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use tidewater_core::{Error, ResourceId, Result};
use tidewater_manifests::{Container, YamlManifests};
use tidewater_release::{Cluster, LocalCheckout, ReleaseContext, Workload};

pub fn deployment(name: &str, image: &str) -> String {
    format!(
        "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
spec:
  template:
    spec:
      containers:
      - name: {name}
        image: {image}
"
    )
}

pub fn id(name: &str) -> ResourceId {
    ResourceId::new("default", "deployment", name)
}

pub fn running(name: &str, image: &str) -> Result<Workload> {
    Ok(Workload::new(id(name)).with_container(Container::new(name, image.parse()?)))
}

/// A checkout directory holding `files` (relative path, contents).
pub fn checkout(files: &[(&str, &str)]) -> Result<TempDir> {
    let dir = TempDir::new()?;
    for (path, contents) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, contents)?;
    }
    Ok(dir)
}

/// A cluster that answers from a fixed list and records every query.
#[derive(Default)]
pub struct RecordingCluster {
    running: Vec<Workload>,
    /// When set, every answer includes all of `running`, asked for or not.
    ignore_request: bool,
    /// When set, every workload in an answer is reported twice.
    repeat: bool,
    pub queries: Mutex<Vec<Vec<ResourceId>>>,
}

impl RecordingCluster {
    pub fn new(running: Vec<Workload>) -> Self {
        Self {
            running,
            ..Self::default()
        }
    }

    /// A misbehaving cluster that reports workloads it was not asked about.
    pub fn answering_everything(running: Vec<Workload>) -> Self {
        Self {
            running,
            ignore_request: true,
            ..Self::default()
        }
    }

    /// A cluster that lists each requested workload twice in its answer.
    pub fn repeating(running: Vec<Workload>) -> Self {
        Self {
            running,
            repeat: true,
            ..Self::default()
        }
    }

    pub fn asked(&self) -> Vec<ResourceId> {
        self.queries
            .lock()
            .map(|q| q.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }
}

impl Cluster for RecordingCluster {
    fn some_workloads(&self, ids: &[ResourceId]) -> Result<Vec<Workload>> {
        self.queries
            .lock()
            .map_err(|e| Error::cluster_query_failed(e.to_string()))?
            .push(ids.to_vec());
        let copies = if self.repeat { 2 } else { 1 };
        Ok(self
            .running
            .iter()
            .filter(|w| self.ignore_request || ids.contains(&w.id))
            .flat_map(|w| std::iter::repeat_n(w.clone(), copies))
            .collect())
    }
}

/// A cluster that is unreachable.
pub struct DownCluster;

impl Cluster for DownCluster {
    fn some_workloads(&self, _ids: &[ResourceId]) -> Result<Vec<Workload>> {
        Err(Error::cluster_query_failed("connection refused"))
    }
}

pub fn context(root: &Path, cluster: Arc<dyn Cluster>) -> ReleaseContext {
    ReleaseContext::new(
        cluster,
        Arc::new(YamlManifests::new()),
        Arc::new(LocalCheckout::new(root)),
    )
}
