//! The release context: index, selector and writer over one checkout.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use tidewater_core::{Error, ResourceId, Result, ResultExt};
use tidewater_manifests::{Manifests, Resource, YamlManifests};
use tracing::{debug, info, warn};

use crate::checkout::Checkout;
use crate::cluster::Cluster;
use crate::filter::WorkloadFilter;
use crate::types::{ReleaseResult, SkipReason, WorkloadResult, WorkloadUpdate};

/// Everything a release needs: where the manifests are, how to read and
/// rewrite them, and how to ask the cluster what is running.
///
/// Each call reloads the manifests and re-queries the cluster; nothing is
/// cached between calls.
pub struct ReleaseContext {
    cluster: Arc<dyn Cluster>,
    manifests: Arc<dyn Manifests>,
    checkout: Arc<dyn Checkout>,
}

impl ReleaseContext {
    pub fn new(
        cluster: Arc<dyn Cluster>,
        manifests: Arc<dyn Manifests>,
        checkout: Arc<dyn Checkout>,
    ) -> Self {
        Self {
            cluster,
            manifests,
            checkout,
        }
    }

    pub fn builder() -> ReleaseContextBuilder {
        ReleaseContextBuilder::new()
    }

    pub fn checkout(&self) -> &Arc<dyn Checkout> {
        &self.checkout
    }

    /// Every resource declared in the checkout, workload or not.
    ///
    /// # Errors
    ///
    /// Fails if any manifest cannot be read or parsed, or if two manifests
    /// define the same resource.
    pub fn load_manifests(&self) -> Result<BTreeMap<ResourceId, Resource>> {
        let root = self.checkout.dir();
        self.manifests
            .load_manifests(root, &self.checkout.manifest_dirs())
            .context(|| format!("loading manifests from {}", root.display()))
    }

    /// The declared workloads, each with the absolute path of its manifest.
    ///
    /// # Errors
    ///
    /// Fails whenever [`Self::load_manifests`] does.
    pub fn workloads_for_update(&self) -> Result<BTreeMap<ResourceId, WorkloadUpdate>> {
        let root = self.checkout.dir();
        let workloads: BTreeMap<_, _> = self
            .load_manifests()?
            .into_iter()
            .filter_map(|(id, resource)| {
                let path = root.join(resource.source());
                resource
                    .into_workload()
                    .map(|workload| (id, WorkloadUpdate::new(workload, path)))
            })
            .collect();

        debug!(workloads = workloads.len(), "Indexed declared workloads");
        Ok(workloads)
    }

    /// Pick the workloads a release should touch.
    ///
    /// `prefilters` judge declared workloads before the cluster is asked;
    /// only the ones they pass are queried. `postfilters` judge the survivors
    /// once their running state is attached. Every verdict is recorded in
    /// `results`, overwriting earlier verdicts for the same workload.
    ///
    /// Returns the selected workloads in id order, with the running workload
    /// attached and no container updates set.
    ///
    /// # Errors
    ///
    /// Fails if the manifests cannot be loaded, the cluster cannot be
    /// queried, or the cluster reports a workload that was not asked about.
    pub fn select_workloads(
        &self,
        results: &mut ReleaseResult,
        prefilters: &[&dyn WorkloadFilter],
        postfilters: &[&dyn WorkloadFilter],
    ) -> Result<Vec<WorkloadUpdate>> {
        let declared = self.workloads_for_update()?;

        let mut candidates = BTreeMap::new();
        for (id, update) in declared {
            let verdict = update.filter(prefilters);
            if verdict.is_rejection() {
                debug!(workload = %id, verdict = %verdict, "Rejected before cluster query");
                results.record(id, verdict);
            } else {
                results.record(id.clone(), WorkloadResult::skipped(SkipReason::NotInCluster));
                candidates.insert(id, update);
            }
        }

        let ask = candidates.keys().cloned().collect_vec();
        let running = if ask.is_empty() {
            Vec::new()
        } else {
            self.cluster
                .some_workloads(&ask)
                .context(|| format!("querying cluster for {} workloads", ask.len()))?
        };

        let asked: BTreeSet<&ResourceId> = ask.iter().collect();
        let mut merged = BTreeMap::new();
        for workload in running {
            let id = workload.id.clone();
            if !asked.contains(&id) {
                return Err(Error::undefined_workload(id));
            }
            let Some(mut update) = candidates.remove(&id) else {
                warn!(workload = %id, "Cluster reported workload more than once, keeping first");
                continue;
            };
            update.workload = Some(workload);
            merged.insert(id, update);
        }

        for id in candidates.keys() {
            warn!(workload = %id, "Declared workload is not running in cluster");
        }

        let mut selected = Vec::with_capacity(merged.len());
        for (id, update) in merged {
            let verdict = update.filter(postfilters);
            debug!(workload = %id, verdict = %verdict, "Post-filter verdict");
            let keep = verdict.is_selected();
            results.record(id, verdict);
            if keep {
                selected.push(update);
            }
        }

        info!(
            asked = ask.len(),
            selected = selected.len(),
            recorded = results.len(),
            "Selected workloads"
        );
        Ok(selected)
    }

    /// Write each update's container changes into its manifest file.
    ///
    /// Updates are applied one after another, each re-reading its file, so
    /// several updates to one file all land. The first failure stops the
    /// batch; files already written stay written.
    ///
    /// # Errors
    ///
    /// Fails, naming the file and the resource, if a manifest cannot be
    /// read, rewritten or written back.
    pub fn write_updates(&self, updates: &[WorkloadUpdate]) -> Result<()> {
        for update in updates {
            let path = update.manifest_path.as_path();
            self.write_update(update, path)
                .inspect_err(|e| {
                    warn!(
                        workload = %update.resource_id,
                        path = %path.display(),
                        error = %e,
                        "Manifest write failed"
                    );
                })
                .context(|| {
                    format!("updating resource {} in {}", update.resource_id, path.display())
                })?;
            debug!(
                workload = %update.resource_id,
                path = %path.display(),
                containers = update.updates.len(),
                "Wrote manifest"
            );
        }

        info!(updates = updates.len(), "Manifest updates written");
        Ok(())
    }

    fn write_update(&self, update: &WorkloadUpdate, path: &Path) -> Result<()> {
        let mut bytes =
            std::fs::read(path).map_err(|e| Error::file_read_failed(path, e.to_string()))?;

        for change in &update.updates {
            bytes = self.manifests.update_image(
                &bytes,
                &update.resource_id,
                &change.container,
                &change.target,
            )?;
        }

        std::fs::write(path, bytes).map_err(|e| Error::file_write_failed(path, e.to_string()))
    }
}

/// Builder for [`ReleaseContext`]. Manifests default to [`YamlManifests`].
#[derive(Default)]
pub struct ReleaseContextBuilder {
    cluster: Option<Arc<dyn Cluster>>,
    manifests: Option<Arc<dyn Manifests>>,
    checkout: Option<Arc<dyn Checkout>>,
}

impl ReleaseContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_cluster(mut self, cluster: Arc<dyn Cluster>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    #[must_use]
    pub fn with_manifests(mut self, manifests: Arc<dyn Manifests>) -> Self {
        self.manifests = Some(manifests);
        self
    }

    #[must_use]
    pub fn with_checkout(mut self, checkout: Arc<dyn Checkout>) -> Self {
        self.checkout = Some(checkout);
        self
    }

    /// # Errors
    ///
    /// Fails if no cluster or no checkout was given.
    pub fn build(self) -> Result<ReleaseContext> {
        let cluster = self
            .cluster
            .ok_or_else(|| Error::invalid_config("a cluster is required"))?;
        let checkout = self
            .checkout
            .ok_or_else(|| Error::invalid_config("a checkout is required"))?;
        let manifests = self
            .manifests
            .unwrap_or_else(|| Arc::new(YamlManifests::new()));

        Ok(ReleaseContext::new(cluster, manifests, checkout))
    }
}
