//! Declared resources.
//!
//! [`Resource`] is a closed set of kinds. The deployable workload kinds each
//! wrap a [`PodController`]; everything else is [`Resource::Other`] and only
//! carries metadata. Adding a workload kind means adding a variant here and
//! handling it in the parser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tidewater_core::{ImageRef, ResourceId};

/// Annotation that locks a resource against automated releases.
pub const LOCKED_ANNOTATION: &str = "tidewater.io/locked";

/// Annotation that takes a resource out of Tidewater's hands entirely.
pub const IGNORE_ANNOTATION: &str = "tidewater.io/ignore";

/// A container as declared in a pod template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: ImageRef,
}

impl Container {
    pub fn new(name: impl Into<String>, image: ImageRef) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }
}

/// Metadata every declared resource has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceMeta {
    pub id: ResourceId,
    /// Path of the defining file, relative to the checkout root.
    pub source: String,
    pub annotations: BTreeMap<String, String>,
}

impl ResourceMeta {
    pub fn new(id: ResourceId, source: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            annotations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn is_locked(&self) -> bool {
        self.policy_enabled(LOCKED_ANNOTATION)
    }

    pub fn is_ignored(&self) -> bool {
        self.policy_enabled(IGNORE_ANNOTATION)
    }

    fn policy_enabled(&self, key: &str) -> bool {
        self.annotations
            .get(key)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }
}

/// A resource that runs pods from a template: the unit Tidewater releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodController {
    pub meta: ResourceMeta,
    pub containers: Vec<Container>,
    pub init_containers: Vec<Container>,
}

impl PodController {
    pub fn new(meta: ResourceMeta) -> Self {
        Self {
            meta,
            containers: Vec::new(),
            init_containers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_container(mut self, container: Container) -> Self {
        self.containers.push(container);
        self
    }

    #[must_use]
    pub fn with_init_container(mut self, container: Container) -> Self {
        self.init_containers.push(container);
        self
    }

    pub const fn id(&self) -> &ResourceId {
        &self.meta.id
    }

    pub fn source(&self) -> &str {
        &self.meta.source
    }

    /// Init containers first, then regular containers.
    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.init_containers.iter().chain(self.containers.iter())
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.all_containers().find(|c| c.name == name)
    }
}

/// A declared resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Deployment(PodController),
    DaemonSet(PodController),
    StatefulSet(PodController),
    CronJob(PodController),
    Other(ResourceMeta),
}

impl Resource {
    pub const fn meta(&self) -> &ResourceMeta {
        match self {
            Self::Deployment(w) | Self::DaemonSet(w) | Self::StatefulSet(w) | Self::CronJob(w) => {
                &w.meta
            }
            Self::Other(meta) => meta,
        }
    }

    pub const fn id(&self) -> &ResourceId {
        &self.meta().id
    }

    pub fn source(&self) -> &str {
        &self.meta().source
    }

    /// The deployable-workload capability: `Some` for every pod controller kind.
    pub const fn as_workload(&self) -> Option<&PodController> {
        match self {
            Self::Deployment(w) | Self::DaemonSet(w) | Self::StatefulSet(w) | Self::CronJob(w) => {
                Some(w)
            }
            Self::Other(_) => None,
        }
    }

    pub fn into_workload(self) -> Option<PodController> {
        match self {
            Self::Deployment(w) | Self::DaemonSet(w) | Self::StatefulSet(w) | Self::CronJob(w) => {
                Some(w)
            }
            Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_core::Result;

    fn meta(name: &str) -> ResourceMeta {
        ResourceMeta::new(ResourceId::new("default", "deployment", name), "apps/web.yaml")
    }

    #[test]
    fn test_only_pod_controllers_are_workloads() {
        let deployment = Resource::Deployment(PodController::new(meta("web")));
        let service = Resource::Other(ResourceMeta::new(
            ResourceId::new("default", "service", "web"),
            "apps/web.yaml",
        ));

        assert!(deployment.as_workload().is_some());
        assert!(service.as_workload().is_none());
        assert_eq!(service.source(), "apps/web.yaml");
    }

    #[test]
    fn test_policies_from_annotations() {
        let locked = meta("web").with_annotation(LOCKED_ANNOTATION, "true");
        let unlocked = meta("web").with_annotation(LOCKED_ANNOTATION, "false");
        let ignored = meta("web").with_annotation(IGNORE_ANNOTATION, "TRUE");

        assert!(locked.is_locked());
        assert!(!unlocked.is_locked());
        assert!(ignored.is_ignored());
        assert!(!ignored.is_locked());
    }

    #[test]
    fn test_container_lookup_covers_init_containers() -> Result<()> {
        let workload = PodController::new(meta("web"))
            .with_init_container(Container::new("migrate", "app/migrate:1".parse()?))
            .with_container(Container::new("app", "app/web:1".parse()?));

        assert_eq!(workload.all_containers().count(), 2);
        assert!(workload.container("migrate").is_some());
        assert!(workload.container("sidecar").is_none());
        Ok(())
    }
}
