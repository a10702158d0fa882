//! # tidewater-manifests
//!
//! The declared side of a release: Kubernetes-style YAML manifests in a
//! checkout.
//!
//! - [`Resource`] is the parsed form of one manifest document; only pod
//!   controllers ([`Resource::as_workload`]) are releasable.
//! - [`Manifests`] is the contract the release engine needs from a manifest
//!   format: load every resource under some directories, and rewrite one
//!   container image in raw manifest bytes.
//! - [`YamlManifests`] implements it for plain multi-document YAML files.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![forbid(clippy::expect_used)]

pub mod load;
pub mod parse;
pub mod resource;
pub mod update;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tidewater_core::{ImageRef, ResourceId, Result};

pub use parse::parse_manifest;
pub use resource::{
    Container, IGNORE_ANNOTATION, LOCKED_ANNOTATION, PodController, Resource, ResourceMeta,
};

/// Access to a set of manifest files.
pub trait Manifests: Send + Sync {
    /// Load every resource defined under `dirs`, keyed by identifier. Each
    /// resource records its defining file relative to `base`.
    ///
    /// # Errors
    ///
    /// Fails if any file cannot be read or parsed.
    fn load_manifests(&self, base: &Path, dirs: &[PathBuf]) -> Result<BTreeMap<ResourceId, Resource>>;

    /// Return `def` with the image of `container` in resource `id` set to
    /// `image`, and nothing else changed.
    ///
    /// # Errors
    ///
    /// Fails if the resource or container cannot be located in `def`.
    fn update_image(
        &self,
        def: &[u8],
        id: &ResourceId,
        container: &str,
        image: &ImageRef,
    ) -> Result<Vec<u8>>;
}

/// Plain YAML manifest files.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlManifests;

impl YamlManifests {
    pub const fn new() -> Self {
        Self
    }
}

impl Manifests for YamlManifests {
    fn load_manifests(&self, base: &Path, dirs: &[PathBuf]) -> Result<BTreeMap<ResourceId, Resource>> {
        load::load_manifests(base, dirs)
    }

    fn update_image(
        &self,
        def: &[u8],
        id: &ResourceId,
        container: &str,
        image: &ImageRef,
    ) -> Result<Vec<u8>> {
        update::update_image(def, id, container, image)
    }
}
