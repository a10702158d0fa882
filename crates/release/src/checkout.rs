//! Working trees holding the manifests.

use std::path::{Path, PathBuf};

/// A checked-out copy of the manifest repository.
pub trait Checkout: Send + Sync {
    /// Root of the working tree. Resource sources are relative to it.
    fn dir(&self) -> &Path;

    /// Directories to search for manifests.
    fn manifest_dirs(&self) -> Vec<PathBuf>;
}

/// A checkout that already exists on local disk.
#[derive(Debug, Clone)]
pub struct LocalCheckout {
    root: PathBuf,
    paths: Vec<PathBuf>,
}

impl LocalCheckout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            paths: Vec::new(),
        }
    }

    /// Restrict manifest discovery to `paths`, relative to the root.
    #[must_use]
    pub fn with_paths(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }
}

impl Checkout for LocalCheckout {
    fn dir(&self) -> &Path {
        &self.root
    }

    fn manifest_dirs(&self) -> Vec<PathBuf> {
        if self.paths.is_empty() {
            return vec![self.root.clone()];
        }
        self.paths.iter().map(|p| self.root.join(p)).collect()
    }
}
