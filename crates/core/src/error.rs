//! Core error types for Tidewater operations.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.
//! Every variant that concerns a file or a resource carries it, so a caller
//! can always tell the user *what* failed and *where*.

use std::path::PathBuf;

use thiserror::Error;

use crate::resource_id::ResourceId;

/// Core error type for Tidewater operations.
#[derive(Debug, Error)]
pub enum Error {
    // I/O errors
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("failed to write file '{path}': {reason}")]
    FileWriteFailed { path: PathBuf, reason: String },

    #[error("failed to scan manifest directory '{path}': {reason}")]
    DirectoryScanFailed { path: PathBuf, reason: String },

    // Manifest errors
    #[error("failed to parse manifest '{path}': {reason}")]
    ManifestParseFailed { path: PathBuf, reason: String },

    #[error("duplicate definition of '{id}' (in {first} and {second})")]
    DuplicateDefinition {
        id: ResourceId,
        first: String,
        second: String,
    },

    #[error("resource '{id}' not found in manifest")]
    ResourceNotFound { id: ResourceId },

    #[error("container '{container}' not found in resource '{id}'")]
    ContainerNotFound { id: ResourceId, container: String },

    #[error("manifest is not valid UTF-8: {reason}")]
    InvalidEncoding { reason: String },

    // Cluster errors
    #[error("cluster query failed: {reason}")]
    ClusterQueryFailed { reason: String },

    #[error("workload {id} was requested and is running, but is not defined")]
    UndefinedWorkload { id: ResourceId },

    // Identifier parsing
    #[error("invalid resource id '{input}': {reason}")]
    InvalidResourceId { input: String, reason: String },

    #[error("invalid image reference '{input}': {reason}")]
    InvalidImageRef { input: String, reason: String },

    // Configuration
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to parse config '{path}': {reason}")]
    ConfigParseFailed { path: PathBuf, reason: String },

    // Operation description wrapped around an underlying failure
    #[error("{operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    // Generic I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a file write error.
    pub fn file_write_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a directory scan error.
    pub fn directory_scan_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DirectoryScanFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a manifest parse error.
    pub fn manifest_parse_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ManifestParseFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate_definition(
        id: ResourceId,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::DuplicateDefinition {
            id,
            first: first.into(),
            second: second.into(),
        }
    }

    /// Create a resource not found error.
    #[must_use]
    pub const fn resource_not_found(id: ResourceId) -> Self {
        Self::ResourceNotFound { id }
    }

    /// Create a container not found error.
    pub fn container_not_found(id: ResourceId, container: impl Into<String>) -> Self {
        Self::ContainerNotFound {
            id,
            container: container.into(),
        }
    }

    /// Create a cluster query error.
    pub fn cluster_query_failed(reason: impl Into<String>) -> Self {
        Self::ClusterQueryFailed {
            reason: reason.into(),
        }
    }

    /// Create an undefined workload error.
    #[must_use]
    pub const fn undefined_workload(id: ResourceId) -> Self {
        Self::UndefinedWorkload { id }
    }

    /// Create an invalid resource id error.
    pub fn invalid_resource_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResourceId {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid image reference error.
    pub fn invalid_image_ref(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidImageRef {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a config parse error.
    pub fn config_parse_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigParseFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap this error with a description of the operation that failed.
    #[must_use]
    pub fn context(self, operation: impl Into<String>) -> Self {
        Self::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any operation descriptions.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_read_failed_names_path() {
        let err = Error::file_read_failed("/tmp/deploy.yaml", "No such file");
        assert!(err.to_string().contains("/tmp/deploy.yaml"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn test_context_wraps_and_keeps_root_cause() {
        let id = ResourceId::new("default", "deployment", "web");
        let err = Error::container_not_found(id.clone(), "app")
            .context(format!("updating resource {id} in web.yaml"));

        let message = err.to_string();
        assert!(message.starts_with("updating resource default:deployment/web in web.yaml"));
        assert!(message.contains("container 'app'"));
        assert!(matches!(err.root_cause(), Error::ContainerNotFound { .. }));
    }

    #[test]
    fn test_undefined_workload_names_id() {
        let id = ResourceId::new("prod", "daemonset", "agent");
        let err = Error::undefined_workload(id);
        assert!(err.to_string().contains("prod:daemonset/agent"));
    }
}
