//! Resource identifiers.
//!
//! A [`ResourceId`] names one resource across the whole system as
//! `namespace:kind/name`. Kinds are compared case-insensitively, so they are
//! stored lower-cased; cluster-scoped resources live in the
//! [`CLUSTER_SCOPE`] pseudo-namespace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Namespace used for resources that are not namespaced.
pub const CLUSTER_SCOPE: &str = "<cluster>";

/// Globally unique key of a resource: namespace, kind and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    namespace: String,
    kind: String,
    name: String,
}

impl ResourceId {
    /// Create a resource id. The kind is normalised to lower case.
    pub fn new(namespace: impl Into<String>, kind: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.as_ref().to_lowercase(),
            name: name.into(),
        }
    }

    /// Create the id of a cluster-scoped resource.
    pub fn cluster_scoped(kind: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self::new(CLUSTER_SCOPE, kind, name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the resource is cluster-scoped.
    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace == CLUSTER_SCOPE
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.namespace, self.kind, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::invalid_resource_id(s, "expected <namespace>:<kind>/<name>"))?;
        let (kind, name) = rest
            .split_once('/')
            .ok_or_else(|| Error::invalid_resource_id(s, "expected <kind>/<name> after ':'"))?;

        if namespace.is_empty() || kind.is_empty() || name.is_empty() {
            return Err(Error::invalid_resource_id(
                s,
                "namespace, kind and name must all be non-empty",
            ));
        }
        if name.contains('/') || kind.contains(':') {
            return Err(Error::invalid_resource_id(s, "too many separators"));
        }

        Ok(Self::new(namespace, kind, name))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() -> Result<(), Error> {
        let id: ResourceId = "prod:Deployment/web".parse()?;
        assert_eq!(id.namespace(), "prod");
        assert_eq!(id.kind(), "deployment");
        assert_eq!(id.name(), "web");
        assert_eq!(id.to_string(), "prod:deployment/web");
        Ok(())
    }

    #[test]
    fn test_cluster_scoped() -> Result<(), Error> {
        let id: ResourceId = "<cluster>:namespace/prod".parse()?;
        assert!(id.is_cluster_scoped());
        assert_eq!(id, ResourceId::cluster_scoped("Namespace", "prod"));
        Ok(())
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["web", "prod:web", ":deployment/web", "prod:/web", "prod:deployment/", "a:b/c/d"] {
            assert!(input.parse::<ResourceId>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn test_ordering_is_namespace_then_kind_then_name() {
        let a = ResourceId::new("a", "deployment", "z");
        let b = ResourceId::new("b", "cronjob", "a");
        let c = ResourceId::new("b", "deployment", "a");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_serializes_as_string() -> Result<(), serde_json::Error> {
        let id = ResourceId::new("default", "statefulset", "db");
        let json = serde_json::to_string(&id)?;
        assert_eq!(json, "\"default:statefulset/db\"");
        let back: ResourceId = serde_json::from_str(&json)?;
        assert_eq!(back, id);
        Ok(())
    }
}
