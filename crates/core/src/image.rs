//! Container image references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// A container image reference: `[registry/]repository[:tag][@digest]`.
///
/// The *name* is everything but the tag and digest. Two references with the
/// same name are versions of the same image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRef {
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    /// Image name without tag or digest, e.g. `quay.io/org/app`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// The same image at a different tag; any digest is dropped.
    #[must_use]
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            tag: Some(tag.into()),
            digest: None,
        }
    }

    /// Whether both references name the same image, regardless of version.
    pub fn same_image(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

impl FromStr for ImageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::invalid_image_ref(s, "empty image reference"));
        }
        if s.chars().any(char::is_whitespace) {
            return Err(Error::invalid_image_ref(s, "contains whitespace"));
        }

        let (rest, digest) = match s.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_string())),
            Some(_) => return Err(Error::invalid_image_ref(s, "empty digest")),
            None => (s, None),
        };

        // A ':' before the last '/' is a registry port, not a tag.
        let (prefix, last) = match rest.rsplit_once('/') {
            Some((prefix, last)) => (Some(prefix), last),
            None => (None, rest),
        };
        let (last_name, tag) = match last.split_once(':') {
            Some((_, "")) => return Err(Error::invalid_image_ref(s, "empty tag")),
            Some((name, tag)) => (name, Some(tag.to_string())),
            None => (last, None),
        };
        if last_name.is_empty() || prefix.is_some_and(str::is_empty) {
            return Err(Error::invalid_image_ref(s, "empty repository name"));
        }

        let name = prefix.map_or_else(|| last_name.to_string(), |p| format!("{p}/{last_name}"));
        Ok(Self { name, tag, digest })
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_tag() -> Result<(), Error> {
        let image: ImageRef = "quay.io/weaveworks/helloworld:master-a000001".parse()?;
        assert_eq!(image.name(), "quay.io/weaveworks/helloworld");
        assert_eq!(image.tag(), Some("master-a000001"));
        assert_eq!(image.digest(), None);
        Ok(())
    }

    #[test]
    fn test_registry_port_is_not_a_tag() -> Result<(), Error> {
        let image: ImageRef = "localhost:5000/app".parse()?;
        assert_eq!(image.name(), "localhost:5000/app");
        assert_eq!(image.tag(), None);

        let tagged: ImageRef = "localhost:5000/app:v2".parse()?;
        assert_eq!(tagged.name(), "localhost:5000/app");
        assert_eq!(tagged.tag(), Some("v2"));
        Ok(())
    }

    #[test]
    fn test_digest() -> Result<(), Error> {
        let image: ImageRef = "nginx:1.25@sha256:abcd".parse()?;
        assert_eq!(image.name(), "nginx");
        assert_eq!(image.tag(), Some("1.25"));
        assert_eq!(image.digest(), Some("sha256:abcd"));
        assert_eq!(image.to_string(), "nginx:1.25@sha256:abcd");
        Ok(())
    }

    #[test]
    fn test_with_tag_keeps_name() -> Result<(), Error> {
        let image: ImageRef = "nginx:1.25@sha256:abcd".parse()?;
        let next = image.with_tag("1.26");
        assert!(next.same_image(&image));
        assert_eq!(next.to_string(), "nginx:1.26");
        Ok(())
    }

    #[test]
    fn test_rejects_malformed() {
        for input in ["", "nginx:", "nginx@", "/nginx", "ngi nx:1", ":1.0"] {
            assert!(input.parse::<ImageRef>().is_err(), "{input:?} should not parse");
        }
    }
}
