//! Rewriting a single container image inside raw manifest text.
//!
//! The rewrite works on the text itself, never on a re-serialised document,
//! so comments, key order and formatting outside the replaced value are kept
//! byte for byte. Only block-style container lists are understood:
//!
//! ```yaml
//! containers:
//! - name: web          # `name` and `image` keys of the same sequence item
//!   image: app/web:1   # <- only this value is replaced
//! ```

use std::path::Path;

use regex::Regex;
use tidewater_core::{Error, ImageRef, ResourceId, Result};

use crate::parse::{document_id, split_documents};

const IN_MEMORY: &str = "<in-memory manifest>";

/// `key: value` at the start of a mapping line. The value group starts at the
/// first non-blank character after the colon.
const KEY_VALUE_PATTERN: &str =
    r#"^(?P<key>[A-Za-z_][A-Za-z0-9_.\-]*|"[^"]*"|'[^']*')[ \t]*:(?:[ \t]+(?P<value>\S.*))?$"#;

/// A scalar value's location within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Scalar {
    start: usize,
    end: usize,
    quote: Option<char>,
    value: String,
}

/// One `key: value` entry found at a sequence item's mapping level.
#[derive(Debug)]
struct Entry {
    key: String,
    value: Option<Scalar>,
}

/// A non-blank, non-comment line of a document.
#[derive(Debug)]
struct Line<'a> {
    /// Byte offset of the line within the document.
    offset: usize,
    indent: usize,
    body: &'a str,
}

impl Line<'_> {
    /// For `- rest` lines: the column where `rest` starts and `rest` itself.
    fn sequence_item(&self) -> Option<(usize, &str)> {
        if self.body == "-" {
            return Some((self.indent.saturating_add(1), ""));
        }
        let rest = self.body.strip_prefix("- ")?;
        let inner = rest.trim_start_matches(' ');
        let column = self
            .indent
            .saturating_add(self.body.len().saturating_sub(inner.len()));
        Some((column, inner))
    }
}

fn lines(text: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);
        let body = line.trim_start_matches(' ');
        let indent = line.len().saturating_sub(body.len());
        if !body.is_empty() && !body.starts_with('#') {
            out.push(Line {
                offset,
                indent,
                body,
            });
        }
        offset = offset.saturating_add(raw.len());
    }
    out
}

/// Locate a scalar that starts at `start` within `text`, stopping before any
/// trailing comment.
fn scalar(text: &str, start: usize) -> Option<Scalar> {
    let raw = text.get(start..)?;
    let first = raw.chars().next()?;
    match first {
        '"' | '\'' => {
            let close = raw.get(1..)?.find(first)?;
            let value = raw.get(1..=close)?.to_string();
            Some(Scalar {
                start,
                end: start.saturating_add(close).saturating_add(2),
                quote: Some(first),
                value,
            })
        }
        '|' | '>' | '[' | '{' | '&' | '*' | '!' => None,
        _ => {
            let content = raw.find(" #").map_or(raw, |pos| raw.get(..pos).unwrap_or(raw));
            let content = content.trim_end();
            Some(Scalar {
                start,
                end: start.saturating_add(content.len()),
                quote: None,
                value: content.to_string(),
            })
        }
    }
}

fn unquote(key: &str) -> &str {
    key.strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .or_else(|| key.strip_prefix('\'').and_then(|k| k.strip_suffix('\'')))
        .unwrap_or(key)
}

struct KeyMatcher {
    regex: Regex,
}

impl KeyMatcher {
    fn new() -> Result<Self> {
        Regex::new(KEY_VALUE_PATTERN)
            .map(|regex| Self { regex })
            .map_err(|e| Error::manifest_parse_failed(IN_MEMORY, format!("key pattern: {e}")))
    }

    /// Parse `content`, which starts at byte `base` of the document.
    fn entry(&self, content: &str, base: usize) -> Option<Entry> {
        let captures = self.regex.captures(content)?;
        let key = unquote(captures.name("key")?.as_str()).to_string();
        let value = captures
            .name("value")
            .and_then(|m| scalar(content, m.start()))
            .map(|s| Scalar {
                start: s.start.saturating_add(base),
                end: s.end.saturating_add(base),
                ..s
            });
        Some(Entry { key, value })
    }
}

/// The `image` values of every sequence item in `text` whose mapping has
/// `name: <container>` and an `image` key.
fn image_scalars(matcher: &KeyMatcher, text: &str, container: &str) -> Vec<Scalar> {
    let lines = lines(text);
    let mut found = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let Some((column, inner)) = line.sequence_item() else {
            continue;
        };

        let mut entries = Vec::new();
        let mut level = None;
        if !inner.is_empty() {
            level = Some(column);
            entries.extend(matcher.entry(inner, line.offset.saturating_add(column)));
        }

        for next in lines.iter().skip(index.saturating_add(1)) {
            if next.indent <= line.indent {
                break;
            }
            let level = *level.get_or_insert(next.indent);
            if next.indent == level && next.sequence_item().is_none() {
                entries.extend(matcher.entry(next.body, next.offset.saturating_add(next.indent)));
            }
        }

        let named = entries.iter().any(|e| {
            e.key == "name" && e.value.as_ref().is_some_and(|v| v.value == container)
        });
        if named {
            found.extend(
                entries
                    .into_iter()
                    .filter(|e| e.key == "image")
                    .filter_map(|e| e.value),
            );
        }
    }

    found
}

/// Rewrite the image of one container of one resource in manifest bytes.
///
/// Everything except the targeted image value is left untouched. Setting an
/// image that is already in place returns the input unchanged.
///
/// # Errors
///
/// Fails if the bytes are not UTF-8, a document is malformed, no document
/// defines `id`, or the resource has no container called `container`.
pub fn update_image(
    def: &[u8],
    id: &ResourceId,
    container: &str,
    image: &ImageRef,
) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(def).map_err(|e| Error::InvalidEncoding {
        reason: e.to_string(),
    })?;

    let origin = Path::new(IN_MEMORY);
    let mut target = None;
    for document in split_documents(text) {
        if document_id(origin, document.text)?.as_ref() == Some(id) {
            target = Some(document);
            break;
        }
    }
    let document = target.ok_or_else(|| Error::resource_not_found(id.clone()))?;

    let matcher = KeyMatcher::new()?;
    let scalars = image_scalars(&matcher, document.text, container);
    if scalars.is_empty() {
        return Err(Error::container_not_found(id.clone(), container));
    }

    let replacement = image.to_string();
    let mut updated = String::with_capacity(text.len().saturating_add(replacement.len()));
    let mut cursor = 0;
    for scalar in &scalars {
        let start = document.offset.saturating_add(scalar.start);
        updated.push_str(text.get(cursor..start).unwrap_or_default());
        match scalar.quote {
            Some(quote) => {
                updated.push(quote);
                updated.push_str(&replacement);
                updated.push(quote);
            }
            None => updated.push_str(&replacement),
        }
        cursor = document.offset.saturating_add(scalar.end);
    }
    updated.push_str(text.get(cursor..).unwrap_or_default());

    Ok(updated.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_manifest;
    use proptest::prelude::*;

    const FILE: &str = "\
# Web tier
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector:
    app: web
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      initContainers:
        - name: migrate
          image: \"app/migrate:1.0\"
      containers:
      - name: web
        image: app/web:1.0   # pinned by release
        env:
        - name: sidecar
          value: ignored
        ports:
        - containerPort: 80
      - image: 'app/sidecar:0.9'
        name: sidecar
";

    fn id(name: &str) -> ResourceId {
        ResourceId::new("default", "deployment", name)
    }

    fn apply(text: &str, container: &str, image: &str) -> Result<String> {
        let bytes = update_image(text.as_bytes(), &id("web"), container, &image.parse()?)?;
        String::from_utf8(bytes).map_err(|e| Error::InvalidEncoding {
            reason: e.to_string(),
        })
    }

    #[test]
    fn test_replaces_only_the_image_value() -> Result<()> {
        let updated = apply(FILE, "web", "app/web:2.0")?;
        assert_eq!(
            updated,
            FILE.replace("image: app/web:1.0   # pinned", "image: app/web:2.0   # pinned")
        );
        Ok(())
    }

    #[test]
    fn test_keeps_quote_style() -> Result<()> {
        let updated = apply(FILE, "migrate", "app/migrate:1.1")?;
        assert!(updated.contains("image: \"app/migrate:1.1\""));

        let updated = apply(FILE, "sidecar", "app/sidecar:1.0")?;
        assert!(updated.contains("- image: 'app/sidecar:1.0'"));
        assert!(updated.contains("value: ignored"));
        Ok(())
    }

    #[test]
    fn test_result_parses_back_to_target() -> Result<()> {
        let updated = apply(FILE, "sidecar", "app/sidecar:1.0")?;
        let resources = parse_manifest(updated.as_bytes(), "web.yaml")?;
        let image = resources
            .iter()
            .find_map(|r| r.as_workload())
            .and_then(|w| w.container("sidecar"))
            .map(|c| c.image.to_string());
        assert_eq!(image.as_deref(), Some("app/sidecar:1.0"));
        Ok(())
    }

    #[test]
    fn test_missing_container() {
        let result = apply(FILE, "cache", "redis:7");
        assert!(matches!(result, Err(Error::ContainerNotFound { .. })));
    }

    #[test]
    fn test_missing_resource() -> Result<()> {
        let result = update_image(FILE.as_bytes(), &id("api"), "web", &"app/web:2".parse()?);
        assert!(matches!(result, Err(Error::ResourceNotFound { .. })));
        Ok(())
    }

    #[test]
    fn test_same_name_in_other_document_is_untouched() -> Result<()> {
        let two = format!("{FILE}---\n{}", FILE.replace("name: web\nspec:\n  template", "name: api\nspec:\n  template"));
        let updated = update_image(two.as_bytes(), &id("api"), "web", &"app/web:3".parse()?)?;
        let updated = String::from_utf8_lossy(&updated);
        assert_eq!(updated.matches("app/web:3").count(), 1);
        assert_eq!(updated.matches("app/web:1.0").count(), 1);
        let api_part = updated.split("name: api").nth(1).unwrap_or_default();
        assert!(api_part.contains("app/web:3"));
        Ok(())
    }

    #[test]
    fn test_dash_on_its_own_line() -> Result<()> {
        let text = "\
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
      -
        name: web
        image: app/web:1
";
        let updated = apply(text, "web", "app/web:2")?;
        assert!(updated.ends_with("        image: app/web:2\n"));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_update_is_idempotent(tag in "[a-z0-9][a-z0-9.-]{0,12}") {
            let target: ImageRef = format!("app/web:{tag}").parse().map_err(|e: Error| TestCaseError::fail(e.to_string()))?;
            let once = update_image(FILE.as_bytes(), &id("web"), "web", &target)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let twice = update_image(&once, &id("web"), "web", &target)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(once, twice);
        }
    }
}
