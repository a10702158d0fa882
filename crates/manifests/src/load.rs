//! Loading every resource under a set of manifest directories.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tidewater_core::{Error, ResourceId, Result};
use tracing::debug;

use crate::parse::{parse_document, split_documents};
use crate::resource::Resource;

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Every `*.yaml`/`*.yml` file under `dir`, recursively, in path order.
fn manifest_files(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::directory_scan_failed(dir, "not a directory"));
    }

    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = BTreeSet::new();
    for extension in MANIFEST_EXTENSIONS {
        let pattern = format!("{escaped}/**/*.{extension}");
        let entries =
            glob::glob(&pattern).map_err(|e| Error::directory_scan_failed(dir, e.to_string()))?;
        for entry in entries {
            let path = entry.map_err(|e| Error::directory_scan_failed(dir, e.to_string()))?;
            if path.is_file() {
                files.insert(path);
            }
        }
    }
    Ok(files)
}

/// Path of `path` relative to `base`, as recorded on each resource.
fn relative_source(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Load every resource defined under `dirs`, keyed by identifier.
///
/// Directories may overlap; each file is read once. Sources are recorded
/// relative to `base`.
///
/// # Errors
///
/// Fails on the first unreadable directory or file, malformed document, or
/// identifier defined more than once.
pub fn load_manifests(base: &Path, dirs: &[PathBuf]) -> Result<BTreeMap<ResourceId, Resource>> {
    let mut files = BTreeSet::new();
    for dir in dirs {
        files.extend(manifest_files(dir)?);
    }

    let mut resources = BTreeMap::new();
    for path in &files {
        let source = relative_source(base, path);
        let bytes = fs::read(path).map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| Error::manifest_parse_failed(path, format!("not valid UTF-8: {e}")))?;

        for document in split_documents(text) {
            let Some(resource) = parse_document(path, &source, document.text)? else {
                continue;
            };
            match resources.entry(resource.id().clone()) {
                Entry::Occupied(existing) => {
                    let existing: &Resource = existing.get();
                    return Err(Error::duplicate_definition(
                        resource.id().clone(),
                        existing.source(),
                        source,
                    ));
                }
                Entry::Vacant(slot) => {
                    slot.insert(resource);
                }
            }
        }
        debug!(file = %source, "Loaded manifest file");
    }

    debug!(files = files.len(), resources = resources.len(), "Loaded manifests");
    Ok(resources)
}
