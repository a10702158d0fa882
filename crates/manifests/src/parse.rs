//! Parsing YAML manifest text into [`Resource`]s.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tidewater_core::{Error, ImageRef, ResourceId, Result};

use crate::resource::{Container, PodController, Resource, ResourceMeta};

/// Kinds that are not namespaced.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "namespace",
    "clusterrole",
    "clusterrolebinding",
    "customresourcedefinition",
    "persistentvolume",
    "storageclass",
    "priorityclass",
];

const DEFAULT_NAMESPACE: &str = "default";

/// One YAML document inside a multi-document file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Document<'a> {
    /// Byte offset of the document in the file.
    pub offset: usize,
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    kind: Option<String>,
    metadata: Option<RawMetadata>,
    #[serde(default)]
    spec: serde_yaml::Value,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    name: Option<String>,
    namespace: Option<String>,
    #[serde(default)]
    annotations: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPodSpec {
    #[serde(default)]
    containers: Vec<RawContainer>,
    #[serde(default)]
    init_containers: Vec<RawContainer>,
}

#[derive(Debug, Deserialize)]
struct RawContainer {
    name: String,
    image: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPodTemplate {
    #[serde(default)]
    spec: RawPodSpec,
}

#[derive(Debug, Default, Deserialize)]
struct RawControllerSpec {
    #[serde(default)]
    template: RawPodTemplate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCronJobSpec {
    #[serde(default)]
    job_template: RawJobTemplate,
}

#[derive(Debug, Default, Deserialize)]
struct RawJobTemplate {
    #[serde(default)]
    spec: RawControllerSpec,
}

/// Split YAML text on `---` document separators.
pub(crate) fn split_documents(text: &str) -> Vec<Document<'_>> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset: usize = 0;

    for line in text.split_inclusive('\n') {
        let line_end = offset.saturating_add(line.len());
        if is_separator(line) {
            documents.push(Document {
                offset: start,
                text: text.get(start..offset).unwrap_or_default(),
            });
            start = line_end;
        }
        offset = line_end;
    }
    documents.push(Document {
        offset: start,
        text: text.get(start..).unwrap_or_default(),
    });

    documents
}

fn is_separator(line: &str) -> bool {
    line.strip_prefix("---")
        .is_some_and(|rest| rest.trim().is_empty() || rest.trim_start().starts_with('#'))
}

fn is_blank_document(text: &str) -> bool {
    text.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "..."
    })
}

fn raw_manifest(origin: &Path, text: &str) -> Result<Option<RawManifest>> {
    if is_blank_document(text) {
        return Ok(None);
    }
    serde_yaml::from_str(text)
        .map(Some)
        .map_err(|e| Error::manifest_parse_failed(origin, e.to_string()))
}

fn resource_id(origin: &Path, raw: &RawManifest) -> Result<ResourceId> {
    let kind = raw
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::manifest_parse_failed(origin, "document has no kind"))?;
    let metadata = raw
        .metadata
        .as_ref()
        .ok_or_else(|| Error::manifest_parse_failed(origin, format!("{kind} has no metadata")))?;
    let name = metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::manifest_parse_failed(origin, format!("{kind} has no metadata.name")))?;

    let kind_lower = kind.to_lowercase();
    if CLUSTER_SCOPED_KINDS.contains(&kind_lower.as_str()) {
        return Ok(ResourceId::cluster_scoped(kind_lower, name));
    }
    let namespace = metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE);
    Ok(ResourceId::new(namespace, kind_lower, name))
}

/// The identifier of the resource a single document defines, if any.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML or lacks a kind or name.
pub(crate) fn document_id(origin: &Path, text: &str) -> Result<Option<ResourceId>> {
    raw_manifest(origin, text)?
        .map(|raw| resource_id(origin, &raw))
        .transpose()
}

fn annotations(raw: &BTreeMap<String, serde_yaml::Value>) -> BTreeMap<String, String> {
    raw.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_yaml::Value::String(s) => s.clone(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((key.clone(), value))
        })
        .collect()
}

fn containers(origin: &Path, id: &ResourceId, raw: Vec<RawContainer>) -> Result<Vec<Container>> {
    raw.into_iter()
        .map(|c| {
            let image: ImageRef = c.image.parse().map_err(|e: Error| {
                Error::manifest_parse_failed(origin, format!("{id} container {}: {e}", c.name))
            })?;
            Ok(Container::new(c.name, image))
        })
        .collect()
}

fn pod_controller(
    origin: &Path,
    meta: ResourceMeta,
    pod: RawPodSpec,
) -> Result<PodController> {
    let regular = containers(origin, &meta.id, pod.containers)?;
    let init = containers(origin, &meta.id, pod.init_containers)?;
    Ok(PodController {
        meta,
        containers: regular,
        init_containers: init,
    })
}

fn spec_as<T: serde::de::DeserializeOwned + Default>(
    origin: &Path,
    id: &ResourceId,
    spec: serde_yaml::Value,
) -> Result<T> {
    if spec.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(spec)
        .map_err(|e| Error::manifest_parse_failed(origin, format!("{id} spec: {e}")))
}

/// Parse one document into a resource. Blank documents yield `None`.
///
/// # Errors
///
/// Returns an error if the document is malformed or a container image is not
/// a valid reference.
pub(crate) fn parse_document(origin: &Path, source: &str, text: &str) -> Result<Option<Resource>> {
    let Some(raw) = raw_manifest(origin, text)? else {
        return Ok(None);
    };
    let id = resource_id(origin, &raw)?;
    let meta = ResourceMeta {
        annotations: raw
            .metadata
            .as_ref()
            .map(|m| annotations(&m.annotations))
            .unwrap_or_default(),
        id,
        source: source.to_string(),
    };

    let kind = meta.id.kind().to_string();
    let resource = match kind.as_str() {
        "deployment" | "daemonset" | "statefulset" => {
            let spec: RawControllerSpec = spec_as(origin, &meta.id, raw.spec)?;
            let workload = pod_controller(origin, meta, spec.template.spec)?;
            match kind.as_str() {
                "deployment" => Resource::Deployment(workload),
                "daemonset" => Resource::DaemonSet(workload),
                _ => Resource::StatefulSet(workload),
            }
        }
        "cronjob" => {
            let spec: RawCronJobSpec = spec_as(origin, &meta.id, raw.spec)?;
            Resource::CronJob(pod_controller(
                origin,
                meta,
                spec.job_template.spec.template.spec,
            )?)
        }
        _ => Resource::Other(meta),
    };

    Ok(Some(resource))
}

/// Parse every resource defined in a manifest file's bytes.
///
/// `source` is recorded on each resource as its defining file.
///
/// # Errors
///
/// Returns an error if the bytes are not UTF-8 or any document is malformed.
pub fn parse_manifest(def: &[u8], source: &str) -> Result<Vec<Resource>> {
    let origin = Path::new(source);
    let text = std::str::from_utf8(def)
        .map_err(|e| Error::manifest_parse_failed(origin, format!("not valid UTF-8: {e}")))?;

    let mut resources = Vec::new();
    for document in split_documents(text) {
        if let Some(resource) = parse_document(origin, source, document.text)? {
            resources.push(resource);
        }
    }
    Ok(resources)
}
