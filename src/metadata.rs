//! The archive's structured description: identity, versioning, dependencies,
//! load-order hints, and a content manifest.
//!
//! The canonical representation is the *uncompressed* UTF-8 JSON; the on-disk
//! compression is an optimization, never part of the logical identity.  Field
//! names are written in snake_case and matched case-insensitively on read.
//! Keys that are not part of the schema are carried through a flattened map
//! so a newer metadata revision round-trips through this build.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{PackError, PackResult};

/// Current metadata schema version.
pub const METADATA_FORMAT_VERSION: u32 = 1;
/// Conventional metadata file name inside a mod directory.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Canonical top-level keys; only these are case-normalized on read.
const KNOWN_KEYS: &[&str] = &[
    "format_version",
    "id",
    "name",
    "version",
    "author",
    "mod_type",
    "description",
    "dependencies",
    "priority",
    "load_phase",
    "manifest",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModType {
    Campaign,
    CreaturePack,
    AssetPack,
    ScriptPack,
    /// Catch-all so an unrecognized declared type never fails the parse.
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    BeforeCampaign,
    AfterCampaign,
    #[default]
    #[serde(other)]
    Independent,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dependency {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub min_version: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// Counts of packed assets, derived by the writer from the packed set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentManifest {
    #[serde(default)]
    pub total_files: u32,
    /// Entry count per category (lower-cased file extension, `none` when absent).
    #[serde(default)]
    pub categories: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModMetadata {
    #[serde(default)]
    pub format_version: u32,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub mod_type: ModType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub load_phase: LoadPhase,
    #[serde(default)]
    pub manifest: ContentManifest,
    /// Unknown keys, preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModMetadata {
    /// Parse the canonical UTF-8 JSON form.
    pub fn parse(bytes: &[u8]) -> PackResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| PackError::InvalidMetadata("metadata block is not valid UTF-8".into()))?;
        let mut value: Value = serde_json::from_str(text)
            .map_err(|e| PackError::InvalidMetadata(format!("malformed JSON: {e}")))?;
        normalize_keys(&mut value);
        let meta: ModMetadata = serde_json::from_value(value)
            .map_err(|e| PackError::InvalidMetadata(e.to_string()))?;
        meta.validate_required()?;
        Ok(meta)
    }

    /// Serialize to the canonical UTF-8 JSON form (snake_case keys).
    pub fn to_json(&self) -> PackResult<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| PackError::InvalidMetadata(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Required fields: mod id, version string, schema version.
    pub fn validate_required(&self) -> PackResult<()> {
        if self.id.trim().is_empty() {
            return Err(PackError::InvalidMetadata(
                "missing required field: id".into(),
            ));
        }
        if self.version.trim().is_empty() {
            return Err(PackError::InvalidMetadata(
                "missing required field: version".into(),
            ));
        }
        if self.format_version == 0 {
            return Err(PackError::InvalidMetadata(
                "missing required field: format_version".into(),
            ));
        }
        Ok(())
    }
}

/// Case-insensitive key mapping on read: a top-level key whose lower-cased
/// form names a known field is rewritten to that canonical spelling.  Keys
/// inside the fully specified sub-objects are lower-cased outright; unknown
/// top-level keys are left untouched so they survive the round trip.
fn normalize_keys(value: &mut Value) {
    let Value::Object(map) = value else { return };

    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let lower = key.to_ascii_lowercase();
        if lower != key && KNOWN_KEYS.contains(&lower.as_str()) && !map.contains_key(&lower) {
            if let Some(v) = map.remove(&key) {
                map.insert(lower, v);
            }
        }
    }

    if let Some(Value::Array(deps)) = map.get_mut("dependencies") {
        for dep in deps {
            lowercase_keys_shallow(dep);
        }
    }
    if let Some(manifest) = map.get_mut("manifest") {
        // Only the manifest's own keys; category names stay verbatim.
        lowercase_keys_shallow(manifest);
    }
}

fn lowercase_keys_shallow(value: &mut Value) {
    let Value::Object(map) = value else { return };
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let lower = key.to_ascii_lowercase();
        if lower != key && !map.contains_key(&lower) {
            if let Some(v) = map.remove(&key) {
                map.insert(lower, v);
            }
        }
    }
}
