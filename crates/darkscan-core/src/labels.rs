//! Class label registry for the dark-pattern classifier.
//!
//! A registry is a fixed bijection between class indices `0..n` and label
//! names. Two versions ship with the crate because the published model heads
//! disagree on the spelling of classes 1, 4 and 7. Anything else is loaded
//! from a Hugging Face `config.json` (`id2label`) or a bare `{"0": "..."}` map.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Labels of the first model head (`urgency`, `forced_action`).
pub const V1_LABELS: &[&str] = &[
    "not_dark",
    "urgency",
    "scarcity",
    "mis_direction",
    "social_proof",
    "sneaking",
    "obstruction",
    "forced_action",
];

/// Labels of the second model head (`countdown`, `forced-continuity`).
pub const V2_LABELS: &[&str] = &[
    "not_dark",
    "countdown",
    "scarcity",
    "mis_direction",
    "social-proof",
    "sneaking",
    "obstruction",
    "forced-continuity",
];

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("read label file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("label JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("label map is empty")]
    Empty,
    #[error("invalid class index {0:?}")]
    InvalidIndex(String),
    #[error("class indices must cover 0..{len}, missing {missing}")]
    MissingIndex { missing: usize, len: usize },
    #[error("class {0} has an empty label name")]
    EmptyName(usize),
    #[error("duplicate label name {0:?}")]
    DuplicateName(String),
    #[error("unknown label set {0:?} (expected v1 or v2)")]
    UnknownVersion(String),
}

/// Which label table a registry was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryVersion {
    V1,
    V2,
    /// Loaded from a label file or model config.
    Custom,
}

impl RegistryVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for RegistryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryVersion {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" => Ok(Self::V1),
            "v2" => Ok(Self::V2),
            _ => Err(LabelError::UnknownVersion(s.to_string())),
        }
    }
}

/// A class index paired with its label name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassLabel {
    pub index: usize,
    pub name: String,
}

/// Immutable index ↔ name mapping for classifier output classes.
#[derive(Debug, Clone)]
pub struct LabelRegistry {
    version: RegistryVersion,
    names: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl LabelRegistry {
    /// Built-in registry for a shipped label table.
    ///
    /// `Custom` has no built-in table and falls back to `v1`.
    pub fn builtin(version: RegistryVersion) -> Self {
        match version {
            RegistryVersion::V2 => Self::from_static(RegistryVersion::V2, V2_LABELS),
            RegistryVersion::V1 | RegistryVersion::Custom => {
                Self::from_static(RegistryVersion::V1, V1_LABELS)
            }
        }
    }

    pub fn v1() -> Self {
        Self::builtin(RegistryVersion::V1)
    }

    pub fn v2() -> Self {
        Self::builtin(RegistryVersion::V2)
    }

    fn from_static(version: RegistryVersion, names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let by_name = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self {
            version,
            names,
            by_name,
        }
    }

    /// Build a registry from names ordered by class index.
    pub fn from_names(version: RegistryVersion, names: Vec<String>) -> Result<Self, LabelError> {
        if names.is_empty() {
            return Err(LabelError::Empty);
        }

        let mut by_name = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(LabelError::EmptyName(index));
            }
            if by_name.insert(name.clone(), index).is_some() {
                return Err(LabelError::DuplicateName(name.clone()));
            }
        }

        Ok(Self {
            version,
            names,
            by_name,
        })
    }

    /// Build a registry from an `id2label` map with stringified indices.
    pub fn from_id2label(map: HashMap<String, String>) -> Result<Self, LabelError> {
        let mut ordered = BTreeMap::new();
        for (key, name) in map {
            let index: usize = key
                .trim()
                .parse()
                .map_err(|_| LabelError::InvalidIndex(key.clone()))?;
            ordered.insert(index, name);
        }

        let len = ordered.len();
        if let Some(missing) = (0..len).find(|i| !ordered.contains_key(i)) {
            return Err(LabelError::MissingIndex { missing, len });
        }

        Self::from_names(RegistryVersion::Custom, ordered.into_values().collect())
    }

    /// Parse either a model `config.json` (uses its `id2label` object) or a
    /// bare index → name object.
    pub fn from_json_str(json: &str) -> Result<Self, LabelError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let table = match value {
            serde_json::Value::Object(mut obj) if obj.contains_key("id2label") => {
                obj.remove("id2label").unwrap_or_default()
            }
            other => other,
        };
        let map: HashMap<String, String> = serde_json::from_value(table)?;
        Self::from_id2label(map)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LabelError> {
        let json = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json_str(&json)?;
        info!(
            labels = registry.len(),
            path = %path.display(),
            "loaded label registry"
        );
        Ok(registry)
    }

    pub fn version(&self) -> RegistryVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label name for a class index, if the registry has one.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    /// Class index for a label name (the reverse `label2id` direction).
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, index: usize) -> Option<ClassLabel> {
        self.name(index).map(|name| ClassLabel {
            index,
            name: name.to_string(),
        })
    }

    /// Label name for a class index, or `Unknown Label (<index>)`. Never fails.
    pub fn resolve(&self, index: usize) -> String {
        match self.name(index) {
            Some(name) => name.to_string(),
            None => format!("Unknown Label ({index})"),
        }
    }

    /// Iterate `(index, name)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}
