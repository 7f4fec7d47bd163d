//! The per-plugin manifest record and the static field tables that drive projection,
//! default backfill and duplication.
//!
//! Manifests are kept as ordered JSON objects rather than a fixed struct: the pipeline
//! must distinguish an absent key from an explicit `false`/`null`, pass unknown values
//! through untouched, and emit keys in a stable order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INTERNAL_NAME: &str = "InternalName";
pub const ASSEMBLY_VERSION: &str = "AssemblyVersion";
pub const REPO_URL: &str = "RepoUrl";
pub const DOWNLOAD_LINK_INSTALL: &str = "DownloadLinkInstall";
pub const DOWNLOAD_LINK_TESTING: &str = "DownloadLinkTesting";
pub const DOWNLOAD_LINK_UPDATE: &str = "DownloadLinkUpdate";
pub const DOWNLOAD_COUNT: &str = "DownloadCount";

pub const IS_HIDE: &str = "IsHide";
pub const IS_TESTING_EXCLUSIVE: &str = "IsTestingExclusive";
pub const APPLICABLE_VERSION: &str = "ApplicableVersion";
pub const LAST_UPDATE: &str = "LastUpdate";
pub const LAST_UPDATED: &str = "LastUpdated";

/// Keys carried from the raw manifest into the master document, in output order.
/// The two policy flags are kept so an explicit value in the source survives
/// projection. Derived keys are absent here: they are always recomputed.
pub const PUBLISHED_KEYS: &[&str] = &[
    "Author",
    "Name",
    "Punchline",
    "Description",
    "Changelog",
    INTERNAL_NAME,
    ASSEMBLY_VERSION,
    REPO_URL,
    APPLICABLE_VERSION,
    "Tags",
    "CategoryTags",
    "DalamudApiLevel",
    "IconUrl",
    "ImageUrls",
    IS_HIDE,
    IS_TESTING_EXCLUSIVE,
];

/// A policy field and the value it takes when the manifest omits it.
#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Bool(bool),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Str(s) => Value::String(s.to_string()),
        }
    }
}

pub const DEFAULTS: &[(&str, DefaultValue)] = &[
    (IS_HIDE, DefaultValue::Bool(false)),
    (IS_TESTING_EXCLUSIVE, DefaultValue::Bool(false)),
    (APPLICABLE_VERSION, DefaultValue::Str("any")),
];

/// Source field copied into each target field the manifest leaves out.
pub const DUPLICATES: &[(&str, &[&str])] = &[(
    DOWNLOAD_LINK_INSTALL,
    &[DOWNLOAD_LINK_TESTING, DOWNLOAD_LINK_UPDATE],
)];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parses manifest text, tolerating a leading UTF-8 byte-order mark.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text.strip_prefix('\u{feff}').unwrap_or(text))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts or replaces `key`.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Inserts `key` only when it is absent. Returns whether anything was written.
    pub fn set_if_absent(&mut self, key: &str, value: impl Into<Value>) -> bool {
        if self.contains(key) {
            return false;
        }
        self.set(key, value);
        true
    }

    /// The value under `key` when it is a non-empty string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn internal_name(&self) -> Option<&str> {
        self.str_field(INTERNAL_NAME)
    }

    pub fn assembly_version(&self) -> Option<&str> {
        self.str_field(ASSEMBLY_VERSION)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for Manifest {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Manifest> for Value {
    fn from(manifest: Manifest) -> Self {
        Value::Object(manifest.0)
    }
}
