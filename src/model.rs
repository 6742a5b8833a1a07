use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Breadth at which an environment variable is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Process,
    User,
    System,
}

impl Scope {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "process" => Some(Scope::Process),
            "user" => Some(Scope::User),
            "system" | "machine" => Some(Scope::System),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Process => "process",
            Scope::User => "user",
            Scope::System => "system",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `KEY=VALUE` entry of a profile.
///
/// Keys are not deduplicated here; duplicate detection is the validator's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
}

impl EnvVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            required: None,
            description: None,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }
}

/// A named, ordered set of variables plus metadata.
///
/// Field names follow the camelCase layout of `profiles.json`. Unknown fields
/// are carried through `extras` so a load/save cycle does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<EnvVariable>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl EnvProfile {
    /// Create an empty, inactive profile stamped with the current time.
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(None),
            name: name.into(),
            description,
            variables: Vec::new(),
            is_active: false,
            created_at: now,
            updated_at: now,
            tags: None,
            group: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_variables(mut self, variables: Vec<EnvVariable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().iter().any(|t| t == tag)
    }

    /// Index of the first variable with exactly this key.
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.key == key)
    }
}

/// A discoverable shell-startup file or registry location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub description: String,
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time-based profile id, optionally prefixed (`system-1712345678901-0`).
///
/// A per-process sequence keeps ids minted within one millisecond apart.
pub fn generate_id(prefix: Option<&str>) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    match prefix {
        Some(prefix) => format!("{prefix}-{}-{seq}", now_millis()),
        None => format!("{}-{seq}", now_millis()),
    }
}
