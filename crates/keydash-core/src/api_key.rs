use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Label given to keys created without a name.
pub const DEFAULT_KEY_NAME: &str = "Untitled API Key";

/// Prefix used when a key is generated without an explicit one.
pub const DEFAULT_KEY_PREFIX: &str = "sk-";

/// Number of random characters appended to the prefix by [`generate_key`].
pub const GENERATED_KEY_LEN: usize = 32;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    #[default]
    Active,
    Inactive,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Inactive => "inactive",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            KeyStatus::Active => "Active",
            KeyStatus::Inactive => "Inactive",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(KeyStatus::Active),
            "inactive" => Some(KeyStatus::Inactive),
            _ => None,
        }
    }

    /// The status a toggle moves to.
    pub fn toggled(self) -> Self {
        match self {
            KeyStatus::Active => KeyStatus::Inactive,
            KeyStatus::Inactive => KeyStatus::Active,
        }
    }
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub status: KeyStatus,
}

/// Input for creating a key. Every field is optional; see `resolve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKey {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub status: Option<KeyStatus>,
}

impl CreateApiKey {
    /// Fill in defaults: blank name becomes [`DEFAULT_KEY_NAME`], a missing or
    /// blank key is generated with `prefix`, missing status is active.
    pub fn resolve(&self, prefix: &str) -> NewApiKey {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_KEY_NAME)
            .to_string();
        let key = self
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| generate_key(prefix));
        NewApiKey {
            name,
            key,
            status: self.status.unwrap_or_default(),
        }
    }
}

/// A fully resolved insert, as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApiKey {
    pub name: String,
    pub key: String,
    pub status: KeyStatus,
}

/// Partial update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApiKey {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub status: Option<KeyStatus>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl UpdateApiKey {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.key.is_none()
            && self.status.is_none()
            && self.last_used.is_none()
    }
}

/// Outcome of checking a presented credential against the stored keys.
///
/// `Invalid` means no such key; `Disabled` means the key exists but is
/// inactive. HTTP callers answer 401 and 403 respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    Disabled,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Valid => "valid",
            ValidationOutcome::Invalid => "invalid",
            ValidationOutcome::Disabled => "disabled",
        }
    }

    pub fn for_status(status: KeyStatus) -> Self {
        match status {
            KeyStatus::Active => ValidationOutcome::Valid,
            KeyStatus::Inactive => ValidationOutcome::Disabled,
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a key: `prefix` + 32 characters drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_key(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let random_part: String = (0..GENERATED_KEY_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHANUMERIC.len());
            ALPHANUMERIC[idx] as char
        })
        .collect();
    format!("{prefix}{random_part}")
}
