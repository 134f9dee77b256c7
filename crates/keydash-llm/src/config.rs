use crate::ChatError;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generation settings sent with every request.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_base: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: 2048,
            temperature: 0.7,
        }
    }
}

impl LlmSettings {
    /// Defaults overridden by `GEMINI_MODEL` and `GEMINI_API_BASE`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(model) = non_empty_var("GEMINI_MODEL") {
            settings.model = model;
        }
        if let Some(base) = non_empty_var("GEMINI_API_BASE") {
            settings.api_base = base.trim_end_matches('/').to_string();
        }
        settings
    }
}

/// Where the provider credential comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Read the named environment variable on every call.
    Env(String),
    /// A fixed value; `None` behaves like an unset variable.
    Fixed(Option<String>),
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Env(API_KEY_VAR.to_string())
    }
}

impl CredentialSource {
    pub(crate) fn resolve(&self) -> Result<String, ChatError> {
        let (name, value) = match self {
            CredentialSource::Env(name) => (name.as_str(), non_empty_var(name)),
            CredentialSource::Fixed(value) => (
                API_KEY_VAR,
                value.clone().filter(|v| !v.trim().is_empty()),
            ),
        };
        value.ok_or_else(|| {
            ChatError::Configuration(format!(
                "Missing {name}. Set it in the server environment (from https://aistudio.google.com/app/apikey)"
            ))
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_generation_settings() {
        let s = LlmSettings::default();
        assert_eq!(s.model, "gemini-2.5-flash");
        assert_eq!(s.max_output_tokens, 2048);
        assert!((s.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let err = CredentialSource::Fixed(None).resolve().unwrap_err();
        match err {
            ChatError::Configuration(msg) => assert!(msg.contains("GOOGLE_API_KEY")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let err = CredentialSource::Fixed(Some("  ".into())).resolve().unwrap_err();
        assert!(matches!(err, ChatError::Configuration(_)));
    }

    #[test]
    fn unset_env_var_is_missing() {
        let source = CredentialSource::Env("KEYDASH_TEST_UNSET_CREDENTIAL".into());
        let err = source.resolve().unwrap_err();
        match err {
            ChatError::Configuration(msg) => {
                assert!(msg.contains("KEYDASH_TEST_UNSET_CREDENTIAL"))
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }
}
