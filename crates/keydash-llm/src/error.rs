use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A required setting is missing from the environment.
    #[error("{0}")]
    Configuration(String),

    /// The provider reports the service's own credential as leaked.
    #[error("upstream credential flagged as leaked: {0}")]
    LeakedCredential(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("decode upstream response: {0}")]
    Decode(String),
}

impl ChatError {
    /// Classify an upstream failure message.
    pub(crate) fn upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("leaked") {
            ChatError::LeakedCredential(message)
        } else {
            ChatError::Upstream(message)
        }
    }
}
