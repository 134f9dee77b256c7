use futures::stream::BoxStream;
use tokio::sync::OnceCell;

use crate::gemini::GeminiClient;
use crate::{ChatError, CredentialSource, LlmSettings};

/// Text chunks from a streaming call. Dropping it closes the upstream connection.
pub type ChatStream = BoxStream<'static, Result<String, ChatError>>;

/// Forwards prompts to Gemini.
///
/// The credential is checked on every call, but the client is built once, on
/// first use, and keeps the credential it was built with. Rotating the key
/// needs a restart.
pub struct ChatService {
    credential: CredentialSource,
    settings: LlmSettings,
    client: OnceCell<GeminiClient>,
}

impl ChatService {
    pub fn new(credential: CredentialSource, settings: LlmSettings) -> Self {
        Self {
            credential,
            settings,
            client: OnceCell::new(),
        }
    }

    /// `GOOGLE_API_KEY`, `GEMINI_MODEL` and `GEMINI_API_BASE` from the environment.
    pub fn from_env() -> Self {
        Self::new(CredentialSource::default(), LlmSettings::from_env())
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    async fn client(&self) -> Result<&GeminiClient, ChatError> {
        let api_key = self.credential.resolve()?;
        let settings = &self.settings;
        self.client
            .get_or_try_init(|| async move { GeminiClient::new(api_key, settings.clone()) })
            .await
    }

    /// Send one prompt and wait for the whole reply.
    pub async fn respond(&self, prompt: &str) -> Result<String, ChatError> {
        let client = self.client().await?;
        tracing::debug!(prompt_chars = prompt.chars().count(), "chat request");
        client.generate(prompt).await
    }

    /// Send one prompt and stream the reply.
    ///
    /// Failures before the first byte come back as `Err`; later ones end the
    /// stream with a single `Err` item.
    pub async fn stream(&self, prompt: &str) -> Result<ChatStream, ChatError> {
        let client = self.client().await?;
        tracing::debug!(prompt_chars = prompt.chars().count(), "chat stream request");
        client.stream_generate(prompt).await
    }
}
