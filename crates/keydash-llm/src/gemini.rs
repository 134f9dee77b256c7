use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::{ChatError, LlmSettings};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

/// A configured client bound to one credential and model.
pub(crate) struct GeminiClient {
    http: Client,
    api_key: String,
    settings: LlmSettings,
}

impl GeminiClient {
    pub(crate) fn new(api_key: String, settings: LlmSettings) -> Result<Self, ChatError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ChatError::Upstream(format!("build http client: {e}")))?;
        tracing::info!(model = %settings.model, api_base = %settings.api_base, "gemini client ready");
        Ok(Self {
            http,
            api_key,
            settings,
        })
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.settings.max_output_tokens,
                temperature: self.settings.temperature,
            },
        }
    }

    async fn post(&self, url: String, prompt: &str) -> Result<reqwest::Response, ChatError> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| ChatError::Upstream(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ChatError::upstream(format!(
            "{status}: {}",
            error_message(&body)
        )))
    }

    pub(crate) async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.api_base, self.settings.model
        );
        let resp = self.post(url, prompt).await?;
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;
        first_candidate_content(&body).map(extract_text)
    }

    pub(crate) async fn stream_generate(
        &self,
        prompt: &str,
    ) -> Result<BoxStream<'static, Result<String, ChatError>>, ChatError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.settings.api_base, self.settings.model
        );
        let resp = self.post(url, prompt).await?;
        Ok(sse_text_chunks(resp.bytes_stream().boxed()))
    }
}

/// Pull `error.message` out of an upstream error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn first_candidate_content(body: &Value) -> Result<&Value, ChatError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(ChatError::upstream(message));
    }
    match body.pointer("/candidates/0/content") {
        Some(content) => Ok(content),
        None => {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            Err(ChatError::Upstream(format!("empty response: {reason}")))
        }
    }
}

fn content_blocks(content: &Value) -> Option<&Vec<Value>> {
    content
        .get("parts")
        .and_then(Value::as_array)
        .or_else(|| content.as_array())
}

fn block_text(block: &Value) -> Option<&str> {
    block.get("text").and_then(Value::as_str)
}

/// Plain text of a response's content.
///
/// A string is returned as is, and so is content made only of text blocks
/// (joined). Otherwise the first block's `text` is used, and failing that the
/// content is stringified.
pub fn extract_text(content: &Value) -> String {
    if let Some(s) = content.as_str() {
        return s.to_string();
    }
    if let Some(blocks) = content_blocks(content) {
        if !blocks.is_empty() && blocks.iter().all(|b| block_text(b).is_some()) {
            return blocks.iter().filter_map(block_text).collect();
        }
        if let Some(text) = blocks.first().and_then(block_text) {
            return text.to_string();
        }
    }
    content.to_string()
}

/// Text carried by one streamed chunk, if any.
fn chunk_text(content: &Value) -> Option<String> {
    if let Some(s) = content.as_str() {
        return (!s.is_empty()).then(|| s.to_string());
    }
    let blocks = content_blocks(content)?;
    let joined: String = blocks.iter().filter_map(block_text).collect();
    if !joined.is_empty() {
        return Some(joined);
    }
    blocks
        .first()
        .and_then(block_text)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, ChatError>>,
    finished: bool,
}

impl SseState {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes.iter().filter(|b| **b != b'\r'));
        while let Some(pos) = find_event_end(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.handle_event(&event[..pos]);
        }
    }

    fn flush(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.iter().all(u8::is_ascii_whitespace) {
            self.handle_event(&rest);
        }
    }

    fn handle_event(&mut self, raw: &[u8]) {
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text,
            Err(e) => {
                self.pending.push_back(Err(ChatError::Decode(e.to_string())));
                return;
            }
        };
        let data: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();
        if data.is_empty() {
            return;
        }
        let payload: Value = match serde_json::from_str(&data.join("\n")) {
            Ok(v) => v,
            Err(e) => {
                self.pending.push_back(Err(ChatError::Decode(e.to_string())));
                return;
            }
        };
        if let Some(message) = payload.pointer("/error/message").and_then(Value::as_str) {
            self.pending.push_back(Err(ChatError::upstream(message)));
            return;
        }
        if let Some(text) = payload
            .pointer("/candidates/0/content")
            .and_then(chunk_text)
        {
            self.pending.push_back(Ok(text));
        }
    }
}

fn find_event_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Turn an SSE body into text chunks. The first error ends the stream.
fn sse_text_chunks(
    body: BoxStream<'static, reqwest::Result<Bytes>>,
) -> BoxStream<'static, Result<String, ChatError>> {
    let state = SseState {
        body,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => st.push_bytes(&bytes),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(ChatError::Upstream(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    st.flush();
                }
            }
        }
    })
    .boxed()
}
