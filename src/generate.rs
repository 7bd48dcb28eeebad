//! Grounded generation client.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint in three
//! modes:
//!
//! - **`complete`** — one-shot free text (hieroglyph translation).
//! - **`stream`** — server-sent-event stream of text chunks (chat). The
//!   caller folds chunks in arrival order and commits the result to
//!   conversation memory only after the stream finishes, so dropping a
//!   [`ChatStream`] mid-flight mutates nothing.
//! - **`complete_json`** — JSON-mode generation (itinerary). The payload
//!   is handed back as parsed JSON; deserializing and validating it
//!   against the itinerary shape is the planning pipeline's job.
//!
//! No call is retried. `Generation` means the outbound call failed;
//! `SchemaViolation` means the model answered but the payload does not
//! parse. Both surface to the caller unchanged.

use serde::Serialize;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{CoreError, CoreResult};

/// One chat-completions message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Client for the configured generative model.
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: String,
}

impl GenerationClient {
    /// Build the client, resolving the API key from the environment.
    /// A missing key is an `Artifact` error so startup fails loudly
    /// instead of the first request.
    pub fn new(config: &GenerationConfig) -> CoreResult<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            CoreError::Artifact(format!("{} environment variable not set", config.api_key_env))
        })?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Artifact(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[Message], stream: bool, json_mode: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        });
        if json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        body
    }

    async fn send(&self, body: &serde_json::Value) -> CoreResult<reqwest::Response> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CoreError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CoreError::Generation(format!(
                "chat completions returned {}: {}",
                status, body_text
            )));
        }
        Ok(response)
    }

    /// One-shot free-text completion.
    pub async fn complete(&self, messages: &[Message]) -> CoreResult<String> {
        let response = self.send(&self.request_body(messages, false, false)).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Generation(e.to_string()))?;
        Ok(extract_content(&json)?.trim().to_string())
    }

    /// JSON-mode completion: the model is asked for a single JSON
    /// object, which is returned parsed. A reply that is not valid JSON
    /// is a `SchemaViolation`.
    pub async fn complete_json(&self, messages: &[Message]) -> CoreResult<serde_json::Value> {
        let response = self.send(&self.request_body(messages, false, true)).await?;
        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CoreError::Generation(e.to_string()))?;
        let content = extract_content(&json)?;
        serde_json::from_str(&content)
            .map_err(|e| CoreError::SchemaViolation(format!("payload is not valid JSON: {}", e)))
    }

    /// Start a streaming completion and hand the chunk stream to the
    /// caller.
    pub async fn stream(&self, messages: &[Message]) -> CoreResult<ChatStream> {
        let response = self.send(&self.request_body(messages, true, false)).await?;
        Ok(ChatStream {
            response,
            buffer: String::new(),
            done: false,
        })
    }
}

/// Pull `choices[0].message.content` out of a completions response.
fn extract_content(json: &serde_json::Value) -> CoreResult<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| CoreError::Generation("response missing message content".into()))
}

// ============ Streaming ============

/// Server-sent-event stream of generated text chunks, consumed in
/// arrival order. Dropping the stream cancels the in-flight response.
pub struct ChatStream {
    response: reqwest::Response,
    buffer: String,
    done: bool,
}

impl ChatStream {
    /// Next text chunk, or `None` once the stream is finished.
    pub async fn next_chunk(&mut self) -> CoreResult<Option<String>> {
        loop {
            if self.done {
                return Ok(None);
            }

            if let Some(pos) = self.buffer.find('\n') {
                let line: String = self.buffer.drain(..=pos).collect();
                match parse_sse_line(line.trim_end_matches(['\n', '\r']))? {
                    SseLine::Skip => continue,
                    SseLine::Done => {
                        self.done = true;
                        return Ok(None);
                    }
                    SseLine::Delta(text) => return Ok(Some(text)),
                }
            }

            match self
                .response
                .chunk()
                .await
                .map_err(|e| CoreError::Generation(e.to_string()))?
            {
                Some(bytes) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                None => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }

    /// Drain the stream, folding chunks in arrival order into the full
    /// response text.
    pub async fn collect(mut self) -> CoreResult<String> {
        let mut folded = String::new();
        while let Some(chunk) = self.next_chunk().await? {
            folded.push_str(&chunk);
        }
        Ok(folded)
    }
}

#[derive(Debug)]
enum SseLine {
    Skip,
    Done,
    Delta(String),
}

/// Interpret one line of a chat-completions SSE body.
fn parse_sse_line(line: &str) -> CoreResult<SseLine> {
    let Some(data) = line.strip_prefix("data: ") else {
        // keep-alive comments, event names, blank separators
        return Ok(SseLine::Skip);
    };
    if data.trim() == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| CoreError::Generation(format!("malformed stream event: {}", e)))?;
    let delta = value
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("");

    if delta.is_empty() {
        // role-only first event, or the final usage event
        Ok(SseLine::Skip)
    } else {
        Ok(SseLine::Delta(delta.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_event(text: &str) -> String {
        format!(
            r#"data: {{"choices":[{{"delta":{{"content":{}}}}}]}}"#,
            serde_json::Value::String(text.to_string())
        )
    }

    #[test]
    fn test_parse_delta_line() {
        match parse_sse_line(&delta_event("Hello")).unwrap() {
            SseLine::Delta(text) => assert_eq!(text, "Hello"),
            _ => panic!("expected a delta"),
        }
    }

    #[test]
    fn test_parse_done_and_noise() {
        assert!(matches!(
            parse_sse_line("data: [DONE]").unwrap(),
            SseLine::Done
        ));
        assert!(matches!(parse_sse_line("").unwrap(), SseLine::Skip));
        assert!(matches!(
            parse_sse_line(": keep-alive").unwrap(),
            SseLine::Skip
        ));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            SseLine::Skip
        ));
    }

    #[test]
    fn test_parse_malformed_event_is_generation_error() {
        let err = parse_sse_line("data: {not json").unwrap_err();
        assert!(matches!(err, CoreError::Generation(_)));
    }

    #[test]
    fn test_fold_preserves_arrival_order() {
        let lines = [
            delta_event("The "),
            delta_event("ankh "),
            delta_event("endures."),
            "data: [DONE]".to_string(),
        ];
        let mut folded = String::new();
        for line in &lines {
            if let SseLine::Delta(text) = parse_sse_line(line).unwrap() {
                folded.push_str(&text);
            }
        }
        assert_eq!(folded, "The ankh endures.");
    }

    #[test]
    fn test_extract_content() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "  a translation  "}}]
        });
        assert_eq!(extract_content(&json).unwrap(), "  a translation  ");
        assert!(extract_content(&serde_json::json!({"choices": []})).is_err());
    }
}
