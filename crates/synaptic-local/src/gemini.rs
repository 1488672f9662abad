//! Gemini `generateContent` completion backend.
//!
//! Segments go out as text parts of a single user turn, in order. The key travels in the
//! `x-goog-api-key` header so it never shows up in URLs or error messages.

use crate::env;
use serde::Serialize;
use synaptic_core::{CompletionBackend, Error, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub fn gemini_api_key_from_env() -> Option<String> {
    env("GEMINI_API_KEY").or_else(|| env("SYNAPTIC_GEMINI_API_KEY"))
}

pub fn gemini_model_from_env() -> String {
    env("SYNAPTIC_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
}

pub fn gemini_timeout_ms_from_env() -> u64 {
    env("SYNAPTIC_GEMINI_TIMEOUT_MS")
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(60_000)
        .clamp(1_000, 300_000)
}

#[derive(Debug, Serialize)]
struct ReqPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct ReqContent {
    role: &'static str,
    parts: Vec<ReqPart>,
}

#[derive(Debug, Serialize)]
struct GenCfg {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct GeminiReq {
    contents: Vec<ReqContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenCfg>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_ms: u64,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_ms: 60_000,
        }
    }

    /// Key from `GEMINI_API_KEY`; model, base URL and timeout from `SYNAPTIC_GEMINI_*`.
    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let key = gemini_api_key_from_env()
            .ok_or_else(|| Error::NotConfigured("missing GEMINI_API_KEY".to_string()))?;
        let model = model_override.unwrap_or_else(gemini_model_from_env);
        let mut c = Self::new(client, key, model).with_timeout_ms(gemini_timeout_ms_from_env());
        if let Some(base) = env("SYNAPTIC_GEMINI_BASE_URL") {
            c = c.with_base_url(base);
        }
        Ok(c)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// `candidates[0].content.parts[*].text`, newline-joined.
fn candidate_text(v: &serde_json::Value) -> String {
    let mut out = String::new();
    let parts = v
        .get("candidates")
        .and_then(|x| x.as_array())
        .and_then(|c| c.first())
        .and_then(|c0| c0.get("content"))
        .and_then(|x| x.get("parts"))
        .and_then(|x| x.as_array());
    for p in parts.into_iter().flatten() {
        if let Some(t) = p.get("text").and_then(|x| x.as_str()) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(t);
        }
    }
    out
}

#[async_trait::async_trait]
impl CompletionBackend for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, segments: &[String]) -> Result<String> {
        let req = GeminiReq {
            contents: vec![ReqContent {
                role: "user",
                parts: segments
                    .iter()
                    .map(|s| ReqPart { text: s.clone() })
                    .collect(),
            }],
            generation_config: Some(GenCfg {
                temperature: Some(0.2),
            }),
        };

        let resp = self
            .client
            .post(self.endpoint())
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("gemini request failed: {e}")))?;

        let status = resp.status();
        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Llm(format!("gemini bad json (HTTP {status}): {e}")))?;
        if !status.is_success() {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("no detail");
            return Err(Error::Llm(format!("gemini HTTP {status}: {msg}")));
        }

        let out = candidate_text(&v);
        if out.trim().is_empty() {
            return Err(Error::Llm("gemini returned no text".to_string()));
        }
        Ok(out)
    }
}
