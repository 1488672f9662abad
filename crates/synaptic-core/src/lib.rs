use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod finding;
pub mod json;
pub mod score;
pub mod store;
pub mod structured;

pub use finding::{AnalysisResult, Finding, RankedFinding, Status};
pub use json::{parse_model_output, ParseError};
pub use score::ResearchScore;
pub use store::{AnalysisStore, Bookmark, HistoryEntry};
pub use structured::{to_mapping, StructuredSection};

/// Failures of a single fetch or of the retrying fetch as a whole.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("URL not found (HTTP 404)")]
    NotFound,
    #[error("access denied (HTTP 403)")]
    AccessDenied,
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    #[error("non-HTML content type: {0}")]
    WrongContentType(String),
    /// One transient failure (transport error, timeout, 5xx). Retryable.
    #[error("network error: {0}")]
    Network(String),
    #[error("unreachable after {attempts} attempts: {last}")]
    Unreachable { attempts: u32, last: String },
}

impl FetchError {
    /// Permanent failures short-circuit the retry loop.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, FetchError::Network(_))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("no meaningful text found ({chars} chars after normalization)")]
    NoMeaningfulText { chars: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("invalid AI response format: {0}")]
    Parse(#[from] ParseError),
    #[error("store error: {0}")]
    Store(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
    /// Extra headers (the backend drops credentials-bearing ones).
    pub headers: BTreeMap<String, String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            max_bytes: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
    pub timings_ms: BTreeMap<String, u128>,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

/// A single HTTP GET. Non-success statuses come back as `Ok` with `status` set; only
/// transport-level failures are errors (`Error::Fetch(FetchError::Network(..))`).
#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

/// Hosted text-completion service. Segments are sent in order (instructions first).
#[async_trait::async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn complete(&self, segments: &[String]) -> Result<String>;
}

/// Which prompt template / extraction richness a pipeline run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Four string-valued categories, plain-text extraction.
    Classic,
    /// Six ranked categories, structured field harvesting.
    #[default]
    Ranked,
}

impl Variant {
    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Classic => "classic",
            Variant::Ranked => "ranked",
        }
    }

    /// Fixed result keys, in display order.
    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Variant::Classic => finding::CLASSIC_CATEGORIES,
            Variant::Ranked => finding::RANKED_CATEGORIES,
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" | "basic" | "v1" => Ok(Variant::Classic),
            "ranked" | "rich" | "v2" => Ok(Variant::Ranked),
            other => Err(Error::Input(format!("unknown variant: {other}"))),
        }
    }
}

/// Successful pipeline output, serialized as the HTTP 200 body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutput {
    pub source_text: String,
    pub structured_data: serde_json::Map<String, serde_json::Value>,
    pub analysis: AnalysisResult,
}
