//! URL in, analysis out: normalize, fetch, extract, prompt, complete, parse, assemble.
//!
//! One configurable pipeline serves both prompt variants. Each run is sequential; the only
//! repetition is the fetch retry loop.

use crate::classify::extract_title;
use crate::extract::{extract_with_min, MIN_TEXT_CHARS};
use crate::fetch::{fetch_html, FetchPolicy};
use crate::prompt::{build_prompt, template_id, truncate_chars, DEFAULT_MAX_PROMPT_CHARS};
use crate::rewrite::normalize_url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use synaptic_core::structured::sections_to_value;
use synaptic_core::{
    parse_model_output, to_mapping, AnalysisOutput, AnalysisResult, CompletionBackend, Error,
    FetchBackend, HistoryEntry, ResearchScore, Result, Variant,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub variant: Variant,
    pub fetch: FetchPolicy,
    pub min_text_chars: usize,
    pub max_prompt_chars: usize,
    /// Rewrite known academic URLs (PDF links etc.) to their HTML landing page first.
    pub normalize_urls: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            fetch: FetchPolicy::default(),
            min_text_chars: MIN_TEXT_CHARS,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
            normalize_urls: true,
        }
    }
}

/// Pipeline output plus the run metadata callers may want to log or persist.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub output: AnalysisOutput,
    pub requested_url: String,
    pub fetched_url: String,
    pub final_url: String,
    pub attempts: u32,
    pub template_id: &'static str,
    pub timings_ms: BTreeMap<String, u128>,
}

impl PipelineRun {
    /// History record for this run. The id is left empty for the store to assign.
    pub fn to_history_entry(&self, now_epoch_s: u64) -> HistoryEntry {
        let out = &self.output;
        HistoryEntry {
            id: String::new(),
            url: self.requested_url.clone(),
            title: extract_title(&out.structured_data, &out.source_text),
            created_at_epoch_s: now_epoch_s,
            overall_score: ResearchScore::calculate(&out.analysis).overall_quality,
            analysis: out.analysis.clone(),
            structured_data: out.structured_data.clone(),
            source_text: out.source_text.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    fetcher: Arc<dyn FetchBackend>,
    completion: Arc<dyn CompletionBackend>,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn FetchBackend>,
        completion: Arc<dyn CompletionBackend>,
        cfg: PipelineConfig,
    ) -> Self {
        Self {
            fetcher,
            completion,
            cfg,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub async fn analyze(&self, url: &str) -> Result<AnalysisOutput> {
        Ok(self.run(url).await?.output)
    }

    pub async fn run(&self, url: &str) -> Result<PipelineRun> {
        let requested = url.trim();
        if requested.is_empty() {
            return Err(Error::Input("URL is required".to_string()));
        }
        let variant = self.cfg.variant;
        let target = if self.cfg.normalize_urls {
            normalize_url(requested)
        } else {
            requested.to_string()
        };
        if target != requested {
            tracing::info!(from = %requested, to = %target, "rewrote url");
        }

        let mut timings_ms = BTreeMap::new();
        let t0 = Instant::now();
        let page = fetch_html(self.fetcher.as_ref(), &target, &self.cfg.fetch).await?;
        timings_ms.insert("fetch".to_string(), t0.elapsed().as_millis());

        let t0 = Instant::now();
        let extracted = extract_with_min(&page.html, variant, self.cfg.min_text_chars)?;
        timings_ms.insert("extract".to_string(), t0.elapsed().as_millis());
        tracing::info!(
            url = %target,
            selector = extracted.selector,
            chars = extracted.chars,
            preview = %truncate_chars(&extracted.text, 200),
            "extracted text"
        );

        let segments = build_prompt(variant, &extracted.text, self.cfg.max_prompt_chars);
        let t0 = Instant::now();
        let raw = self.completion.complete(&segments).await?;
        timings_ms.insert("completion".to_string(), t0.elapsed().as_millis());
        tracing::debug!(backend = self.completion.name(), chars = raw.len(), "model responded");

        let parsed = parse_model_output(&raw)
            .and_then(|v| AnalysisResult::from_value(&v, variant).map(|a| (a, v)));
        let (analysis, value) = match parsed {
            Ok(x) => x,
            Err(e) => {
                tracing::warn!(error = %e, raw = %truncate_chars(&raw, 2_000), "unparseable model output");
                return Err(e.into());
            }
        };

        let mut sections: Vec<Value> = match sections_to_value(&extracted.sections) {
            Value::Array(xs) => xs,
            _ => Vec::new(),
        };
        if let Some(Value::Array(xs)) = value.get("structured_data") {
            sections.extend(xs.iter().cloned());
        }
        let structured_data = to_mapping(&Value::Array(sections));

        tracing::info!(
            url = %target,
            template = template_id(variant),
            findings = analysis.total_findings(),
            attempts = page.attempts,
            "analysis complete"
        );

        Ok(PipelineRun {
            output: AnalysisOutput {
                source_text: extracted.text,
                structured_data,
                analysis,
            },
            requested_url: requested.to_string(),
            fetched_url: target,
            final_url: page.final_url,
            attempts: page.attempts,
            template_id: template_id(variant),
            timings_ms,
        })
    }
}
