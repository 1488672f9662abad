//! Analysis findings.
//!
//! The completion service returns each category as a list whose items are either plain strings
//! (older prompt) or ranked records. Both shapes deserialize into [`Finding`], and every consumer
//! goes through [`Finding::render`] / [`Finding::text`] instead of probing the JSON shape.

use crate::json::ParseError;
use crate::Variant;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const CLASSIC_CATEGORIES: &[&str] = &["exploits", "opportunities", "gaps", "models"];

pub const RANKED_CATEGORIES: &[&str] = &[
    "exploits",
    "opportunities",
    "gaps",
    "models",
    "ethical_concerns",
    "reproducibility_issues",
];

/// Human-facing heading for a category key.
pub fn category_title(key: &str) -> &'static str {
    match key {
        "exploits" => "Exploits & Red Flags",
        "opportunities" => "Opportunities & Core Tech",
        "gaps" => "Knowledge Gaps",
        "models" => "Growth Models",
        "ethical_concerns" => "Ethical Concerns & Bias",
        "reproducibility_issues" => "Reproducibility Issues",
        _ => "Other Findings",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Status {
    Critical,
    High,
    #[default]
    Moderate,
    Low,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Critical => "CRITICAL",
            Status::High => "HIGH",
            Status::Moderate => "MODERATE",
            Status::Low => "LOW",
        }
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Status::Critical,
            "HIGH" => Status::High,
            "LOW" => Status::Low,
            // Anything unrecognized renders as moderate.
            _ => Status::Moderate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedFinding {
    #[serde(default = "default_rank", deserialize_with = "de_rank")]
    pub rank: u8,
    #[serde(default)]
    pub status: Status,
    #[serde(
        default,
        deserialize_with = "de_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "de_tags")]
    pub tags: Vec<String>,
    #[serde(alias = "content")]
    pub finding: String,
}

fn default_rank() -> u8 {
    3
}

fn de_rank<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    let n = match &v {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(3.0),
        serde_json::Value::String(s) => s.trim().trim_start_matches('#').parse().unwrap_or(3.0),
        _ => 3.0,
    };
    Ok(n.round().clamp(1.0, 5.0) as u8)
}

fn de_confidence<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    let n = match &v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(n.filter(|x| x.is_finite()).map(|x| x.clamp(0.0, 1.0)))
}

fn de_tags<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Array(xs) => xs
            .into_iter()
            .filter_map(|x| x.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
        serde_json::Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Finding {
    Ranked(RankedFinding),
    Text(String),
}

impl Finding {
    pub fn text(&self) -> &str {
        match self {
            Finding::Ranked(r) => &r.finding,
            Finding::Text(s) => s,
        }
    }

    pub fn ranked(&self) -> Option<&RankedFinding> {
        match self {
            Finding::Ranked(r) => Some(r),
            Finding::Text(_) => None,
        }
    }

    /// One-line rendering: `#1 [CRITICAL 92%] (tag, tag) text` or just the text.
    pub fn render(&self) -> String {
        match self {
            Finding::Text(s) => s.clone(),
            Finding::Ranked(r) => {
                let mut out = format!("#{} [{}", r.rank, r.status.as_str());
                if let Some(c) = r.confidence {
                    out.push_str(&format!(" {}%", (c * 100.0).round() as u32));
                }
                out.push(']');
                if !r.tags.is_empty() {
                    out.push_str(&format!(" ({})", r.tags.join(", ")));
                }
                out.push(' ');
                out.push_str(&r.finding);
                out
            }
        }
    }
}

/// Fixed category keys mapped to their findings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult {
    categories: BTreeMap<String, Vec<Finding>>,
}

impl AnalysisResult {
    pub fn empty(variant: Variant) -> Self {
        let categories = variant
            .categories()
            .iter()
            .map(|k| (k.to_string(), Vec::new()))
            .collect();
        Self { categories }
    }

    /// Build the typed result from parsed model output.
    ///
    /// Keys outside the variant's category set are ignored, missing keys become empty lists, and
    /// list items that are neither strings nor finding records are dropped.
    pub fn from_value(v: &serde_json::Value, variant: Variant) -> Result<Self, ParseError> {
        let obj = v.as_object().ok_or(ParseError::NotAnObject)?;
        let mut out = Self::empty(variant);
        for key in variant.categories() {
            let items = obj
                .get(*key)
                .and_then(|x| x.as_array())
                .map(|xs| {
                    xs.iter()
                        .filter_map(|x| serde_json::from_value::<Finding>(x.clone()).ok())
                        .filter(|f| !f.text().trim().is_empty())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            out.categories.insert(key.to_string(), items);
        }
        Ok(out)
    }

    pub fn get(&self, key: &str) -> &[Finding] {
        self.categories.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, key: impl Into<String>, findings: Vec<Finding>) {
        self.categories.insert(key.into(), findings);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Finding])> {
        self.categories
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn total_findings(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}
