//! Versioned prompt templates.
//!
//! A prompt is an ordered pair of segments: the fixed instructions, then the page text.

use synaptic_core::Variant;

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 50_000;

const CLASSIC_V1: &str = r#"You are a highly analytical AI assistant for the "Synaptic Insight Engine". Your task is to analyze the provided text from a scientific paper or tech case study. Your goal is to identify potential exploits, opportunities, knowledge gaps, and underlying growth models.

Analyze the following text and respond ONLY with a valid JSON object. Do not include any explanatory text before or after the JSON, and do not wrap it in code fences.

The JSON object must have these four keys: "exploits", "opportunities", "gaps", "models".
- Each key should have an array of strings as its value.
- "exploits": hyperbolic buzzwords, claims that lack evidence (e.g. "secret formula", "data is confidential"), and red flags that suggest marketing over science.
- "opportunities": the core technology or scientific principle that has legitimate potential, even if the claims are exaggerated.
- "gaps": what is missing, such as a lack of peer-reviewed data, an unexplained scientific mechanism, or missing trial information.
- "models": phrases that suggest a specific type of growth or improvement model (e.g. "exponential growth", "10x improvement").

Here is the text to analyze:
"#;

const RANKED_V2: &str = r#"You are a rigorous research reviewer for the "Synaptic Insight Engine". Analyze the provided text from a scientific paper or tech case study.

Respond ONLY with a valid JSON object. Do not include any explanatory text before or after the JSON, and do not wrap it in code fences.

The JSON object must have these six keys: "exploits", "opportunities", "gaps", "models", "ethical_concerns", "reproducibility_issues".
Each key holds an array of finding objects, most important first:
  {"rank": 1-5 (1 = most important), "status": "CRITICAL" | "HIGH" | "MODERATE" | "LOW", "confidence": 0.0-1.0, "tags": ["short", "labels"], "finding": "one or two sentences"}
- "exploits": unsupported claims, methodological flaws, buzzwords, and red flags.
- "opportunities": legitimate technical or scientific potential worth building on.
- "gaps": missing data, unexplained mechanisms, absent baselines, weak statistics, and missing transparency (code, data, hyperparameters).
- "models": growth or improvement models implied by the text (e.g. "exponential growth", "10x improvement").
- "ethical_concerns": bias, privacy, consent, dual-use, and fairness issues.
- "reproducibility_issues": anything that would stop an independent team from reproducing the results.

Optionally add a "structured_data" key: an array of {"section": string, "content": string | array of strings} objects summarizing the paper (for example "methods", "datasets", "metrics", "limitations").

Use an empty array for a category with no findings.

Here is the text to analyze:
"#;

/// Stable identifier of the template a variant uses, for logs and reports.
pub fn template_id(variant: Variant) -> &'static str {
    match variant {
        Variant::Classic => "classic-v1",
        Variant::Ranked => "ranked-v2",
    }
}

pub fn template(variant: Variant) -> &'static str {
    match variant {
        Variant::Classic => CLASSIC_V1,
        Variant::Ranked => RANKED_V2,
    }
}

/// Truncate to at most `max_chars` characters (never splits a code point).
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// `[instructions, text]`, with the text bounded to `max_chars`.
pub fn build_prompt(variant: Variant, text: &str, max_chars: usize) -> Vec<String> {
    vec![
        template(variant).to_string(),
        truncate_chars(text, max_chars).to_string(),
    ]
}
