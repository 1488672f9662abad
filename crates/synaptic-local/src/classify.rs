//! Keyword categorization, tagging and titles for saved analyses and bookmarks.

use serde_json::{Map, Value};
use synaptic_core::{AnalysisStore, Bookmark, HistoryEntry, Result};

pub const DEFAULT_TITLE: &str = "Untitled Paper";
const MAX_TITLE_CHARS: usize = 100;
pub const MAX_TAGS: usize = 8;

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Machine Learning",
        &[
            "machine learning",
            "ml",
            "neural",
            "deep learning",
            "ai",
            "artificial intelligence",
            "model",
            "training",
            "algorithm",
        ],
    ),
    (
        "Education",
        &[
            "education",
            "teaching",
            "learning",
            "student",
            "curriculum",
            "pedagogy",
            "academic",
        ],
    ),
    (
        "Cryptography",
        &[
            "cryptography",
            "encryption",
            "crypto",
            "security",
            "hash",
            "blockchain",
            "cipher",
        ],
    ),
    (
        "Medicine",
        &[
            "medical",
            "medicine",
            "health",
            "clinical",
            "patient",
            "treatment",
            "therapy",
        ],
    ),
    (
        "Computer Science",
        &[
            "computer",
            "software",
            "programming",
            "system",
            "database",
            "computing",
        ],
    ),
    (
        "Physics",
        &["physics", "quantum", "particle", "energy", "theory", "experiment"],
    ),
    (
        "Biology",
        &[
            "biology",
            "biological",
            "cell",
            "gene",
            "protein",
            "dna",
            "molecular",
        ],
    ),
    (
        "Mathematics",
        &[
            "mathematics",
            "mathematical",
            "theorem",
            "proof",
            "equation",
            "analysis",
        ],
    ),
];

const TAG_KEYWORDS: &[&str] = &[
    "survey",
    "review",
    "systematic",
    "meta-analysis",
    "empirical",
    "experimental",
    "theoretical",
    "novel",
    "approach",
    "framework",
    "methodology",
    "algorithm",
    "analysis",
    "evaluation",
    "comparison",
    "performance",
    "optimization",
    "deep",
    "neural",
    "network",
    "learning",
    "supervised",
    "unsupervised",
    "classification",
    "prediction",
    "regression",
    "clustering",
    "detection",
];

/// Short keywords ("ai", "ml", "dna") only count as whole words; longer ones match anywhere.
fn mentions(haystack: &str, keyword: &str) -> bool {
    if keyword.len() > 3 {
        return haystack.contains(keyword);
    }
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == keyword)
}

pub fn categorize(title: &str, content: &str) -> Vec<String> {
    let text = format!("{} {}", title.to_lowercase(), content.to_lowercase());
    let mut out: Vec<String> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, kws)| kws.iter().any(|k| mentions(&text, k)))
        .map(|(name, _)| name.to_string())
        .collect();
    if out.is_empty() {
        out.push("Other".to_string());
    }
    out
}

/// Up to [`MAX_TAGS`] research tags, in keyword-table order.
pub fn generate_tags(title: &str, content: &str) -> Vec<String> {
    let text = format!("{title} {content}").to_lowercase();
    TAG_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .take(MAX_TAGS)
        .map(|k| k.to_string())
        .collect()
}

fn cap(s: &str) -> String {
    s.chars().take(MAX_TITLE_CHARS).collect()
}

/// Title from the structured `title` section, else the first `Title:` line of the text.
pub fn extract_title(structured: &Map<String, Value>, source_text: &str) -> String {
    if let Some(t) = structured.get("title").and_then(Value::as_str) {
        if !t.trim().is_empty() {
            return cap(t.trim());
        }
    }
    source_text
        .find("Title:")
        .map(|i| source_text[i + "Title:".len()..].trim_start())
        .and_then(|rest| rest.lines().next())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(cap)
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Bookmark record for a history entry, with derived categories and tags.
pub fn bookmark_for(entry: &HistoryEntry, now_epoch_s: u64) -> Bookmark {
    let content = if entry.source_text.is_empty() {
        serde_json::to_string(&entry.structured_data).unwrap_or_default()
    } else {
        entry.source_text.clone()
    };
    Bookmark {
        id: format!("bm-{}", entry.id),
        analysis_id: entry.id.clone(),
        url: entry.url.clone(),
        title: entry.title.clone(),
        overall_score: entry.overall_score,
        categories: categorize(&entry.title, &content),
        tags: generate_tags(&entry.title, &content),
        created_at_epoch_s: now_epoch_s,
    }
}

/// Bookmark `entry` if its URL isn't bookmarked yet, otherwise remove the bookmark.
/// Returns whether the URL is bookmarked afterwards.
pub async fn toggle_bookmark(store: &dyn AnalysisStore, entry: &HistoryEntry) -> Result<bool> {
    if let Some(existing) = store.find_bookmark_by_url(&entry.url).await? {
        store.remove_bookmark(&existing.analysis_id).await?;
        tracing::info!(url = %entry.url, store = store.name(), "bookmark removed");
        return Ok(false);
    }
    store
        .save_bookmark(&bookmark_for(entry, crate::now_epoch_s()))
        .await?;
    tracing::info!(url = %entry.url, store = store.name(), "bookmark added");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn categories_by_keyword_with_other_fallback() {
        let c = categorize("Deep Learning for Protein Folding", "We train a neural network.");
        assert!(c.contains(&"Machine Learning".to_string()));
        assert!(c.contains(&"Biology".to_string()));
        assert_eq!(categorize("Poetry", "Sonnets and odes."), vec!["Other"]);
    }

    #[test]
    fn short_keywords_need_word_boundaries() {
        // "ai" inside "detail" / "ml" inside "html" should not count.
        assert_eq!(categorize("", "a detailed html page"), vec!["Other"]);
        assert_eq!(categorize("", "new AI regulation"), vec!["Machine Learning"]);
    }

    #[test]
    fn tags_follow_table_order_and_cap_at_eight() {
        let text = "survey review systematic meta-analysis empirical experimental theoretical novel approach framework";
        let tags = generate_tags("", text);
        assert_eq!(tags.len(), MAX_TAGS);
        assert_eq!(tags[0], "survey");
        assert_eq!(tags[7], "novel");
        assert!(generate_tags("Poetry", "odes").is_empty());
    }

    #[test]
    fn title_prefers_structured_then_text_line() {
        let mut m = Map::new();
        m.insert("title".into(), json!("From Sections"));
        assert_eq!(extract_title(&m, "Title: From Text"), "From Sections");
        assert_eq!(
            extract_title(&Map::new(), "Title:   From Text\nAuthors: A"),
            "From Text"
        );
        assert_eq!(extract_title(&Map::new(), "no title here"), DEFAULT_TITLE);

        let long = "x".repeat(250);
        assert_eq!(
            extract_title(&Map::new(), &format!("Title: {long}")).chars().count(),
            100
        );
    }
}
