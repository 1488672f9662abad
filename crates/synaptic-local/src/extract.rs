//! Readable-text extraction from fetched HTML.
//!
//! Selector heuristics run in a fixed priority order and the first one that matches non-empty
//! text wins. On abstract pages the ranked variant also harvests paper metadata (title, authors,
//! identifier, subjects, venue) into structured sections.

use html_scraper::{ElementRef, Html, Selector};
use synaptic_core::{ExtractionError, StructuredSection, Variant};

/// Pages with less text than this are paywalls, JS shells or error stubs.
pub const MIN_TEXT_CHARS: usize = 100;

const ABSTRACT_SELECTORS: &[&str] = &[
    "blockquote.abstract",
    "div.abstract",
    "section.abstract",
];

const RANKED_ABSTRACT_SELECTORS: &[&str] = &["blockquote.abstract", "#abstract"];

const FALLBACK_SELECTORS: &[&str] = &[
    "article",
    "main, [role=main], #main-content, .main-content",
    "body",
];

#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// Source text handed to the model and returned to the caller.
    pub text: String,
    pub sections: Vec<StructuredSection>,
    /// Which selector produced the text.
    pub selector: &'static str,
    /// Characters of scraped text (after whitespace normalization).
    pub chars: usize,
}

/// Collapse every whitespace run to a single space and trim.
pub fn norm_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort guess for whether bytes are HTML-ish.
pub fn bytes_look_like_html(bytes: &[u8]) -> bool {
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return false;
    }
    let rest = &bytes[i..];
    let head: Vec<u8> = rest.iter().take(9).map(|b| b.to_ascii_lowercase()).collect();
    head.starts_with(b"<!doctype")
        || head.starts_with(b"<html")
        || head.starts_with(b"<head")
        || head.starts_with(b"<body")
}

fn sel(s: &str) -> Option<Selector> {
    Selector::parse(s).ok()
}

/// Visible text of an element: script/style contents are skipped, text nodes are joined with
/// spaces so adjacent blocks don't glue together.
fn element_text(el: &ElementRef) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
            .map(|n| matches!(n.as_str(), "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        if !hidden {
            parts.push(t);
        }
    }
    norm_ws(&parts.join(" "))
}

/// Text of every element matching `selector`, or `None` when nothing matched with text.
fn select_text(doc: &Html, selector: &str) -> Option<String> {
    let s = sel(selector)?;
    let texts: Vec<String> = doc
        .select(&s)
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect();
    (!texts.is_empty()).then(|| texts.join(" "))
}

fn select_all_texts(doc: &Html, selector: &str) -> Vec<String> {
    let Some(s) = sel(selector) else {
        return Vec::new();
    };
    doc.select(&s)
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
        .collect()
}

fn meta_contents(doc: &Html, name: &str) -> Vec<String> {
    let Some(s) = sel(&format!("meta[name=\"{name}\"]")) else {
        return Vec::new();
    };
    doc.select(&s)
        .filter_map(|el| el.value().attr("content"))
        .map(norm_ws)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Drop a leading `Label:` that arXiv-style pages render inside the field itself.
fn strip_label(s: &str, label: &str) -> String {
    let t = s.trim();
    match t.get(..label.len()) {
        Some(head) if head.eq_ignore_ascii_case(label) => {
            t[label.len()..].trim_start_matches(':').trim().to_string()
        }
        _ => t.to_string(),
    }
}

fn first_of(doc: &Html, selector: &str, meta: &[&str]) -> Option<String> {
    select_text(doc, selector).or_else(|| {
        meta.iter()
            .find_map(|m| meta_contents(doc, m).into_iter().next())
    })
}

fn harvest_sections(doc: &Html, abstract_text: &str) -> Vec<StructuredSection> {
    let mut out = Vec::new();
    if let Some(title) = first_of(doc, "h1.title", &["citation_title"]) {
        let t = strip_label(&title, "Title");
        if !t.is_empty() {
            out.push(StructuredSection::text("title", t));
        }
    }
    let mut authors = select_all_texts(doc, "div.authors a");
    if authors.is_empty() {
        authors = meta_contents(doc, "citation_author");
    }
    if !authors.is_empty() {
        out.push(StructuredSection::list("authors", authors));
    }
    let abs = strip_label(abstract_text, "Abstract");
    if !abs.is_empty() {
        out.push(StructuredSection::text("abstract", abs));
    }
    if let Some(id) = first_of(doc, ".arxivid", &["citation_arxiv_id", "citation_doi"]) {
        out.push(StructuredSection::text("identifier", id));
    }
    if let Some(subjects) = select_text(doc, "td.subjects").or_else(|| select_text(doc, ".primary-subject")) {
        let subjects: Vec<String> = subjects
            .split(';')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !subjects.is_empty() {
            out.push(StructuredSection::list("subjects", subjects));
        }
    }
    if let Some(venue) = first_of(
        doc,
        "td.jref",
        &["citation_journal_title", "citation_conference_title"],
    ) {
        out.push(StructuredSection::text("venue", venue));
    }
    out
}

fn section_str<'a>(sections: &'a [StructuredSection], key: &str) -> Option<&'a str> {
    sections
        .iter()
        .find(|s| s.section == key)
        .and_then(|s| s.content.as_str())
}

fn section_list(sections: &[StructuredSection], key: &str) -> Vec<String> {
    sections
        .iter()
        .find(|s| s.section == key)
        .and_then(|s| s.content.as_array())
        .map(|xs| {
            xs.iter()
                .filter_map(|x| x.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// `Title: ...` / `Authors: ...` / `Abstract: ...` lines for the model and for title lookup.
fn render_structured_text(sections: &[StructuredSection], fallback: &str) -> String {
    let mut lines = Vec::new();
    if let Some(t) = section_str(sections, "title") {
        lines.push(format!("Title: {t}"));
    }
    let authors = section_list(sections, "authors");
    if !authors.is_empty() {
        lines.push(format!("Authors: {}", authors.join(", ")));
    }
    let subjects = section_list(sections, "subjects");
    if !subjects.is_empty() {
        lines.push(format!("Subjects: {}", subjects.join("; ")));
    }
    lines.push(format!(
        "Abstract: {}",
        section_str(sections, "abstract").unwrap_or(fallback)
    ));
    lines.join("\n")
}

pub fn extract(html: &str, variant: Variant) -> Result<ExtractedContent, ExtractionError> {
    extract_with_min(html, variant, MIN_TEXT_CHARS)
}

pub fn extract_with_min(
    html: &str,
    variant: Variant,
    min_chars: usize,
) -> Result<ExtractedContent, ExtractionError> {
    let doc = Html::parse_document(html);

    let abstract_selectors = match variant {
        Variant::Classic => ABSTRACT_SELECTORS,
        Variant::Ranked => RANKED_ABSTRACT_SELECTORS,
    };
    let ordered = abstract_selectors
        .iter()
        .chain(ABSTRACT_SELECTORS.iter())
        .chain(FALLBACK_SELECTORS.iter());

    let mut picked: Option<(&'static str, String)> = None;
    for s in ordered {
        if let Some(t) = select_text(&doc, s) {
            picked = Some((*s, t));
            break;
        }
    }
    let Some((selector, scraped)) = picked else {
        return Err(ExtractionError::NoMeaningfulText { chars: 0 });
    };
    let chars = scraped.chars().count();
    if chars < min_chars {
        return Err(ExtractionError::NoMeaningfulText { chars });
    }

    let is_abstract_page =
        abstract_selectors.contains(&selector) || ABSTRACT_SELECTORS.contains(&selector);
    let (text, sections) = if variant == Variant::Ranked && is_abstract_page {
        let sections = harvest_sections(&doc, &scraped);
        if section_str(&sections, "title").is_some() {
            (render_structured_text(&sections, &scraped), sections)
        } else {
            (scraped, sections)
        }
    } else {
        (scraped, Vec::new())
    };

    tracing::debug!(selector, chars, sections = sections.len(), "extracted text");
    Ok(ExtractedContent {
        text,
        sections,
        selector,
        chars,
    })
}
