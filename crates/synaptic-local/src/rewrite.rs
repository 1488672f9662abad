//! URL normalization for academic repositories (bounded, deterministic, no network IO).
//!
//! Papers are reachable under several addresses (abstract page, PDF, HTML render). We always
//! fetch the abstract/landing page: it is HTML, small, and carries the structured metadata.
//! Unrecognized or unparseable input is returned untouched, and normalizing twice is the same
//! as normalizing once.

fn env_csv(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn host_matches(host: &str, pat: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    let pat = pat.trim().to_ascii_lowercase();
    if host == pat {
        return true;
    }
    host.ends_with(&format!(".{pat}"))
}

fn arxiv_rewrite_hosts() -> Vec<String> {
    let v = env_csv("SYNAPTIC_ARXIV_REWRITE_HOSTS");
    if v.is_empty() {
        vec![
            "arxiv.org".to_string(),
            "www.arxiv.org".to_string(),
            "export.arxiv.org".to_string(),
            "ar5iv.labs.arxiv.org".to_string(),
            "ar5iv.org".to_string(),
        ]
    } else {
        v
    }
}

fn openreview_rewrite_hosts() -> Vec<String> {
    let v = env_csv("SYNAPTIC_OPENREVIEW_REWRITE_HOSTS");
    if v.is_empty() {
        vec![
            "openreview.net".to_string(),
            "www.openreview.net".to_string(),
        ]
    } else {
        v
    }
}

/// Strip every trailing `suffix` (so `x.pdf.pdf` and `x.pdf` both become `x`).
fn strip_all_suffixes<'a>(mut s: &'a str, suffixes: &[&str]) -> &'a str {
    loop {
        let before = s.len();
        for suf in suffixes {
            if let Some(x) = s.strip_suffix(suf) {
                s = x;
            }
        }
        if s.len() == before {
            return s;
        }
    }
}

/// Ids are re-parsed as URL paths on the next pass; reject anything the parser would rewrite.
fn is_stable_path(p: &str) -> bool {
    !p.trim().is_empty()
        && p.split('/').all(|seg| {
            !seg.is_empty()
                && !matches!(
                    seg.to_ascii_lowercase().as_str(),
                    "." | ".." | "%2e" | ".%2e" | "%2e." | "%2e%2e"
                )
        })
}

/// arXiv: `/abs/<id>`, `/pdf/<id>[.pdf]`, `/html/<id>`, `/format/<id>` -> `https://arxiv.org/abs/<id>`.
///
/// Supports modern (`2307.12008v2`) and legacy category ids (`hep-th/9901001`).
pub fn arxiv_abs_url(url: &str) -> Option<String> {
    let u = reqwest::Url::parse(url.trim()).ok()?;
    let host = u.host_str()?.to_string();
    if !arxiv_rewrite_hosts().iter().any(|h| host_matches(&host, h)) {
        return None;
    }
    let path = u.path().trim_matches('/');
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 2 {
        return None;
    }
    if !matches!(parts[0], "abs" | "pdf" | "html" | "format") {
        return None;
    }
    let id = parts[1..].join("/");
    let id = strip_all_suffixes(id.trim_matches('/'), &[".pdf", "/"]);
    if !is_stable_path(id) {
        return None;
    }
    Some(format!("https://arxiv.org/abs/{id}"))
}

/// OpenReview: `/pdf?id=<id>` -> `https://openreview.net/forum?id=<id>`.
pub fn openreview_forum_url(url: &str) -> Option<String> {
    let u = reqwest::Url::parse(url.trim()).ok()?;
    let host = u.host_str()?.to_string();
    if !openreview_rewrite_hosts()
        .iter()
        .any(|h| host_matches(&host, h))
    {
        return None;
    }
    if u.path().trim_matches('/') != "pdf" {
        return None;
    }
    let id = u
        .query_pairs()
        .find_map(|(k, v)| (k == "id").then_some(v.to_string()))?;
    let id = id.trim().to_string();
    if id.is_empty() {
        return None;
    }
    let mut out = reqwest::Url::parse("https://openreview.net/forum").ok()?;
    out.query_pairs_mut().append_pair("id", id.as_str());
    Some(out.to_string())
}

/// bioRxiv / medRxiv: `/content/<doi-path>[.full][.pdf]` -> `https://www.<site>.org/content/<doi-path>`.
pub fn preprint_server_url(url: &str) -> Option<String> {
    let u = reqwest::Url::parse(url.trim()).ok()?;
    let host = u.host_str()?.to_ascii_lowercase();
    let site = ["biorxiv.org", "medrxiv.org"]
        .into_iter()
        .find(|s| host_matches(&host, s))?;
    let rest = u.path().strip_prefix("/content/")?;
    let rest = strip_all_suffixes(
        rest.trim_matches('/'),
        &[".pdf", ".full", ".full-text", ".abstract", "/"],
    );
    if !is_stable_path(rest) {
        return None;
    }
    Some(format!("https://www.{site}/content/{rest}"))
}

/// Rewrite a known academic URL to its canonical HTML page; everything else passes through.
pub fn normalize_url(url: &str) -> String {
    arxiv_abs_url(url)
        .or_else(|| openreview_forum_url(url))
        .or_else(|| preprint_server_url(url))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn arxiv_variants_collapse_to_abs_page() {
        for u in [
            "https://arxiv.org/abs/2307.12008",
            "https://arxiv.org/pdf/2307.12008",
            "https://arxiv.org/pdf/2307.12008.pdf",
            "http://www.arxiv.org/pdf/2307.12008.pdf?download=1",
            "https://arxiv.org/html/2307.12008",
            "https://export.arxiv.org/abs/2307.12008/",
            "https://ar5iv.labs.arxiv.org/html/2307.12008",
        ] {
            assert_eq!(normalize_url(u), "https://arxiv.org/abs/2307.12008", "{u}");
        }
        assert_eq!(
            normalize_url("https://arxiv.org/pdf/2307.12008v2.pdf"),
            "https://arxiv.org/abs/2307.12008v2"
        );
        assert_eq!(
            normalize_url("https://arxiv.org/pdf/hep-th/9901001.pdf"),
            "https://arxiv.org/abs/hep-th/9901001"
        );
        assert_eq!(
            normalize_url("https://arxiv.org/abs/2307.12008.pdf.pdf"),
            "https://arxiv.org/abs/2307.12008"
        );
    }

    #[test]
    fn arxiv_non_paper_paths_pass_through() {
        for u in [
            "https://arxiv.org/",
            "https://arxiv.org/list/cs.LG/recent",
            "https://arxiv.org/pdf/.pdf",
        ] {
            assert_eq!(normalize_url(u), u);
        }
    }

    #[test]
    fn openreview_pdf_goes_to_forum() {
        assert_eq!(
            normalize_url("https://openreview.net/pdf?id=abc123"),
            "https://openreview.net/forum?id=abc123"
        );
        let forum = "https://openreview.net/forum?id=abc123&noteId=x";
        assert_eq!(normalize_url(forum), forum);
        assert_eq!(
            normalize_url("https://openreview.net/pdf"),
            "https://openreview.net/pdf"
        );
    }

    #[test]
    fn preprint_servers_drop_full_and_pdf_suffixes() {
        assert_eq!(
            normalize_url("https://www.biorxiv.org/content/10.1101/2024.01.01.123456v1.full.pdf"),
            "https://www.biorxiv.org/content/10.1101/2024.01.01.123456v1"
        );
        assert_eq!(
            normalize_url("http://medrxiv.org/content/10.1101/2023.05.05.555555v2.full"),
            "https://www.medrxiv.org/content/10.1101/2023.05.05.555555v2"
        );
    }

    #[test]
    fn other_and_malformed_input_is_untouched() {
        for u in [
            "https://example.com/article.pdf",
            "not a url",
            "",
            "   ",
            "https://notarxiv.org/pdf/1.pdf",
        ] {
            assert_eq!(normalize_url(u), u);
        }
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent_for_arbitrary_strings(u in any::<String>()) {
            let once = normalize_url(&u);
            prop_assert_eq!(normalize_url(&once), once);
        }

        #[test]
        fn normalize_is_idempotent_for_academic_shapes(
            scheme in prop::sample::select(vec!["http", "https"]),
            host in prop::sample::select(vec![
                "arxiv.org", "www.arxiv.org", "export.arxiv.org", "openreview.net",
                "www.biorxiv.org", "medrxiv.org", "example.com",
            ]),
            kind in prop::sample::select(vec!["abs", "pdf", "html", "content", "forum", "list"]),
            id in "[a-z0-9./-]{0,24}",
            suffix in prop::sample::select(vec!["", ".pdf", ".full", ".full.pdf", "/", "?id=x1"]),
        ) {
            let u = format!("{scheme}://{host}/{kind}/{id}{suffix}");
            let once = normalize_url(&u);
            prop_assert_eq!(normalize_url(&once), once);
        }
    }
}
