//! Retrying HTML fetch on top of a [`FetchBackend`].
//!
//! 404/403/429 and non-HTML responses end the request at once. Transport failures and other
//! non-success statuses are retried up to the configured budget.

use crate::extract::bytes_look_like_html;
use std::time::Duration;
use synaptic_core::{Error, FetchBackend, FetchError, FetchRequest, FetchResponse, Result};

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout_ms: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause between attempts (0 = retry immediately).
    pub retry_delay_ms: u64,
    pub max_bytes: u64,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 12_000,
            max_retries: 2,
            retry_delay_ms: 0,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedHtml {
    pub html: String,
    pub content_type: Option<String>,
    pub final_url: String,
    pub attempts: u32,
    pub truncated: bool,
}

fn is_html_content_type(ct: &str) -> bool {
    let ct = ct.trim().to_ascii_lowercase();
    ct.starts_with("text/html") || ct.starts_with("application/xhtml+xml")
}

/// Map one response to a page or a failure. `Network` failures are retryable.
fn classify(resp: FetchResponse) -> std::result::Result<FetchResponse, FetchError> {
    match resp.status {
        404 | 410 => return Err(FetchError::NotFound),
        403 | 401 => return Err(FetchError::AccessDenied),
        429 => return Err(FetchError::RateLimited),
        200..=299 => {}
        s => return Err(FetchError::Network(format!("HTTP {s}"))),
    }
    match resp.content_type.as_deref() {
        Some(ct) if is_html_content_type(ct) => Ok(resp),
        Some(ct) => Err(FetchError::WrongContentType(ct.to_string())),
        None if bytes_look_like_html(&resp.bytes) => Ok(resp),
        None => Err(FetchError::WrongContentType("unknown".to_string())),
    }
}

pub async fn fetch_html(
    backend: &dyn FetchBackend,
    url: &str,
    policy: &FetchPolicy,
) -> Result<FetchedHtml> {
    let mut req = FetchRequest::new(url);
    req.timeout_ms = Some(policy.timeout_ms);
    req.max_bytes = Some(policy.max_bytes);

    let max_attempts = policy.max_retries.saturating_add(1);
    let mut last = String::new();
    for attempt in 1..=max_attempts {
        if attempt > 1 && policy.retry_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(policy.retry_delay_ms)).await;
        }
        let outcome = match backend.fetch(&req).await {
            Ok(resp) => classify(resp),
            Err(Error::Fetch(e)) => Err(e),
            // Invalid URLs and the like never get better on retry.
            Err(other) => return Err(other),
        };
        match outcome {
            Ok(resp) => {
                tracing::info!(
                    url = %url,
                    attempt,
                    status = resp.status,
                    bytes = resp.bytes.len(),
                    "fetched page"
                );
                return Ok(FetchedHtml {
                    html: resp.text_lossy(),
                    content_type: resp.content_type,
                    final_url: resp.final_url,
                    attempts: attempt,
                    truncated: resp.truncated,
                });
            }
            Err(e) if e.is_permanent() => {
                tracing::warn!(url = %url, attempt, error = %e, "fetch failed permanently");
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!(url = %url, attempt, max_attempts, error = %e, "fetch attempt failed");
                last = e.to_string();
            }
        }
    }
    Err(FetchError::Unreachable {
        attempts: max_attempts,
        last,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes and counts calls.
    struct Scripted {
        script: Mutex<VecDeque<Result<FetchResponse>>>,
        calls: Mutex<u32>,
    }

    impl Scripted {
        fn new(script: Vec<Result<FetchResponse>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(0),
            }
        }
        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl FetchBackend for Scripted {
        async fn fetch(&self, _req: &FetchRequest) -> Result<FetchResponse> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".into()).into()))
        }
    }

    fn page(status: u16, ct: Option<&str>, body: &str) -> Result<FetchResponse> {
        Ok(FetchResponse {
            url: "https://x.test/".into(),
            final_url: "https://x.test/".into(),
            status,
            content_type: ct.map(str::to_string),
            headers: BTreeMap::new(),
            bytes: body.as_bytes().to_vec(),
            truncated: false,
            timings_ms: BTreeMap::new(),
        })
    }

    fn net_err() -> Result<FetchResponse> {
        Err(FetchError::Network("connection reset".into()).into())
    }

    #[tokio::test]
    async fn not_found_short_circuits_without_retry() {
        let b = Scripted::new(vec![page(404, Some("text/html"), "gone"), page(200, Some("text/html"), "ok")]);
        let err = fetch_html(&b, "https://x.test/", &FetchPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::NotFound)), "{err:?}");
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn forbidden_and_rate_limited_short_circuit() {
        for (status, want) in [(403, FetchError::AccessDenied), (429, FetchError::RateLimited)] {
            let b = Scripted::new(vec![page(status, Some("text/html"), "")]);
            let err = fetch_html(&b, "https://x.test/", &FetchPolicy::default())
                .await
                .unwrap_err();
            match err {
                Error::Fetch(e) => assert_eq!(e, want),
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(b.calls(), 1);
        }
    }

    #[tokio::test]
    async fn two_transient_failures_then_success_uses_third_attempt() {
        let b = Scripted::new(vec![
            net_err(),
            page(503, Some("text/html"), "busy"),
            page(200, Some("text/html; charset=utf-8"), "<html><body>third</body></html>"),
        ]);
        let got = fetch_html(&b, "https://x.test/", &FetchPolicy::default())
            .await
            .unwrap();
        assert_eq!(got.attempts, 3);
        assert!(got.html.contains("third"));
        assert_eq!(b.calls(), 3);
    }

    #[tokio::test]
    async fn budget_exhausted_after_three_attempts() {
        let b = Scripted::new(vec![net_err(), net_err(), net_err(), page(200, Some("text/html"), "late")]);
        let err = fetch_html(&b, "https://x.test/", &FetchPolicy::default())
            .await
            .unwrap_err();
        match err {
            Error::Fetch(FetchError::Unreachable { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("connection reset"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(b.calls(), 3);
    }

    #[tokio::test]
    async fn non_html_content_type_is_permanent() {
        let b = Scripted::new(vec![page(200, Some("application/pdf"), "%PDF-1.7")]);
        let err = fetch_html(&b, "https://x.test/", &FetchPolicy::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Fetch(FetchError::WrongContentType(ref ct)) if ct == "application/pdf"),
            "{err:?}"
        );
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn missing_content_type_is_sniffed() {
        let b = Scripted::new(vec![page(200, None, "<!DOCTYPE html><html></html>")]);
        assert!(fetch_html(&b, "https://x.test/", &FetchPolicy::default()).await.is_ok());

        let b = Scripted::new(vec![page(200, None, "{\"json\": true}")]);
        let err = fetch_html(&b, "https://x.test/", &FetchPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(FetchError::WrongContentType(_))));
    }

    #[tokio::test]
    async fn invalid_url_is_not_retried() {
        let b = Scripted::new(vec![Err(Error::InvalidUrl("bad".into()))]);
        let err = fetch_html(&b, "bad", &FetchPolicy::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let b = Scripted::new(vec![net_err(), page(200, Some("text/html"), "ok")]);
        let policy = FetchPolicy {
            max_retries: 0,
            ..FetchPolicy::default()
        };
        let err = fetch_html(&b, "https://x.test/", &policy).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(FetchError::Unreachable { attempts: 1, .. })
        ));
    }
}
