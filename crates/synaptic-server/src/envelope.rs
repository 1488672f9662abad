//! Internal failures → one user-facing message and HTTP status.
//!
//! The message table is fixed; internal detail (upstream bodies, raw model text) is logged by
//! the caller and never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use synaptic_core::{Error, FetchError};

pub const MSG_URL_REQUIRED: &str = "URL is required";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const MSG_CONFIG: &str = "Server configuration error";
pub const MSG_EXTRACTION: &str = "Could not extract readable text from the page.";
pub const MSG_LLM: &str = "AI analysis failed. Please try again later.";
pub const MSG_PARSE: &str = "AI returned a response that could not be understood.";
pub const MSG_INTERNAL: &str = "An error occurred during analysis.";

pub fn status_and_message(err: &Error) -> (StatusCode, &'static str) {
    match err {
        Error::Input(_) => (StatusCode::BAD_REQUEST, MSG_URL_REQUIRED),
        Error::InvalidUrl(_) => (
            StatusCode::BAD_REQUEST,
            "Invalid URL. Please provide a full http(s) address.",
        ),
        Error::NotConfigured(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_CONFIG),
        Error::Fetch(f) => match f {
            FetchError::NotFound => (
                StatusCode::BAD_REQUEST,
                "URL not found (404). Please check the link.",
            ),
            FetchError::AccessDenied => (
                StatusCode::BAD_REQUEST,
                "Access to this URL is forbidden (403). The site may block automated access.",
            ),
            FetchError::WrongContentType(_) => (
                StatusCode::BAD_REQUEST,
                "The URL does not point to an HTML page.",
            ),
            FetchError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "The site is rate limiting requests. Please try again later.",
            ),
            FetchError::Unreachable { .. } | FetchError::Network(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch the URL after several attempts.",
            ),
        },
        Error::Extraction(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_EXTRACTION),
        Error::Llm(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_LLM),
        Error::Parse(_) => (StatusCode::INTERNAL_SERVER_ERROR, MSG_PARSE),
        Error::Store(_) | Error::NotSupported(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, MSG_INTERNAL)
        }
    }
}

pub fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

pub fn error_response(err: &Error) -> Response {
    let (status, message) = status_and_message(err);
    error_body(status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synaptic_core::{ExtractionError, ParseError};

    #[test]
    fn fetch_failures_map_to_client_or_server_status() {
        let cases = [
            (FetchError::NotFound, StatusCode::BAD_REQUEST),
            (FetchError::AccessDenied, StatusCode::BAD_REQUEST),
            (
                FetchError::WrongContentType("application/pdf".into()),
                StatusCode::BAD_REQUEST,
            ),
            (FetchError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                FetchError::Unreachable {
                    attempts: 3,
                    last: "timeout".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        let mut seen = std::collections::BTreeSet::new();
        for (f, want) in cases {
            let (status, msg) = status_and_message(&Error::Fetch(f));
            assert_eq!(status, want);
            assert!(seen.insert(msg), "duplicate message {msg}");
        }
    }

    #[test]
    fn pipeline_stage_failures_have_fixed_messages() {
        let (s, m) = status_and_message(&Error::Extraction(ExtractionError::NoMeaningfulText {
            chars: 12,
        }));
        assert_eq!((s, m), (StatusCode::INTERNAL_SERVER_ERROR, MSG_EXTRACTION));

        let (s, m) = status_and_message(&Error::Llm("quota exceeded for key abc".into()));
        assert_eq!((s, m), (StatusCode::INTERNAL_SERVER_ERROR, MSG_LLM));

        let (s, m) = status_and_message(&Error::Parse(ParseError::NoJsonFound));
        assert_eq!((s, m), (StatusCode::INTERNAL_SERVER_ERROR, MSG_PARSE));

        let (s, m) = status_and_message(&Error::NotConfigured("missing GEMINI_API_KEY".into()));
        assert_eq!((s, m), (StatusCode::INTERNAL_SERVER_ERROR, MSG_CONFIG));

        let (s, m) = status_and_message(&Error::Input("URL is required".into()));
        assert_eq!((s, m), (StatusCode::BAD_REQUEST, MSG_URL_REQUIRED));

        let (_, m) = status_and_message(&Error::Store("disk full".into()));
        assert_eq!(m, MSG_INTERNAL);
    }
}
