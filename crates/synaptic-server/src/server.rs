//! HTTP surface: `POST /analyze` (alias `/api/analyze`) plus health routes.

use crate::envelope::{error_body, error_response, MSG_CONFIG, MSG_METHOD_NOT_ALLOWED, MSG_URL_REQUIRED};
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use synaptic_core::{AnalysisStore, CompletionBackend, FetchBackend};
use synaptic_local::pipeline::{Pipeline, PipelineConfig};

/// Shared, read-only request context.
///
/// `completion` is `None` when the provider's credentials are missing; requests then fail with
/// the configuration error before any network IO. `store` is `None` when history saving is off.
pub struct AppState {
    pub pipeline_cfg: PipelineConfig,
    pub fetcher: Arc<dyn FetchBackend>,
    pub completion: Option<Arc<dyn CompletionBackend>>,
    pub store: Option<Arc<dyn AnalysisStore>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/analyze", any(analyze))
        .route("/api/analyze", any(analyze))
        .with_state(state)
}

async fn root() -> &'static str {
    "Hello from the Synaptic Insight Engine Backend!"
}

async fn healthz(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "name": "synaptic",
        "version": env!("CARGO_PKG_VERSION"),
        "variant": state.pipeline_cfg.variant.as_str(),
        "completion": state.completion.as_ref().map(|c| c.name()),
        "store": state.store.as_ref().map(|s| s.name()),
    }))
}

/// `url` from a JSON body, if present and non-blank. Any other body shape counts as missing.
fn request_url(body: &[u8]) -> Option<String> {
    let v: serde_json::Value = serde_json::from_slice(body).ok()?;
    let url = v.get("url")?.as_str()?.trim();
    (!url.is_empty()).then(|| url.to_string())
}

async fn analyze(State(state): State<Arc<AppState>>, method: Method, body: Bytes) -> Response {
    let Some(url) = request_url(&body) else {
        return error_body(StatusCode::BAD_REQUEST, MSG_URL_REQUIRED);
    };
    if method != Method::POST {
        return error_body(StatusCode::METHOD_NOT_ALLOWED, MSG_METHOD_NOT_ALLOWED);
    }
    let Some(completion) = state.completion.clone() else {
        tracing::error!("completion backend not configured (missing credentials)");
        return error_body(StatusCode::INTERNAL_SERVER_ERROR, MSG_CONFIG);
    };

    let pipeline = Pipeline::new(state.fetcher.clone(), completion, state.pipeline_cfg.clone());
    let run = match pipeline.run(&url).await {
        Ok(run) => run,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "analysis failed");
            return error_response(&e);
        }
    };

    if let Some(store) = &state.store {
        let entry = run.to_history_entry(synaptic_local::now_epoch_s());
        match store.save_analysis(&entry).await {
            Ok(saved) => tracing::info!(id = %saved.id, store = store.name(), "saved analysis"),
            Err(e) => tracing::warn!(url = %url, error = %e, "could not save analysis"),
        }
    }
    (StatusCode::OK, Json(run.output)).into_response()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn serve(bind: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %addr, variant = state.pipeline_cfg.variant.as_str(), "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
