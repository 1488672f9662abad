//! [`AnalysisStore`] over a PostgREST endpoint (Supabase-style `/rest/v1/<table>`).
//!
//! Rows live in the `analyses` and `bookmarks` tables and every query is scoped with
//! `user_id=eq.<id>`. Requests carry the project key in `apikey` and the user's access token as a
//! bearer token.

use crate::env;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use synaptic_core::{AnalysisResult, AnalysisStore, Bookmark, Error, HistoryEntry, Result};

const ANALYSES: &str = "analyses";
const BOOKMARKS: &str = "bookmarks";
/// Upper bound on rows fetched by one listing.
const MAX_ROWS: usize = 1_000;

#[derive(Clone)]
pub struct RestStoreConfig {
    pub base_url: String,
    pub api_key: String,
    /// User session token; the project key is used when absent.
    pub access_token: Option<String>,
    pub user_id: String,
}

impl std::fmt::Debug for RestStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStoreConfig")
            .field("base_url", &self.base_url)
            .field("user_id", &self.user_id)
            .field("has_access_token", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl RestStoreConfig {
    pub fn from_env() -> Result<Self> {
        let need = |k: &str| env(k).ok_or_else(|| Error::NotConfigured(format!("missing {k}")));
        Ok(Self {
            base_url: need("SYNAPTIC_REST_URL")?,
            api_key: need("SYNAPTIC_REST_API_KEY")?,
            access_token: env("SYNAPTIC_REST_ACCESS_TOKEN"),
            user_id: need("SYNAPTIC_REST_USER_ID")?,
        })
    }
}

/// Row ids may be bigint or uuid depending on the schema.
fn de_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Serialize)]
struct NewAnalysisRow<'a> {
    user_id: &'a str,
    url: &'a str,
    title: &'a str,
    analysis_data: &'a AnalysisResult,
    structured_data: &'a Map<String, Value>,
    source_text: &'a str,
    overall_score: u32,
    created_at_epoch_s: u64,
}

#[derive(Debug, Deserialize)]
struct AnalysisRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    analysis_data: AnalysisResult,
    #[serde(default)]
    structured_data: Option<Map<String, Value>>,
    #[serde(default)]
    source_text: Option<String>,
    #[serde(default)]
    overall_score: u32,
    #[serde(default)]
    created_at_epoch_s: u64,
}

impl From<AnalysisRow> for HistoryEntry {
    fn from(r: AnalysisRow) -> Self {
        HistoryEntry {
            id: r.id,
            url: r.url,
            title: r.title,
            created_at_epoch_s: r.created_at_epoch_s,
            overall_score: r.overall_score,
            analysis: r.analysis_data,
            structured_data: r.structured_data.unwrap_or_default(),
            source_text: r.source_text.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct NewBookmarkRow<'a> {
    user_id: &'a str,
    analysis_id: &'a str,
    url: &'a str,
    title: &'a str,
    overall_score: u32,
    categories: &'a [String],
    tags: &'a [String],
    created_at_epoch_s: u64,
}

#[derive(Debug, Deserialize)]
struct BookmarkRow {
    #[serde(deserialize_with = "de_id")]
    id: String,
    #[serde(deserialize_with = "de_id")]
    analysis_id: String,
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    overall_score: u32,
    #[serde(default)]
    categories: Option<Vec<String>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    created_at_epoch_s: u64,
}

impl From<BookmarkRow> for Bookmark {
    fn from(r: BookmarkRow) -> Self {
        Bookmark {
            id: r.id,
            analysis_id: r.analysis_id,
            url: r.url,
            title: r.title,
            overall_score: r.overall_score,
            categories: r.categories.unwrap_or_default(),
            tags: r.tags.unwrap_or_default(),
            created_at_epoch_s: r.created_at_epoch_s,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    cfg: RestStoreConfig,
}

impl RestStore {
    pub fn new(client: reqwest::Client, cfg: RestStoreConfig) -> Self {
        Self { client, cfg }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        Ok(Self::new(client, RestStoreConfig::from_env()?))
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.cfg.base_url.trim_end_matches('/'))
    }

    fn authed(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        let token = self
            .cfg
            .access_token
            .as_deref()
            .unwrap_or(&self.cfg.api_key);
        self.client
            .request(method, self.endpoint(table))
            .header("apikey", &self.cfg.api_key)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
    }

    /// Authenticated request filtered to the configured user.
    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.authed(method, table)
            .query(&[("user_id", format!("eq.{}", self.cfg.user_id))])
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        rb: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let resp = rb
            .send()
            .await
            .map_err(|e| Error::Store(format!("{what}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail: String = body.chars().take(300).collect();
            return Err(Error::Store(format!("{what}: HTTP {status}: {detail}")));
        }
        resp.json::<T>()
            .await
            .map_err(|e| Error::Store(format!("{what}: bad response: {e}")))
    }
}

fn single<T>(mut rows: Vec<T>, what: &str) -> Result<T> {
    if rows.is_empty() {
        return Err(Error::Store(format!("{what}: no row returned")));
    }
    Ok(rows.swap_remove(0))
}

#[async_trait::async_trait]
impl AnalysisStore for RestStore {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn save_analysis(&self, entry: &HistoryEntry) -> Result<HistoryEntry> {
        let row = NewAnalysisRow {
            user_id: &self.cfg.user_id,
            url: &entry.url,
            title: &entry.title,
            analysis_data: &entry.analysis,
            structured_data: &entry.structured_data,
            source_text: &entry.source_text,
            overall_score: entry.overall_score,
            created_at_epoch_s: entry.created_at_epoch_s,
        };
        let rb = self
            .authed(reqwest::Method::POST, ANALYSES)
            .header("Prefer", "return=representation")
            .json(&row);
        let rows: Vec<AnalysisRow> = self.send(rb, "save analysis").await?;
        Ok(single(rows, "save analysis")?.into())
    }

    async fn list_analyses(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = limit.min(MAX_ROWS);
        let rb = self
            .request(reqwest::Method::GET, ANALYSES)
            .query(&[
                ("select", "*".to_string()),
                ("order", "created_at_epoch_s.desc".to_string()),
                ("limit", limit.to_string()),
            ]);
        let rows: Vec<AnalysisRow> = self.send(rb, "list analyses").await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn save_bookmark(&self, bookmark: &Bookmark) -> Result<Bookmark> {
        let row = NewBookmarkRow {
            user_id: &self.cfg.user_id,
            analysis_id: &bookmark.analysis_id,
            url: &bookmark.url,
            title: &bookmark.title,
            overall_score: bookmark.overall_score,
            categories: &bookmark.categories,
            tags: &bookmark.tags,
            created_at_epoch_s: bookmark.created_at_epoch_s,
        };
        let rb = self
            .authed(reqwest::Method::POST, BOOKMARKS)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .query(&[("on_conflict", "user_id,analysis_id")])
            .json(&row);
        let rows: Vec<BookmarkRow> = self.send(rb, "save bookmark").await?;
        Ok(single(rows, "save bookmark")?.into())
    }

    async fn remove_bookmark(&self, analysis_id: &str) -> Result<bool> {
        let rb = self
            .request(reqwest::Method::DELETE, BOOKMARKS)
            .query(&[("analysis_id", format!("eq.{analysis_id}"))])
            .header("Prefer", "return=representation");
        let rows: Vec<Value> = self.send(rb, "remove bookmark").await?;
        Ok(!rows.is_empty())
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let rb = self.request(reqwest::Method::GET, BOOKMARKS).query(&[
            ("select", "*".to_string()),
            ("order", "created_at_epoch_s.desc".to_string()),
            ("limit", MAX_ROWS.to_string()),
        ]);
        let rows: Vec<BookmarkRow> = self.send(rb, "list bookmarks").await?;
        Ok(rows.into_iter().map(Bookmark::from).collect())
    }

    async fn find_bookmark_by_url(&self, url: &str) -> Result<Option<Bookmark>> {
        let rb = self.request(reqwest::Method::GET, BOOKMARKS).query(&[
            ("select", "*".to_string()),
            ("url", format!("eq.{url}")),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<BookmarkRow> = self.send(rb, "find bookmark").await?;
        Ok(rows.into_iter().next().map(Bookmark::from))
    }

    async fn clear(&self) -> Result<()> {
        for table in [BOOKMARKS, ANALYSES] {
            let rb = self
                .request(reqwest::Method::DELETE, table)
                .header("Prefer", "return=minimal");
            let resp = rb
                .send()
                .await
                .map_err(|e| Error::Store(format!("clear {table}: {e}")))?;
            if !resp.status().is_success() {
                return Err(Error::Store(format!(
                    "clear {table}: HTTP {}",
                    resp.status()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{RawQuery, State},
        http::{HeaderMap, Method, StatusCode, Uri},
        routing::any,
        Json, Router,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    async fn stub(
        State(log): State<Log>,
        method: Method,
        uri: Uri,
        RawQuery(q): RawQuery,
        headers: HeaderMap,
        body: axum::body::Bytes,
    ) -> (StatusCode, Json<Value>) {
        let h = |k: &str| {
            headers
                .get(k)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        if h("apikey") != "anon" || h("authorization") != "Bearer user-jwt" {
            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "JWT invalid"})));
        }
        let q = q.unwrap_or_default();
        log.lock()
            .unwrap()
            .push(format!("{method} {}?{q}", uri.path()));
        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        match (method.as_str(), uri.path()) {
            ("POST", "/rest/v1/analyses") => {
                let mut row = body.clone();
                row["id"] = json!(42);
                (StatusCode::CREATED, Json(json!([row])))
            }
            ("GET", "/rest/v1/analyses") => (
                StatusCode::OK,
                Json(json!([{
                    "id": "7b1f", "url": "https://a", "title": "A",
                    "analysis_data": {"gaps": ["no controls"]},
                    "structured_data": null, "source_text": null,
                    "overall_score": 85, "created_at_epoch_s": 10
                }])),
            ),
            ("POST", "/rest/v1/bookmarks") => {
                let mut row = body.clone();
                row["id"] = json!(5);
                (StatusCode::CREATED, Json(json!([row])))
            }
            ("GET", "/rest/v1/bookmarks") => (StatusCode::OK, Json(json!([]))),
            ("DELETE", "/rest/v1/bookmarks") => {
                (StatusCode::OK, Json(json!([{"id": 5}])))
            }
            _ => (StatusCode::NOT_FOUND, Json(json!({}))),
        }
    }

    async fn serve() -> (RestStore, Log) {
        let log: Log = Arc::default();
        let app = Router::new()
            .route("/rest/v1/:table", any(stub))
            .with_state(log.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let store = RestStore::new(
            reqwest::Client::new(),
            RestStoreConfig {
                base_url: format!("http://{addr}/"),
                api_key: "anon".into(),
                access_token: Some("user-jwt".into()),
                user_id: "u1".into(),
            },
        );
        (store, log)
    }

    #[tokio::test]
    async fn save_and_list_analyses_scoped_to_user() {
        let (store, log) = serve().await;
        let entry = HistoryEntry {
            id: "local".into(),
            url: "https://a".into(),
            title: "A".into(),
            created_at_epoch_s: 10,
            overall_score: 85,
            analysis: AnalysisResult::default(),
            structured_data: Default::default(),
            source_text: "text".into(),
        };
        let saved = store.save_analysis(&entry).await.unwrap();
        assert_eq!(saved.id, "42");
        assert_eq!(saved.source_text, "text");

        let listed = store.list_analyses(50).await.unwrap();
        assert_eq!(listed[0].id, "7b1f");
        assert_eq!(listed[0].analysis.get("gaps").len(), 1);

        let log = log.lock().unwrap();
        assert!(log[1].starts_with("GET /rest/v1/analyses?user_id=eq.u1"), "{}", log[1]);
        assert!(log[1].contains("order=created_at_epoch_s.desc"));
        assert!(log[1].contains("limit=50"));
    }

    #[tokio::test]
    async fn zero_limit_lists_nothing_without_a_request() {
        let (store, log) = serve().await;
        assert!(store.list_analyses(0).await.unwrap().is_empty());
        assert!(log.lock().unwrap().is_empty());

        store.list_analyses(usize::MAX).await.unwrap();
        let log = log.lock().unwrap();
        assert!(log[0].contains(&format!("limit={MAX_ROWS}")), "{}", log[0]);
    }

    #[tokio::test]
    async fn bookmark_upsert_remove_and_lookup() {
        let (store, log) = serve().await;
        let bm = Bookmark {
            id: String::new(),
            analysis_id: "42".into(),
            url: "https://a?x=1&y=2".into(),
            title: "A".into(),
            overall_score: 85,
            categories: vec!["Other".into()],
            tags: vec![],
            created_at_epoch_s: 11,
        };
        let saved = store.save_bookmark(&bm).await.unwrap();
        assert_eq!(saved.id, "5");
        assert_eq!(saved.categories, vec!["Other"]);
        assert!(store.remove_bookmark("42").await.unwrap());
        assert!(store.find_bookmark_by_url(&bm.url).await.unwrap().is_none());

        let log = log.lock().unwrap();
        assert!(log[0].contains("on_conflict=user_id%2Canalysis_id"), "{}", log[0]);
        assert!(log[1].starts_with("DELETE /rest/v1/bookmarks?user_id=eq.u1&analysis_id=eq.42"));
        // The url filter value is percent-encoded, not spliced raw into the query.
        assert!(log[2].contains("url=eq.https%3A%2F%2Fa%3Fx%3D1%26y%3D2"), "{}", log[2]);
    }

    #[tokio::test]
    async fn upstream_errors_become_store_errors() {
        let (mut store, _log) = serve().await;
        store.cfg.access_token = Some("expired".into());
        match store.list_bookmarks().await {
            Err(Error::Store(m)) => assert!(m.contains("401"), "{m}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
