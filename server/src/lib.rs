use anyhow::Result;
use axum::{extract::{rejection::JsonRejection, Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use docsim_core::persist::{load_index, save_index, IndexPaths};
use docsim_core::{load_documents, DocumentIndex, IndexConfig, IndexHandle, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub mod agent;

use agent::{DocumentSearchTool, EchoAgent};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// JSON/JSONL document source, re-read on refresh
    pub documents: PathBuf,
    pub index_config: IndexConfig,
    /// Optional vector cache directory, reused at startup when it matches the corpus
    pub cache_dir: Option<PathBuf>,
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { DEFAULT_TOP_K }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub name: String,
    pub score: f32,
    pub snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePart {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(alias = "app_name")]
    pub app_name: String,
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(alias = "new_message")]
    pub new_message: NewMessage,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub status: RunStatus,
    pub reply: String,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<IndexHandle>,
    pub agent: EchoAgent,
    pub documents: Arc<PathBuf>,
    pub index_config: Arc<IndexConfig>,
    pub cache_dir: Option<Arc<PathBuf>>,
    pub admin_token: Option<String>,
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    config.index_config.validate()?;

    // A missing or broken source leaves the handle unbuilt: searches answer empty.
    let index = Arc::new(IndexHandle::new());
    if let Some(initial) = initial_index(&config) {
        index.install(initial);
    }

    let agent = EchoAgent::new(DocumentSearchTool::new(Arc::clone(&index)));
    let app_state = AppState {
        index,
        agent,
        documents: Arc::new(config.documents),
        index_config: Arc::new(config.index_config),
        cache_dir: config.cache_dir.map(Arc::new),
        admin_token: config.admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:name", get(doc_handler))
        .route("/run", post(run_handler))
        .route("/index/refresh", post(refresh_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn initial_index(config: &ServerConfig) -> Option<DocumentIndex> {
    let documents = match load_documents(&config.documents) {
        Ok(docs) => docs,
        Err(e) => {
            tracing::warn!(error = %e, "document source unavailable, serving an empty index");
            return None;
        }
    };
    if let Some(dir) = &config.cache_dir {
        match load_index(&IndexPaths::new(dir), documents.clone(), &config.index_config) {
            Ok(index) => return Some(index),
            Err(e) => tracing::warn!(cache = %dir.display(), error = %e, "vector cache unusable, refitting"),
        }
    }
    let index = DocumentIndex::build(documents, &config.index_config);
    if let Some(dir) = &config.cache_dir {
        if let Err(e) = save_index(&IndexPaths::new(dir), &index) {
            tracing::warn!(cache = %dir.display(), error = %e, "failed to write vector cache");
        }
    }
    Some(index)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.max(1).min(100);
    let hits = state.index.query(&params.q, k);

    // Capture raw query terms for highlighting
    let raw_terms: Vec<String> = params
        .q
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();
    let results: Vec<SearchHit> = hits
        .into_iter()
        .map(|h| {
            let snippet = snippet_from_text(&h.document.content, &raw_terms);
            SearchHit { name: h.document.name, score: h.score, snippet }
        })
        .collect();

    let elapsed = start.elapsed();
    Json(SearchResponse { query: params.q, took_ms: elapsed.as_millis(), took_s: elapsed.as_secs_f64(), total_hits: results.len(), results })
}

pub async fn doc_handler(State(state): State<AppState>, Path(name): Path<String>) -> Json<serde_json::Value> {
    if let Some(index) = state.index.snapshot() {
        if let Some(doc) = index.get(&name) {
            return Json(serde_json::json!({ "name": doc.name, "content": doc.content }));
        }
    }
    Json(serde_json::json!({ "error": "not found" }))
}

pub async fn run_handler(State(state): State<AppState>, payload: Result<Json<RunRequest>, JsonRejection>) -> Json<RunResponse> {
    let request = match payload {
        Ok(Json(r)) => r,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected chat request");
            return Json(RunResponse { status: RunStatus::Error, reply: format!("Invalid request: {}", rejection.body_text()) });
        }
    };
    tracing::info!(app = %request.app_name, user = %request.user_id, session = %request.session_id, role = %request.new_message.role, "chat request");

    let text: Vec<&str> = request
        .new_message
        .parts
        .iter()
        .map(|p| p.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if text.is_empty() {
        return Json(RunResponse { status: RunStatus::Error, reply: "The message has no text to respond to.".into() });
    }
    let reply = state.agent.respond(&text.join("\n"));
    Json(RunResponse { status: RunStatus::Success, reply })
}

async fn refresh_handler(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let result = tokio::task::spawn_blocking(move || {
        let index = state.index.rebuild_from_path(state.documents.as_path(), &state.index_config)?;
        if let Some(dir) = &state.cache_dir {
            save_index(&IndexPaths::new(dir.as_path()), &index)?;
        }
        Ok::<_, docsim_core::IndexError>(index.len())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match result {
        Ok(num_docs) => Ok(Json(serde_json::json!({ "num_docs": num_docs }))),
        Err(e) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
    }
}

fn authorize(state: &AppState, headers: &axum::http::HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn snippet_from_text(text: &str, raw_terms: &[String]) -> Option<String> {
    if text.is_empty() { return None; }
    // find first match (case-insensitive) of any raw term
    let lower = text.to_lowercase();
    let first_idx = raw_terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .find_map(|t| lower.find(&t.to_lowercase()));
    let snippet = match first_idx {
        // lowercasing can shift byte offsets; only trust the index on a boundary
        Some(idx) if lower.len() == text.len() && text.is_char_boundary(idx) => {
            let start = floor_boundary(text, idx.saturating_sub(100));
            let end = floor_boundary(text, (idx + 200).min(text.len()));
            text[start..end].to_string()
        }
        _ => text.chars().take(200).collect(),
    };
    Some(highlight_terms(&snippet, raw_terms))
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while !text.is_char_boundary(idx) { idx -= 1; }
    idx
}

fn highlight_terms(snippet: &str, terms: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in terms {
        if t.trim().is_empty() { continue; }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else { continue };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_highlights_terms() {
        let s = snippet_from_text("Quarterly budget report", &["budget".into()]).unwrap();
        assert_eq!(s, "Quarterly <em>budget</em> report");
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = format!("{}budget", "é".repeat(150));
        let s = snippet_from_text(&text, &["budget".into()]).unwrap();
        assert!(s.ends_with("<em>budget</em>"));
    }
}
