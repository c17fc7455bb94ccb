//! HTTP handlers for the dashboard API

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::usage::models::{ClaudeStats, ProjectDetailStats, StatsFilters};
use crate::usage::overrides::{OverrideMap, StoreError};
use crate::usage::stats::{parse_claude_data, parse_project_data};
use crate::AppState;

/// Errors surfaced to API clients as `{ "error": ... }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Project not found")]
    NotFound,
    #[error("Failed to save overrides: {0}")]
    Store(#[from] StoreError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Task(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Run filesystem-bound pipeline work off the async workers
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await?)
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Aggregated statistics; filters apply only when at least one is given
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<StatsFilters>,
) -> Result<Json<ClaudeStats>, ApiError> {
    let filters = filters.without_blanks();
    let stats = blocking(move || {
        let filters = (!filters.is_empty()).then_some(&filters);
        parse_claude_data(&state.store, filters)
    })
    .await?;
    Ok(Json(stats))
}

/// Statistics for one project
pub async fn get_project_stats(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
) -> Result<Json<ProjectDetailStats>, ApiError> {
    blocking(move || parse_project_data(&state.store, &project))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Drop cached sessions so the next request rescans disk
pub async fn refresh_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    // Waits out any rebuild holding the session lock
    blocking(move || state.store.clear_session_cache()).await?;
    Ok(ok())
}

pub async fn get_overrides(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let overrides: OverrideMap = blocking(move || (*state.store.get_overrides()).clone()).await?;
    Ok(Json(overrides))
}

/// Override request body; fields stay untyped so a wrong type reads as missing
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    #[serde(default)]
    pub session_id: Value,
    #[serde(default)]
    pub project: Value,
}

fn required(value: &Value, message: &'static str) -> Result<String, ApiError> {
    value
        .as_str()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::BadRequest(message))
}

pub async fn set_override(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<Value>, ApiError> {
    let session_id = required(&body.session_id, "sessionId required")?;
    let project = required(&body.project, "project required")?;

    blocking(move || state.store.set_override(&session_id, &project)).await??;
    Ok(ok())
}

pub async fn remove_override(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<Value>, ApiError> {
    let session_id = required(&body.session_id, "sessionId required")?;

    blocking(move || state.store.remove_override(&session_id)).await??;
    Ok(ok())
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::usage::cache::{SessionStore, StorePaths};
    use crate::usage::config::ConfigSource;

    const REPLY: &str = r#"{"type":"assistant","timestamp":"2026-03-10T10:00:00Z","message":{"model":"claude-sonnet-4-6","usage":{"input_tokens":1000,"output_tokens":500}}}"#;

    fn state(root: &std::path::Path) -> Arc<AppState> {
        let folder = root.join("projects").join("-Users-me-Code-web");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("abc123.jsonl"), REPLY).unwrap();

        Arc::new(AppState::new(SessionStore::new(StorePaths {
            projects_dir: root.join("projects"),
            overrides_file: root.join("session-overrides.json"),
            config: ConfigSource {
                config_file: root.join("codecenter.config.json"),
                home_dir: PathBuf::from("/Users/me"),
            },
        })))
    }

    fn body(session_id: Value, project: Value) -> Json<OverrideRequest> {
        Json(OverrideRequest { session_id, project })
    }

    #[tokio::test]
    async fn test_get_stats_with_and_without_filters() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        let Json(stats) = get_stats(State(state.clone()), Query(StatsFilters::default()))
            .await
            .unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert!((stats.estimated_cost - 0.0105).abs() < 1e-12);
        assert!(!stats.generated_at.is_empty());

        let filters = StatsFilters::new().with_model(Some("opus".into()));
        let Json(stats) = get_stats(State(state.clone()), Query(filters)).await.unwrap();
        assert_eq!(stats.total_sessions, 0);

        let blank = StatsFilters::new().with_project(Some(String::new()));
        let Json(stats) = get_stats(State(state), Query(blank)).await.unwrap();
        assert_eq!(stats.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_project_stats_not_found() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        let Json(detail) = get_project_stats(State(state.clone()), Path("WEB".to_string()))
            .await
            .unwrap();
        assert_eq!(detail.name, "WEB");
        assert_eq!(detail.sessions, 1);

        let err = get_project_stats(State(state), Path("nonexistent-project-xyz".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_override_validation() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        let err = set_override(State(state.clone()), body(Value::Null, json!("p")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "sessionId required");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);

        let err = set_override(State(state.clone()), body(json!("abc123"), json!(42)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "project required");

        let err = remove_override(State(state), body(json!(""), Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "sessionId required");
    }

    #[tokio::test]
    async fn test_override_roundtrip_reattributes_session() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());

        set_override(State(state.clone()), body(json!("abc123"), json!("other-project")))
            .await
            .unwrap();
        let Json(overrides) = get_overrides(State(state.clone())).await.unwrap();
        assert_eq!(overrides.get("abc123").map(String::as_str), Some("other-project"));

        let Json(stats) = get_stats(State(state.clone()), Query(StatsFilters::default()))
            .await
            .unwrap();
        assert_eq!(stats.project_stats[0].name, "other-project");

        remove_override(State(state.clone()), body(json!("abc123"), Value::Null))
            .await
            .unwrap();
        let Json(stats) = get_stats(State(state), Query(StatsFilters::default()))
            .await
            .unwrap();
        assert_eq!(stats.project_stats[0].name, "web");
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_files() {
        let root = tempfile::tempdir().unwrap();
        let state = state(root.path());
        assert_eq!(state.store.get_all_sessions().len(), 1);

        let folder = root.path().join("projects").join("-Users-me-Code-web");
        fs::write(folder.join("def456.jsonl"), REPLY).unwrap();
        assert_eq!(state.store.get_all_sessions().len(), 1);

        let Json(reply) = refresh_stats(State(state.clone())).await.unwrap();
        assert_eq!(reply, json!({ "ok": true }));
        assert_eq!(state.store.get_all_sessions().len(), 2);
    }

    #[tokio::test]
    async fn test_health_check() {
        let Json(reply) = health_check().await;
        assert_eq!(reply["status"], "ok");
    }
}
