//! JSON admin endpoints for source registration

use axum::{
    Json,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use url::Url;

use crate::SharedState;
use crate::db::sources::{NewSource, generate_hook_secret};

#[derive(Debug, Deserialize)]
pub struct RegisterSourceRequest {
    pub repository_url: String,
    pub repository_access_token: String,
    #[serde(default)]
    pub branch_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BranchFilterRequest {
    pub branch_filter: String,
}

/// GET /api/sources - list registered sources
pub async fn list_sources(AxumState(state): AxumState<SharedState>) -> Response {
    match state.sources.list_all().await {
        Ok(sources) => Json(sources).into_response(),
        Err(e) => {
            error!("Failed to list sources: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// POST /api/sources - register (or re-register) a repository source.
/// The hook secret is generated server-side and returned once so the
/// operator can configure the remote webhook.
pub async fn register_source(
    AxumState(state): AxumState<SharedState>,
    Json(req): Json<RegisterSourceRequest>,
) -> Response {
    let repository_url = req.repository_url.trim().to_string();
    if repository_url.is_empty() || Url::parse(&repository_url).is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Repository URL is required and must be a valid URL"
            })),
        )
            .into_response();
    }

    let access_token = req.repository_access_token.trim().to_string();
    if access_token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Repository access token is required"})),
        )
            .into_response();
    }

    let branch_filter = req
        .branch_filter
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "*".to_string());

    let source = NewSource {
        repository_url,
        repository_access_token: access_token,
        hook_id: 0,
        hook_secret: generate_hook_secret(),
        branch_filter,
    };

    match state.sources.save(&source).await {
        Ok(id) => {
            info!("Registered source {} for {}", id, source.repository_url);
            Json(json!({
                "success": true,
                "id": id,
                "hook_secret": source.hook_secret,
            }))
            .into_response()
        }
        Err(e) => {
            error!("Failed to save source: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "message": "Failed to save configuration"})),
            )
                .into_response()
        }
    }
}

/// POST /api/sources/{id}/branch-filter - update the branch filter
pub async fn update_branch_filter(
    AxumState(state): AxumState<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<BranchFilterRequest>,
) -> Response {
    let branch_filter = req.branch_filter.trim();
    if branch_filter.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "Branch filter cannot be empty"})),
        )
            .into_response();
    }

    match state.sources.update_branch_filter(id, branch_filter).await {
        Ok(true) => Json(json!({"success": true, "message": "Branch filter updated"})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "No such configuration"})),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to update branch filter: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "message": "Update failed"})),
            )
                .into_response()
        }
    }
}

/// DELETE /api/sources/{id} - remove a configuration
pub async fn delete_source(
    AxumState(state): AxumState<SharedState>,
    Path(id): Path<i64>,
) -> Response {
    match state.sources.delete_by_id(id).await {
        Ok(true) => Json(json!({"success": true, "message": "Configuration deleted"})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "No such configuration"})),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to delete source: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "message": "Delete failed"})),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppState;
    use crate::db::sources::SourceStore;
    use crate::db::test_pool;
    use crate::db::tracker::TrackerStore;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    async fn state_with(pool: &SqlitePool) -> SharedState {
        Arc::new(AppState {
            sources: SourceStore::new(pool.clone()),
            tracker: TrackerStore::new(pool.clone()),
        })
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_returns_generated_secret() {
        let pool = test_pool().await;
        let state = state_with(&pool).await;

        let resp = register_source(
            AxumState(state.clone()),
            Json(RegisterSourceRequest {
                repository_url: "https://git.example.com/owner/repo".to_string(),
                repository_access_token: "tok".to_string(),
                branch_filter: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        let secret = body["hook_secret"].as_str().unwrap();
        assert_eq!(secret.len(), 32);

        let stored = state.sources.list_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].hook_secret, secret);
        assert_eq!(stored[0].branch_filter, "*");
    }

    #[tokio::test]
    async fn register_rejects_bad_url_and_missing_token() {
        let pool = test_pool().await;
        let state = state_with(&pool).await;

        let resp = register_source(
            AxumState(state.clone()),
            Json(RegisterSourceRequest {
                repository_url: "not a url".to_string(),
                repository_access_token: "tok".to_string(),
                branch_filter: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = register_source(
            AxumState(state),
            Json(RegisterSourceRequest {
                repository_url: "https://git.example.com/o/r".to_string(),
                repository_access_token: "  ".to_string(),
                branch_filter: None,
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn branch_filter_update_and_delete_report_missing_rows() {
        let pool = test_pool().await;
        let state = state_with(&pool).await;

        let resp = update_branch_filter(
            AxumState(state.clone()),
            Path(123),
            Json(BranchFilterRequest {
                branch_filter: "release/*".to_string(),
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = delete_source(AxumState(state), Path(123)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
