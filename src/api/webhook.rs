//! Inbound webhook endpoint: verification, normalization, ticket linking.

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::SharedState;
use crate::identity::resolve_user_id;
use crate::linker::link_commit;
use crate::payload::extract_push_facts;
use crate::verify::{MatchOutcome, extract_signature, match_source};

/// Handles the webhook POST request.
///
/// Verification failures (empty/invalid body, no matching source, signature
/// mismatch) are the only non-success responses. Once a delivery is
/// verified, identity resolution and ticket linking are best-effort: their
/// failures are logged and reported in the summary counts, never as an HTTP
/// error the sender would retry.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        warn!("Webhook delivery with empty payload");
        return (StatusCode::BAD_REQUEST, "Empty payload").into_response();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => {
            warn!("Webhook delivery with invalid JSON payload");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };

    let signature = extract_signature(&headers);

    let sources = match state.sources.list_all().await {
        Ok(sources) => sources,
        Err(e) => {
            error!("Could not load source configurations: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "message": "Configuration store unavailable"})),
            )
                .into_response();
        }
    };

    let source = match match_source(&sources, &body, signature.as_deref(), &payload) {
        MatchOutcome::Matched(source) => source,
        MatchOutcome::NoMatch => {
            warn!("No matching source configuration for incoming webhook");
            return (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "success": false,
                    "message": "No matching repository configuration found"
                })),
            )
                .into_response();
        }
        MatchOutcome::SignatureMismatch => {
            warn!("Signature mismatch for incoming webhook");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"success": false, "message": "Signature mismatch"})),
            )
                .into_response();
        }
    };

    info!(
        "Verified webhook delivery for source {} ({})",
        source.id, source.repository_url
    );

    let facts = extract_push_facts(&payload, &source.repository_url);

    let mut linked = 0;
    let mut errors = 0;
    // Branch references are delivery-level: scanned once, alongside the
    // first commit, so a `fix-#12` branch does not produce one history
    // entry per commit in the push.
    for (index, commit) in facts.commits.iter().enumerate() {
        let branch = if index == 0 { facts.branch.as_str() } else { "" };
        let user_id = resolve_user_id(&state.tracker, commit, &facts.pusher).await;
        let summary = link_commit(
            &state.tracker,
            &commit.message,
            branch,
            &commit.commit_url,
            &commit.sha,
            user_id,
        )
        .await;
        linked += summary.linked;
        errors += summary.errors;
    }
    if facts.commits.is_empty() && !facts.branch.is_empty() {
        // No commit facts at all, but the branch name may still reference tickets
        let user_id = resolve_user_id(&state.tracker, &Default::default(), &facts.pusher).await;
        let summary = link_commit(&state.tracker, "", &facts.branch, "", "", user_id).await;
        linked += summary.linked;
        errors += summary.errors;
    }

    let head = facts.commits.first();
    Json(json!({
        "success": true,
        "branch": facts.branch,
        "commit_sha": head.map(|c| c.sha.as_str()).unwrap_or(""),
        "commit_message": head.map(|c| c.message.as_str()).unwrap_or(""),
        "commit_link": head.map(|c| c.commit_url.as_str()).unwrap_or(""),
        "tickets_linked": linked,
        "ticket_errors": errors,
    }))
    .into_response()
}
