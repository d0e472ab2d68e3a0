//! Webhook verification and source matching.
//!
//! Pure functions over the raw request body, the signature header and the
//! parsed payload, so the whole authentication decision is testable without
//! a transport layer.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::db::sources::RepositorySource;

type HmacSha256 = Hmac<Sha256>;

/// Checked in fixed priority order; first non-empty value wins.
const SIGNATURE_HEADERS: [&str; 3] = [
    "X-Gitea-Signature",
    "X-Hub-Signature",
    "X-Hub-Signature-256",
];

/// Payload keys that may carry the repository URL, tried in order.
const REPO_URL_KEYS: [&str; 5] = ["html_url", "url", "clone_url", "git_http_url", "ssh_url"];

/// Outcome of matching a delivery against the registered sources.
#[derive(Debug)]
pub enum MatchOutcome {
    Matched(RepositorySource),
    NoMatch,
    SignatureMismatch,
}

/// Extract the sender-supplied signature and normalize it to a bare hex
/// digest. Senders disagree on whether the value carries a `sha256=` prefix;
/// normalization happens here, once, so every later comparison sees the same
/// form.
pub fn extract_signature(headers: &HeaderMap) -> Option<String> {
    for name in SIGNATURE_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                let digest = value.strip_prefix("sha256=").unwrap_or(value);
                return Some(digest.to_string());
            }
        }
    }
    None
}

/// Constant-time check of a normalized hex signature against
/// HMAC-SHA256(body) keyed by the source secret.
pub fn signature_matches(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(claimed) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&claimed).is_ok()
}

/// Collect candidate repository URLs from the payload's `repository` object.
fn payload_repo_urls(payload: &Value) -> Vec<&str> {
    let Some(repo) = payload.get("repository") else {
        return Vec::new();
    };
    REPO_URL_KEYS
        .iter()
        .filter_map(|key| repo.get(key).and_then(Value::as_str))
        .filter(|url| !url.is_empty())
        .collect()
}

/// Strip a trailing `/` and a trailing `.git` so that clone URLs, web URLs
/// and registered URLs compare equal.
fn normalize_repo_url(url: &str) -> &str {
    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

/// Match a delivery against the registered sources.
///
/// A present signature is tried first against every source with a secret
/// (store order, newest registration first). Failing that, the payload's
/// repository URLs are compared against registered URLs after normalization,
/// accepting equality or containment either way. A URL-matched source that
/// has a secret, when the sender did supply a signature that does not
/// verify, is rejected as [`MatchOutcome::SignatureMismatch`]. A URL match
/// with no signature at all is accepted as-is: that trust-on-URL fallback
/// keeps secretless senders working, at the documented cost of allowing
/// spoofed deliveries for sources whose secret was never configured.
pub fn match_source(
    sources: &[RepositorySource],
    body: &[u8],
    signature: Option<&str>,
    payload: &Value,
) -> MatchOutcome {
    let mut matched: Option<&RepositorySource> = None;

    if let Some(sig) = signature {
        matched = sources
            .iter()
            .find(|s| !s.hook_secret.is_empty() && signature_matches(&s.hook_secret, body, sig));
    }

    if matched.is_none() {
        let candidates = payload_repo_urls(payload);
        'sources: for source in sources {
            let registered = normalize_repo_url(&source.repository_url);
            if registered.is_empty() {
                continue;
            }
            for candidate in &candidates {
                let candidate = normalize_repo_url(candidate);
                if candidate == registered
                    || candidate.contains(registered)
                    || registered.contains(candidate)
                {
                    matched = Some(source);
                    break 'sources;
                }
            }
        }
    }

    let Some(source) = matched else {
        return MatchOutcome::NoMatch;
    };

    if let Some(sig) = signature {
        if !source.hook_secret.is_empty() && !signature_matches(&source.hook_secret, body, sig) {
            return MatchOutcome::SignatureMismatch;
        }
    }

    MatchOutcome::Matched(source.clone())
}
