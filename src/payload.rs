//! Payload normalization: turns a loosely-shaped push payload into commit
//! facts and fallback identity fields.
//!
//! Providers disagree on field names and nesting, so everything here is
//! best-effort over a `serde_json::Value` tree. Missing or oddly-typed
//! fields degrade to empty strings, never to an error.

use serde_json::Value;
use url::Url;

/// Event-level fallback identity, merged from `pusher` then `sender`.
#[derive(Debug, Clone, Default)]
pub struct PusherIdentity {
    pub name: String,
    pub login: String,
    pub email: String,
}

/// One commit extracted from a push event.
#[derive(Debug, Clone, Default)]
pub struct CommitFact {
    pub sha: String,
    pub message: String,
    pub commit_url: String,
    pub author_name: String,
    pub author_email: String,
    pub author_username: String,
}

/// Everything the linking pipeline needs from one delivery.
#[derive(Debug, Clone, Default)]
pub struct PushFacts {
    pub branch: String,
    pub pusher: PusherIdentity,
    pub commits: Vec<CommitFact>,
}

/// First non-empty string among `keys` on `value`.
fn str_field(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}

/// Branch name from `ref` (leading `refs/heads/` stripped), falling back to
/// the Bitbucket-style `push.changes[0].new.name` nesting.
fn extract_branch(payload: &Value) -> String {
    if let Some(git_ref) = payload.get("ref").and_then(Value::as_str) {
        if !git_ref.is_empty() {
            return git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref).to_string();
        }
    }

    payload
        .get("push")
        .and_then(|p| p.get("changes"))
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("new"))
        .and_then(|n| n.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn extract_pusher(payload: &Value) -> PusherIdentity {
    let mut identity = PusherIdentity::default();

    if let Some(pusher) = payload.get("pusher") {
        identity.login = str_field(pusher, &["username", "login", "name"]);
        identity.name = str_field(pusher, &["full_name", "fullname", "name"]);
        identity.email = str_field(pusher, &["email"]);
    }

    if let Some(sender) = payload.get("sender") {
        if identity.login.is_empty() {
            identity.login = str_field(sender, &["login", "username"]);
        }
        if identity.name.is_empty() {
            identity.name = str_field(sender, &["full_name", "fullname", "name"]);
        }
        if identity.email.is_empty() {
            identity.email = str_field(sender, &["email"]);
        }
    }

    identity
}

fn commit_author(commit: &Value) -> (String, String, String) {
    match commit.get("author") {
        Some(author) => (
            str_field(author, &["name"]),
            str_field(author, &["email"]),
            str_field(author, &["username"]),
        ),
        None => Default::default(),
    }
}

/// Build `{scheme}://{host}[:{port}][/{prefix}]/{owner}/{repo}/commit/{sha}`
/// from the registered repository URL. The last two path segments are taken
/// as owner and repo; anything before them is preserved as a subpath-install
/// prefix. Returns an empty string when the URL cannot be parsed down to
/// owner/repo.
pub fn synthesize_commit_url(repository_url: &str, sha: &str) -> String {
    if repository_url.is_empty() || sha.is_empty() {
        return String::new();
    }
    let Ok(parsed) = Url::parse(repository_url.trim_end_matches('/')) else {
        return String::new();
    };
    let segments: Vec<String> = match parsed.path_segments() {
        Some(segments) => segments
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => return String::new(),
    };
    if segments.len() < 2 {
        return String::new();
    }

    let mut link = parsed.clone();
    link.set_query(None);
    link.set_fragment(None);
    if let Ok(mut path) = link.path_segments_mut() {
        path.clear();
        for prefix in &segments[..segments.len() - 2] {
            path.push(prefix);
        }
        path.push(&segments[segments.len() - 2]);
        path.push(&segments[segments.len() - 1]);
        path.push("commit");
        path.push(sha);
    } else {
        return String::new();
    }

    link.to_string()
}

/// Extract branch, commits and pusher identity from a push payload.
///
/// When the payload carries a `commits` array, every entry becomes a
/// [`CommitFact`] with its own `url` (synthesized from the registered
/// repository URL when the commit carries none). Without a commit list the
/// extraction falls back to `head_commit`, then to `after` (sha only), with
/// the commit URL always synthesized.
pub fn extract_push_facts(payload: &Value, repository_url: &str) -> PushFacts {
    let branch = extract_branch(payload);
    let pusher = extract_pusher(payload);

    let mut commits = Vec::new();
    if let Some(list) = payload.get("commits").and_then(Value::as_array) {
        for commit in list {
            let sha = str_field(commit, &["id", "sha"]);
            let message = str_field(commit, &["message"]);
            if sha.is_empty() && message.is_empty() {
                continue;
            }
            let commit_url = match str_field(commit, &["url"]) {
                url if !url.is_empty() => url,
                _ => synthesize_commit_url(repository_url, &sha),
            };
            let (author_name, author_email, author_username) = commit_author(commit);
            commits.push(CommitFact {
                sha,
                message,
                commit_url,
                author_name,
                author_email,
                author_username,
            });
        }
    }

    if commits.is_empty() {
        let mut sha = String::new();
        let mut message = String::new();
        let mut author = <(String, String, String)>::default();
        if let Some(head) = payload.get("head_commit") {
            sha = str_field(head, &["id", "sha"]);
            message = str_field(head, &["message"]);
            author = commit_author(head);
        }
        if sha.is_empty() {
            sha = str_field(payload, &["after"]);
        }
        if !sha.is_empty() || !message.is_empty() {
            let (author_name, author_email, author_username) = author;
            commits.push(CommitFact {
                commit_url: synthesize_commit_url(repository_url, &sha),
                sha,
                message,
                author_name,
                author_email,
                author_username,
            });
        }
    }

    PushFacts {
        branch,
        pusher,
        commits,
    }
}
