//! Ticket reference extraction and history writing.

use regex::Regex;
use std::sync::OnceLock;
use tracing::{error, info};

use crate::db::tracker::TrackerStore;

fn ticket_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\d+)").expect("ticket reference pattern"))
}

/// All `#<digits>` references in the commit message and branch name,
/// deduplicated in first-seen order. Zero and unparsable numbers are dropped.
pub fn extract_ticket_refs(commit_message: &str, branch: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for text in [commit_message, branch] {
        for cap in ticket_ref_regex().captures_iter(text) {
            if let Ok(id) = cap[1].parse::<i64>() {
                if id > 0 && !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

/// History entry text: commit link and message joined with `||` when both
/// are present, otherwise whichever exists.
pub fn change_value(commit_url: &str, commit_message: &str) -> String {
    if !commit_url.is_empty() && !commit_message.is_empty() {
        format!("{}||{}", commit_url, commit_message)
    } else if !commit_url.is_empty() {
        commit_url.to_string()
    } else {
        commit_message.to_string()
    }
}

/// Per-commit linking outcome.
#[derive(Debug, Default)]
pub struct LinkSummary {
    pub linked: usize,
    pub errors: usize,
}

/// Link one commit to every ticket it references.
///
/// Each reference is processed independently: tickets missing from the store
/// are skipped silently, and a failed existence check or write is logged and
/// counted without aborting the remaining references.
pub async fn link_commit(
    tracker: &TrackerStore,
    commit_message: &str,
    branch: &str,
    commit_url: &str,
    commit_sha: &str,
    user_id: i64,
) -> LinkSummary {
    let mut summary = LinkSummary::default();
    let value = change_value(commit_url, commit_message);

    for ticket_id in extract_ticket_refs(commit_message, branch) {
        match tracker.ticket_exists(ticket_id).await {
            Ok(false) => continue,
            Ok(true) => match tracker.add_history(ticket_id, user_id, "commit", &value).await {
                Ok(true) => {
                    info!(
                        "Recorded commit {} for ticket #{}",
                        commit_sha, ticket_id
                    );
                    summary.linked += 1;
                }
                Ok(false) => {
                    error!("Failed to record history for ticket #{}", ticket_id);
                    summary.errors += 1;
                }
                Err(e) => {
                    error!("Error writing history for ticket #{}: {}", ticket_id, e);
                    summary.errors += 1;
                }
            },
            Err(e) => {
                error!("Error checking ticket #{}: {}", ticket_id, e);
                summary.errors += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::tracker::seed_ticket;

    #[test]
    fn extracts_and_dedupes_references() {
        assert_eq!(extract_ticket_refs("fix #42 and #42 again", ""), vec![42]);
        assert_eq!(
            extract_ticket_refs("closes #7, relates to #12", "feature/#99-cleanup"),
            vec![7, 12, 99]
        );
        assert_eq!(extract_ticket_refs("", ""), Vec::<i64>::new());
    }

    #[test]
    fn drops_zero_and_unparsable_references() {
        assert_eq!(extract_ticket_refs("#0 is not a ticket", ""), Vec::<i64>::new());
        assert_eq!(
            extract_ticket_refs("#99999999999999999999 overflows, #3 does not", ""),
            vec![3]
        );
        assert_eq!(extract_ticket_refs("no refs here", "plain-branch"), Vec::<i64>::new());
    }

    #[test]
    fn change_value_joins_url_and_message() {
        assert_eq!(change_value("https://x/commit/a", "fix #1"), "https://x/commit/a||fix #1");
        assert_eq!(change_value("https://x/commit/a", ""), "https://x/commit/a");
        assert_eq!(change_value("", "fix #1"), "fix #1");
        assert_eq!(change_value("", ""), "");
    }

    #[tokio::test]
    async fn links_existing_tickets_and_skips_missing_ones() {
        let pool = test_pool().await;
        seed_ticket(&pool, 7).await;
        let tracker = TrackerStore::new(pool.clone());

        let summary = link_commit(
            &tracker,
            "fix #7, also mentions #404",
            "main",
            "https://x/commit/abc",
            "abc",
            9,
        )
        .await;

        assert_eq!(summary.linked, 1);
        assert_eq!(summary.errors, 0);

        let rows: Vec<(i64, i64, String)> =
            sqlx::query_as("SELECT ticket_id, user_id, change_value FROM ticket_history")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 7);
        assert_eq!(rows[0].1, 9);
        assert_eq!(rows[0].2, "https://x/commit/abc||fix #7, also mentions #404");
    }

    #[tokio::test]
    async fn duplicate_references_write_once() {
        let pool = test_pool().await;
        seed_ticket(&pool, 42).await;
        let tracker = TrackerStore::new(pool.clone());

        let summary = link_commit(&tracker, "fix #42 #42", "hotfix/#42", "", "abc", 0).await;
        assert_eq!(summary.linked, 1);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ticket_history")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
