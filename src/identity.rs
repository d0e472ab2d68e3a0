//! Best-effort resolution of commit authors to tracker user ids.

use tracing::warn;

use crate::db::tracker::TrackerStore;
use crate::payload::{CommitFact, PusherIdentity};

/// Ledger sentinel for an unresolved actor.
pub const UNRESOLVED_USER: i64 = 0;

/// One candidate lookup in the resolution cascade.
enum Strategy<'a> {
    UsernameOrEmail(&'a str),
    FullName(&'a str),
    PartialName(&'a str),
}

impl Strategy<'_> {
    fn candidate(&self) -> &str {
        match self {
            Strategy::UsernameOrEmail(s) | Strategy::FullName(s) | Strategy::PartialName(s) => s,
        }
    }
}

/// Resolve the author of a commit to a user id, or [`UNRESOLVED_USER`].
///
/// Strategies run in a fixed order and the first hit wins: exact
/// username-column matches for the author email, pusher email and author
/// username; then exact full-name matches (both token orders) for the author
/// name, pusher name and pusher login; finally partial-name matches for the
/// author name, author username, pusher name and pusher login. A store error
/// aborts the cascade and leaves the author unresolved rather than failing
/// the delivery.
pub async fn resolve_user_id(
    tracker: &TrackerStore,
    commit: &CommitFact,
    pusher: &PusherIdentity,
) -> i64 {
    let strategies = [
        Strategy::UsernameOrEmail(&commit.author_email),
        Strategy::UsernameOrEmail(&pusher.email),
        Strategy::UsernameOrEmail(&commit.author_username),
        Strategy::FullName(&commit.author_name),
        Strategy::FullName(&pusher.name),
        Strategy::FullName(&pusher.login),
        Strategy::PartialName(&commit.author_name),
        Strategy::PartialName(&commit.author_username),
        Strategy::PartialName(&pusher.name),
        Strategy::PartialName(&pusher.login),
    ];

    for strategy in strategies {
        if strategy.candidate().trim().is_empty() {
            continue;
        }
        let result = match &strategy {
            Strategy::UsernameOrEmail(s) => tracker.find_by_username_or_email(s).await,
            Strategy::FullName(s) => tracker.find_by_full_name(s).await,
            Strategy::PartialName(s) => tracker.find_by_partial_name(s).await,
        };
        match result {
            Ok(Some(id)) => return id,
            Ok(None) => {}
            Err(e) => {
                warn!("User lookup failed, treating author as unresolved: {}", e);
                return UNRESOLVED_USER;
            }
        }
    }

    UNRESOLVED_USER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::tracker::seed_user;

    fn commit(name: &str, email: &str, username: &str) -> CommitFact {
        CommitFact {
            author_name: name.to_string(),
            author_email: email.to_string(),
            author_username: username.to_string(),
            ..Default::default()
        }
    }

    fn pusher(name: &str, login: &str, email: &str) -> PusherIdentity {
        PusherIdentity {
            name: name.to_string(),
            login: login.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn author_email_match_wins_over_names() {
        let pool = test_pool().await;
        seed_user(&pool, 9, "a@x.com", "Someone", "Else").await;
        seed_user(&pool, 10, "other", "Jane", "Doe").await;
        let tracker = TrackerStore::new(pool);

        let id = resolve_user_id(
            &tracker,
            &commit("Jane Doe", "a@x.com", ""),
            &PusherIdentity::default(),
        )
        .await;
        assert_eq!(id, 9);
    }

    #[tokio::test]
    async fn pusher_email_fallback() {
        let pool = test_pool().await;
        seed_user(&pool, 4, "pusher@x.com", "", "").await;
        let tracker = TrackerStore::new(pool);

        let id = resolve_user_id(
            &tracker,
            &commit("", "unknown@x.com", ""),
            &pusher("", "", "pusher@x.com"),
        )
        .await;
        assert_eq!(id, 4);
    }

    #[tokio::test]
    async fn full_name_matches_swapped_order_not_other_users() {
        let pool = test_pool().await;
        seed_user(&pool, 3, "jdoe", "Doe", "Jane").await;
        seed_user(&pool, 4, "jsmith", "Jane", "Smith").await;
        let tracker = TrackerStore::new(pool);

        let id = resolve_user_id(
            &tracker,
            &commit("Jane Doe", "", ""),
            &PusherIdentity::default(),
        )
        .await;
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn single_token_name_resolves_only_via_partial_match() {
        let pool = test_pool().await;
        seed_user(&pool, 6, "mb", "Maria", "Berg").await;
        let tracker = TrackerStore::new(pool);

        let id = resolve_user_id(&tracker, &commit("Berg", "", ""), &PusherIdentity::default())
            .await;
        assert_eq!(id, 6);
    }

    #[tokio::test]
    async fn unmatched_author_is_unresolved() {
        let tracker = TrackerStore::new(test_pool().await);

        let id = resolve_user_id(
            &tracker,
            &commit("Ghost Writer", "ghost@x.com", "ghost"),
            &pusher("Phantom Pusher", "phantom", "phantom@x.com"),
        )
        .await;
        assert_eq!(id, UNRESOLVED_USER);
    }
}
