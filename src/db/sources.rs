use rand::RngCore;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::ListenerError;

/// One registered webhook target.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RepositorySource {
    pub id: i64,
    pub repository_url: String,
    pub repository_access_token: String,
    pub hook_id: i64,
    pub hook_secret: String,
    pub branch_filter: String,
}

/// Fields for registering (or re-registering) a source.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub repository_url: String,
    pub repository_access_token: String,
    pub hook_id: i64,
    pub hook_secret: String,
    pub branch_filter: String,
}

/// Generate a fresh per-source hook secret: 16 random bytes, hex-encoded.
pub fn generate_hook_secret() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Persistent storage for registered repository sources
#[derive(Clone)]
pub struct SourceStore {
    pool: SqlitePool,
}

impl SourceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All registered sources, newest registration first.
    /// Matching iterates in this order.
    pub async fn list_all(&self) -> Result<Vec<RepositorySource>, ListenerError> {
        sqlx::query_as::<_, RepositorySource>(
            r#"
            SELECT id, repository_url, repository_access_token, hook_id, hook_secret, branch_filter
            FROM repo_sources
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ListenerError::DatabaseError(format!("Failed to list sources: {}", e)))
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<RepositorySource>, ListenerError> {
        sqlx::query_as::<_, RepositorySource>(
            r#"
            SELECT id, repository_url, repository_access_token, hook_id, hook_secret, branch_filter
            FROM repo_sources
            WHERE repository_url = ?
            LIMIT 1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ListenerError::DatabaseError(format!("Failed to fetch source: {}", e)))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<RepositorySource>, ListenerError> {
        sqlx::query_as::<_, RepositorySource>(
            r#"
            SELECT id, repository_url, repository_access_token, hook_id, hook_secret, branch_filter
            FROM repo_sources
            WHERE id = ?
            LIMIT 1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ListenerError::DatabaseError(format!("Failed to fetch source: {}", e)))
    }

    /// Insert or replace a source configuration.
    /// Re-registering the same repository_url removes the existing row and
    /// inserts a fresh one inside a single transaction, so a failure leaves
    /// the prior registration intact. Returns the inserted id.
    pub async fn save(&self, source: &NewSource) -> Result<i64, ListenerError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            ListenerError::DatabaseError(format!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM repo_sources WHERE repository_url = ?")
            .bind(&source.repository_url)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                ListenerError::DatabaseError(format!("Failed to replace source: {}", e))
            })?;

        let result = sqlx::query(
            r#"
            INSERT INTO repo_sources (
                repository_url, repository_access_token, hook_id, hook_secret, branch_filter
            )
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source.repository_url)
        .bind(&source.repository_access_token)
        .bind(source.hook_id)
        .bind(&source.hook_secret)
        .bind(&source.branch_filter)
        .execute(&mut *tx)
        .await
        .map_err(|e| ListenerError::DatabaseError(format!("Failed to insert source: {}", e)))?;

        tx.commit().await.map_err(|e| {
            ListenerError::DatabaseError(format!("Failed to commit source save: {}", e))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Update the branch filter for a source. Returns false when no row matched.
    pub async fn update_branch_filter(
        &self,
        id: i64,
        branch_filter: &str,
    ) -> Result<bool, ListenerError> {
        let result = sqlx::query("UPDATE repo_sources SET branch_filter = ? WHERE id = ?")
            .bind(branch_filter)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                ListenerError::DatabaseError(format!("Failed to update branch filter: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    /// Update the remote hook id for a source. Returns false when no row matched.
    pub async fn update_hook_id(&self, id: i64, hook_id: i64) -> Result<bool, ListenerError> {
        let result = sqlx::query("UPDATE repo_sources SET hook_id = ? WHERE id = ?")
            .bind(hook_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ListenerError::DatabaseError(format!("Failed to update hook id: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a source. Returns false when no row matched.
    pub async fn delete_by_id(&self, id: i64) -> Result<bool, ListenerError> {
        let result = sqlx::query("DELETE FROM repo_sources WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ListenerError::DatabaseError(format!("Failed to delete source: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn new_source(url: &str) -> NewSource {
        NewSource {
            repository_url: url.to_string(),
            repository_access_token: "token".to_string(),
            hook_id: 0,
            hook_secret: generate_hook_secret(),
            branch_filter: "*".to_string(),
        }
    }

    #[test]
    fn hook_secret_is_32_hex_chars() {
        let secret = generate_hook_secret();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_hook_secret());
    }

    #[tokio::test]
    async fn save_then_list_returns_newest_first() {
        let store = SourceStore::new(test_pool().await);
        store.save(&new_source("https://git.example.com/a/a")).await.unwrap();
        store.save(&new_source("https://git.example.com/b/b")).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].repository_url, "https://git.example.com/b/b");
        assert_eq!(all[1].repository_url, "https://git.example.com/a/a");
    }

    #[tokio::test]
    async fn save_replaces_existing_url_with_fresh_row() {
        let store = SourceStore::new(test_pool().await);
        let url = "https://git.example.com/owner/repo";
        let first_id = store.save(&new_source(url)).await.unwrap();

        let mut replacement = new_source(url);
        replacement.repository_access_token = "rotated".to_string();
        let second_id = store.save(&replacement).await.unwrap();

        assert_ne!(first_id, second_id);
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].repository_access_token, "rotated");
    }

    #[tokio::test]
    async fn update_branch_filter_and_delete() {
        let store = SourceStore::new(test_pool().await);
        let id = store.save(&new_source("https://git.example.com/o/r")).await.unwrap();

        assert!(store.update_branch_filter(id, "release/*").await.unwrap());
        let source = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(source.branch_filter, "release/*");

        assert!(!store.update_branch_filter(id + 99, "x").await.unwrap());
        assert!(store.delete_by_id(id).await.unwrap());
        assert!(!store.delete_by_id(id).await.unwrap());
    }

    #[tokio::test]
    async fn get_by_url_finds_exact_match_only() {
        let store = SourceStore::new(test_pool().await);
        store.save(&new_source("https://git.example.com/o/r")).await.unwrap();

        assert!(store.get_by_url("https://git.example.com/o/r").await.unwrap().is_some());
        assert!(store.get_by_url("https://git.example.com/o/r.git").await.unwrap().is_none());
    }
}
