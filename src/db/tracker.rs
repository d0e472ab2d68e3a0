use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::ListenerError;

/// Tracker-side store: ticket existence checks, user directory lookups and
/// the append-only ticket history ledger.
#[derive(Clone)]
pub struct TrackerStore {
    pool: SqlitePool,
}

impl TrackerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn ticket_exists(&self, ticket_id: i64) -> Result<bool, ListenerError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM tickets WHERE id = ? LIMIT 1")
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ListenerError::DatabaseError(format!("Failed to check ticket: {}", e)))?;

        Ok(row.is_some())
    }

    /// Append one ticket history entry. Returns false when nothing was written.
    pub async fn add_history(
        &self,
        ticket_id: i64,
        user_id: i64,
        change_type: &str,
        change_value: &str,
    ) -> Result<bool, ListenerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO ticket_history (ticket_id, user_id, change_type, change_value, date_modified)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .bind(change_type)
        .bind(change_value)
        .bind(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| ListenerError::DatabaseError(format!("Failed to add history: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Exact match of a candidate string against the username column.
    /// Tracker usernames are email addresses, so this serves email lookups too.
    pub async fn find_by_username_or_email(
        &self,
        candidate: &str,
    ) -> Result<Option<i64>, ListenerError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(None);
        }

        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ? LIMIT 1")
            .bind(candidate)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ListenerError::DatabaseError(format!("Failed to look up user: {}", e)))?;

        Ok(row.map(|(id,)| id))
    }

    /// Case-insensitive first/last name match, trying both token orders
    /// ("First Last" and "Last First"). Names with fewer than two tokens
    /// never match here.
    pub async fn find_by_full_name(&self, full_name: &str) -> Result<Option<i64>, ListenerError> {
        let tokens: Vec<&str> = full_name.split_whitespace().collect();
        if tokens.len() < 2 {
            return Ok(None);
        }
        let first = tokens[0];
        let last = tokens[tokens.len() - 1];

        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM users
            WHERE (LOWER(firstname) = LOWER(?1) AND LOWER(lastname) = LOWER(?2))
               OR (LOWER(firstname) = LOWER(?2) AND LOWER(lastname) = LOWER(?1))
            LIMIT 1
            "#,
        )
        .bind(first)
        .bind(last)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ListenerError::DatabaseError(format!("Failed to look up user: {}", e)))?;

        Ok(row.map(|(id,)| id))
    }

    /// Best-effort partial name match, prioritizing the last-name token, then
    /// falling back to the first-name token against either name column.
    pub async fn find_by_partial_name(
        &self,
        full_name: &str,
    ) -> Result<Option<i64>, ListenerError> {
        let tokens: Vec<&str> = full_name.split_whitespace().collect();
        let first = tokens.first().copied().unwrap_or("");
        let last = tokens.last().copied().unwrap_or("");

        if !last.is_empty() && last != first {
            let row: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM users WHERE lastname = ? OR lastname LIKE ? LIMIT 1",
            )
            .bind(last)
            .bind(format!("%{}%", last))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ListenerError::DatabaseError(format!("Failed to look up user: {}", e)))?;

            if let Some((id,)) = row {
                return Ok(Some(id));
            }
        }

        if !first.is_empty() {
            let row: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM users WHERE firstname = ? OR firstname LIKE ? OR lastname LIKE ? LIMIT 1",
            )
            .bind(first)
            .bind(format!("%{}%", first))
            .bind(format!("%{}%", first))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ListenerError::DatabaseError(format!("Failed to look up user: {}", e)))?;

            if let Some((id,)) = row {
                return Ok(Some(id));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
pub(crate) async fn seed_user(
    pool: &SqlitePool,
    id: i64,
    username: &str,
    firstname: &str,
    lastname: &str,
) {
    sqlx::query("INSERT INTO users (id, username, firstname, lastname) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(username)
        .bind(firstname)
        .bind(lastname)
        .execute(pool)
        .await
        .expect("seed user");
}

#[cfg(test)]
pub(crate) async fn seed_ticket(pool: &SqlitePool, id: i64) {
    sqlx::query("INSERT INTO tickets (id, headline) VALUES (?, 'test ticket')")
        .bind(id)
        .execute(pool)
        .await
        .expect("seed ticket");
}
