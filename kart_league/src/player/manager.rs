//! Player manager.

use super::models::{CreatePlayer, Player, PlayerId, UpdatePlayer};
use crate::{
    db::{LIVE, Page, PageRequest, SoftDeletable, soft_delete},
    security::{
        InputError,
        sanitize::{MAX_NAME_LEN, MAX_NICKNAME_LEN, sanitize_field},
    },
};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use thiserror::Error;

/// Player errors
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player not found: {0}")]
    NotFound(PlayerId),

    #[error("Nickname already taken: {0}")]
    NicknameTaken(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PlayerError {
    pub fn client_message(&self) -> String {
        match self {
            PlayerError::Database(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type PlayerResult<T> = Result<T, PlayerError>;

const PLAYER_COLUMNS: &str = "id, name, nickname, user_id, created_at, updated_at";

fn player_from_row(row: &PgRow) -> Player {
    Player {
        id: row.get("id"),
        name: row.get("name"),
        nickname: row.get("nickname"),
        user_id: row.get("user_id"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

/// Map unique and foreign key violations to domain errors
fn map_write_error(e: sqlx::Error, nickname: &str, user_id: Option<i64>) -> PlayerError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return PlayerError::NicknameTaken(nickname.to_string());
        }
        if db.is_foreign_key_violation()
            && let Some(user_id) = user_id
        {
            return PlayerError::UserNotFound(user_id);
        }
    }
    PlayerError::Database(e)
}

/// Player manager
#[derive(Clone)]
pub struct PlayerManager {
    pool: Arc<PgPool>,
}

impl PlayerManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreatePlayer) -> PlayerResult<Player> {
        let name = sanitize_field("name", &request.name, MAX_NAME_LEN)?;
        let nickname = sanitize_field("nickname", &request.nickname, MAX_NICKNAME_LEN)?;

        let sql = format!(
            "INSERT INTO players (name, nickname, user_id) VALUES ($1, $2, $3) RETURNING {PLAYER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&name)
            .bind(&nickname)
            .bind(request.user_id)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(|e| map_write_error(e, &nickname, request.user_id))?;
        Ok(player_from_row(&row))
    }

    pub async fn get(&self, id: PlayerId) -> PlayerResult<Player> {
        let sql = format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = $1 AND {LIVE}");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(PlayerError::NotFound(id))?;
        Ok(player_from_row(&row))
    }

    /// Live players by id; unknown or deleted ids are skipped
    pub async fn get_many(&self, ids: &[PlayerId]) -> PlayerResult<Vec<Player>> {
        let sql = format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE id = ANY($1) AND {LIVE} ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows.iter().map(player_from_row).collect())
    }

    /// List live players by nickname, optionally filtered by a search term
    pub async fn list(&self, search: Option<&str>, page: PageRequest) -> PlayerResult<Page<Player>> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM players WHERE {LIVE} AND ($1::TEXT IS NULL OR nickname ILIKE $1 OR name ILIKE $1)"
        ))
        .bind(&pattern)
        .fetch_one(self.pool.as_ref())
        .await?
        .get("total");

        let sql = format!(
            r#"
            SELECT {PLAYER_COLUMNS} FROM players
            WHERE {LIVE} AND ($1::TEXT IS NULL OR nickname ILIKE $1 OR name ILIKE $1)
            ORDER BY LOWER(nickname)
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool.as_ref())
            .await?;

        let items = rows.iter().map(player_from_row).collect();
        Ok(Page::new(items, page, total.max(0) as u64))
    }

    pub async fn update(&self, id: PlayerId, request: UpdatePlayer) -> PlayerResult<Player> {
        let name = request
            .name
            .as_deref()
            .map(|n| sanitize_field("name", n, MAX_NAME_LEN))
            .transpose()?;
        let nickname = request
            .nickname
            .as_deref()
            .map(|n| sanitize_field("nickname", n, MAX_NICKNAME_LEN))
            .transpose()?;

        let sql = format!(
            r#"
            UPDATE players
            SET name = COALESCE($2, name), nickname = COALESCE($3, nickname), updated_at = NOW()
            WHERE id = $1 AND {LIVE}
            RETURNING {PLAYER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&name)
            .bind(&nickname)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| map_write_error(e, nickname.as_deref().unwrap_or_default(), None))?
            .ok_or(PlayerError::NotFound(id))?;
        Ok(player_from_row(&row))
    }

    /// Link or unlink an admin account
    pub async fn link_user(&self, id: PlayerId, user_id: Option<i64>) -> PlayerResult<Player> {
        let sql = format!(
            "UPDATE players SET user_id = $2, updated_at = NOW() WHERE id = $1 AND {LIVE} RETURNING {PLAYER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| map_write_error(e, "", user_id))?
            .ok_or(PlayerError::NotFound(id))?;
        Ok(player_from_row(&row))
    }

    pub async fn delete(&self, id: PlayerId) -> PlayerResult<()> {
        if !soft_delete::soft_delete(self.pool.as_ref(), SoftDeletable::Player, id).await? {
            return Err(PlayerError::NotFound(id));
        }
        Ok(())
    }

    /// Restore a deleted player; fails if a live player took the nickname meanwhile
    pub async fn restore(&self, id: PlayerId) -> PlayerResult<Player> {
        let restored = soft_delete::restore(self.pool.as_ref(), SoftDeletable::Player, id)
            .await
            .map_err(|e| map_write_error(e, &format!("player {id}"), None))?;
        if !restored {
            return Err(PlayerError::NotFound(id));
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message() {
        assert_eq!(
            PlayerError::Database(sqlx::Error::RowNotFound).client_message(),
            "Internal server error"
        );
        assert_eq!(
            PlayerError::NicknameTaken("Yoshi".to_string()).client_message(),
            "Nickname already taken: Yoshi"
        );
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = map_write_error(sqlx::Error::RowNotFound, "Yoshi", None);
        assert!(matches!(err, PlayerError::Database(_)));
    }
}
