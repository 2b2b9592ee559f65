//! Tournament manager: CRUD, status transitions and participant tokens.

use super::models::{
    CreateTournament, ParticipantToken, Tournament, TournamentId, TournamentStatus,
    UpdateTournament,
};
use crate::{
    db::{LIVE, Page, PageRequest, SoftDeletable, soft_delete},
    security::{
        InputError,
        sanitize::{MAX_NAME_LEN, sanitize_field},
        tokens::{generate_token, tokens_match},
    },
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use thiserror::Error;

/// Longest participant token lifetime
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 14;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    #[error("Tournament not found: {0}")]
    NotFound(TournamentId),

    #[error("Cannot move tournament from {from:?} to {to:?}")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },

    #[error("Tournament is {0:?} and does not accept this change")]
    WrongStatus(TournamentStatus),

    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error("Token lifetime must be between 1 and {max} hours", max = MAX_TOKEN_TTL_HOURS)]
    InvalidTokenTtl,

    #[error("Invalid tournament token")]
    TokenInvalid,

    #[error("Tournament token expired")]
    TokenExpired,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TournamentError {
    /// Client-safe message that hides database details
    pub fn client_message(&self) -> String {
        match self {
            TournamentError::Database(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type TournamentResult<T> = Result<T, TournamentError>;

/// Check a provided participant token against the stored one
pub fn check_token(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    provided: &str,
    now: DateTime<Utc>,
) -> TournamentResult<()> {
    let Some(stored) = stored else {
        return Err(TournamentError::TokenInvalid);
    };
    if !tokens_match(stored, provided) {
        return Err(TournamentError::TokenInvalid);
    }
    match expires_at {
        Some(expires_at) if expires_at > now => Ok(()),
        _ => Err(TournamentError::TokenExpired),
    }
}

const TOURNAMENT_COLUMNS: &str = "id, name, event_date, status, participant_token IS NOT NULL AS has_token, token_expires_at, created_at, updated_at";

fn tournament_from_row(row: &PgRow) -> Tournament {
    let status: String = row.get("status");
    Tournament {
        id: row.get("id"),
        name: row.get("name"),
        event_date: row.get("event_date"),
        status: TournamentStatus::parse(&status).unwrap_or(TournamentStatus::Draft),
        has_participant_token: row.get("has_token"),
        token_expires_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("token_expires_at")
            .map(|dt| dt.and_utc()),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    }
}

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    pool: Arc<PgPool>,
}

impl TournamentManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreateTournament) -> TournamentResult<Tournament> {
        let name = sanitize_field("name", &request.name, MAX_NAME_LEN)?;
        let sql = format!(
            "INSERT INTO tournaments (name, event_date) VALUES ($1, $2) RETURNING {TOURNAMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&name)
            .bind(request.event_date)
            .fetch_one(self.pool.as_ref())
            .await?;
        let tournament = tournament_from_row(&row);
        log::info!("Created tournament {} ({})", tournament.id, tournament.name);
        Ok(tournament)
    }

    /// Get a live tournament
    pub async fn get(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let sql = format!("SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 AND {LIVE}");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(TournamentError::NotFound(id))?;
        Ok(tournament_from_row(&row))
    }

    /// List live tournaments, newest first
    pub async fn list(
        &self,
        status: Option<TournamentStatus>,
        page: PageRequest,
    ) -> TournamentResult<Page<Tournament>> {
        let status = status.map(TournamentStatus::as_str);
        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM tournaments WHERE {LIVE} AND ($1::TEXT IS NULL OR status = $1)"
        ))
        .bind(status)
        .fetch_one(self.pool.as_ref())
        .await?
        .get("total");

        let sql = format!(
            r#"
            SELECT {TOURNAMENT_COLUMNS} FROM tournaments
            WHERE {LIVE} AND ($1::TEXT IS NULL OR status = $1)
            ORDER BY event_date DESC NULLS LAST, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool.as_ref())
            .await?;

        let items = rows.iter().map(tournament_from_row).collect();
        Ok(Page::new(items, page, total.max(0) as u64))
    }

    pub async fn update(
        &self,
        id: TournamentId,
        request: UpdateTournament,
    ) -> TournamentResult<Tournament> {
        let name = request
            .name
            .as_deref()
            .map(|name| sanitize_field("name", name, MAX_NAME_LEN))
            .transpose()?;
        let sql = format!(
            r#"
            UPDATE tournaments
            SET name = COALESCE($2, name), event_date = COALESCE($3, event_date), updated_at = NOW()
            WHERE id = $1 AND {LIVE}
            RETURNING {TOURNAMENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(name)
            .bind(request.event_date)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(TournamentError::NotFound(id))?;
        Ok(tournament_from_row(&row))
    }

    /// Move a tournament one step forward
    pub async fn transition(
        &self,
        id: TournamentId,
        to: TournamentStatus,
    ) -> TournamentResult<Tournament> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(TournamentError::InvalidTransition {
                from: current.status,
                to,
            });
        }
        self.write_status(id, current.status, to).await
    }

    /// Reopen a completed tournament for finals corrections
    pub async fn reopen(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let current = self.get(id).await?;
        if current.status != TournamentStatus::Completed {
            return Err(TournamentError::InvalidTransition {
                from: current.status,
                to: TournamentStatus::Finals,
            });
        }
        self.write_status(id, current.status, TournamentStatus::Finals)
            .await
    }

    async fn write_status(
        &self,
        id: TournamentId,
        from: TournamentStatus,
        to: TournamentStatus,
    ) -> TournamentResult<Tournament> {
        // Guard on the old status so concurrent transitions cannot both win
        let sql = format!(
            r#"
            UPDATE tournaments SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND {LIVE}
            RETURNING {TOURNAMENT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(TournamentError::InvalidTransition { from, to })?;
        log::info!("Tournament {} moved from {:?} to {:?}", id, from, to);
        Ok(tournament_from_row(&row))
    }

    /// Fail unless the tournament currently accepts score writes
    pub async fn ensure_accepts_scores(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let tournament = self.get(id).await?;
        if !tournament.status.accepts_scores() {
            return Err(TournamentError::WrongStatus(tournament.status));
        }
        Ok(tournament)
    }

    pub async fn delete(&self, id: TournamentId) -> TournamentResult<()> {
        if !soft_delete::soft_delete(self.pool.as_ref(), SoftDeletable::Tournament, id).await? {
            return Err(TournamentError::NotFound(id));
        }
        Ok(())
    }

    pub async fn restore(&self, id: TournamentId) -> TournamentResult<Tournament> {
        if !soft_delete::restore(self.pool.as_ref(), SoftDeletable::Tournament, id).await? {
            return Err(TournamentError::NotFound(id));
        }
        self.get(id).await
    }

    /// Generate a new participant token, replacing any previous one
    pub async fn issue_token(
        &self,
        id: TournamentId,
        ttl_hours: i64,
    ) -> TournamentResult<ParticipantToken> {
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&ttl_hours) {
            return Err(TournamentError::InvalidTokenTtl);
        }
        let token = generate_token();
        let expires_at = Utc::now() + Duration::hours(ttl_hours);

        let result = sqlx::query(&format!(
            "UPDATE tournaments SET participant_token = $2, token_expires_at = $3, updated_at = NOW() WHERE id = $1 AND {LIVE}"
        ))
        .bind(id)
        .bind(&token)
        .bind(expires_at.naive_utc())
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::NotFound(id));
        }
        log::info!("Issued participant token for tournament {} ({}h)", id, ttl_hours);
        Ok(ParticipantToken { token, expires_at })
    }

    pub async fn revoke_token(&self, id: TournamentId) -> TournamentResult<()> {
        let result = sqlx::query(&format!(
            "UPDATE tournaments SET participant_token = NULL, token_expires_at = NULL, updated_at = NOW() WHERE id = $1 AND {LIVE}"
        ))
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::NotFound(id));
        }
        Ok(())
    }

    /// Validate a participant token for a tournament
    pub async fn validate_token(&self, id: TournamentId, provided: &str) -> TournamentResult<()> {
        let row = sqlx::query(&format!(
            "SELECT participant_token, token_expires_at FROM tournaments WHERE id = $1 AND {LIVE}"
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(TournamentError::NotFound(id))?;

        let stored: Option<String> = row.get("participant_token");
        let expires_at = row
            .get::<Option<chrono::NaiveDateTime>, _>("token_expires_at")
            .map(|dt| dt.and_utc());
        check_token(stored.as_deref(), expires_at, provided, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_token() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        let token = generate_token();

        assert!(check_token(Some(&token), Some(later), &token, now).is_ok());
        assert!(matches!(
            check_token(Some(&token), Some(later), "wrong", now),
            Err(TournamentError::TokenInvalid)
        ));
        assert!(matches!(
            check_token(None, None, &token, now),
            Err(TournamentError::TokenInvalid)
        ));
        assert!(matches!(
            check_token(Some(&token), Some(now - Duration::seconds(1)), &token, now),
            Err(TournamentError::TokenExpired)
        ));
    }

    #[test]
    fn test_client_message_hides_database_errors() {
        let err = TournamentError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(
            TournamentError::NotFound(4).client_message(),
            "Tournament not found: 4"
        );
    }
}
