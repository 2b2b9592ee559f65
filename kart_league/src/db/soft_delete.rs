//! Soft delete.
//!
//! Rows are hidden by stamping `deleted_at` and come back by clearing it.
//! Only the tables listed in [`SoftDeletable`] take part; the table name is
//! never taken from user input.

use super::timeouts::{LONG_OPERATION_TIMEOUT, TimeoutResult, with_timeout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

/// Filter for live rows
pub const LIVE: &str = "deleted_at IS NULL";

/// Tables that support soft delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftDeletable {
    Tournament,
    Player,
    Qualification,
    Match,
}

impl SoftDeletable {
    pub const ALL: [SoftDeletable; 4] = [
        SoftDeletable::Tournament,
        SoftDeletable::Player,
        SoftDeletable::Qualification,
        SoftDeletable::Match,
    ];

    pub fn table(self) -> &'static str {
        match self {
            SoftDeletable::Tournament => "tournaments",
            SoftDeletable::Player => "players",
            SoftDeletable::Qualification => "qualifications",
            SoftDeletable::Match => "matches",
        }
    }

    /// Entity name used in audit logs and URLs
    pub fn entity(self) -> &'static str {
        match self {
            SoftDeletable::Tournament => "tournament",
            SoftDeletable::Player => "player",
            SoftDeletable::Qualification => "qualification",
            SoftDeletable::Match => "match",
        }
    }

    pub fn parse(entity: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.entity() == entity)
    }
}

/// Mark a live row deleted. Returns false when no live row matched.
pub async fn soft_delete<'e, E>(executor: E, entity: SoftDeletable, id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE {} SET deleted_at = NOW() WHERE id = $1 AND {LIVE}",
        entity.table()
    );
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// Bring a deleted row back. Returns false when no deleted row matched.
pub async fn restore<'e, E>(executor: E, entity: SoftDeletable, id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE {} SET deleted_at = NULL WHERE id = $1 AND deleted_at IS NOT NULL",
        entity.table()
    );
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// Permanently remove rows deleted before `cutoff`
pub async fn purge_before<'e, E>(
    executor: E,
    entity: SoftDeletable,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "DELETE FROM {} WHERE deleted_at IS NOT NULL AND deleted_at < $1",
        entity.table()
    );
    let result = sqlx::query(&sql)
        .bind(cutoff.naive_utc())
        .execute(executor)
        .await?;
    if result.rows_affected() > 0 {
        log::info!(
            "Purged {} soft-deleted rows from {}",
            result.rows_affected(),
            entity.table()
        );
    }
    Ok(result.rows_affected())
}

/// Tables in purge order, rows that reference others first
pub const PURGE_ORDER: [SoftDeletable; 4] = [
    SoftDeletable::Match,
    SoftDeletable::Qualification,
    SoftDeletable::Player,
    SoftDeletable::Tournament,
];

/// Purge every soft-deletable table, each delete bounded by
/// [`LONG_OPERATION_TIMEOUT`]. Returns the number of rows removed.
pub async fn purge_all_before(pool: &PgPool, cutoff: DateTime<Utc>) -> TimeoutResult<u64> {
    let mut purged = 0;
    for entity in PURGE_ORDER {
        purged += with_timeout(LONG_OPERATION_TIMEOUT, purge_before(pool, entity, cutoff)).await?;
    }
    Ok(purged)
}
