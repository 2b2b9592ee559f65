//! Optimistic locking.
//!
//! Versioned rows are updated with `WHERE id = $1 AND version = $2` and bump
//! the version on success. When the update touches nothing the caller reads
//! the current version to tell a conflict from a missing row.

use super::soft_delete::{LIVE, SoftDeletable};
use sqlx::{PgExecutor, Row};

/// Result of a versioned update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOutcome {
    Updated { version: i32 },
    Conflict { expected: i32, current: i32 },
    NotFound,
}

/// Classify a versioned update from the version it returned (if any) and
/// the version currently stored (if the row is live)
pub fn classify_update(returned: Option<i32>, current: Option<i32>, expected: i32) -> VersionOutcome {
    match (returned, current) {
        (Some(version), _) => VersionOutcome::Updated { version },
        (None, Some(current)) => VersionOutcome::Conflict { expected, current },
        (None, None) => VersionOutcome::NotFound,
    }
}

/// Current version of a live row
pub async fn current_version<'e, E>(
    executor: E,
    entity: SoftDeletable,
    id: i64,
) -> Result<Option<i32>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!("SELECT version FROM {} WHERE id = $1 AND {LIVE}", entity.table());
    let row = sqlx::query(&sql).bind(id).fetch_optional(executor).await?;
    Ok(row.map(|r| r.get("version")))
}
