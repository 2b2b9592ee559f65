//! Match manager: CRUD, paginated listing and version-checked score writes.

use super::{
    errors::{MatchError, MatchResult},
    models::{Match, MatchFilter, MatchId, NewMatch, ScoreUpdate},
};
use crate::{
    bracket::BracketSide,
    db::{
        LIVE, Page, PageRequest, SoftDeletable, VersionOutcome, classify_update,
        locking::current_version, soft_delete,
    },
    modes::{GameMode, Stage},
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::sync::Arc;

pub(crate) const MATCH_COLUMNS: &str = "id, tournament_id, mode, stage, round_label, group_label, bracket, match_number, player1_id, player2_id, score1, score2, rounds, completed, version, created_at, updated_at";

pub(crate) fn match_from_row(row: &PgRow) -> MatchResult<Match> {
    let mode: String = row.get("mode");
    let stage: String = row.get("stage");
    let bracket: Option<String> = row.get("bracket");

    let mode: GameMode = mode
        .parse()
        .map_err(|_| MatchError::Corrupt(format!("unknown mode {mode}")))?;
    let stage =
        Stage::parse(&stage).ok_or_else(|| MatchError::Corrupt(format!("unknown stage {stage}")))?;
    let bracket = match bracket {
        Some(side) => Some(
            BracketSide::parse(&side)
                .ok_or_else(|| MatchError::Corrupt(format!("unknown bracket {side}")))?,
        ),
        None => None,
    };

    Ok(Match {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        mode,
        stage,
        round_label: row.get("round_label"),
        group_label: row.get("group_label"),
        bracket,
        match_number: row.get::<i32, _>("match_number").max(0) as u32,
        player1_id: row.get("player1_id"),
        player2_id: row.get("player2_id"),
        score1: row.get::<i32, _>("score1").max(0) as u32,
        score2: row.get::<i32, _>("score2").max(0) as u32,
        rounds: serde_json::from_value(row.get("rounds"))?,
        completed: row.get("completed"),
        version: row.get("version"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        updated_at: row.get::<chrono::NaiveDateTime, _>("updated_at").and_utc(),
    })
}

/// Insert matches on an open connection or transaction
pub(crate) async fn insert_matches(
    conn: &mut PgConnection,
    matches: &[NewMatch],
) -> MatchResult<Vec<Match>> {
    let sql = format!(
        r#"
        INSERT INTO matches (tournament_id, mode, stage, round_label, group_label, bracket, match_number, player1_id, player2_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {MATCH_COLUMNS}
        "#
    );
    let mut inserted = Vec::with_capacity(matches.len());
    for m in matches {
        let row = sqlx::query(&sql)
            .bind(m.tournament_id)
            .bind(m.mode.code())
            .bind(m.stage.as_str())
            .bind(&m.round_label)
            .bind(&m.group_label)
            .bind(m.bracket.map(BracketSide::as_str))
            .bind(m.match_number as i32)
            .bind(m.player1_id)
            .bind(m.player2_id)
            .fetch_one(&mut *conn)
            .await?;
        inserted.push(match_from_row(&row)?);
    }
    Ok(inserted)
}

/// Live matches of one tournament, mode and stage ordered by number
pub(crate) async fn matches_for(
    conn: &mut PgConnection,
    tournament_id: i64,
    mode: GameMode,
    stage: Stage,
    for_update: bool,
) -> MatchResult<Vec<Match>> {
    let sql = format!(
        r#"
        SELECT {MATCH_COLUMNS} FROM matches
        WHERE tournament_id = $1 AND mode = $2 AND stage = $3 AND {LIVE}
        ORDER BY match_number, id
        {}
        "#,
        if for_update { "FOR UPDATE" } else { "" }
    );
    let rows = sqlx::query(&sql)
        .bind(tournament_id)
        .bind(mode.code())
        .bind(stage.as_str())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(match_from_row).collect()
}

/// Version-checked score write; returns the updated row
pub(crate) async fn write_score(
    conn: &mut PgConnection,
    id: MatchId,
    update: &ScoreUpdate,
) -> MatchResult<Match> {
    let sql = format!(
        r#"
        UPDATE matches
        SET score1 = $3, score2 = $4, rounds = $5, completed = $6,
            version = version + 1, updated_at = NOW()
        WHERE id = $1 AND version = $2 AND {LIVE}
        RETURNING {MATCH_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(update.expected_version)
        .bind(update.score1 as i32)
        .bind(update.score2 as i32)
        .bind(serde_json::to_value(&update.rounds)?)
        .bind(update.completed)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => match_from_row(&row),
        None => {
            let current = current_version(&mut *conn, SoftDeletable::Match, id).await?;
            Err(stale_write_error(id, update.expected_version, current))
        }
    }
}

/// Error for a versioned write that touched no row, given the version
/// stored now (`None` when the row is gone)
pub(crate) fn stale_write_error(id: MatchId, expected: i32, current: Option<i32>) -> MatchError {
    match classify_update(None, current, expected) {
        VersionOutcome::Conflict { expected, current } => {
            MatchError::VersionConflict { expected, current }
        }
        VersionOutcome::Updated { .. } | VersionOutcome::NotFound => MatchError::NotFound(id),
    }
}

/// Finals rows only change through the bracket engine
fn ensure_not_bracket(id: MatchId, stage: Stage) -> MatchResult<()> {
    if stage == Stage::Finals {
        return Err(MatchError::BracketMatch(id));
    }
    Ok(())
}

/// Match manager
#[derive(Clone)]
pub struct MatchManager {
    pool: Arc<PgPool>,
}

impl MatchManager {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewMatch) -> MatchResult<Match> {
        let mut conn = self.pool.acquire().await?;
        insert_matches(&mut conn, std::slice::from_ref(&new))
            .await?
            .pop()
            .ok_or_else(|| MatchError::Corrupt("insert returned no row".to_string()))
    }

    pub async fn get(&self, id: MatchId) -> MatchResult<Match> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1 AND {LIVE}");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or(MatchError::NotFound(id))?;
        match_from_row(&row)
    }

    /// Every live match of a tournament, mode and stage
    pub async fn list_for(
        &self,
        tournament_id: i64,
        mode: GameMode,
        stage: Stage,
    ) -> MatchResult<Vec<Match>> {
        let mut conn = self.pool.acquire().await?;
        matches_for(&mut conn, tournament_id, mode, stage, false).await
    }

    /// Paginated listing
    pub async fn list(&self, filter: MatchFilter, page: PageRequest) -> MatchResult<Page<Match>> {
        let mode = filter.mode.map(GameMode::code);
        let stage = filter.stage.map(Stage::as_str);
        let condition = format!(
            "{LIVE} AND ($1::BIGINT IS NULL OR tournament_id = $1) AND ($2::TEXT IS NULL OR mode = $2) AND ($3::TEXT IS NULL OR stage = $3)"
        );

        let total: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM matches WHERE {condition}"
        ))
        .bind(filter.tournament_id)
        .bind(mode)
        .bind(stage)
        .fetch_one(self.pool.as_ref())
        .await?
        .get("total");

        let sql = format!(
            r#"
            SELECT {MATCH_COLUMNS} FROM matches
            WHERE {condition}
            ORDER BY tournament_id, mode, stage, match_number, id
            LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.tournament_id)
            .bind(mode)
            .bind(stage)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool.as_ref())
            .await?;

        let items = rows.iter().map(match_from_row).collect::<MatchResult<Vec<_>>>()?;
        Ok(Page::new(items, page, total.max(0) as u64))
    }

    /// Write a qualification score.
    ///
    /// Fails with [`MatchError::VersionConflict`] when the match changed
    /// since the caller read `expected_version`. Finals matches must go
    /// through the bracket so that players advance.
    pub async fn update_score(&self, id: MatchId, update: ScoreUpdate) -> MatchResult<Match> {
        let current = self.get(id).await?;
        ensure_not_bracket(id, current.stage)?;
        if current.player1_id.is_none() || current.player2_id.is_none() {
            return Err(MatchError::MissingPlayers(id));
        }
        current
            .mode
            .validate_score(current.stage, update.score1, update.score2, &update.rounds)?;

        let mut conn = self.pool.acquire().await?;
        let updated = write_score(&mut conn, id, &update).await?;
        log::info!(
            "Match {} score {}-{} (version {})",
            id,
            updated.score1,
            updated.score2,
            updated.version
        );
        Ok(updated)
    }

    /// Soft-delete a qualification match. Finals rows are refused since
    /// the bracket engine expects every slot to exist.
    pub async fn delete(&self, id: MatchId) -> MatchResult<()> {
        let current = self.get(id).await?;
        ensure_not_bracket(id, current.stage)?;
        if !soft_delete::soft_delete(self.pool.as_ref(), SoftDeletable::Match, id).await? {
            return Err(MatchError::NotFound(id));
        }
        Ok(())
    }

    /// Restore a deleted qualification match. Finals rows discarded by a
    /// bracket reset stay deleted.
    pub async fn restore(&self, id: MatchId) -> MatchResult<Match> {
        let stage: String = sqlx::query(
            "SELECT stage FROM matches WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(MatchError::NotFound(id))?
        .get("stage");
        let stage = Stage::parse(&stage)
            .ok_or_else(|| MatchError::Corrupt(format!("unknown stage {stage}")))?;
        ensure_not_bracket(id, stage)?;

        if !soft_delete::restore(self.pool.as_ref(), SoftDeletable::Match, id).await? {
            return Err(MatchError::NotFound(id));
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_internals() {
        assert_eq!(
            MatchError::Corrupt("unknown mode xx".to_string()).client_message(),
            "Internal server error"
        );
        let conflict = MatchError::VersionConflict {
            expected: 2,
            current: 3,
        };
        assert!(conflict.client_message().contains("expected version 2"));
    }

    #[test]
    fn test_stale_write_uses_stored_version() {
        assert!(matches!(
            stale_write_error(9, 2, Some(5)),
            MatchError::VersionConflict {
                expected: 2,
                current: 5
            }
        ));
        assert!(matches!(stale_write_error(9, 2, None), MatchError::NotFound(9)));
    }

    #[test]
    fn test_bracket_rows_are_refused() {
        assert!(matches!(
            ensure_not_bracket(4, Stage::Finals),
            Err(MatchError::BracketMatch(4))
        ));
        assert!(ensure_not_bracket(4, Stage::Qualification).is_ok());
    }
}
