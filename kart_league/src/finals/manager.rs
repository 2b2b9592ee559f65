//! Finals service shared by every head-to-head mode.

use super::errors::{FinalsError, FinalsResult};
use crate::{
    audit::{Actor, AuditEntry, AuditLogger, actions},
    bracket::{
        Bracket, BracketFormat, BracketMatch, BracketSystem, Placement, PlayerId, SlotUpdate,
    },
    cache::StandingsCache,
    db::{
        LIVE, SoftDeletable,
        locking::current_version,
        timeouts::{DEFAULT_TRANSACTION_TIMEOUT, LOCK_TIMEOUT, set_lock_timeout, with_deadline},
    },
    matches::{
        Match, NewMatch,
        manager::{MATCH_COLUMNS, insert_matches, match_from_row, matches_for, stale_write_error},
    },
    modes::{GameMode, RoundResult, Stage},
    qualification::QualificationManager,
    tournament::TournamentManager,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;

/// A finals bracket with its persisted matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketView {
    pub tournament_id: i64,
    pub mode: GameMode,
    pub format: BracketFormat,
    pub matches: Vec<Match>,
    pub finished: bool,
    pub champion: Option<PlayerId>,
    pub placements: Vec<Placement>,
}

impl BracketView {
    fn new(tournament_id: i64, mode: GameMode, bracket: &Bracket, matches: Vec<Match>) -> Self {
        Self {
            tournament_id,
            mode,
            format: bracket.format(),
            matches,
            finished: bracket.is_finished(),
            champion: bracket.champion(),
            placements: bracket.placements(),
        }
    }
}

/// Result of recording a finals match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalsUpdate {
    /// Every row that changed, the recorded match included
    pub changed: Vec<Match>,
    pub bracket: BracketView,
}

fn row_changed(stored: &Match, engine: &BracketMatch) -> bool {
    stored.player1_id != engine.player1
        || stored.player2_id != engine.player2
        || stored.score1 != engine.score1
        || stored.score2 != engine.score2
        || stored.completed != engine.completed
}

fn engine_view(matches: &[Match]) -> FinalsResult<Bracket> {
    let rows: Vec<BracketMatch> = matches.iter().map(Match::to_bracket_match).collect();
    let format = Bracket::detect_format(&rows);
    Ok(Bracket::from_matches(format, rows)?)
}

/// Write one bracket row back, bumping its version
async fn write_bracket_row(
    conn: &mut PgConnection,
    stored: &Match,
    engine: &BracketMatch,
    rounds: &[RoundResult],
) -> FinalsResult<Match> {
    let sql = format!(
        r#"
        UPDATE matches
        SET player1_id = $3, player2_id = $4, score1 = $5, score2 = $6, rounds = $7,
            completed = $8, version = version + 1, updated_at = NOW()
        WHERE id = $1 AND version = $2 AND {LIVE}
        RETURNING {MATCH_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(stored.id)
        .bind(stored.version)
        .bind(engine.player1)
        .bind(engine.player2)
        .bind(engine.score1 as i32)
        .bind(engine.score2 as i32)
        .bind(serde_json::to_value(rounds)?)
        .bind(engine.completed)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => Ok(match_from_row(&row)?),
        None => {
            let current = current_version(&mut *conn, SoftDeletable::Match, stored.id).await?;
            Err(stale_write_error(stored.id, stored.version, current).into())
        }
    }
}

/// Outcome of the locked part of recording a result
struct Advanced {
    bracket: Bracket,
    updates: Vec<SlotUpdate>,
    changed: Vec<Match>,
    matches: Vec<Match>,
}

/// Finals manager
#[derive(Clone)]
pub struct FinalsManager {
    pool: Arc<PgPool>,
    tournaments: TournamentManager,
    qualification: QualificationManager,
    cache: StandingsCache,
    audit: AuditLogger,
}

impl FinalsManager {
    pub fn new(
        pool: Arc<PgPool>,
        tournaments: TournamentManager,
        qualification: QualificationManager,
        cache: StandingsCache,
        audit: AuditLogger,
    ) -> Self {
        Self {
            pool,
            tournaments,
            qualification,
            cache,
            audit,
        }
    }

    fn check_mode(mode: GameMode) -> FinalsResult<()> {
        if mode.is_head_to_head() {
            Ok(())
        } else {
            Err(FinalsError::NotBracketMode(mode))
        }
    }

    /// Seed a bracket from qualification and persist its matches.
    ///
    /// With `reset` an existing bracket is soft-deleted first. The
    /// tournament must still accept scores.
    pub async fn create_bracket(
        &self,
        tournament_id: i64,
        mode: GameMode,
        format: BracketFormat,
        reset: bool,
        actor: Actor,
    ) -> FinalsResult<BracketView> {
        Self::check_mode(mode)?;
        self.tournaments.ensure_accepts_scores(tournament_id).await?;
        let seeds = self
            .qualification
            .finals_seeds(tournament_id, mode, Bracket::size_for(format))
            .await?;
        let bracket = Bracket::generate(format, &seeds)?;
        let rows: Vec<NewMatch> = bracket
            .matches()
            .iter()
            .map(|m| NewMatch::from_bracket(tournament_id, mode, m))
            .collect();

        let matches = with_deadline(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.replace_bracket(tournament_id, mode, &rows, reset),
        )
        .await?;

        self.audit
            .record(
                AuditEntry::new(actor, actions::BRACKET_CREATED, "tournament", Some(tournament_id))
                    .with_details(json!({
                        "mode": mode.code(),
                        "format": format.as_str(),
                        "seeds": seeds,
                        "reset": reset,
                    })),
            )
            .await;
        log::info!(
            "Created {} {} bracket for tournament {}",
            format.as_str(),
            mode,
            tournament_id
        );
        Ok(BracketView::new(tournament_id, mode, &bracket, matches))
    }

    /// Insert the bracket rows, discarding the live bracket when `reset`
    async fn replace_bracket(
        &self,
        tournament_id: i64,
        mode: GameMode,
        rows: &[NewMatch],
        reset: bool,
    ) -> FinalsResult<Vec<Match>> {
        let mut tx = self.pool.begin().await?;
        set_lock_timeout(&mut *tx, LOCK_TIMEOUT).await?;
        let existing = matches_for(&mut *tx, tournament_id, mode, Stage::Finals, true).await?;
        if !existing.is_empty() {
            if !reset {
                return Err(FinalsError::BracketExists(mode));
            }
            sqlx::query(&format!(
                r#"
                UPDATE matches SET deleted_at = NOW()
                WHERE tournament_id = $1 AND mode = $2 AND stage = 'finals' AND {LIVE}
                "#
            ))
            .bind(tournament_id)
            .bind(mode.code())
            .execute(&mut *tx)
            .await?;
            log::warn!(
                "Discarded {} {} finals matches of tournament {}",
                existing.len(),
                mode,
                tournament_id
            );
        }

        let matches = insert_matches(&mut *tx, rows).await?;
        tx.commit().await?;
        Ok(matches)
    }

    /// Current bracket of a mode
    pub async fn bracket(&self, tournament_id: i64, mode: GameMode) -> FinalsResult<BracketView> {
        Self::check_mode(mode)?;
        let mut conn = self.pool.acquire().await?;
        let matches = matches_for(&mut *conn, tournament_id, mode, Stage::Finals, false).await?;
        if matches.is_empty() {
            return Err(FinalsError::NoBracket(mode));
        }
        let bracket = engine_view(&matches)?;
        Ok(BracketView::new(tournament_id, mode, &bracket, matches))
    }

    /// Record (or correct) a finals result and advance players.
    ///
    /// The whole bracket is locked while the engine runs so two results
    /// cannot advance into the same slot concurrently. Lock waits and the
    /// transaction as a whole are time limited.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_result(
        &self,
        tournament_id: i64,
        mode: GameMode,
        match_number: u32,
        score1: u32,
        score2: u32,
        rounds: Vec<RoundResult>,
        actor: Actor,
    ) -> FinalsResult<FinalsUpdate> {
        Self::check_mode(mode)?;
        mode.validate_score(Stage::Finals, score1, score2, &rounds)?;
        self.tournaments.ensure_accepts_scores(tournament_id).await?;

        let Advanced {
            bracket,
            updates,
            changed,
            matches,
        } = with_deadline(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.advance(tournament_id, mode, match_number, score1, score2, &rounds),
        )
        .await?;

        self.cache.invalidate(tournament_id, mode).await;
        self.audit
            .record(
                AuditEntry::new(
                    actor,
                    actions::BRACKET_RESULT,
                    "tournament",
                    Some(tournament_id),
                )
                .with_details(json!({
                    "mode": mode.code(),
                    "match_number": match_number,
                    "score": [score1, score2],
                    "advanced": updates,
                })),
            )
            .await;
        log::info!(
            "Recorded {} finals match {} ({}-{}) for tournament {}, {} slots written",
            mode,
            match_number,
            score1,
            score2,
            tournament_id,
            updates.len()
        );

        Ok(FinalsUpdate {
            changed,
            bracket: BracketView::new(tournament_id, mode, &bracket, matches),
        })
    }

    /// Lock the bracket, run the engine and write back every changed row
    async fn advance(
        &self,
        tournament_id: i64,
        mode: GameMode,
        match_number: u32,
        score1: u32,
        score2: u32,
        rounds: &[RoundResult],
    ) -> FinalsResult<Advanced> {
        let mut tx = self.pool.begin().await?;
        set_lock_timeout(&mut *tx, LOCK_TIMEOUT).await?;
        let stored = matches_for(&mut *tx, tournament_id, mode, Stage::Finals, true).await?;
        if stored.is_empty() {
            return Err(FinalsError::NoBracket(mode));
        }
        let mut bracket = engine_view(&stored)?;
        let updates = bracket.record_result(match_number, score1, score2)?;

        let mut changed = Vec::new();
        let mut matches = Vec::with_capacity(stored.len());
        for (row, engine) in stored.iter().zip(bracket.matches()) {
            let recorded = row.match_number == match_number;
            if recorded || row_changed(row, engine) {
                let rounds: &[RoundResult] = if recorded {
                    rounds
                } else if engine.completed {
                    &row.rounds
                } else {
                    &[]
                };
                let updated = write_bracket_row(&mut *tx, row, engine, rounds).await?;
                changed.push(updated.clone());
                matches.push(updated);
            } else {
                matches.push(row.clone());
            }
        }
        tx.commit().await?;

        Ok(Advanced {
            bracket,
            updates,
            changed,
            matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(bracket: &Bracket) -> Vec<Match> {
        bracket
            .matches()
            .iter()
            .enumerate()
            .map(|(index, m)| Match {
                id: index as i64 + 100,
                tournament_id: 1,
                mode: GameMode::Mr,
                stage: Stage::Finals,
                round_label: m.round.clone(),
                group_label: None,
                bracket: Some(m.side),
                match_number: m.number,
                player1_id: m.player1,
                player2_id: m.player2,
                score1: m.score1,
                score2: m.score2,
                rounds: Vec::new(),
                completed: m.completed,
                version: 1,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_engine_view_detects_format() {
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let double = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        let rebuilt = engine_view(&stored(&double)).unwrap();
        assert_eq!(rebuilt.format(), BracketFormat::DoubleElimination);

        let single = Bracket::generate(BracketFormat::SingleElimination, &seeds).unwrap();
        let rebuilt = engine_view(&stored(&single)).unwrap();
        assert_eq!(rebuilt.format(), BracketFormat::SingleElimination);
    }

    #[test]
    fn test_only_touched_rows_change() {
        let seeds: Vec<PlayerId> = (1..=8).collect();
        let before = Bracket::generate(BracketFormat::DoubleElimination, &seeds).unwrap();
        let rows = stored(&before);
        let mut after = before.clone();
        after.record_result(1, 5, 2).unwrap();

        let changed: Vec<u32> = rows
            .iter()
            .zip(after.matches())
            .filter(|(row, engine)| row_changed(row, engine))
            .map(|(row, _)| row.match_number)
            .collect();
        // The match itself, the winners semifinal and the losers first round
        assert_eq!(changed.len(), 3);
        assert_eq!(changed[0], 1);
    }

    #[tokio::test]
    async fn test_stuck_transaction_times_out() {
        let result: FinalsResult<Advanced> = with_deadline(
            std::time::Duration::from_millis(10),
            std::future::pending(),
        )
        .await;
        let err = match result {
            Err(err) => err,
            Ok(_) => panic!("pending work should time out"),
        };
        assert!(matches!(
            err,
            FinalsError::Timeout(crate::db::timeouts::TimeoutError::Timeout(_))
        ));
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn test_client_message_hides_corruption() {
        let err = FinalsError::Bracket(crate::bracket::BracketError::Corrupt("gap".into()));
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(
            FinalsError::NoBracket(GameMode::Bm).client_message(),
            "No bm bracket exists for this tournament"
        );
    }
}
