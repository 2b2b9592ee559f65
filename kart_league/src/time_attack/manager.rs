//! Persisted Time Attack elimination phase.
//!
//! Only the entrants and the played rounds are stored. The phase state is
//! rebuilt by replaying the rounds through [`EliminationPhase`], so the
//! stored rounds are the single source of truth.

use super::{
    elimination::EliminationPhase,
    models::{EliminationRound, RoundTime, TaEntrant, TaError},
};
use crate::{
    bracket::{Placement, PlayerId},
    cache::StandingsCache,
    db::timeouts::{LOCK_TIMEOUT, set_lock_timeout},
    modes::GameMode,
    qualification::{QualificationError, QualificationManager},
    security::{
        InputError,
        sanitize::{MAX_LABEL_LEN, sanitize_field},
    },
    tournament::{TournamentError, TournamentManager},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Row};
use std::sync::Arc;
use thiserror::Error;

/// Time Attack phase errors
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("No elimination phase for tournament {0}")]
    NotStarted(i64),

    #[error("Elimination phase for tournament {0} already started")]
    AlreadyStarted(i64),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Elimination(#[from] TaError),

    #[error(transparent)]
    Qualification(#[from] QualificationError),

    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PhaseError {
    pub fn client_message(&self) -> String {
        match self {
            PhaseError::Database(_) | PhaseError::Serialization(_) => {
                "Internal server error".to_string()
            }
            PhaseError::Tournament(e) => e.client_message(),
            PhaseError::Qualification(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type PhaseResult<T> = Result<T, PhaseError>;

/// Snapshot of an elimination phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseView {
    pub tournament_id: i64,
    pub eliminate_per_round: usize,
    pub entrants: Vec<TaEntrant>,
    pub remaining: Vec<PlayerId>,
    pub rounds: Vec<EliminationRound>,
    pub finished: bool,
    pub winner: Option<PlayerId>,
    /// Final standings, eliminated players included as soon as they drop
    pub placements: Vec<Placement>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PhaseView {
    fn new(
        tournament_id: i64,
        phase: &EliminationPhase,
        started_at: DateTime<Utc>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            tournament_id,
            eliminate_per_round: phase.eliminate_per_round(),
            entrants: phase.entrants().to_vec(),
            remaining: phase.remaining().to_vec(),
            rounds: phase.rounds().to_vec(),
            finished: phase.is_finished(),
            winner: phase.winner(),
            placements: phase.placements(),
            started_at,
            finished_at,
        }
    }
}

struct StoredPhase {
    phase: EliminationPhase,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Time Attack elimination manager
#[derive(Clone)]
pub struct PhaseManager {
    pool: Arc<PgPool>,
    tournaments: TournamentManager,
    qualification: QualificationManager,
    cache: StandingsCache,
}

impl PhaseManager {
    pub fn new(
        pool: Arc<PgPool>,
        tournaments: TournamentManager,
        qualification: QualificationManager,
        cache: StandingsCache,
    ) -> Self {
        Self {
            pool,
            tournaments,
            qualification,
            cache,
        }
    }

    /// Start the phase with every ranked qualifier, seeded by qualification rank
    pub async fn start_phase(
        &self,
        tournament_id: i64,
        eliminate_per_round: usize,
    ) -> PhaseResult<PhaseView> {
        self.tournaments.ensure_accepts_scores(tournament_id).await?;
        let ranking = self.qualification.ta_ranking(tournament_id).await?;
        let entrants: Vec<TaEntrant> = ranking
            .iter()
            .map(|s| TaEntrant {
                player_id: s.player_id,
                seed: s.rank,
            })
            .collect();
        let phase = EliminationPhase::new(entrants, eliminate_per_round)?;

        let row = sqlx::query(
            r#"
            INSERT INTO ta_phases (tournament_id, eliminate_per_round, entrants)
            VALUES ($1, $2, $3)
            ON CONFLICT (tournament_id) DO NOTHING
            RETURNING started_at
            "#,
        )
        .bind(tournament_id)
        .bind(eliminate_per_round as i32)
        .bind(serde_json::to_value(phase.entrants())?)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or(PhaseError::AlreadyStarted(tournament_id))?;

        log::info!(
            "Started TA elimination for tournament {} with {} players",
            tournament_id,
            phase.entrants().len()
        );
        let started_at = row.get::<NaiveDateTime, _>("started_at").and_utc();
        Ok(PhaseView::new(tournament_id, &phase, started_at, None))
    }

    async fn load(
        conn: &mut PgConnection,
        tournament_id: i64,
        for_update: bool,
    ) -> PhaseResult<StoredPhase> {
        let sql = format!(
            "SELECT eliminate_per_round, entrants, started_at, finished_at FROM ta_phases WHERE tournament_id = $1 {}",
            if for_update { "FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql)
            .bind(tournament_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(PhaseError::NotStarted(tournament_id))?;

        let entrants: Vec<TaEntrant> = serde_json::from_value(row.get("entrants"))?;
        let eliminate_per_round = row.get::<i32, _>("eliminate_per_round").max(1) as usize;
        let started_at = row.get::<NaiveDateTime, _>("started_at").and_utc();
        let finished_at = row
            .get::<Option<NaiveDateTime>, _>("finished_at")
            .map(|t| t.and_utc());

        let round_rows = sqlx::query(
            r#"
            SELECT round_number, course, times, eliminated FROM ta_rounds
            WHERE tournament_id = $1
            ORDER BY round_number
            "#,
        )
        .bind(tournament_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut rounds = Vec::with_capacity(round_rows.len());
        for row in &round_rows {
            rounds.push(EliminationRound {
                round: row.get::<i32, _>("round_number").max(0) as u32,
                course: row.get("course"),
                times: serde_json::from_value(row.get("times"))?,
                eliminated: serde_json::from_value(row.get("eliminated"))?,
            });
        }

        let phase = EliminationPhase::replay(entrants, eliminate_per_round, &rounds)?;
        Ok(StoredPhase {
            phase,
            started_at,
            finished_at,
        })
    }

    /// Play one round and persist it
    pub async fn submit_round(
        &self,
        tournament_id: i64,
        course: &str,
        times: &[RoundTime],
    ) -> PhaseResult<PhaseView> {
        let course = sanitize_field("course", course, MAX_LABEL_LEN)?;
        self.tournaments.ensure_accepts_scores(tournament_id).await?;

        let mut tx = self.pool.begin().await?;
        set_lock_timeout(&mut *tx, LOCK_TIMEOUT).await?;
        let StoredPhase {
            mut phase,
            started_at,
            mut finished_at,
        } = Self::load(&mut *tx, tournament_id, true).await?;

        let round = phase.submit_round(&course, times)?.clone();
        sqlx::query(
            r#"
            INSERT INTO ta_rounds (tournament_id, round_number, course, times, eliminated)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tournament_id)
        .bind(round.round as i32)
        .bind(&round.course)
        .bind(serde_json::to_value(&round.times)?)
        .bind(serde_json::to_value(&round.eliminated)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE ta_entries SET eliminated_round = $3, updated_at = NOW()
            WHERE tournament_id = $1 AND player_id = ANY($2) AND stage = 'qualification'
            "#,
        )
        .bind(tournament_id)
        .bind(&round.eliminated)
        .bind(round.round as i32)
        .execute(&mut *tx)
        .await?;

        if phase.is_finished() {
            let row = sqlx::query(
                "UPDATE ta_phases SET finished_at = NOW() WHERE tournament_id = $1 RETURNING finished_at",
            )
            .bind(tournament_id)
            .fetch_one(&mut *tx)
            .await?;
            finished_at = row
                .get::<Option<NaiveDateTime>, _>("finished_at")
                .map(|t| t.and_utc());
        }
        tx.commit().await?;

        self.cache.invalidate(tournament_id, GameMode::Ta).await;
        Ok(PhaseView::new(tournament_id, &phase, started_at, finished_at))
    }

    /// Current phase state
    pub async fn phase(&self, tournament_id: i64) -> PhaseResult<PhaseView> {
        let mut conn = self.pool.acquire().await?;
        let stored = Self::load(&mut *conn, tournament_id, false).await?;
        Ok(PhaseView::new(
            tournament_id,
            &stored.phase,
            stored.started_at,
            stored.finished_at,
        ))
    }

    /// Drop the phase and its rounds so it can be started again
    pub async fn reset(&self, tournament_id: i64) -> PhaseResult<()> {
        self.tournaments.ensure_accepts_scores(tournament_id).await?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM ta_rounds WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE ta_entries SET eliminated_round = NULL WHERE tournament_id = $1 AND stage = 'qualification'",
        )
        .bind(tournament_id)
        .execute(&mut *tx)
        .await?;
        let deleted = sqlx::query("DELETE FROM ta_phases WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(PhaseError::NotStarted(tournament_id));
        }
        tx.commit().await?;
        log::warn!("Reset TA elimination for tournament {}", tournament_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_reflects_phase() {
        let entrants = vec![
            TaEntrant {
                player_id: 7,
                seed: 1,
            },
            TaEntrant {
                player_id: 8,
                seed: 2,
            },
        ];
        let mut phase = EliminationPhase::new(entrants, 1).unwrap();
        phase
            .submit_round(
                "Rainbow Road",
                &[RoundTime {
                    player_id: 8,
                    time_ms: Some(120_000),
                }],
            )
            .unwrap();

        let now = Utc::now();
        let view = PhaseView::new(3, &phase, now, Some(now));
        assert!(view.finished);
        assert_eq!(view.winner, Some(8));
        assert_eq!(view.remaining, vec![8]);
        assert_eq!(view.placements.len(), 2);
        assert_eq!(view.placements[1].player_id, 7);
    }

    #[test]
    fn test_client_message_hides_database_errors() {
        let err = PhaseError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.client_message(), "Internal server error");
        assert_eq!(
            PhaseError::NotStarted(4).client_message(),
            "No elimination phase for tournament 4"
        );
    }
}
