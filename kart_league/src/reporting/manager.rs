//! Participant score reporting.
//!
//! Each player of a match reports the score with the tournament token.
//! Reports are append-only; the latest report of each player counts. When
//! both agree the match is confirmed, when they differ the dispute is
//! written to the audit log and an admin settles it.

use super::models::{ReportOutcome, Resolution, ScoreEntry, ScoreReport, resolve};
use crate::{
    audit::{Actor, AuditEntry, AuditLogger, actions},
    bracket::PlayerId,
    db::{
        LIVE,
        timeouts::{LOCK_TIMEOUT, set_lock_timeout},
    },
    finals::{FinalsError, FinalsManager},
    matches::{
        Match, MatchError, MatchId, ScoreUpdate,
        manager::{MATCH_COLUMNS, match_from_row, write_score},
    },
    modes::Stage,
    qualification::{QualificationError, QualificationManager},
    tournament::{TournamentError, TournamentManager},
};
use serde_json::json;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Player {player_id} does not play match {match_id}")]
    NotAParticipant { match_id: MatchId, player_id: PlayerId },

    #[error("Match {0} is already completed")]
    AlreadyCompleted(MatchId),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Finals(#[from] FinalsError),

    #[error(transparent)]
    Qualification(#[from] QualificationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ReportError {
    pub fn client_message(&self) -> String {
        match self {
            ReportError::Database(_) | ReportError::Serialization(_) => {
                "Internal server error".to_string()
            }
            ReportError::Match(e) => e.client_message(),
            ReportError::Tournament(e) => e.client_message(),
            ReportError::Finals(e) => e.client_message(),
            ReportError::Qualification(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

fn entry_from_row(row: &PgRow) -> ReportResult<ScoreEntry> {
    Ok(ScoreEntry {
        id: row.get("id"),
        match_id: row.get("match_id"),
        player_id: row.get("player_id"),
        score1: row.get::<i32, _>("score1").max(0) as u32,
        score2: row.get::<i32, _>("score2").max(0) as u32,
        rounds: serde_json::from_value(row.get("rounds"))?,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

/// Latest report of each player of a match
async fn latest_reports(
    conn: &mut PgConnection,
    match_id: MatchId,
) -> ReportResult<Vec<ScoreEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT ON (player_id) id, match_id, player_id, score1, score2, rounds, created_at
        FROM score_entries
        WHERE match_id = $1
        ORDER BY player_id, created_at DESC, id DESC
        "#,
    )
    .bind(match_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(entry_from_row).collect()
}

/// Score report manager
#[derive(Clone)]
pub struct ReportManager {
    pool: Arc<PgPool>,
    tournaments: TournamentManager,
    qualification: QualificationManager,
    finals: FinalsManager,
    audit: AuditLogger,
}

impl ReportManager {
    pub fn new(
        pool: Arc<PgPool>,
        tournaments: TournamentManager,
        qualification: QualificationManager,
        finals: FinalsManager,
        audit: AuditLogger,
    ) -> Self {
        Self {
            pool,
            tournaments,
            qualification,
            finals,
            audit,
        }
    }

    /// Append a report from one of the match's players
    pub async fn report_score(
        &self,
        match_id: MatchId,
        reporter: PlayerId,
        report: ScoreReport,
        ip_address: Option<String>,
    ) -> ReportResult<ReportOutcome> {
        let mut tx = self.pool.begin().await?;
        set_lock_timeout(&mut *tx, LOCK_TIMEOUT).await?;
        let row = sqlx::query(&format!(
            "SELECT {MATCH_COLUMNS} FROM matches WHERE id = $1 AND {LIVE} FOR UPDATE"
        ))
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(MatchError::NotFound(match_id))?;
        let m = match_from_row(&row)?;

        self.tournaments.ensure_accepts_scores(m.tournament_id).await?;
        if m.completed {
            return Err(ReportError::AlreadyCompleted(match_id));
        }
        let (Some(player1), Some(player2)) = (m.player1_id, m.player2_id) else {
            return Err(MatchError::MissingPlayers(match_id).into());
        };
        if reporter != player1 && reporter != player2 {
            return Err(ReportError::NotAParticipant {
                match_id,
                player_id: reporter,
            });
        }
        m.mode
            .validate_score(m.stage, report.score1, report.score2, &report.rounds)
            .map_err(MatchError::from)?;

        let row = sqlx::query(
            r#"
            INSERT INTO score_entries (match_id, player_id, score1, score2, rounds, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, match_id, player_id, score1, score2, rounds, created_at
            "#,
        )
        .bind(match_id)
        .bind(reporter)
        .bind(report.score1 as i32)
        .bind(report.score2 as i32)
        .bind(serde_json::to_value(&report.rounds)?)
        .bind(&ip_address)
        .fetch_one(&mut *tx)
        .await?;
        let entry = entry_from_row(&row)?;

        let latest = latest_reports(&mut *tx, match_id).await?;
        let actor = Actor::Participant {
            player_id: reporter,
        };

        match resolve(player1, player2, &latest) {
            Resolution::Waiting => {
                tx.commit().await?;
                self.audit_report(actor, actions::SCORE_REPORTED, &m, &report, &ip_address)
                    .await;
                Ok(ReportOutcome::Pending { entry })
            }
            Resolution::Disputed => {
                tx.commit().await?;
                let opponent = latest
                    .iter()
                    .find(|e| e.player_id != reporter)
                    .cloned()
                    .unwrap_or_else(|| entry.clone());
                self.audit
                    .record(
                        AuditEntry::new(actor, actions::SCORE_DISPUTED, "match", Some(match_id))
                            .with_details(json!({
                                "reports": latest,
                            }))
                            .with_client(ip_address, None),
                    )
                    .await;
                log::warn!("Disputed score reports on match {}", match_id);
                Ok(ReportOutcome::Disputed { entry, opponent })
            }
            Resolution::Agreed => {
                let confirmed = self.confirm(tx, &m, &report, actor.clone()).await?;
                self.audit_report(actor, actions::SCORE_CONFIRMED, &m, &report, &ip_address)
                    .await;
                Ok(ReportOutcome::Confirmed {
                    entry,
                    match_record: confirmed,
                })
            }
        }
    }

    /// Write an agreed score; finals results go through the bracket
    async fn confirm(
        &self,
        mut tx: sqlx::Transaction<'static, sqlx::Postgres>,
        m: &Match,
        report: &ScoreReport,
        actor: Actor,
    ) -> ReportResult<Match> {
        match m.stage {
            Stage::Qualification => {
                let update = ScoreUpdate {
                    expected_version: m.version,
                    score1: report.score1,
                    score2: report.score2,
                    rounds: report.rounds.clone(),
                    completed: true,
                };
                let updated = write_score(&mut *tx, m.id, &update).await?;
                tx.commit().await?;
                self.qualification.recompute(m.tournament_id, m.mode).await?;
                Ok(updated)
            }
            Stage::Finals => {
                // The bracket locks its own rows; keep the report committed first
                tx.commit().await?;
                let result = self
                    .finals
                    .record_result(
                        m.tournament_id,
                        m.mode,
                        m.match_number,
                        report.score1,
                        report.score2,
                        report.rounds.clone(),
                        actor,
                    )
                    .await?;
                result
                    .changed
                    .into_iter()
                    .find(|changed| changed.id == m.id)
                    .ok_or(MatchError::NotFound(m.id).into())
            }
        }
    }

    async fn audit_report(
        &self,
        actor: Actor,
        action: &str,
        m: &Match,
        report: &ScoreReport,
        ip_address: &Option<String>,
    ) {
        self.audit
            .record(
                AuditEntry::new(actor, action, "match", Some(m.id))
                    .with_details(json!({
                        "tournament_id": m.tournament_id,
                        "mode": m.mode.code(),
                        "score": [report.score1, report.score2],
                    }))
                    .with_client(ip_address.clone(), None),
            )
            .await;
    }

    /// Every report of a match, oldest first
    pub async fn reports(&self, match_id: MatchId) -> ReportResult<Vec<ScoreEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, match_id, player_id, score1, score2, rounds, created_at
            FROM score_entries
            WHERE match_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(match_id)
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_delegates() {
        let err = ReportError::Match(MatchError::Corrupt("bad mode".into()));
        assert_eq!(err.client_message(), "Internal server error");

        let err = ReportError::NotAParticipant {
            match_id: 5,
            player_id: 9,
        };
        assert_eq!(err.client_message(), "Player 9 does not play match 5");
    }
}
