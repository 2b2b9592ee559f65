//! Qualification manager: group setup, standings and Time Attack times.

use super::{
    models::{GroupAssignment, GroupStandings, MatchOutcome, QualificationRecord},
    schedule::round_robin,
    standings::{GroupEntrant, compute_standings, rank_time_trials, cross_group_seeds},
};
use crate::{
    bracket::PlayerId,
    cache::StandingsCache,
    db::LIVE,
    matches::{
        Match, MatchError, NewMatch,
        manager::{insert_matches, matches_for},
    },
    modes::{GameMode, Stage},
    security::{
        InputError,
        sanitize::{MAX_LABEL_LEN, sanitize_field},
    },
    time_attack::models::{TaEntry, TaError, TaStanding},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};
use thiserror::Error;

/// Qualification errors
#[derive(Debug, Error)]
pub enum QualificationError {
    #[error("Mode {0} is not played in groups")]
    NotGroupMode(GameMode),

    #[error("Mode {0} has no time trials")]
    NotTimeTrialMode(GameMode),

    #[error("Qualification for mode {0} is already set up")]
    AlreadySetUp(GameMode),

    #[error("Group {0} needs at least 2 players")]
    GroupTooSmall(String),

    #[error("Player {0} is assigned more than once")]
    DuplicatePlayer(PlayerId),

    #[error("Player not found: {0}")]
    UnknownPlayer(PlayerId),

    #[error("Not enough qualified players: need {needed}, have {available}")]
    NotEnoughPlayers { needed: usize, available: usize },

    #[error(transparent)]
    InvalidInput(#[from] InputError),

    #[error(transparent)]
    Time(#[from] TaError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QualificationError {
    pub fn client_message(&self) -> String {
        match self {
            QualificationError::Database(_) | QualificationError::Serialization(_) => {
                "Internal server error".to_string()
            }
            QualificationError::Match(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type QualificationResult<T> = Result<T, QualificationError>;

fn record_from_row(row: &PgRow, mode: GameMode) -> QualificationRecord {
    QualificationRecord {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        player_id: row.get("player_id"),
        mode,
        group_label: row.get("group_label"),
        seeding: row.get::<Option<i32>, _>("seeding").map(|s| s.max(0) as u32),
        matches_played: row.get::<i32, _>("matches_played").max(0) as u32,
        wins: row.get::<i32, _>("wins").max(0) as u32,
        ties: row.get::<i32, _>("ties").max(0) as u32,
        losses: row.get::<i32, _>("losses").max(0) as u32,
        points: row.get("points"),
        score_for: row.get::<i32, _>("score_for").max(0) as u32,
        score_against: row.get::<i32, _>("score_against").max(0) as u32,
    }
}

/// Validate assignments and group them by label (labels sorted)
fn group_assignments(
    assignments: &[GroupAssignment],
) -> QualificationResult<BTreeMap<String, Vec<GroupAssignment>>> {
    let mut seen = HashSet::new();
    let mut groups: BTreeMap<String, Vec<GroupAssignment>> = BTreeMap::new();
    for assignment in assignments {
        if !seen.insert(assignment.player_id) {
            return Err(QualificationError::DuplicatePlayer(assignment.player_id));
        }
        let label = sanitize_field("group_label", &assignment.group_label, MAX_LABEL_LEN)?;
        groups.entry(label.clone()).or_default().push(GroupAssignment {
            group_label: label,
            ..assignment.clone()
        });
    }
    if let Some((label, _)) = groups.iter().find(|(_, members)| members.len() < 2) {
        return Err(QualificationError::GroupTooSmall(label.clone()));
    }
    Ok(groups)
}

/// Build the round-robin matches of every group
fn schedule_matches(
    tournament_id: i64,
    mode: GameMode,
    groups: &BTreeMap<String, Vec<GroupAssignment>>,
) -> Vec<NewMatch> {
    let mut matches = Vec::new();
    let mut number = 1;
    for (label, members) in groups {
        // Seeded players first so the schedule is stable
        let mut ordered = members.clone();
        ordered.sort_by_key(|a| (a.seeding.unwrap_or(u32::MAX), a.player_id));
        let players: Vec<PlayerId> = ordered.iter().map(|a| a.player_id).collect();

        for pairing in round_robin(&players) {
            matches.push(NewMatch {
                tournament_id,
                mode,
                stage: Stage::Qualification,
                round_label: format!("Group {} Round {}", label, pairing.round),
                group_label: Some(label.clone()),
                bracket: None,
                match_number: number,
                player1_id: Some(pairing.player1),
                player2_id: Some(pairing.player2),
            });
            number += 1;
        }
    }
    matches
}

fn outcomes(matches: &[Match]) -> Vec<MatchOutcome> {
    matches
        .iter()
        .filter(|m| m.completed)
        .filter_map(|m| {
            Some(MatchOutcome {
                player1: m.player1_id?,
                player2: m.player2_id?,
                score1: m.score1,
                score2: m.score2,
            })
        })
        .collect()
}

/// Qualification manager
#[derive(Clone)]
pub struct QualificationManager {
    pool: Arc<PgPool>,
    cache: StandingsCache,
}

impl QualificationManager {
    pub fn new(pool: Arc<PgPool>, cache: StandingsCache) -> Self {
        Self { pool, cache }
    }

    /// Create qualification records and the round-robin schedule of every group
    pub async fn setup_groups(
        &self,
        tournament_id: i64,
        mode: GameMode,
        assignments: &[GroupAssignment],
    ) -> QualificationResult<Vec<Match>> {
        if !mode.is_head_to_head() {
            return Err(QualificationError::NotGroupMode(mode));
        }
        let groups = group_assignments(assignments)?;

        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM qualifications WHERE tournament_id = $1 AND mode = $2 AND {LIVE}"
        ))
        .bind(tournament_id)
        .bind(mode.code())
        .fetch_one(&mut *tx)
        .await?
        .get("total");
        if existing > 0 {
            return Err(QualificationError::AlreadySetUp(mode));
        }

        let player_ids: Vec<PlayerId> = assignments.iter().map(|a| a.player_id).collect();
        let live: Vec<PlayerId> = sqlx::query(&format!(
            "SELECT id FROM players WHERE id = ANY($1) AND {LIVE}"
        ))
        .bind(&player_ids)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.get("id"))
        .collect();
        if let Some(missing) = player_ids.iter().find(|id| !live.contains(id)) {
            return Err(QualificationError::UnknownPlayer(*missing));
        }

        for members in groups.values() {
            for assignment in members {
                sqlx::query(
                    r#"
                    INSERT INTO qualifications (tournament_id, player_id, mode, group_label, seeding)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(tournament_id)
                .bind(assignment.player_id)
                .bind(mode.code())
                .bind(&assignment.group_label)
                .bind(assignment.seeding.map(|s| s as i32))
                .execute(&mut *tx)
                .await?;
            }
        }

        let scheduled = schedule_matches(tournament_id, mode, &groups);
        let matches = insert_matches(&mut *tx, &scheduled).await?;
        tx.commit().await?;

        self.cache.invalidate(tournament_id, mode).await;
        log::info!(
            "Set up {} groups with {} matches for tournament {} mode {}",
            groups.len(),
            matches.len(),
            tournament_id,
            mode
        );
        Ok(matches)
    }

    /// Stored qualification records
    pub async fn records(
        &self,
        tournament_id: i64,
        mode: GameMode,
    ) -> QualificationResult<Vec<QualificationRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT id, tournament_id, player_id, group_label, seeding, matches_played, wins, ties,
                   losses, points, score_for, score_against
            FROM qualifications
            WHERE tournament_id = $1 AND mode = $2 AND {LIVE}
            ORDER BY group_label, points DESC, player_id
            "#
        ))
        .bind(tournament_id)
        .bind(mode.code())
        .fetch_all(self.pool.as_ref())
        .await?;
        Ok(rows.iter().map(|row| record_from_row(row, mode)).collect())
    }

    async fn compute(
        &self,
        tournament_id: i64,
        mode: GameMode,
    ) -> QualificationResult<Vec<GroupStandings>> {
        let entrants: Vec<GroupEntrant> = self
            .records(tournament_id, mode)
            .await?
            .into_iter()
            .map(|r| GroupEntrant {
                player_id: r.player_id,
                group_label: r.group_label,
                seeding: r.seeding,
            })
            .collect();

        let mut conn = self.pool.acquire().await?;
        let matches = matches_for(&mut *conn, tournament_id, mode, Stage::Qualification, false).await?;
        Ok(compute_standings(&entrants, &outcomes(&matches)))
    }

    /// Ranked group tables, served from the cache when possible
    pub async fn standings(
        &self,
        tournament_id: i64,
        mode: GameMode,
    ) -> QualificationResult<Vec<GroupStandings>> {
        if !mode.is_head_to_head() {
            return Err(QualificationError::NotGroupMode(mode));
        }
        self.cache
            .get_or_compute(tournament_id, mode, || self.compute(tournament_id, mode))
            .await
    }

    /// Recompute standings from matches and persist the aggregates
    pub async fn recompute(
        &self,
        tournament_id: i64,
        mode: GameMode,
    ) -> QualificationResult<Vec<GroupStandings>> {
        let groups = self.compute(tournament_id, mode).await?;

        let mut tx = self.pool.begin().await?;
        for standing in groups.iter().flat_map(|g| &g.standings) {
            sqlx::query(&format!(
                r#"
                UPDATE qualifications
                SET matches_played = $4, wins = $5, ties = $6, losses = $7, points = $8,
                    score_for = $9, score_against = $10, updated_at = NOW()
                WHERE tournament_id = $1 AND player_id = $2 AND mode = $3 AND {LIVE}
                "#
            ))
            .bind(tournament_id)
            .bind(standing.player_id)
            .bind(mode.code())
            .bind(standing.matches_played as i32)
            .bind(standing.wins as i32)
            .bind(standing.ties as i32)
            .bind(standing.losses as i32)
            .bind(standing.points)
            .bind(standing.score_for as i32)
            .bind(standing.score_against as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.cache.invalidate(tournament_id, mode).await;
        Ok(groups)
    }

    /// Bracket seeds: the best `size` players, groups interleaved by rank
    /// so groupmates do not meet in the first round
    pub async fn finals_seeds(
        &self,
        tournament_id: i64,
        mode: GameMode,
        size: usize,
    ) -> QualificationResult<Vec<PlayerId>> {
        let groups = self.compute(tournament_id, mode).await?;
        cross_group_seeds(&groups, size).ok_or_else(|| QualificationError::NotEnoughPlayers {
            needed: size,
            available: groups.iter().map(|g| g.standings.len()).sum(),
        })
    }

    /// Record (or overwrite) a player's Time Attack qualification time on a course
    pub async fn record_ta_time(
        &self,
        tournament_id: i64,
        player_id: PlayerId,
        course: &str,
        time_ms: u32,
    ) -> QualificationResult<TaEntry> {
        let course = sanitize_field("course", course, MAX_LABEL_LEN)?;
        if time_ms == 0 {
            return Err(TaError::InvalidTime("time must be positive".to_string()).into());
        }

        let mut tx = self.pool.begin().await?;
        let player = sqlx::query(&format!("SELECT id FROM players WHERE id = $1 AND {LIVE}"))
            .bind(player_id)
            .fetch_optional(&mut *tx)
            .await?;
        if player.is_none() {
            return Err(QualificationError::UnknownPlayer(player_id));
        }

        let row = sqlx::query(
            r#"
            SELECT course_times FROM ta_entries
            WHERE tournament_id = $1 AND player_id = $2 AND stage = 'qualification'
            FOR UPDATE
            "#,
        )
        .bind(tournament_id)
        .bind(player_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut entry = TaEntry::new(player_id);
        if let Some(row) = row {
            entry.course_times = serde_json::from_value(row.get("course_times"))?;
        }
        entry.course_times.insert(course, time_ms);

        sqlx::query(
            r#"
            INSERT INTO ta_entries (tournament_id, player_id, stage, course_times, total_ms)
            VALUES ($1, $2, 'qualification', $3, $4)
            ON CONFLICT (tournament_id, player_id, stage)
            DO UPDATE SET course_times = EXCLUDED.course_times, total_ms = EXCLUDED.total_ms, updated_at = NOW()
            "#,
        )
        .bind(tournament_id)
        .bind(player_id)
        .bind(serde_json::to_value(&entry.course_times)?)
        .bind(entry.total_ms() as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.cache.invalidate(tournament_id, GameMode::Ta).await;
        Ok(entry)
    }

    /// Time Attack qualification entries
    pub async fn ta_entries(&self, tournament_id: i64) -> QualificationResult<Vec<TaEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT e.player_id, e.course_times FROM ta_entries e
            JOIN players p ON p.id = e.player_id AND p.{LIVE}
            WHERE e.tournament_id = $1 AND e.stage = 'qualification'
            ORDER BY e.player_id
            "#
        ))
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TaEntry {
                    player_id: row.get("player_id"),
                    course_times: serde_json::from_value(row.get("course_times"))?,
                })
            })
            .collect()
    }

    /// Time Attack qualification ranking, cached like group standings
    pub async fn ta_ranking(&self, tournament_id: i64) -> QualificationResult<Vec<TaStanding>> {
        self.cache
            .get_or_compute(tournament_id, GameMode::Ta, || async {
                let entries = self.ta_entries(tournament_id).await?;
                Ok::<_, QualificationError>(rank_time_trials(&entries))
            })
            .await
    }
}
