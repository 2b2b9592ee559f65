//! End-to-end league flows against a real database.
//!
//! Run with `DATABASE_URL` pointing at a migrated database:
//! `cargo test --test league_flow_integration -- --ignored`

use kart_league::{
    audit::{Actor, AuditLogger},
    bracket::{BracketFormat, PlayerId},
    cache::{DEFAULT_TTL, MemoryStore, StandingsCache},
    db::{
        Database, DatabaseConfig,
        timeouts::{DEFAULT_TRANSACTION_TIMEOUT, LOCK_TIMEOUT},
    },
    finals::{BracketView, FinalsError, FinalsManager},
    matches::{Match, MatchError, MatchManager, ScoreUpdate},
    modes::GameMode,
    player::{CreatePlayer, PlayerManager},
    qualification::{GroupAssignment, QualificationManager},
    reporting::{ReportError, ReportManager, ReportOutcome, ScoreReport},
    time_attack::{PhaseError, PhaseManager, RoundTime},
    tournament::{CreateTournament, TournamentError, TournamentManager, TournamentStatus},
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

struct League {
    pool: Arc<PgPool>,
    tournaments: TournamentManager,
    players: PlayerManager,
    matches: MatchManager,
    qualification: QualificationManager,
    finals: FinalsManager,
    reports: ReportManager,
    phases: PhaseManager,
}

/// Helper to create a test database pool
async fn setup_test_db() -> Arc<PgPool> {
    let mut config = DatabaseConfig::from_env();
    config.max_connections = 5;
    config.min_connections = 1;

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    db.migrate().await.expect("Failed to run migrations");
    Arc::new(db.pool().clone())
}

async fn setup_league() -> League {
    let pool = setup_test_db().await;
    let cache = StandingsCache::new(Arc::new(MemoryStore::new()), DEFAULT_TTL);
    let audit = AuditLogger::new(pool.clone());
    let tournaments = TournamentManager::new(pool.clone());
    let qualification = QualificationManager::new(pool.clone(), cache.clone());
    let finals = FinalsManager::new(
        pool.clone(),
        tournaments.clone(),
        qualification.clone(),
        cache.clone(),
        audit.clone(),
    );
    League {
        players: PlayerManager::new(pool.clone()),
        matches: MatchManager::new(pool.clone()),
        reports: ReportManager::new(
            pool.clone(),
            tournaments.clone(),
            qualification.clone(),
            finals.clone(),
            audit,
        ),
        phases: PhaseManager::new(
            pool.clone(),
            tournaments.clone(),
            qualification.clone(),
            cache,
        ),
        tournaments,
        qualification,
        finals,
        pool,
    }
}

fn unique(prefix: &str) -> String {
    format!(
        "{}{}",
        prefix,
        chrono::Utc::now().timestamp_nanos_opt().unwrap() % 1_000_000_000
    )
}

async fn create_players(league: &League, count: usize) -> Vec<PlayerId> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let player = league
            .players
            .create(CreatePlayer {
                name: format!("Racer {i}"),
                nickname: unique(&format!("r{i}_")),
                user_id: None,
            })
            .await
            .unwrap();
        ids.push(player.id);
    }
    ids
}

async fn tournament_in_qualification(league: &League) -> i64 {
    let tournament = league
        .tournaments
        .create(CreateTournament {
            name: unique("Cup "),
            event_date: None,
        })
        .await
        .unwrap();
    league
        .tournaments
        .transition(tournament.id, TournamentStatus::Qualification)
        .await
        .unwrap();
    tournament.id
}

/// Play a two-group Battle Mode qualification and seed a double elimination
/// bracket from it. Returns the tournament, its qualification matches and
/// the fresh bracket.
async fn bm_bracket(league: &League) -> (i64, Vec<Match>, BracketView) {
    let tournament_id = tournament_in_qualification(league).await;
    let players = create_players(league, 8).await;
    let assignments: Vec<GroupAssignment> = players
        .iter()
        .enumerate()
        .map(|(i, &player_id)| GroupAssignment {
            player_id,
            group_label: if i < 4 { "A" } else { "B" }.to_string(),
            seeding: Some(i as u32 + 1),
        })
        .collect();
    let scheduled = league
        .qualification
        .setup_groups(tournament_id, GameMode::Bm, &assignments)
        .await
        .unwrap();

    let mut played = Vec::with_capacity(scheduled.len());
    for m in &scheduled {
        let (Some(p1), Some(p2)) = (m.player1_id, m.player2_id) else {
            panic!("qualification match without players");
        };
        let (score1, score2) = if p1 < p2 { (3, 1) } else { (1, 3) };
        let updated = league
            .matches
            .update_score(
                m.id,
                ScoreUpdate {
                    expected_version: m.version,
                    score1,
                    score2,
                    rounds: Vec::new(),
                    completed: true,
                },
            )
            .await
            .unwrap();
        played.push(updated);
    }
    league
        .qualification
        .recompute(tournament_id, GameMode::Bm)
        .await
        .unwrap();
    league
        .tournaments
        .transition(tournament_id, TournamentStatus::Finals)
        .await
        .unwrap();
    let view = league
        .finals
        .create_bracket(
            tournament_id,
            GameMode::Bm,
            BracketFormat::DoubleElimination,
            false,
            Actor::System,
        )
        .await
        .unwrap();
    (tournament_id, played, view)
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_battle_mode_qualification_to_champion() {
    let league = setup_league().await;
    let tournament_id = tournament_in_qualification(&league).await;
    let players = create_players(&league, 8).await;

    let assignments: Vec<GroupAssignment> = players
        .iter()
        .enumerate()
        .map(|(i, &player_id)| GroupAssignment {
            player_id,
            group_label: if i % 2 == 0 { "A" } else { "B" }.to_string(),
            seeding: Some(i as u32 + 1),
        })
        .collect();
    let scheduled = league
        .qualification
        .setup_groups(tournament_id, GameMode::Bm, &assignments)
        .await
        .unwrap();
    assert_eq!(scheduled.len(), 12);

    // Lower id always wins 3-1
    for m in &scheduled {
        let (Some(p1), Some(p2)) = (m.player1_id, m.player2_id) else {
            panic!("qualification match without players");
        };
        let (score1, score2) = if p1 < p2 { (3, 1) } else { (1, 3) };
        league
            .matches
            .update_score(
                m.id,
                ScoreUpdate {
                    expected_version: m.version,
                    score1,
                    score2,
                    rounds: Vec::new(),
                    completed: true,
                },
            )
            .await
            .unwrap();
    }
    let groups = league
        .qualification
        .recompute(tournament_id, GameMode::Bm)
        .await
        .unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| g.standings[0].points == 6));

    league
        .tournaments
        .transition(tournament_id, TournamentStatus::Finals)
        .await
        .unwrap();
    let view = league
        .finals
        .create_bracket(
            tournament_id,
            GameMode::Bm,
            BracketFormat::DoubleElimination,
            false,
            Actor::System,
        )
        .await
        .unwrap();
    assert_eq!(view.matches.len(), 15);

    assert!(matches!(
        league
            .finals
            .create_bracket(
                tournament_id,
                GameMode::Bm,
                BracketFormat::DoubleElimination,
                false,
                Actor::System,
            )
            .await,
        Err(FinalsError::BracketExists(GameMode::Bm))
    ));

    // Finals matches only move through the bracket
    assert!(matches!(
        league
            .matches
            .update_score(
                view.matches[0].id,
                ScoreUpdate {
                    expected_version: view.matches[0].version,
                    score1: 5,
                    score2: 1,
                    rounds: Vec::new(),
                    completed: true,
                },
            )
            .await,
        Err(MatchError::BracketMatch(_))
    ));

    let mut bracket = view;
    while !bracket.finished {
        let next = bracket
            .matches
            .iter()
            .find(|m| !m.completed && m.player1_id.is_some() && m.player2_id.is_some())
            .map(|m| m.match_number)
            .unwrap();
        bracket = league
            .finals
            .record_result(
                tournament_id,
                GameMode::Bm,
                next,
                5,
                2,
                Vec::new(),
                Actor::System,
            )
            .await
            .unwrap()
            .bracket;
    }
    assert_eq!(bracket.placements.len(), 8);
    assert_eq!(bracket.champion, Some(bracket.placements[0].player_id));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_participant_reports_confirm_and_dispute() {
    let league = setup_league().await;
    let tournament_id = tournament_in_qualification(&league).await;
    let players = create_players(&league, 3).await;

    let assignments: Vec<GroupAssignment> = players
        .iter()
        .map(|&player_id| GroupAssignment {
            player_id,
            group_label: "A".to_string(),
            seeding: None,
        })
        .collect();
    let scheduled = league
        .qualification
        .setup_groups(tournament_id, GameMode::Mr, &assignments)
        .await
        .unwrap();
    assert_eq!(scheduled.len(), 3);

    let first = &scheduled[0];
    let (p1, p2) = (first.player1_id.unwrap(), first.player2_id.unwrap());
    let report = ScoreReport {
        score1: 3,
        score2: 1,
        rounds: Vec::new(),
    };

    let outcome = league
        .reports
        .report_score(first.id, p1, report.clone(), None)
        .await
        .unwrap();
    assert!(matches!(outcome, ReportOutcome::Pending { .. }));

    let outcome = league
        .reports
        .report_score(first.id, p2, report.clone(), None)
        .await
        .unwrap();
    let ReportOutcome::Confirmed { match_record, .. } = outcome else {
        panic!("expected confirmation");
    };
    assert!(match_record.completed);
    assert_eq!(match_record.version, first.version + 1);

    assert!(matches!(
        league.reports.report_score(first.id, p1, report, None).await,
        Err(ReportError::AlreadyCompleted(_))
    ));

    let second = &scheduled[1];
    let (q1, q2) = (second.player1_id.unwrap(), second.player2_id.unwrap());
    league
        .reports
        .report_score(
            second.id,
            q1,
            ScoreReport {
                score1: 2,
                score2: 2,
                rounds: Vec::new(),
            },
            None,
        )
        .await
        .unwrap();
    let outcome = league
        .reports
        .report_score(
            second.id,
            q2,
            ScoreReport {
                score1: 1,
                score2: 3,
                rounds: Vec::new(),
            },
            None,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, ReportOutcome::Disputed { .. }));

    let outsider = players
        .iter()
        .copied()
        .find(|p| !second.involves(*p))
        .unwrap();
    assert!(matches!(
        league
            .reports
            .report_score(
                second.id,
                outsider,
                ScoreReport {
                    score1: 1,
                    score2: 0,
                    rounds: Vec::new(),
                },
                None,
            )
            .await,
        Err(ReportError::NotAParticipant { .. })
    ));

    let standings = league
        .qualification
        .standings(tournament_id, GameMode::Mr)
        .await
        .unwrap();
    assert_eq!(standings[0].standings[0].points, 2);
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_time_attack_qualification_and_elimination() {
    let league = setup_league().await;
    let tournament_id = tournament_in_qualification(&league).await;
    let players = create_players(&league, 4).await;

    for (i, &player_id) in players.iter().enumerate() {
        for course in ["Mario Circuit 1", "Donut Plains 1"] {
            league
                .qualification
                .record_ta_time(tournament_id, player_id, course, 60_000 + i as u32 * 1_000)
                .await
                .unwrap();
        }
    }
    let ranking = league.qualification.ta_ranking(tournament_id).await.unwrap();
    assert_eq!(ranking.len(), 4);
    assert_eq!(ranking[0].player_id, players[0]);
    assert_eq!(ranking[0].total_ms, 120_000);

    league.phases.start_phase(tournament_id, 1).await.unwrap();
    for round in 0..3u32 {
        let view = league.phases.phase(tournament_id).await.unwrap();
        let times: Vec<RoundTime> = view
            .remaining
            .iter()
            .map(|&player_id| RoundTime {
                player_id,
                time_ms: Some(50_000 + (player_id as u32 % 7) * 100 + round),
            })
            .collect();
        league
            .phases
            .submit_round(tournament_id, "Ghost Valley 1", &times)
            .await
            .unwrap();
    }

    let view = league.phases.phase(tournament_id).await.unwrap();
    assert!(view.finished);
    assert!(view.finished_at.is_some());
    assert_eq!(view.placements.len(), 4);
    assert_eq!(view.rounds.len(), 3);
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_completed_tournament_rejects_finals_until_reopened() {
    let league = setup_league().await;
    let (tournament_id, _, _) = bm_bracket(&league).await;

    league
        .tournaments
        .transition(tournament_id, TournamentStatus::Completed)
        .await
        .unwrap();

    let result = league
        .finals
        .record_result(
            tournament_id,
            GameMode::Bm,
            1,
            5,
            2,
            Vec::new(),
            Actor::System,
        )
        .await;
    assert!(matches!(
        result,
        Err(FinalsError::Tournament(TournamentError::WrongStatus(
            TournamentStatus::Completed
        )))
    ));
    assert!(matches!(
        league
            .finals
            .create_bracket(
                tournament_id,
                GameMode::Bm,
                BracketFormat::DoubleElimination,
                true,
                Actor::System,
            )
            .await,
        Err(FinalsError::Tournament(TournamentError::WrongStatus(_)))
    ));

    // Nothing was written while closed
    let bracket = league.finals.bracket(tournament_id, GameMode::Bm).await.unwrap();
    assert!(bracket.matches.iter().all(|m| !m.completed));

    league.tournaments.reopen(tournament_id).await.unwrap();
    let update = league
        .finals
        .record_result(
            tournament_id,
            GameMode::Bm,
            1,
            5,
            2,
            Vec::new(),
            Actor::System,
        )
        .await
        .unwrap();
    assert!(update.changed.iter().any(|m| m.match_number == 1 && m.completed));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_time_attack_phase_refuses_closed_tournament() {
    let league = setup_league().await;
    let tournament = league
        .tournaments
        .create(CreateTournament {
            name: unique("Draft Cup "),
            event_date: None,
        })
        .await
        .unwrap();

    assert!(matches!(
        league.phases.start_phase(tournament.id, 1).await,
        Err(PhaseError::Tournament(TournamentError::WrongStatus(
            TournamentStatus::Draft
        )))
    ));
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_bracket_rows_cannot_be_deleted_or_restored() {
    let league = setup_league().await;
    let (tournament_id, qualification, view) = bm_bracket(&league).await;
    let first = &view.matches[0];

    assert!(matches!(
        league.matches.delete(first.id).await,
        Err(MatchError::BracketMatch(id)) if id == first.id
    ));
    // Still live and untouched
    assert_eq!(league.matches.get(first.id).await.unwrap(), *first);

    // A reset discards the old rows; they cannot be brought back
    league
        .finals
        .create_bracket(
            tournament_id,
            GameMode::Bm,
            BracketFormat::DoubleElimination,
            true,
            Actor::System,
        )
        .await
        .unwrap();
    assert!(matches!(
        league.matches.restore(first.id).await,
        Err(MatchError::BracketMatch(_))
    ));
    let bracket = league.finals.bracket(tournament_id, GameMode::Bm).await.unwrap();
    assert_eq!(bracket.matches.len(), 15);

    // Qualification rows keep their soft delete
    let played = &qualification[0];
    league.matches.delete(played.id).await.unwrap();
    assert!(matches!(
        league.matches.get(played.id).await,
        Err(MatchError::NotFound(_))
    ));
    assert_eq!(league.matches.restore(played.id).await.unwrap().id, played.id);
}

#[tokio::test]
#[ignore = "Requires database setup"]
async fn test_locked_bracket_fails_fast() {
    let league = setup_league().await;
    let (tournament_id, _, _) = bm_bracket(&league).await;

    // Another transaction holds every bracket row
    let mut holder = league.pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM matches WHERE tournament_id = $1 AND stage = 'finals' FOR UPDATE")
        .bind(tournament_id)
        .fetch_all(&mut *holder)
        .await
        .unwrap();

    let started = Instant::now();
    let result = league
        .finals
        .record_result(
            tournament_id,
            GameMode::Bm,
            1,
            5,
            2,
            Vec::new(),
            Actor::System,
        )
        .await;
    let waited = started.elapsed();
    holder.rollback().await.unwrap();

    assert!(result.is_err());
    assert!(waited >= LOCK_TIMEOUT);
    assert!(waited < DEFAULT_TRANSACTION_TIMEOUT);

    // Once released the same result goes through
    assert!(
        league
            .finals
            .record_result(
                tournament_id,
                GameMode::Bm,
                1,
                5,
                2,
                Vec::new(),
                Actor::System,
            )
            .await
            .is_ok()
    );
}
