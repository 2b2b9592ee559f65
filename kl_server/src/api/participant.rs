//! Participant score reporting.
//!
//! Players authenticate with the tournament's participant token instead of
//! an account:
//!
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/tournaments/3/matches/41/report \
//!   -H "x-tournament-token: 9f2c..." \
//!   -H "Content-Type: application/json" \
//!   -d '{"player_id": 12, "score1": 3, "score2": 1}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use kart_league::{
    matches::MatchId,
    modes::RoundResult,
    player::PlayerId,
    reporting::{ReportOutcome, ScoreReport},
    security::{RateLimitResult, rate_limiter::SCORE_REPORT},
    tournament::{TournamentError, TournamentId},
};
use serde::Deserialize;

use super::{
    AppState,
    error::{ApiError, ApiResult},
    extract::{ClientIp, TournamentToken},
};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct ReportPayload {
    /// The reporting player, one of the match's two players
    pub player_id: PlayerId,
    pub score1: u32,
    pub score2: u32,
    #[serde(default)]
    pub rounds: Vec<RoundResult>,
}

/// Append a score report.
///
/// When both players have reported the same score the match is confirmed;
/// different scores leave it open as disputed.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing, wrong or expired token
/// - `403 Forbidden`: The reporter does not play this match
/// - `409 Conflict`: Match already completed or tournament not accepting scores
/// - `429 Too Many Requests`: Too many reports from this client
pub async fn report_score(
    State(state): State<AppState>,
    Path((tournament_id, match_id)): Path<(TournamentId, MatchId)>,
    client_ip: ClientIp,
    TournamentToken(token): TournamentToken,
    Json(payload): Json<ReportPayload>,
) -> ApiResult<Json<ReportOutcome>> {
    let identity = format!(
        "{}:{}",
        tournament_id,
        client_ip.identity(&payload.player_id.to_string())
    );
    if let Ok(RateLimitResult::Locked { retry_after }) = state
        .rate_limiter
        .check_and_record(SCORE_REPORT, &identity)
        .await
    {
        metrics::rate_limit_hits_total(SCORE_REPORT);
        return Err(ApiError::RateLimited { retry_after });
    }

    if let Err(e) = state.tournaments.validate_token(tournament_id, &token).await {
        if matches!(e, TournamentError::TokenInvalid | TournamentError::TokenExpired) {
            logging::log_security_event(
                "invalid_participant_token",
                None,
                client_ip.0.as_deref(),
                &format!("{} for tournament {}", e, tournament_id),
            );
        }
        return Err(e.into());
    }

    // The token only covers its own tournament
    let m = state.matches.get(match_id).await?;
    if m.tournament_id != tournament_id {
        return Err(ApiError::NotFound(format!("Match not found: {}", match_id)));
    }

    let report = ScoreReport {
        score1: payload.score1,
        score2: payload.score2,
        rounds: payload.rounds,
    };
    let outcome = state
        .reports
        .report_score(match_id, payload.player_id, report, client_ip.0)
        .await?;

    metrics::score_reports_total(match &outcome {
        ReportOutcome::Pending { .. } => "pending",
        ReportOutcome::Confirmed { .. } => "confirmed",
        ReportOutcome::Disputed { .. } => "disputed",
    });
    Ok(Json(outcome))
}
