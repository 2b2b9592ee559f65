//! Finals bracket handlers.
//!
//! One set of handlers serves Battle Mode, Match Race and Grand Prix; the
//! mode comes from the `{mode}` path segment. Time Attack has no bracket and
//! answers `400`.
//!
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/tournaments/3/finals/mr/matches/5 \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"score1": 3, "score2": 1}'
//! ```

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use kart_league::{
    bracket::BracketFormat,
    finals::{BracketView, FinalsUpdate},
    modes::{GameMode, RoundResult},
    tournament::TournamentId,
};
use serde::Deserialize;
use std::time::Instant;

use super::{AppState, error::ApiResult, middleware::AdminUser};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct CreateBracketPayload {
    #[serde(default = "default_format")]
    pub format: BracketFormat,
    /// Replace an existing bracket
    #[serde(default)]
    pub reset: bool,
}

fn default_format() -> BracketFormat {
    BracketFormat::DoubleElimination
}

#[derive(Debug, Deserialize)]
pub struct ResultPayload {
    pub score1: u32,
    pub score2: u32,
    #[serde(default)]
    pub rounds: Vec<RoundResult>,
}

/// Seed a bracket from qualification standings
pub async fn create_bracket(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
    Json(payload): Json<CreateBracketPayload>,
) -> ApiResult<(StatusCode, Json<BracketView>)> {
    state.tournaments.get(tournament_id).await?;
    let view = state
        .finals
        .create_bracket(
            tournament_id,
            mode,
            payload.format,
            payload.reset,
            admin.actor(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Current bracket with placements once finished
pub async fn get_bracket(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Json<BracketView>> {
    Ok(Json(state.finals.bracket(tournament_id, mode).await?))
}

/// Record or correct the result of bracket match `number`
pub async fn record_result(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path((tournament_id, mode, number)): Path<(TournamentId, GameMode, u32)>,
    Json(payload): Json<ResultPayload>,
) -> ApiResult<Json<FinalsUpdate>> {
    let start = Instant::now();
    let update = state
        .finals
        .record_result(
            tournament_id,
            mode,
            number,
            payload.score1,
            payload.score2,
            payload.rounds,
            admin.actor(),
        )
        .await?;

    metrics::bracket_advancements_total(mode.code(), update.changed.len().saturating_sub(1));
    logging::log_performance(
        "finals_record_result",
        start.elapsed().as_millis() as u64,
        Some(mode.code()),
    );
    Ok(Json(update))
}
