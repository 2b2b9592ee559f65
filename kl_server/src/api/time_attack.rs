//! Time Attack elimination phase handlers.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use kart_league::{
    audit::{AuditEntry, actions},
    time_attack::{PhaseView, RoundTime},
    tournament::TournamentId,
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, error::ApiResult, middleware::AdminUser};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct StartPhasePayload {
    #[serde(default = "default_eliminate_per_round")]
    pub eliminate_per_round: usize,
}

fn default_eliminate_per_round() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct RoundPayload {
    pub course: String,
    pub times: Vec<RoundTime>,
}

/// Start the phase with every ranked qualifier
pub async fn start_phase(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(tournament_id): Path<TournamentId>,
    Json(payload): Json<StartPhasePayload>,
) -> ApiResult<(StatusCode, Json<PhaseView>)> {
    state.tournaments.get(tournament_id).await?;
    let view = state
        .phases
        .start_phase(tournament_id, payload.eliminate_per_round)
        .await?;
    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::TA_PHASE_STARTED,
                "tournament",
                Some(tournament_id),
            )
            .with_details(json!({
                "entrants": view.entrants.len(),
                "eliminate_per_round": view.eliminate_per_round,
            })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_phase(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Json<PhaseView>> {
    Ok(Json(state.phases.phase(tournament_id).await?))
}

/// Play one round: the slowest remaining players (DNFs first) drop out
pub async fn submit_round(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(tournament_id): Path<TournamentId>,
    Json(payload): Json<RoundPayload>,
) -> ApiResult<Json<PhaseView>> {
    let view = state
        .phases
        .submit_round(tournament_id, &payload.course, &payload.times)
        .await?;
    metrics::ta_rounds_total();

    let eliminated = view
        .rounds
        .last()
        .map(|r| r.eliminated.clone())
        .unwrap_or_default();
    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::TA_ROUND_PLAYED,
                "tournament",
                Some(tournament_id),
            )
            .with_details(json!({
                "round": view.rounds.len(),
                "course": payload.course,
                "eliminated": eliminated,
                "finished": view.finished,
            })),
        )
        .await;
    Ok(Json(view))
}

/// Throw the phase away so it can be started again
pub async fn reset_phase(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<StatusCode> {
    state.phases.reset(tournament_id).await?;
    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::ENTITY_DELETED,
                "ta_phase",
                Some(tournament_id),
            ),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}
