//! Qualification handlers: group setup, standings and Time Attack times.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use kart_league::{
    audit::{AuditEntry, actions},
    matches::Match,
    modes::GameMode,
    player::PlayerId,
    qualification::{GroupAssignment, GroupStandings, QualificationRecord},
    time_attack::{TaEntry, TaStanding, parse_time},
    tournament::TournamentId,
};
use serde::Deserialize;
use serde_json::json;

use super::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AdminUser,
};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct SetupGroupsPayload {
    pub groups: Vec<GroupAssignment>,
}

/// A qualification time, either as `m:ss.mmm` text or in milliseconds
#[derive(Debug, Deserialize)]
pub struct TaTimePayload {
    pub player_id: PlayerId,
    pub course: String,
    pub time: Option<String>,
    pub time_ms: Option<u32>,
}

impl TaTimePayload {
    fn millis(&self) -> ApiResult<u32> {
        match (&self.time, self.time_ms) {
            (_, Some(ms)) => Ok(ms),
            (Some(text), None) => parse_time(text)
                .map_err(|e| ApiError::BadRequest(e.to_string())),
            (None, None) => Err(ApiError::BadRequest(
                "Either time or time_ms is required".to_string(),
            )),
        }
    }
}

/// Assign players to groups and generate every group's round-robin schedule
pub async fn setup_groups(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
    Json(payload): Json<SetupGroupsPayload>,
) -> ApiResult<(StatusCode, Json<Vec<Match>>)> {
    state.tournaments.get(tournament_id).await?;
    let matches = state
        .qualification
        .setup_groups(tournament_id, mode, &payload.groups)
        .await?;

    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::GROUPS_CREATED,
                "tournament",
                Some(tournament_id),
            )
            .with_details(json!({
                "mode": mode.code(),
                "players": payload.groups.len(),
                "matches": matches.len(),
            })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(matches)))
}

/// Group tables computed from completed matches (cached)
pub async fn standings(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Json<Vec<GroupStandings>>> {
    let groups = state.qualification.standings(tournament_id, mode).await?;
    metrics::cache_stats(state.cache.stats());
    Ok(Json(groups))
}

/// Stored per-player aggregates
pub async fn records(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Json<Vec<QualificationRecord>>> {
    Ok(Json(state.qualification.records(tournament_id, mode).await?))
}

/// Recompute and persist standings, e.g. after a manual correction
pub async fn recompute(
    State(state): State<AppState>,
    Path((tournament_id, mode)): Path<(TournamentId, GameMode)>,
) -> ApiResult<Json<Vec<GroupStandings>>> {
    Ok(Json(
        state.qualification.recompute(tournament_id, mode).await?,
    ))
}

/// Record or overwrite a Time Attack qualification time
pub async fn record_ta_time(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
    Json(payload): Json<TaTimePayload>,
) -> ApiResult<Json<TaEntry>> {
    let time_ms = payload.millis()?;
    state.tournaments.ensure_accepts_scores(tournament_id).await?;
    let entry = state
        .qualification
        .record_ta_time(tournament_id, payload.player_id, &payload.course, time_ms)
        .await?;
    Ok(Json(entry))
}

pub async fn ta_entries(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Json<Vec<TaEntry>>> {
    Ok(Json(state.qualification.ta_entries(tournament_id).await?))
}

/// Ranking by total time over all courses (cached)
pub async fn ta_ranking(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> ApiResult<Json<Vec<TaStanding>>> {
    let ranking = state.qualification.ta_ranking(tournament_id).await?;
    metrics::cache_stats(state.cache.stats());
    Ok(Json(ranking))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(time: Option<&str>, time_ms: Option<u32>) -> TaTimePayload {
        TaTimePayload {
            player_id: 1,
            course: "Mario Circuit 1".to_string(),
            time: time.map(str::to_string),
            time_ms,
        }
    }

    #[test]
    fn test_time_text_is_parsed() {
        assert_eq!(payload(Some("1:02.345"), None).millis().unwrap(), 62_345);
    }

    #[test]
    fn test_time_ms_wins_over_text() {
        assert_eq!(payload(Some("1:02.345"), Some(500)).millis().unwrap(), 500);
    }

    #[test]
    fn test_missing_time_is_rejected() {
        assert!(matches!(
            payload(None, None).millis(),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            payload(Some("fast"), None).millis(),
            Err(ApiError::BadRequest(_))
        ));
    }
}
