//! Match handlers.
//!
//! Qualification scores are written here with optimistic locking. Finals
//! matches are rejected with `409`; their results go through the finals
//! routes so players advance.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use kart_league::{
    audit::{AuditEntry, actions},
    db::{Page, SoftDeletable},
    matches::{Match, MatchFilter, MatchId, ScoreUpdate},
    modes::{GameMode, Stage},
    reporting::ScoreEntry,
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, error::ApiResult, middleware::AdminUser, page_request};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub tournament_id: Option<i64>,
    pub mode: Option<GameMode>,
    pub stage: Option<Stage>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Match>>> {
    let filter = MatchFilter {
        tournament_id: query.tournament_id,
        mode: query.mode,
        stage: query.stage,
    };
    let page = state
        .matches
        .list(filter, page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
) -> ApiResult<Json<Match>> {
    Ok(Json(state.matches.get(id).await?))
}

/// Write a qualification score guarded by `expected_version`.
///
/// Standings of the match's mode are recomputed afterwards.
///
/// # Errors
///
/// - `409 Conflict`: The match changed since `expected_version`, it is a finals match,
///   or the tournament no longer accepts scores
/// - `400 Bad Request`: Score not valid for the mode
pub async fn update_score(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<MatchId>,
    Json(update): Json<ScoreUpdate>,
) -> ApiResult<Json<Match>> {
    let current = state.matches.get(id).await?;
    state
        .tournaments
        .ensure_accepts_scores(current.tournament_id)
        .await?;

    let updated = state.matches.update_score(id, update).await?;
    state
        .qualification
        .recompute(updated.tournament_id, updated.mode)
        .await?;

    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::SCORE_UPDATED,
                SoftDeletable::Match.entity(),
                Some(id),
            )
            .with_details(json!({
                "score1": updated.score1,
                "score2": updated.score2,
                "completed": updated.completed,
                "version": updated.version,
            })),
        )
        .await;
    Ok(Json(updated))
}

/// Every participant report of a match, oldest first
pub async fn list_reports(
    State(state): State<AppState>,
    Path(id): Path<MatchId>,
) -> ApiResult<Json<Vec<ScoreEntry>>> {
    state.matches.get(id).await?;
    Ok(Json(state.reports.reports(id).await?))
}

pub async fn delete_match(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<MatchId>,
) -> ApiResult<StatusCode> {
    let m = state.matches.get(id).await?;
    state.matches.delete(id).await?;
    state.cache.invalidate(m.tournament_id, m.mode).await;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::ENTITY_DELETED,
            SoftDeletable::Match.entity(),
            Some(id),
        ))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_match(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<MatchId>,
) -> ApiResult<Json<Match>> {
    let m = state.matches.restore(id).await?;
    state.cache.invalidate(m.tournament_id, m.mode).await;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::ENTITY_RESTORED,
            SoftDeletable::Match.entity(),
            Some(id),
        ))
        .await;
    Ok(Json(m))
}
