//! Tournament administration handlers.
//!
//! Reads are public; every write requires an admin token and is audit logged.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use kart_league::{
    audit::{AuditEntry, actions},
    db::{Page, SoftDeletable},
    tournament::{
        CreateTournament, ParticipantToken, Tournament, TournamentId, TournamentStatus,
        UpdateTournament,
    },
};
use serde::Deserialize;
use serde_json::json;

use super::{AppState, error::ApiResult, middleware::AdminUser, page_request};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<TournamentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionPayload {
    pub status: TournamentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueTokenPayload {
    /// Defaults to the configured participant token lifetime
    pub ttl_hours: Option<i64>,
}

pub async fn list_tournaments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Tournament>>> {
    let page = state
        .tournaments
        .list(query.status, page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page))
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Tournament>> {
    Ok(Json(state.tournaments.get(id).await?))
}

pub async fn create_tournament(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Json(payload): Json<CreateTournament>,
) -> ApiResult<(StatusCode, Json<Tournament>)> {
    let tournament = state.tournaments.create(payload).await?;
    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::TOURNAMENT_CREATED,
                SoftDeletable::Tournament.entity(),
                Some(tournament.id),
            )
            .with_details(json!({ "name": tournament.name })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(tournament)))
}

pub async fn update_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
    Json(payload): Json<UpdateTournament>,
) -> ApiResult<Json<Tournament>> {
    Ok(Json(state.tournaments.update(id, payload).await?))
}

/// Move a tournament one step forward (`draft → qualification → finals → completed`)
pub async fn transition_tournament(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<TournamentId>,
    Json(payload): Json<TransitionPayload>,
) -> ApiResult<Json<Tournament>> {
    let tournament = state.tournaments.transition(id, payload.status).await?;
    audit_status(&state, &admin, &tournament).await;
    Ok(Json(tournament))
}

/// Reopen a completed tournament into finals so results can be corrected
pub async fn reopen_tournament(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Tournament>> {
    let tournament = state.tournaments.reopen(id).await?;
    audit_status(&state, &admin, &tournament).await;
    Ok(Json(tournament))
}

async fn audit_status(state: &AppState, admin: &AdminUser, tournament: &Tournament) {
    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::TOURNAMENT_STATUS,
                SoftDeletable::Tournament.entity(),
                Some(tournament.id),
            )
            .with_details(json!({ "status": tournament.status.as_str() })),
        )
        .await;
}

pub async fn delete_tournament(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<TournamentId>,
) -> ApiResult<StatusCode> {
    state.tournaments.delete(id).await?;
    state.cache.invalidate_tournament(id).await;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::ENTITY_DELETED,
            SoftDeletable::Tournament.entity(),
            Some(id),
        ))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_tournament(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Tournament>> {
    let tournament = state.tournaments.restore(id).await?;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::ENTITY_RESTORED,
            SoftDeletable::Tournament.entity(),
            Some(id),
        ))
        .await;
    Ok(Json(tournament))
}

/// Issue a fresh participant token; the previous one stops working.
///
/// The token is only ever shown in this response.
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<TournamentId>,
    payload: Option<Json<IssueTokenPayload>>,
) -> ApiResult<(StatusCode, Json<ParticipantToken>)> {
    let ttl_hours = payload
        .and_then(|Json(p)| p.ttl_hours)
        .unwrap_or(state.participant_token_ttl_hours);
    let token = state.tournaments.issue_token(id, ttl_hours).await?;
    state
        .audit
        .record(
            AuditEntry::new(
                admin.actor(),
                actions::TOKEN_ISSUED,
                SoftDeletable::Tournament.entity(),
                Some(id),
            )
            .with_details(json!({ "ttl_hours": ttl_hours, "expires_at": token.expires_at })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(token)))
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminUser>,
    Path(id): Path<TournamentId>,
) -> ApiResult<StatusCode> {
    state.tournaments.revoke_token(id).await?;
    state
        .audit
        .record(AuditEntry::new(
            admin.actor(),
            actions::TOKEN_REVOKED,
            SoftDeletable::Tournament.entity(),
            Some(id),
        ))
        .await;
    Ok(StatusCode::NO_CONTENT)
}
