//! Audit log listing.

use axum::{
    Json,
    extract::{Query, State},
};
use kart_league::{
    audit::{AuditFilter, AuditLog},
    db::Page,
};
use serde::Deserialize;

use super::{AppState, error::ApiResult, page_request};

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub action: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Newest records first
pub async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Page<AuditLog>>> {
    let filter = AuditFilter {
        entity_type: query.entity_type,
        entity_id: query.entity_id,
        action: query.action,
    };
    let page = state
        .audit
        .list(&filter, page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page))
}
