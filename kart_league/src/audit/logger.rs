//! Append-only audit logger.

use super::models::{AuditEntry, AuditFilter, AuditLog};
use crate::db::{Page, PageRequest};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;

/// Writes and lists audit records
#[derive(Clone)]
pub struct AuditLogger {
    pool: Arc<PgPool>,
}

fn audit_from_row(row: &PgRow) -> AuditLog {
    AuditLog {
        id: row.get("id"),
        user_id: row.get("user_id"),
        actor: row.get("actor"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        details: row.get("details"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    }
}

impl AuditLogger {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Append a record. Failures are logged and swallowed so that auditing
    /// never fails the operation being audited.
    pub async fn record(&self, entry: AuditEntry) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, actor, action, entity_type, entity_id, details, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.actor.user_id())
        .bind(entry.actor.label())
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(self.pool.as_ref())
        .await;

        if let Err(e) = result {
            log::error!(
                "Failed to write audit log {} on {}/{:?}: {}",
                entry.action,
                entry.entity_type,
                entry.entity_id,
                e
            );
        }
    }

    /// List records, newest first
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLog>, sqlx::Error> {
        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total FROM audit_logs
            WHERE ($1::TEXT IS NULL OR entity_type = $1)
              AND ($2::BIGINT IS NULL OR entity_id = $2)
              AND ($3::TEXT IS NULL OR action = $3)
            "#,
        )
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(&filter.action)
        .fetch_one(self.pool.as_ref())
        .await?
        .get("total");

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, actor, action, entity_type, entity_id, details,
                   ip_address, user_agent, created_at
            FROM audit_logs
            WHERE ($1::TEXT IS NULL OR entity_type = $1)
              AND ($2::BIGINT IS NULL OR entity_id = $2)
              AND ($3::TEXT IS NULL OR action = $3)
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&filter.entity_type)
        .bind(filter.entity_id)
        .bind(&filter.action)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool.as_ref())
        .await?;

        let items = rows.iter().map(audit_from_row).collect();
        Ok(Page::new(items, page, total.max(0) as u64))
    }
}
