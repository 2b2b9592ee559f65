//! Audit log models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action names written to the audit log
pub mod actions {
    pub const TOURNAMENT_CREATED: &str = "tournament.created";
    pub const TOURNAMENT_STATUS: &str = "tournament.status_changed";
    pub const TOKEN_ISSUED: &str = "tournament.token_issued";
    pub const TOKEN_REVOKED: &str = "tournament.token_revoked";
    pub const ENTITY_DELETED: &str = "entity.deleted";
    pub const ENTITY_RESTORED: &str = "entity.restored";
    pub const GROUPS_CREATED: &str = "qualification.groups_created";
    pub const SCORE_UPDATED: &str = "match.score_updated";
    pub const SCORE_REPORTED: &str = "match.score_reported";
    pub const SCORE_CONFIRMED: &str = "match.score_confirmed";
    pub const SCORE_DISPUTED: &str = "match.score_disputed";
    pub const BRACKET_CREATED: &str = "finals.bracket_created";
    pub const BRACKET_RESULT: &str = "finals.result_recorded";
    pub const TA_PHASE_STARTED: &str = "ta.phase_started";
    pub const TA_ROUND_PLAYED: &str = "ta.round_played";
    pub const ADMIN_LOGIN: &str = "auth.login";
}

/// Who did something
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// Authenticated admin
    Admin { user_id: i64 },
    /// Participant using the tournament token
    Participant { player_id: i64 },
    /// The service itself
    System,
}

impl Actor {
    pub fn label(&self) -> String {
        match self {
            Actor::Admin { user_id } => format!("admin:{user_id}"),
            Actor::Participant { player_id } => format!("player:{player_id}"),
            Actor::System => "system".to_string(),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Actor::Admin { user_id } => Some(*user_id),
            _ => None,
        }
    }
}

/// A new audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: Actor,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    pub fn new(actor: Actor, action: &str, entity_type: &str, entity_id: Option<i64>) -> Self {
        Self {
            actor,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: serde_json::Value::Object(Default::default()),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// A stored audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter for listing audit records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub action: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_actor_labels() {
        assert_eq!(Actor::Admin { user_id: 3 }.label(), "admin:3");
        assert_eq!(Actor::Participant { player_id: 9 }.label(), "player:9");
        assert_eq!(Actor::System.label(), "system");
        assert_eq!(Actor::System.user_id(), None);
    }

    #[test]
    fn test_entry_builder() {
        let entry = AuditEntry::new(Actor::System, actions::SCORE_UPDATED, "match", Some(4))
            .with_details(json!({"score1": 3}))
            .with_client(Some("10.0.0.1".to_string()), None);
        assert_eq!(entry.action, "match.score_updated");
        assert_eq!(entry.details["score1"], 3);
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
    }
}
