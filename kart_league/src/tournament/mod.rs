//! Tournaments: lifecycle, soft delete and participant tokens.
//!
//! A tournament moves `draft → qualification → finals → completed`. The
//! only way back is [`TournamentManager::reopen`], which returns a completed
//! tournament to finals so a bracket result can be corrected.
//!
//! ## Example
//!
//! ```no_run
//! use kart_league::db::Database;
//! use kart_league::tournament::{CreateTournament, TournamentManager, TournamentStatus};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let tournaments = TournamentManager::new(Arc::new(db.pool().clone()));
//!
//!     let cup = tournaments
//!         .create(CreateTournament {
//!             name: "Spring Cup".to_string(),
//!             event_date: None,
//!         })
//!         .await?;
//!     tournaments.transition(cup.id, TournamentStatus::Qualification).await?;
//!     let token = tournaments.issue_token(cup.id, 12).await?;
//!     println!("Participant token: {}", token.token);
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::{TournamentError, TournamentManager, TournamentResult, check_token};
pub use models::{
    CreateTournament, ParticipantToken, Tournament, TournamentId, TournamentStatus,
    UpdateTournament,
};
