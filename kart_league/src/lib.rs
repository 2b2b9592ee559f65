//! # Kart League
//!
//! Tournament scoring and bracket management for a kart racing league.
//!
//! A tournament is played in four game modes. Battle Mode, Match Race and
//! Grand Prix run a round-robin qualification inside groups followed by a
//! finals bracket; Time Attack ranks players by total qualification time
//! and then runs an elimination phase.
//!
//! ## Core Modules
//!
//! - [`bracket`]: Double and single elimination engine (no I/O)
//! - [`time_attack`]: Time Attack times and the elimination phase
//! - [`modes`]: Game modes and their scoring rules
//! - [`qualification`]: Group setup, round-robin schedule and standings
//! - [`finals`]: Bracket creation and result recording for every mode
//! - [`reporting`]: Participant score reports with token authentication
//!
//! ## Supporting Modules
//!
//! - [`tournament`], [`player`], [`matches`]: records with soft delete
//! - [`db`]: Pool, pagination, optimistic locking and timeouts
//! - [`cache`], [`audit`], [`security`], [`auth`], [`export`]
//!
//! ## Example
//!
//! ```
//! use kart_league::bracket::{Bracket, BracketFormat, BracketSystem};
//!
//! let seeds: Vec<i64> = (1..=8).collect();
//! let mut bracket = Bracket::generate(BracketFormat::SingleElimination, &seeds).unwrap();
//! bracket.record_result(1, 3, 1).unwrap();
//! assert!(!bracket.is_finished());
//! ```

pub mod audit;
pub mod auth;
pub mod bracket;
pub mod cache;
pub mod db;
pub mod export;
pub mod finals;
pub mod matches;
pub mod modes;
pub mod player;
pub mod qualification;
pub mod reporting;
pub mod security;
pub mod time_attack;
pub mod tournament;

pub use bracket::{Bracket, BracketFormat, BracketSystem, Placement, PlayerId};
pub use modes::{GameMode, RoundResult, Stage};
