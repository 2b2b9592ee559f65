//! Qualification stage.
//!
//! Head-to-head modes play a round robin inside groups; the top players
//! across groups are seeded into the finals bracket. Time Attack players
//! set a time on each course and are ranked by total time.

pub mod manager;
pub mod models;
pub mod schedule;
pub mod standings;

pub use manager::{QualificationError, QualificationManager, QualificationResult};
pub use models::{GroupAssignment, GroupStandings, MatchOutcome, QualificationRecord, Standing};
pub use schedule::{Pairing, round_robin};
pub use standings::{compute_standings, cross_group_seeds, rank_time_trials};
