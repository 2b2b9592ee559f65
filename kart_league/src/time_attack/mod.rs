//! Time Attack: qualification times and the elimination phase.

pub mod elimination;
pub mod manager;
pub mod models;

pub use elimination::EliminationPhase;
pub use manager::{PhaseError, PhaseManager, PhaseResult, PhaseView};
pub use models::{
    EliminationRound, RoundTime, TaEntrant, TaEntry, TaError, TaResult, TaStanding, format_time,
    parse_time,
};
