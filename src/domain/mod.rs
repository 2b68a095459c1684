pub mod models;
pub mod outcomes;
pub mod refs;

pub use models::*;
pub use outcomes::{MatchOutcome, MatchSummary, SideSummary, TierChange, TierShift};
pub use refs::PlayerRef;
