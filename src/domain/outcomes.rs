use serde::Serialize;

use super::models::{Match, MatchId, Player};
use crate::ladder::Tier;

/// A player's tier moving from one band to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierShift {
    pub player: Player,
    pub old_tier: Tier,
    pub new_tier: Tier,
}

/// Tiers swapped by an upset in a ranked match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierChange {
    pub promoted: TierShift,
    pub demoted: TierShift,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideSummary {
    pub player_name: String,
    pub character_name: String,
    pub character_emoji: String,
}

/// Everything an adapter needs to announce a recorded match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub ranked: bool,
    pub sides: [SideSummary; 2],
    pub winner_name: String,
    pub stocks: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub record: Match,
    pub summary: MatchSummary,
    pub tier_change: Option<TierChange>,
}

impl MatchOutcome {
    pub fn tier_changed(&self) -> bool {
        self.tier_change.is_some()
    }
}
