use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ladder::Tier;

pub type PlayerId = u32;
pub type MatchId = u32;
pub type CharacterId = u32;

/// Registered player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// External account reference, unique across players
    pub account: String,
    pub current_tier: Tier,
}

/// Selectable character, provisioned out of band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub emoji: String,
}

/// One side of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contender {
    pub player_id: PlayerId,
    pub character_id: CharacterId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner_id: PlayerId,
    /// Stocks the winner had left
    pub stocks: u32,
    /// Damage percentage the winner ended on
    pub percentage: f64,
}

/// Opaque handle to an announcement posted by an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostRef(pub String);

/// Recorded match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub contenders: [Contender; 2],
    pub ranked: bool,
    pub result: MatchResult,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_ref: Option<PostRef>,
}

impl Match {
    pub fn involves(&self, player_id: PlayerId) -> bool {
        self.contender_for(player_id).is_some()
    }

    /// The contender slot piloted by the given player, if they played.
    pub fn contender_for(&self, player_id: PlayerId) -> Option<&Contender> {
        self.contenders.iter().find(|c| c.player_id == player_id)
    }

    pub fn won_by(&self, player_id: PlayerId) -> bool {
        self.result.winner_id == player_id
    }
}
