use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::LadderError;

/// Skill tiers, strongest first. The declaration order is the ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "S")]
    S,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "D-")]
    DMinus,
    #[serde(rename = "F")]
    F,
}

impl Tier {
    pub const ALL: [Tier; 10] = [
        Tier::S,
        Tier::APlus,
        Tier::AMinus,
        Tier::BPlus,
        Tier::BMinus,
        Tier::CPlus,
        Tier::CMinus,
        Tier::DPlus,
        Tier::DMinus,
        Tier::F,
    ];

    /// Where newly registered players start.
    pub const LOWEST: Tier = Tier::F;

    pub fn label(&self) -> &'static str {
        match self {
            Tier::S => "S",
            Tier::APlus => "A+",
            Tier::AMinus => "A-",
            Tier::BPlus => "B+",
            Tier::BMinus => "B-",
            Tier::CPlus => "C+",
            Tier::CMinus => "C-",
            Tier::DPlus => "D+",
            Tier::DMinus => "D-",
            Tier::F => "F",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Tier::S => "🟣",
            Tier::APlus => "🟡",
            Tier::AMinus => "🟠",
            Tier::BPlus => "🔴",
            Tier::BMinus => "⚪",
            Tier::CPlus => "🔵",
            Tier::CMinus => "🟢",
            Tier::DPlus => "⭕",
            Tier::DMinus => "⚫",
            Tier::F => "🟤",
        }
    }

    /// Looks a tier up by its position on the ladder.
    pub fn from_ordinal(index: usize) -> Result<Tier, LadderError> {
        Tier::ALL
            .get(index)
            .copied()
            .ok_or_else(|| LadderError::InvalidTier(format!("#{}", index)))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .iter()
            .find(|tier| tier.label() == s)
            .copied()
            .ok_or_else(|| LadderError::InvalidTier(s.to_string()))
    }
}

/// Index of the tier on the ladder, 0 being the strongest.
pub fn ordinal(tier: Tier) -> usize {
    tier as usize
}

/// Two tiers touch when they are direct neighbours on the ladder.
pub fn touching(a: Tier, b: Tier) -> bool {
    ordinal(a).abs_diff(ordinal(b)) == 1
}

/// The stronger of two tiers.
pub fn higher_of(a: Tier, b: Tier) -> Tier {
    if ordinal(a) <= ordinal(b) { a } else { b }
}
