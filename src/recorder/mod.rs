use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::catalog::CharacterCatalog;
use crate::domain::{
    Character, Contender, Match, MatchId, MatchOutcome, MatchResult, MatchSummary, Player,
    PlayerId, PlayerRef, PostRef, SideSummary, TierChange,
};
use crate::errors::{LadderError, Result};
use crate::ladder::{higher_of, touching};
use crate::registry::Roster;
use crate::storage::{Collection, Versioned};

/// The match collection, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    version: u64,
    matches: Vec<Match>,
}

impl Versioned for History {
    const COLLECTION: Collection = Collection::Matches;

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl History {
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == id)
    }

    /// Deletes a match. Tier swaps it caused are left in place.
    pub fn remove(&mut self, id: MatchId) -> Result<Match> {
        let index = self
            .matches
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| missing(id))?;

        let removed = self.matches.remove(index);
        info!("Removed match {}", removed.id);
        Ok(removed)
    }

    /// The one mutation a recorded match accepts.
    pub fn attach_post(&mut self, id: MatchId, post_ref: PostRef) -> Result<()> {
        let record = self
            .matches
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| missing(id))?;

        record.post_ref = Some(post_ref);
        info!("Attached post to match {}", id);
        Ok(())
    }

    fn next_id(&self) -> MatchId {
        self.matches.iter().map(|m| m.id).max().unwrap_or(0) + 1
    }
}

fn missing(id: MatchId) -> LadderError {
    LadderError::NotFound(format!("match {}", id))
}

/// A reported match as submitted by a caller.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub player1: PlayerRef,
    pub player2: PlayerRef,
    pub character1: String,
    pub character2: String,
    pub ranked: bool,
    pub winner: PlayerRef,
    pub stocks: i64,
    pub percentage: f64,
}

/// Validates a report, appends the match and applies any tier swap.
///
/// Nothing is written to `roster` or `history` unless every check passes.
pub fn record_match(
    roster: &mut Roster,
    history: &mut History,
    catalog: &CharacterCatalog,
    report: &MatchReport,
    recorded_at: DateTime<Utc>,
) -> Result<MatchOutcome> {
    let first = roster.resolve(&report.player1)?.clone();
    let second = roster.resolve(&report.player2)?.clone();
    if first.id == second.id {
        return Err(LadderError::DuplicateContender(first.id));
    }

    let first_character = resolve_character(catalog, &report.character1)?;
    let second_character = resolve_character(catalog, &report.character2)?;

    if report.ranked && !touching(first.current_tier, second.current_tier) {
        warn!(
            "Rejected ranked match between {} ({}) and {} ({})",
            first.name, first.current_tier, second.name, second.current_tier
        );
        return Err(LadderError::TierMismatch(
            first.current_tier.to_string(),
            second.current_tier.to_string(),
        ));
    }

    let winner = roster
        .find(&report.winner)
        .filter(|w| w.id == first.id || w.id == second.id)
        .cloned()
        .ok_or_else(|| LadderError::InvalidWinner(report.winner.to_string()))?;

    let result = validate_result(winner.id, report.stocks, report.percentage)?;

    let upset = if report.ranked {
        find_upset(&first, &second, winner.id)?
    } else {
        None
    };

    let record = Match {
        id: history.next_id(),
        contenders: [
            Contender {
                player_id: first.id,
                character_id: first_character.id,
            },
            Contender {
                player_id: second.id,
                character_id: second_character.id,
            },
        ],
        ranked: report.ranked,
        result,
        recorded_at,
        post_ref: None,
    };
    history.matches.push(record.clone());

    let tier_change = match upset {
        Some((lower, higher)) => {
            let (promoted, demoted) = roster.swap_tiers(lower, higher)?;
            info!(
                "{} overtook {} and is now {}",
                promoted.player.name, demoted.player.name, promoted.new_tier
            );
            Some(TierChange { promoted, demoted })
        }
        None => None,
    };

    info!(
        "Recorded {} match {}: {} beat {}",
        if record.ranked { "ranked" } else { "unranked" },
        record.id,
        winner.name,
        if winner.id == first.id { &second.name } else { &first.name }
    );

    let summary = MatchSummary {
        match_id: record.id,
        ranked: record.ranked,
        sides: [
            side_summary(&first, &first_character),
            side_summary(&second, &second_character),
        ],
        winner_name: winner.name.clone(),
        stocks: record.result.stocks,
        percentage: record.result.percentage,
    };

    Ok(MatchOutcome {
        record,
        summary,
        tier_change,
    })
}

fn resolve_character(catalog: &CharacterCatalog, name: &str) -> Result<Character> {
    catalog
        .find(name)
        .cloned()
        .ok_or_else(|| LadderError::UnknownCharacter(name.to_string()))
}

fn validate_result(winner_id: PlayerId, stocks: i64, percentage: f64) -> Result<MatchResult> {
    let stocks = u32::try_from(stocks).map_err(|_| {
        LadderError::InvalidResult(format!("stocks must be non-negative, got {}", stocks))
    })?;

    if !percentage.is_finite() || percentage < 0.0 {
        return Err(LadderError::InvalidResult(format!(
            "percentage must be non-negative, got {}",
            percentage
        )));
    }

    Ok(MatchResult {
        winner_id,
        stocks,
        percentage,
    })
}

/// Returns `(lower, higher)` when the lower-tier contender won.
fn find_upset(
    first: &Player,
    second: &Player,
    winner_id: PlayerId,
) -> Result<Option<(PlayerId, PlayerId)>> {
    if first.current_tier == second.current_tier {
        return Err(LadderError::invariant(format!(
            "ranked contenders {} and {} share tier {}",
            first.id, second.id, first.current_tier
        )));
    }

    let higher_tier = higher_of(first.current_tier, second.current_tier);
    let (higher, lower) = if higher_tier == first.current_tier {
        (first, second)
    } else {
        (second, first)
    };

    Ok((winner_id == lower.id).then_some((lower.id, higher.id)))
}

fn side_summary(player: &Player, character: &Character) -> SideSummary {
    SideSummary {
        player_name: player.name.clone(),
        character_name: character.name.clone(),
        character_emoji: character.emoji.clone(),
    }
}
