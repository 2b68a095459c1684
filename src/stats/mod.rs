//! Win-rate statistics derived on demand from the full match history.
//!
//! Nothing here is cached, so every figure reflects the history as it is now.
//! Rates are percentages and are 0 whenever there are no games to divide by.

use log::warn;
use serde::Serialize;

use crate::catalog::CharacterCatalog;
use crate::domain::{Character, CharacterId, Match, Player, PlayerRef};
use crate::errors::{LadderError, Result};
use crate::ladder::Tier;
use crate::recorder::History;
use crate::registry::Roster;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub games: u32,
    pub wins: u32,
}

impl Tally {
    fn add(&mut self, won: bool) {
        self.games += 1;
        if won {
            self.wins += 1;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.games) * 100.0
        }
    }
}

/// Tallies split by ranked flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitTally {
    pub overall: Tally,
    pub ranked: Tally,
    pub unranked: Tally,
}

impl SplitTally {
    fn of<'a>(player: &Player, matches: impl Iterator<Item = &'a Match>) -> Self {
        let mut split = SplitTally::default();
        for m in matches {
            let won = m.won_by(player.id);
            split.overall.add(won);
            if m.ranked {
                split.ranked.add(won);
            } else {
                split.unranked.add(won);
            }
        }
        split
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStats {
    pub player: Player,
    pub current_tier: Tier,
    pub win_rate: f64,
    pub ranked_win_rate: f64,
    pub unranked_win_rate: f64,
    pub tally: SplitTally,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterStats {
    pub player: Player,
    pub character: Character,
    pub total_games: u32,
    pub overall_win_rate: f64,
    pub ranked_games: u32,
    pub ranked_win_rate: f64,
    pub unranked_games: u32,
    pub unranked_win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRanking {
    pub character: Character,
    pub games: u32,
    pub wins: u32,
    pub win_rate: f64,
}

pub fn overall_stats(
    roster: &Roster,
    history: &History,
    reference: &PlayerRef,
) -> Result<OverallStats> {
    let player = roster.resolve(reference)?.clone();
    let tally = SplitTally::of(&player, history.matches().iter().filter(|m| m.involves(player.id)));

    Ok(OverallStats {
        current_tier: player.current_tier,
        win_rate: tally.overall.win_rate(),
        ranked_win_rate: tally.ranked.win_rate(),
        unranked_win_rate: tally.unranked.win_rate(),
        tally,
        player,
    })
}

pub fn character_stats(
    roster: &Roster,
    history: &History,
    catalog: &CharacterCatalog,
    reference: &PlayerRef,
    character_name: &str,
) -> Result<CharacterStats> {
    let player = roster.resolve(reference)?.clone();
    let character = catalog
        .find(character_name)
        .cloned()
        .ok_or_else(|| LadderError::UnknownCharacter(character_name.to_string()))?;

    let piloted = history.matches().iter().filter(|m| {
        m.contenders
            .iter()
            .any(|c| c.player_id == player.id && c.character_id == character.id)
    });
    let tally = SplitTally::of(&player, piloted);

    Ok(CharacterStats {
        player,
        character,
        total_games: tally.overall.games,
        overall_win_rate: tally.overall.win_rate(),
        ranked_games: tally.ranked.games,
        ranked_win_rate: tally.ranked.win_rate(),
        unranked_games: tally.unranked.games,
        unranked_win_rate: tally.unranked.win_rate(),
    })
}

/// Characters the player has used, best win rate first.
///
/// Ties keep the order in which the characters first show up in the history.
pub fn top_characters(
    roster: &Roster,
    history: &History,
    catalog: &CharacterCatalog,
    reference: &PlayerRef,
    limit: usize,
) -> Result<Vec<CharacterRanking>> {
    let player = roster.resolve(reference)?;

    let mut per_character: Vec<(CharacterId, Tally)> = Vec::new();
    for m in history.matches() {
        let Some(contender) = m.contender_for(player.id) else {
            continue;
        };
        let won = m.won_by(player.id);
        match per_character.iter_mut().find(|(id, _)| *id == contender.character_id) {
            Some((_, tally)) => tally.add(won),
            None => {
                let mut tally = Tally::default();
                tally.add(won);
                per_character.push((contender.character_id, tally));
            }
        }
    }

    per_character.sort_by(|a, b| b.1.win_rate().total_cmp(&a.1.win_rate()));
    per_character.truncate(limit);

    Ok(per_character
        .into_iter()
        .map(|(id, tally)| CharacterRanking {
            character: lookup_character(catalog, id),
            games: tally.games,
            wins: tally.wins,
            win_rate: tally.win_rate(),
        })
        .collect())
}

fn lookup_character(catalog: &CharacterCatalog, id: CharacterId) -> Character {
    catalog.get(id).cloned().unwrap_or_else(|| {
        warn!("Match history references character {} missing from the catalog", id);
        Character {
            id,
            name: format!("Character #{}", id),
            emoji: "❔".to_string(),
        }
    })
}
