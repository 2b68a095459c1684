use anyhow::Result;
use colored::Colorize;
use std::fmt::Write as _;

use crate::cli::Command;
use crate::domain::{Character, MatchOutcome, Player, PlayerRef, PostRef, TierShift};
use crate::errors::LadderError;
use crate::ladder::Tier;
use crate::recorder::MatchReport;
use crate::services::ladder::Ladder;
use crate::stats::{CharacterRanking, CharacterStats, OverallStats};

/// Runs ladder commands from the command line and prints the results as text
pub struct ConsoleService {
    ladder: Ladder,
}

impl ConsoleService {
    pub fn new(ladder: Ladder) -> Self {
        Self { ladder }
    }

    pub fn run(&self, command: &Command) -> Result<()> {
        let output = self.execute(command)?;
        println!("{}", output);
        Ok(())
    }

    fn execute(&self, command: &Command) -> Result<String> {
        let output = match command {
            Command::AddPlayer { name, account } => {
                let player = self.ladder.register(name, account)?;
                format!(
                    "Player {} added with tier {} {}",
                    player.name,
                    player.current_tier.glyph(),
                    player.current_tier
                )
            }
            Command::RemovePlayer { account } => {
                let player = self.ladder.deregister(account)?;
                format!("Player {} removed", player.name)
            }
            Command::AddGame {
                player1,
                player2,
                character1,
                character2,
                ranked,
                winner,
                stocks,
                percentage,
            } => {
                let report = MatchReport {
                    player1: PlayerRef::token(player1.as_str()),
                    player2: PlayerRef::token(player2.as_str()),
                    character1: character1.clone(),
                    character2: character2.clone(),
                    ranked: *ranked,
                    winner: PlayerRef::token(winner.as_str()),
                    stocks: *stocks,
                    percentage: *percentage,
                };
                render_outcome(&self.ladder.record_match(&report)?)
            }
            Command::RemoveGame { id } => {
                let removed = self.ladder.remove_match(*id)?;
                match removed.post_ref {
                    Some(PostRef(post)) => format!("Game {} removed (retract post {})", id, post),
                    None => format!("Game {} removed", id),
                }
            }
            Command::AttachPost { id, post_ref } => {
                self.ladder.attach_post(*id, PostRef(post_ref.clone()))?;
                format!("Post {} attached to game {}", post_ref, id)
            }
            Command::TierList => render_tier_list(&self.ladder.tier_list()?),
            Command::Stats {
                player,
                character,
                characters,
                limit,
            } => {
                let reference = PlayerRef::token(player.as_str());
                if *characters {
                    let name = self.player_name(&reference)?;
                    render_top_characters(&name, &self.ladder.top_characters(&reference, *limit)?)
                } else if let Some(character) = character {
                    render_character_stats(&self.ladder.character_stats(&reference, character)?)
                } else {
                    render_overall_stats(&self.ladder.overall_stats(&reference)?)
                }
            }
            Command::SetTier { player, tier } => {
                let tier: Tier = tier.parse()?;
                let shift = self.ladder.set_tier(&PlayerRef::token(player.as_str()), tier)?;
                render_tier_shift(&shift)
            }
            Command::Characters => render_characters(self.ladder.characters().all()),
            Command::Completions { .. } => {
                anyhow::bail!("Completions are printed without opening the ladder")
            }
        };
        Ok(output)
    }

    fn player_name(&self, reference: &PlayerRef) -> Result<String> {
        let player = self
            .ladder
            .find(reference)?
            .ok_or_else(|| LadderError::UnknownPlayer(reference.to_string()))?;
        Ok(player.name)
    }
}

fn ranked_label(ranked: bool) -> &'static str {
    if ranked { "Ranked" } else { "Unranked" }
}

pub fn render_outcome(outcome: &MatchOutcome) -> String {
    let summary = &outcome.summary;
    let [first, second] = &summary.sides;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        format!("Game {} | {}", summary.match_id, ranked_label(summary.ranked)).bold()
    );
    let _ = writeln!(out, "------------------");
    let _ = writeln!(
        out,
        "Players: {} as {} {} versus {} as {} {}",
        first.player_name,
        first.character_emoji,
        first.character_name,
        second.player_name,
        second.character_emoji,
        second.character_name
    );
    let _ = write!(
        out,
        "Result: {} won with {} stocks and {}%",
        summary.winner_name, summary.stocks, summary.percentage
    );

    if summary.ranked {
        match &outcome.tier_change {
            Some(change) => {
                let _ = write!(
                    out,
                    "\n{} overtook {} and is now {} {} tier!",
                    change.promoted.player.name,
                    change.demoted.player.name,
                    change.promoted.new_tier.glyph(),
                    change.promoted.new_tier
                );
            }
            None => out.push_str("\nNo tier updates"),
        }
    }
    out
}

pub fn render_tier_list(tiers: &[(Tier, Vec<Player>)]) -> String {
    let mut out = format!("{}\n-------------------", "Current Tier List:".bold());
    for (tier, members) in tiers {
        let names: Vec<&str> = members.iter().map(|p| p.name.as_str()).collect();
        let _ = write!(out, "\n{} {}: {}", tier.glyph(), tier, names.join(", "));
    }
    out
}

pub fn render_overall_stats(stats: &OverallStats) -> String {
    format!(
        "{}\n--------------------------\nOverall Winrate: {:.2}%\nRanked Winrate: {:.2}%\nUnranked Winrate: {:.2}%\nCurrent Tier: {} {}",
        format!("{}'s Stats:", stats.player.name).bold(),
        stats.win_rate,
        stats.ranked_win_rate,
        stats.unranked_win_rate,
        stats.current_tier.glyph(),
        stats.current_tier
    )
}

pub fn render_character_stats(stats: &CharacterStats) -> String {
    format!(
        "{}\n------------------------------------\nTotal Games Played: {}\nOverall Winrate: {:.2}%\nRanked Games Played: {}\nRanked Winrate: {:.2}%\nUnranked Games Played: {}\nUnranked Winrate: {:.2}%",
        format!(
            "{} as {} {}:",
            stats.player.name, stats.character.emoji, stats.character.name
        )
        .bold(),
        stats.total_games,
        stats.overall_win_rate,
        stats.ranked_games,
        stats.ranked_win_rate,
        stats.unranked_games,
        stats.unranked_win_rate
    )
}

pub fn render_top_characters(player_name: &str, rankings: &[CharacterRanking]) -> String {
    let mut out = format!(
        "{}\n---------------------------------------",
        format!("{}'s Top Characters:", player_name).bold()
    );
    for ranking in rankings {
        let _ = write!(
            out,
            "\n{} {}: {:.2}%",
            ranking.character.emoji, ranking.character.name, ranking.win_rate
        );
    }
    out
}

pub fn render_tier_shift(shift: &TierShift) -> String {
    format!(
        "Set {}'s tier from {} {} to {} {}",
        shift.player.name,
        shift.old_tier.glyph(),
        shift.old_tier,
        shift.new_tier.glyph(),
        shift.new_tier
    )
}

pub fn render_characters(characters: &[Character]) -> String {
    characters
        .iter()
        .map(|c| format!("{:>3} {} {}", c.id, c.emoji, c.name))
        .collect::<Vec<_>>()
        .join("\n")
}
