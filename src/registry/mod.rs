use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::domain::{Player, PlayerId, PlayerRef, TierShift};
use crate::errors::{LadderError, Result};
use crate::ladder::Tier;
use crate::storage::{Collection, Versioned};

/// The player collection. Only these methods write player records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    version: u64,
    players: Vec<Player>,
}

impl Versioned for Roster {
    const COLLECTION: Collection = Collection::Players;

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Roster {
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// New players start on the lowest tier.
    pub fn register(&mut self, name: &str, account: &str) -> Result<Player> {
        if self.players.iter().any(|p| p.account == account) {
            return Err(LadderError::DuplicateAccount(account.to_string()));
        }

        let player = Player {
            id: self.next_id(),
            name: name.to_string(),
            account: account.to_string(),
            current_tier: Tier::LOWEST,
        };
        self.players.push(player.clone());

        info!("Registered player {} (#{}) at tier {}", player.name, player.id, player.current_tier);
        Ok(player)
    }

    pub fn deregister(&mut self, account: &str) -> Result<Player> {
        let index = self
            .players
            .iter()
            .position(|p| p.account == account)
            .ok_or_else(|| LadderError::NotFound(format!("player with account {}", account)))?;

        let player = self.players.remove(index);
        info!("Removed player {} (#{})", player.name, player.id);
        Ok(player)
    }

    pub fn find(&self, reference: &PlayerRef) -> Option<&Player> {
        let found = reference
            .candidates()
            .iter()
            .find_map(|candidate| self.find_exact(candidate));

        debug!("Lookup {} -> {:?}", reference, found.map(|p| p.id));
        found
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Like `find`, but a miss is an `UnknownPlayer` error.
    pub fn resolve(&self, reference: &PlayerRef) -> Result<&Player> {
        self.find(reference)
            .ok_or_else(|| LadderError::UnknownPlayer(reference.to_string()))
    }

    pub fn set_tier(&mut self, reference: &PlayerRef, tier: Tier) -> Result<TierShift> {
        let id = self
            .find(reference)
            .map(|p| p.id)
            .ok_or_else(|| LadderError::NotFound(format!("player {}", reference)))?;

        let player = self.player_mut(id)?;
        let old_tier = player.current_tier;
        player.current_tier = tier;

        info!("Set tier of {} from {} to {}", player.name, old_tier, tier);
        Ok(TierShift {
            player: player.clone(),
            old_tier,
            new_tier: tier,
        })
    }

    /// Exchanges the tiers of two players and reports both moves, first player first.
    pub fn swap_tiers(
        &mut self,
        first: PlayerId,
        second: PlayerId,
    ) -> Result<(TierShift, TierShift)> {
        let first_tier = self.current_tier(first)?;
        let second_tier = self.current_tier(second)?;

        self.player_mut(first)?.current_tier = second_tier;
        self.player_mut(second)?.current_tier = first_tier;

        let shift = |id: PlayerId, old_tier: Tier, new_tier: Tier| -> Result<TierShift> {
            Ok(TierShift {
                player: self.get(id).cloned().ok_or_else(|| missing(id))?,
                old_tier,
                new_tier,
            })
        };

        Ok((
            shift(first, first_tier, second_tier)?,
            shift(second, second_tier, first_tier)?,
        ))
    }

    /// Players grouped by tier in ladder order; empty tiers are left out.
    pub fn tier_list(&self) -> Vec<(Tier, Vec<&Player>)> {
        Tier::ALL
            .iter()
            .filter_map(|tier| {
                let members: Vec<&Player> = self
                    .players
                    .iter()
                    .filter(|p| p.current_tier == *tier)
                    .collect();
                (!members.is_empty()).then_some((*tier, members))
            })
            .collect()
    }

    // --- Helper Methods ---

    fn find_exact(&self, reference: &PlayerRef) -> Option<&Player> {
        match reference {
            PlayerRef::Id(id) => self.get(*id),
            PlayerRef::Name(name) => self.players.iter().find(|p| &p.name == name),
            PlayerRef::Account(account) => self.players.iter().find(|p| &p.account == account),
            PlayerRef::Token(_) => None,
        }
    }

    fn next_id(&self) -> PlayerId {
        self.players.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }

    fn current_tier(&self, id: PlayerId) -> Result<Tier> {
        self.get(id).map(|p| p.current_tier).ok_or_else(|| missing(id))
    }

    fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| missing(id))
    }
}

fn missing(id: PlayerId) -> LadderError {
    LadderError::NotFound(format!("player #{}", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(names: &[(&str, &str)]) -> Roster {
        let mut roster = Roster::default();
        for (name, account) in names {
            roster.register(name, account).unwrap();
        }
        roster
    }

    #[test]
    fn test_register_assigns_ids_and_lowest_tier() {
        let roster = roster_with(&[("Alice", "100"), ("Bob", "200")]);

        assert_eq!(roster.players()[0].id, 1);
        assert_eq!(roster.players()[1].id, 2);
        assert!(roster.players().iter().all(|p| p.current_tier == Tier::F));
    }

    #[test]
    fn test_ids_follow_highest_existing() {
        let mut roster = roster_with(&[("Alice", "100"), ("Bob", "200"), ("Cara", "300")]);
        roster.deregister("200").unwrap();

        let dan = roster.register("Dan", "400").unwrap();
        assert_eq!(dan.id, 4);
    }

    #[test]
    fn test_duplicate_account_leaves_roster_unchanged() {
        let mut roster = roster_with(&[("Alice", "100")]);
        let before = roster.clone();

        let result = roster.register("Impostor", "100");

        assert!(matches!(result, Err(LadderError::DuplicateAccount(_))));
        assert_eq!(roster, before);
    }

    #[test]
    fn test_deregister_unknown_account() {
        let mut roster = roster_with(&[("Alice", "100")]);
        assert!(matches!(roster.deregister("999"), Err(LadderError::NotFound(_))));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_find_precedence_id_then_name_then_account() {
        // Player #2 is named "1" and Cara's account is "Bob"
        let roster = roster_with(&[("Alice", "555"), ("1", "200"), ("Cara", "Bob")]);

        assert_eq!(roster.find(&PlayerRef::token("1")).unwrap().name, "Alice");
        assert_eq!(roster.find(&PlayerRef::token("Cara")).unwrap().id, 3);
        assert_eq!(roster.find(&PlayerRef::token("555")).unwrap().name, "Alice");
        assert_eq!(roster.find(&PlayerRef::token("Bob")).unwrap().name, "Cara");
        assert!(roster.find(&PlayerRef::token("nobody")).is_none());
    }

    #[test]
    fn test_exact_references_do_not_fall_through() {
        let roster = roster_with(&[("Alice", "100")]);

        assert!(roster.find(&PlayerRef::Name("100".to_string())).is_none());
        assert!(roster.find(&PlayerRef::Account("100".to_string())).is_some());
        assert!(roster.find(&PlayerRef::Id(2)).is_none());
    }

    #[test]
    fn test_set_tier_reports_old_and_new() {
        let mut roster = roster_with(&[("Alice", "100")]);

        let shift = roster.set_tier(&PlayerRef::token("Alice"), Tier::BPlus).unwrap();

        assert_eq!(shift.old_tier, Tier::F);
        assert_eq!(shift.new_tier, Tier::BPlus);
        assert_eq!(roster.players()[0].current_tier, Tier::BPlus);
    }

    #[test]
    fn test_set_tier_unknown_player() {
        let mut roster = roster_with(&[("Alice", "100")]);
        let result = roster.set_tier(&PlayerRef::token("Zed"), Tier::S);
        assert!(matches!(result, Err(LadderError::NotFound(_))));
    }

    #[test]
    fn test_swap_tiers_touches_only_the_pair() {
        let mut roster = roster_with(&[("Alice", "1"), ("Bob", "2"), ("Cara", "3")]);
        roster.set_tier(&PlayerRef::Id(1), Tier::APlus).unwrap();
        roster.set_tier(&PlayerRef::Id(2), Tier::AMinus).unwrap();
        roster.set_tier(&PlayerRef::Id(3), Tier::S).unwrap();

        let (first, second) = roster.swap_tiers(2, 1).unwrap();

        assert_eq!(first.player.name, "Bob");
        assert_eq!(first.new_tier, Tier::APlus);
        assert_eq!(second.new_tier, Tier::AMinus);
        assert_eq!(roster.get(1).unwrap().current_tier, Tier::AMinus);
        assert_eq!(roster.get(2).unwrap().current_tier, Tier::APlus);
        assert_eq!(roster.get(3).unwrap().current_tier, Tier::S);
    }

    #[test]
    fn test_tier_list_groups_in_ladder_order() {
        let mut roster = roster_with(&[("Alice", "1"), ("Bob", "2"), ("Cara", "3")]);
        roster.set_tier(&PlayerRef::Id(3), Tier::S).unwrap();

        let list = roster.tier_list();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].0, Tier::S);
        assert_eq!(list[0].1[0].name, "Cara");
        assert_eq!(list[1].0, Tier::F);
        let names: Vec<&str> = list[1].1.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn test_document_rejects_unknown_tier() {
        let json = r#"{"version": 3, "players": [
            {"id": 1, "name": "A", "account": "1", "current_tier": "Z"}
        ]}"#;
        assert!(serde_json::from_str::<Roster>(json).is_err());
    }
}
