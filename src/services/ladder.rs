use chrono::Utc;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::catalog::CharacterCatalog;
use crate::config::settings::AppConfig;
use crate::domain::{Match, MatchId, MatchOutcome, Player, PlayerRef, PostRef, TierShift};
use crate::errors::{LadderError, Result};
use crate::guard::Guarded;
use crate::ladder::Tier;
use crate::recorder::{self, History, MatchReport};
use crate::registry::Roster;
use crate::stats::{self, CharacterRanking, CharacterStats, OverallStats};
use crate::storage::{
    self, load_document, DocumentStore, DocumentWrite, MemoryStore, Versioned, VersionConflict,
};

/// The ranking ladder engine.
///
/// Each operation holds the lock of every collection it touches for its whole
/// duration, reloads those collections from the store, works on a copy,
/// commits the copy, and only then replaces the in-memory snapshot. Players
/// are always locked before matches.
///
/// Commits are compare-and-swap on the document version, so another process
/// writing the same storage in between turns into a retry of the whole
/// operation on fresh documents rather than a lost write.
pub struct Ladder {
    store: Box<dyn DocumentStore>,
    catalog: CharacterCatalog,
    players: Guarded<Roster>,
    matches: Guarded<History>,
    lock_timeout: Duration,
    top_characters_limit: usize,
}

impl Ladder {
    pub fn open(
        store: Box<dyn DocumentStore>,
        catalog: CharacterCatalog,
        config: &AppConfig,
    ) -> Result<Self> {
        let roster: Roster = load_document(store.as_ref())?;
        let history: History = load_document(store.as_ref())?;

        info!(
            "Opened ladder: {} players (v{}), {} matches (v{}), {} characters",
            roster.len(),
            roster.version(),
            history.len(),
            history.version(),
            catalog.len()
        );

        let timeout = config.guard.lock_timeout();
        Ok(Self {
            store,
            catalog,
            players: Guarded::new("players", roster, timeout),
            matches: Guarded::new("matches", history, timeout),
            lock_timeout: timeout,
            top_characters_limit: config.stats.top_characters_limit,
        })
    }

    /// Store and catalog chosen by configuration
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = storage::open_store(&config.storage, config.guard.lock_timeout())?;
        let catalog = match &config.stats.characters_path {
            Some(path) => CharacterCatalog::load(path)?,
            None => CharacterCatalog::bundled()?,
        };
        Ok(Self::open(store, catalog, config)?)
    }

    pub fn in_memory(catalog: CharacterCatalog) -> Result<Self> {
        Self::open(Box::new(MemoryStore::new()), catalog, &AppConfig::new())
    }

    pub fn characters(&self) -> &CharacterCatalog {
        &self.catalog
    }

    // --- Players ---

    pub fn register(&self, name: &str, account: &str) -> Result<Player> {
        let mut roster = self.players.lock()?;
        self.serialized(|| {
            self.refresh(&mut *roster)?;
            let mut next = roster.clone();
            let player = next.register(name, account)?;
            self.commit_one(&mut *roster, next)?;
            Ok(player)
        })
    }

    pub fn deregister(&self, account: &str) -> Result<Player> {
        let mut roster = self.players.lock()?;
        self.serialized(|| {
            self.refresh(&mut *roster)?;
            let mut next = roster.clone();
            let player = next.deregister(account)?;
            self.commit_one(&mut *roster, next)?;
            Ok(player)
        })
    }

    pub fn find(&self, reference: &PlayerRef) -> Result<Option<Player>> {
        let mut roster = self.players.lock()?;
        self.refresh(&mut *roster)?;
        Ok(roster.find(reference).cloned())
    }

    pub fn players(&self) -> Result<Vec<Player>> {
        let mut roster = self.players.lock()?;
        self.refresh(&mut *roster)?;
        Ok(roster.players().to_vec())
    }

    /// Manual override; the returned shift is what an adapter syncs roles from.
    pub fn set_tier(&self, reference: &PlayerRef, tier: Tier) -> Result<TierShift> {
        let mut roster = self.players.lock()?;
        self.serialized(|| {
            self.refresh(&mut *roster)?;
            let mut next = roster.clone();
            let shift = next.set_tier(reference, tier)?;
            self.commit_one(&mut *roster, next)?;
            Ok(shift)
        })
    }

    pub fn tier_list(&self) -> Result<Vec<(Tier, Vec<Player>)>> {
        let mut roster = self.players.lock()?;
        self.refresh(&mut *roster)?;
        Ok(roster
            .tier_list()
            .into_iter()
            .map(|(tier, members)| (tier, members.into_iter().cloned().collect()))
            .collect())
    }

    // --- Matches ---

    pub fn record_match(&self, report: &MatchReport) -> Result<MatchOutcome> {
        let mut roster = self.players.lock()?;
        let mut history = self.matches.lock()?;

        self.serialized(|| {
            self.refresh(&mut *roster)?;
            self.refresh(&mut *history)?;

            let mut next_roster = roster.clone();
            let mut next_history = history.clone();
            let outcome = recorder::record_match(
                &mut next_roster,
                &mut next_history,
                &self.catalog,
                report,
                Utc::now(),
            )?;

            if outcome.tier_changed() {
                self.commit_both(&mut *roster, next_roster, &mut *history, next_history)?;
            } else {
                self.commit_one(&mut *history, next_history)?;
            }
            Ok(outcome)
        })
    }

    /// Deletes a match and hands back the record, including any post to retract.
    /// Tier swaps the match caused stay in place.
    pub fn remove_match(&self, id: MatchId) -> Result<Match> {
        let mut history = self.matches.lock()?;
        self.serialized(|| {
            self.refresh(&mut *history)?;
            let mut next = history.clone();
            let removed = next.remove(id)?;
            self.commit_one(&mut *history, next)?;
            Ok(removed)
        })
    }

    pub fn attach_post(&self, id: MatchId, post_ref: PostRef) -> Result<()> {
        let mut history = self.matches.lock()?;
        self.serialized(|| {
            self.refresh(&mut *history)?;
            let mut next = history.clone();
            next.attach_post(id, post_ref.clone())?;
            self.commit_one(&mut *history, next)
        })
    }

    pub fn match_record(&self, id: MatchId) -> Result<Option<Match>> {
        let mut history = self.matches.lock()?;
        self.refresh(&mut *history)?;
        Ok(history.get(id).cloned())
    }

    pub fn matches(&self) -> Result<Vec<Match>> {
        let mut history = self.matches.lock()?;
        self.refresh(&mut *history)?;
        Ok(history.matches().to_vec())
    }

    // --- Stats ---

    pub fn overall_stats(&self, reference: &PlayerRef) -> Result<OverallStats> {
        let mut roster = self.players.lock()?;
        let mut history = self.matches.lock()?;
        self.refresh(&mut *roster)?;
        self.refresh(&mut *history)?;
        stats::overall_stats(&roster, &history, reference)
    }

    pub fn character_stats(
        &self,
        reference: &PlayerRef,
        character: &str,
    ) -> Result<CharacterStats> {
        let mut roster = self.players.lock()?;
        let mut history = self.matches.lock()?;
        self.refresh(&mut *roster)?;
        self.refresh(&mut *history)?;
        stats::character_stats(&roster, &history, &self.catalog, reference, character)
    }

    /// `limit` defaults to the configured top-characters limit
    pub fn top_characters(
        &self,
        reference: &PlayerRef,
        limit: Option<usize>,
    ) -> Result<Vec<CharacterRanking>> {
        let mut roster = self.players.lock()?;
        let mut history = self.matches.lock()?;
        self.refresh(&mut *roster)?;
        self.refresh(&mut *history)?;
        let limit = limit.unwrap_or(self.top_characters_limit);
        stats::top_characters(&roster, &history, &self.catalog, reference, limit)
    }

    // --- Helper Methods ---

    /// Reruns `op` while its commit loses a version race, up to the lock timeout.
    fn serialized<R>(&self, mut op: impl FnMut() -> Result<R>) -> Result<R> {
        let started = Instant::now();
        loop {
            match op() {
                Err(LadderError::Conflict(collection)) => {
                    if started.elapsed() >= self.lock_timeout {
                        warn!("Giving up after repeated concurrent changes to {}", collection);
                        return Err(LadderError::Conflict(collection));
                    }
                    debug!("{} changed concurrently, retrying", collection);
                }
                result => return result,
            }
        }
    }

    /// Replaces the snapshot with what the store holds now.
    fn refresh<T: Versioned>(&self, current: &mut T) -> Result<()> {
        let stored: T = load_document(self.store.as_ref())?;
        if stored.version() != current.version() {
            debug!(
                "{} document moved from v{} to v{} in storage",
                T::COLLECTION,
                current.version(),
                stored.version()
            );
        }
        *current = stored;
        Ok(())
    }

    fn commit_one<T: Versioned>(&self, current: &mut T, mut next: T) -> Result<()> {
        let write = stage(&mut next)?;
        self.store.commit(&[write]).map_err(store_error)?;
        *current = next;
        Ok(())
    }

    fn commit_both(
        &self,
        roster: &mut Roster,
        mut next_roster: Roster,
        history: &mut History,
        mut next_history: History,
    ) -> Result<()> {
        let writes = [stage(&mut next_history)?, stage(&mut next_roster)?];
        self.store.commit(&writes).map_err(store_error)?;
        *roster = next_roster;
        *history = next_history;
        Ok(())
    }
}

fn stage<T: Versioned>(next: &mut T) -> Result<DocumentWrite> {
    let expected = next.version();
    next.set_version(expected + 1);
    Ok(DocumentWrite::encode(next, expected)?)
}

fn store_error(err: anyhow::Error) -> LadderError {
    match err.downcast_ref::<VersionConflict>() {
        Some(conflict) => LadderError::Conflict(conflict.collection.to_string()),
        None => LadderError::Storage(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::StorageBackend;
    use crate::storage::Collection;
    use std::sync::Arc;
    use std::thread;

    fn catalog() -> CharacterCatalog {
        CharacterCatalog::bundled().unwrap()
    }

    fn report(p1: &str, p2: &str, ranked: bool, winner: &str) -> MatchReport {
        MatchReport {
            player1: PlayerRef::token(p1),
            player2: PlayerRef::token(p2),
            character1: "Marth".to_string(),
            character2: "Sheik".to_string(),
            ranked,
            winner: PlayerRef::token(winner),
            stocks: 3,
            percentage: 42.0,
        }
    }

    fn tier_of(ladder: &Ladder, name: &str) -> Tier {
        ladder.find(&PlayerRef::token(name)).unwrap().unwrap().current_tier
    }

    /// X on A+, Y on A- (adjacent)
    fn seed_adjacent_pair(ladder: &Ladder) {
        ladder.register("X", "1001").unwrap();
        ladder.register("Y", "1002").unwrap();
        ladder.set_tier(&PlayerRef::token("X"), Tier::APlus).unwrap();
        ladder.set_tier(&PlayerRef::token("Y"), Tier::AMinus).unwrap();
    }

    fn adjacent_pair() -> Ladder {
        let ladder = Ladder::in_memory(catalog()).unwrap();
        seed_adjacent_pair(&ladder);
        ladder
    }

    struct FailingStore;

    impl DocumentStore for FailingStore {
        fn load(&self, _collection: Collection) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        fn commit(&self, _writes: &[DocumentWrite]) -> anyhow::Result<()> {
            anyhow::bail!("disk unplugged")
        }
    }

    /// Accepts single-document commits. A multi-document commit fails, after
    /// applying its first `applied` writes when that is non-zero.
    struct PairFailingStore {
        inner: MemoryStore,
        applied: usize,
    }

    impl DocumentStore for PairFailingStore {
        fn load(&self, collection: Collection) -> anyhow::Result<Option<String>> {
            self.inner.load(collection)
        }

        fn commit(&self, writes: &[DocumentWrite]) -> anyhow::Result<()> {
            if writes.len() < 2 {
                return self.inner.commit(writes);
            }
            if self.applied > 0 {
                self.inner.commit(&writes[..self.applied])?;
            }
            anyhow::bail!("disk full after {} of {} documents", self.applied, writes.len())
        }
    }

    struct ConflictingStore;

    impl DocumentStore for ConflictingStore {
        fn load(&self, _collection: Collection) -> anyhow::Result<Option<String>> {
            Ok(None)
        }

        fn commit(&self, writes: &[DocumentWrite]) -> anyhow::Result<()> {
            Err(VersionConflict {
                collection: writes[0].collection,
                expected: writes[0].expected,
                found: writes[0].expected + 1,
            }
            .into())
        }
    }

    fn pair_failing_ladder(applied: usize) -> Ladder {
        let store = PairFailingStore {
            inner: MemoryStore::new(),
            applied,
        };
        let ladder = Ladder::open(Box::new(store), catalog(), &AppConfig::new()).unwrap();
        seed_adjacent_pair(&ladder);
        ladder
    }

    #[test]
    fn test_upset_scenario() {
        let ladder = adjacent_pair();

        let outcome = ladder.record_match(&report("X", "Y", true, "Y")).unwrap();

        assert!(outcome.tier_changed());
        assert_eq!(tier_of(&ladder, "X"), Tier::AMinus);
        assert_eq!(tier_of(&ladder, "Y"), Tier::APlus);
    }

    #[test]
    fn test_favourite_scenario() {
        let ladder = adjacent_pair();

        let outcome = ladder.record_match(&report("X", "Y", true, "X")).unwrap();

        assert!(!outcome.tier_changed());
        assert_eq!(tier_of(&ladder, "X"), Tier::APlus);
        assert_eq!(tier_of(&ladder, "Y"), Tier::AMinus);
    }

    #[test]
    fn test_removal_keeps_tier_swap() {
        let ladder = adjacent_pair();
        let outcome = ladder.record_match(&report("X", "Y", true, "Y")).unwrap();
        ladder
            .attach_post(outcome.record.id, PostRef("announcement-1".to_string()))
            .unwrap();
        let stored = ladder.match_record(outcome.record.id).unwrap().unwrap();
        assert_eq!(stored.post_ref, Some(PostRef("announcement-1".to_string())));

        let removed = ladder.remove_match(outcome.record.id).unwrap();

        assert_eq!(removed.post_ref, Some(PostRef("announcement-1".to_string())));
        assert!(ladder.matches().unwrap().is_empty());
        let stats = ladder.overall_stats(&PlayerRef::token("Y")).unwrap();
        assert_eq!(stats.tally.overall.games, 0);
        assert_eq!(tier_of(&ladder, "Y"), Tier::APlus);
    }

    #[test]
    fn test_rejected_match_leaves_state_unchanged() {
        let ladder = adjacent_pair();
        ladder.register("Z", "1003").unwrap();
        let players_before = ladder.players().unwrap();

        let result = ladder.record_match(&report("X", "Z", true, "Z"));

        assert!(matches!(result, Err(LadderError::TierMismatch(_, _))));
        assert!(ladder.matches().unwrap().is_empty());
        assert_eq!(ladder.players().unwrap(), players_before);
    }

    #[test]
    fn test_duplicate_account() {
        let ladder = adjacent_pair();
        let result = ladder.register("Other", "1001");
        assert!(matches!(result, Err(LadderError::DuplicateAccount(_))));
        assert_eq!(ladder.players().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_commit_keeps_snapshot() {
        let ladder = Ladder::open(Box::new(FailingStore), catalog(), &AppConfig::new()).unwrap();

        let result = ladder.register("X", "1001");

        assert!(matches!(result, Err(LadderError::Storage(_))));
        assert!(ladder.players().unwrap().is_empty());
    }

    #[test]
    fn test_failed_upset_commit_changes_neither_collection() {
        let ladder = pair_failing_ladder(0);
        let players_before = ladder.players().unwrap();

        let result = ladder.record_match(&report("X", "Y", true, "Y"));

        assert!(matches!(result, Err(LadderError::Storage(_))));
        assert_eq!(ladder.players().unwrap(), players_before);
        assert_eq!(tier_of(&ladder, "X"), Tier::APlus);
        assert_eq!(tier_of(&ladder, "Y"), Tier::AMinus);
        assert!(ladder.matches().unwrap().is_empty());

        // The favourite winning touches only the history and still goes through
        let outcome = ladder.record_match(&report("X", "Y", true, "X")).unwrap();
        assert_eq!(outcome.record.id, 1);
    }

    #[test]
    fn test_torn_commit_shows_what_storage_holds() {
        let ladder = pair_failing_ladder(1);

        let result = ladder.record_match(&report("X", "Y", true, "Y"));

        // Only the match document made it; the next read reflects exactly that
        assert!(matches!(result, Err(LadderError::Storage(_))));
        assert_eq!(ladder.matches().unwrap().len(), 1);
        assert_eq!(tier_of(&ladder, "X"), Tier::APlus);
        assert_eq!(tier_of(&ladder, "Y"), Tier::AMinus);
    }

    #[test]
    fn test_endless_conflict_gives_up_after_timeout() {
        let mut config = AppConfig::new();
        config.guard.lock_timeout_ms = 20;
        let ladder = Ladder::open(Box::new(ConflictingStore), catalog(), &config).unwrap();

        let result = ladder.register("X", "1001");

        assert!(matches!(result, Err(LadderError::Conflict(ref c)) if c == "players"));
        assert!(ladder.players().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_disjoint_matches() {
        let ladder = Arc::new(Ladder::in_memory(catalog()).unwrap());
        for (name, account) in [("A", "1"), ("B", "2"), ("C", "3"), ("D", "4")] {
            ladder.register(name, account).unwrap();
        }

        let handles: Vec<_> = [("A", "B"), ("C", "D")]
            .into_iter()
            .map(|(p1, p2)| {
                let ladder = Arc::clone(&ladder);
                thread::spawn(move || ladder.record_match(&report(p1, p2, false, p1)).unwrap())
            })
            .collect();

        let mut ids: Vec<MatchId> = handles
            .into_iter()
            .map(|h| h.join().unwrap().record.id)
            .collect();
        ids.sort();

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ladder.matches().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_registrations_get_distinct_ids() {
        let ladder = Arc::new(Ladder::in_memory(catalog()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ladder = Arc::clone(&ladder);
                thread::spawn(move || {
                    let account = format!("{}", 5000 + i);
                    ladder.register(&format!("P{}", i), &account).unwrap().id
                })
            })
            .collect();

        let mut ids: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, (1..=8).collect::<Vec<u32>>());
    }

    fn reopen_keeps_state(config: &AppConfig) {
        {
            let ladder = Ladder::from_config(config).unwrap();
            ladder.register("X", "1001").unwrap();
            ladder.register("Y", "1002").unwrap();
            ladder.set_tier(&PlayerRef::token("X"), Tier::S).unwrap();
            ladder.set_tier(&PlayerRef::token("Y"), Tier::APlus).unwrap();
            ladder.record_match(&report("X", "Y", true, "Y")).unwrap();
        }

        let ladder = Ladder::from_config(config).unwrap();
        assert_eq!(tier_of(&ladder, "Y"), Tier::S);
        assert_eq!(tier_of(&ladder, "X"), Tier::APlus);
        assert_eq!(ladder.matches().unwrap().len(), 1);
        assert_eq!(ladder.players.lock().unwrap().version(), 5);
        assert_eq!(ladder.matches.lock().unwrap().version(), 1);
    }

    /// Two engines on one storage location, as two CLI invocations would be
    fn shared_storage_keeps_every_write(config: &AppConfig) {
        let first = Arc::new(Ladder::from_config(config).unwrap());
        let second = Arc::new(Ladder::from_config(config).unwrap());

        let alice = first.register("Alice", "100").unwrap();
        let bob = second.register("Bob", "200").unwrap();
        assert_eq!((alice.id, bob.id), (1, 2));
        assert_eq!(first.players().unwrap().len(), 2);

        let handles: Vec<_> = [Arc::clone(&first), Arc::clone(&second)]
            .into_iter()
            .enumerate()
            .map(|(side, ladder)| {
                thread::spawn(move || {
                    (0..4)
                        .map(|i| {
                            let account = format!("{}{}", side, i);
                            ladder.register(&format!("P{}", account), &account).unwrap().id
                        })
                        .collect::<Vec<u32>>()
                })
            })
            .collect();

        let mut ids: Vec<u32> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort();
        assert_eq!(ids, (3..=10).collect::<Vec<u32>>());

        drop(first);
        drop(second);
        let reopened = Ladder::from_config(config).unwrap();
        assert_eq!(reopened.players().unwrap().len(), 10);
        assert_eq!(reopened.players.lock().unwrap().version(), 10);
    }

    fn json_config(name: &str) -> AppConfig {
        let dir = std::env::temp_dir().join(format!(
            "smash_ladder_service_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        let mut config = AppConfig::new();
        config.storage.backend = StorageBackend::Json;
        config.storage.path = dir;
        config
    }

    fn sqlite_config(name: &str) -> AppConfig {
        let path = std::env::temp_dir().join(format!(
            "smash_ladder_service_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let mut config = AppConfig::new();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = path;
        config
    }

    #[test]
    fn test_json_backend_persists() {
        let config = json_config("json");

        reopen_keeps_state(&config);

        // Cleanup
        std::fs::remove_dir_all(&config.storage.path).unwrap();
    }

    #[test]
    fn test_sqlite_backend_persists() {
        let config = sqlite_config("sqlite");

        reopen_keeps_state(&config);

        // Cleanup
        std::fs::remove_file(&config.storage.path).unwrap();
    }

    #[test]
    fn test_json_backend_shared_between_ladders() {
        let config = json_config("json_shared");

        shared_storage_keeps_every_write(&config);

        // Cleanup
        std::fs::remove_dir_all(&config.storage.path).unwrap();
    }

    #[test]
    fn test_sqlite_backend_shared_between_ladders() {
        let config = sqlite_config("sqlite_shared");

        shared_storage_keeps_every_write(&config);

        // Cleanup
        std::fs::remove_file(&config.storage.path).unwrap();
    }
}
