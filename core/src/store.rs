//! Record store
//!
//! Append-only, counter-indexed tables. Ids are allocated sequentially from
//! zero and never reused; records are never deleted. Counter and rows live
//! under one lock so a read-then-write is a single atomic step.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ethers::types::Address;
use log::debug;

use crate::error::{CoreError, Result};
use crate::models::{CiphertextHandle, GameRecord};

/// Counter-indexed table of records
#[derive(Debug)]
pub struct RecordStore<R> {
    /// Table name used in log lines
    name: &'static str,

    /// Rows, indexed by id; the counter is the row count
    rows: RwLock<Vec<R>>,
}

impl<R: Clone + Default> RecordStore<R> {
    /// Create an empty store
    pub fn new(name: &'static str) -> Self {
        RecordStore {
            name,
            rows: RwLock::new(Vec::new()),
        }
    }

    // Writers validate before mutating, so a poisoned lock still guards a
    // consistent table.
    fn read(&self) -> RwLockReadGuard<'_, Vec<R>> {
        self.rows.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<R>> {
        self.rows.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next id, store the record built for it and return the id
    pub fn create(&self, build: impl FnOnce(u64) -> R) -> Result<u64> {
        let mut rows = self.write();

        let id = u64::try_from(rows.len())
            .ok()
            .filter(|id| *id < u64::MAX)
            .ok_or_else(|| {
                CoreError::ResourceLimitExceeded(format!("{} id space exhausted", self.name))
            })?;

        rows.push(build(id));
        debug!("{}: created record {}", self.name, id);

        Ok(id)
    }

    /// Record at `id`, or the zero-value record if `id` was never allocated
    pub fn get(&self, id: u64) -> R {
        self.try_get(id).unwrap_or_default()
    }

    /// Record at `id` if allocated
    pub fn try_get(&self, id: u64) -> Option<R> {
        let rows = self.read();
        usize::try_from(id).ok().and_then(|i| rows.get(i).cloned())
    }

    /// Number of ids allocated so far
    pub fn counter(&self) -> u64 {
        self.read().len() as u64
    }

    /// Whether `id` has been allocated
    pub fn contains(&self, id: u64) -> bool {
        id < self.counter()
    }

    /// Mutate the record at `id` in place
    ///
    /// `f` must validate before it mutates: returning an error after a
    /// partial write would leave the record half-updated.
    pub(crate) fn update<T>(&self, id: u64, f: impl FnOnce(&mut R) -> Result<T>) -> Result<T> {
        let mut rows = self.write();
        let row = usize::try_from(id)
            .ok()
            .and_then(|i| rows.get_mut(i))
            .ok_or(CoreError::InvalidId(id))?;
        f(row)
    }
}

impl RecordStore<GameRecord> {
    /// Count a guess by `player` and remember its encrypted result
    ///
    /// Fails with `GameNotActive`, without touching any counter, when the game
    /// is absent or no longer active. Returns the player's new guess count.
    pub fn append_guess(&self, id: u64, player: Address, result: CiphertextHandle) -> Result<u64> {
        let mut rows = self.write();
        let game = usize::try_from(id)
            .ok()
            .and_then(|i| rows.get_mut(i))
            .filter(|game| game.is_active())
            .ok_or(CoreError::GameNotActive(id))?;

        let count = game.guess_counts.entry(player).or_insert(0);
        *count += 1;
        let count = *count;

        game.total_guesses += 1;
        game.last_results.insert(player, result);

        debug!("{}: game {} guess #{} by {:?}", self.name, id, count, player);

        Ok(count)
    }
}
