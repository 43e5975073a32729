//! Ledger events emitted by the engines

use std::sync::{PoisonError, RwLock};

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Event appended by a successful state-changing operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A comparison record was stored
    NumbersCompared {
        /// Record id
        compare_id: u64,
        /// Submitter
        player: Address,
        /// Ledger timestamp
        timestamp: u64,
    },

    /// A game was created
    GameCreated {
        /// Game id
        game_id: u64,
        /// Host
        host: Address,
        /// Ledger timestamp
        timestamp: u64,
    },

    /// A guess was counted
    GuessMade {
        /// Game id
        game_id: u64,
        /// Guessing player
        player: Address,
        /// Player's guess number, starting at 1
        guess_number: u64,
    },

    /// A win was claimed and accepted
    GameWon {
        /// Game id
        game_id: u64,
        /// Winner
        winner: Address,
    },

    /// The host ended the game
    GameEnded {
        /// Game id
        game_id: u64,
    },
}

/// Append-only event log
#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<LedgerEvent>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event
    pub fn emit(&self, event: LedgerEvent) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of all events in emission order
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events emitted at or after position `index`
    pub fn since(&self, index: usize) -> Vec<LedgerEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index..)
            .map(<[LedgerEvent]>::to_vec)
            .unwrap_or_default()
    }

    /// Number of events emitted
    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been emitted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_returns_tail() {
        let log = EventLog::new();
        log.emit(LedgerEvent::GameEnded { game_id: 0 });
        let before = log.len();
        log.emit(LedgerEvent::GameEnded { game_id: 1 });
        log.emit(LedgerEvent::GameEnded { game_id: 2 });

        assert_eq!(
            log.since(before),
            vec![LedgerEvent::GameEnded { game_id: 1 }, LedgerEvent::GameEnded { game_id: 2 }]
        );
        assert!(log.since(3).is_empty());
        assert!(log.since(10).is_empty());
        assert_eq!(log.since(0), log.events());
    }
}
