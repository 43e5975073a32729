//! Guessing game representation
//!
//! A game moves `Active -> (Won | Ended)`. Both terminal states are final;
//! the zero-value record reports `Uninitialized` and is never active.

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use super::handle::CiphertextHandle;

/// Lifecycle status of a game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    /// Zero value for ids that were never created
    #[default]
    Uninitialized,

    /// Accepting guesses
    Active,

    /// A player proved a CORRECT guess
    Won,

    /// The host ended the game
    Ended,
}

impl GameStatus {
    /// Whether no further transition is defined
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Ended)
    }
}

/// A stored guessing game
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Game id
    pub id: u64,

    /// Account that created the game
    pub host: Address,

    /// Encrypted secret number
    pub encrypted_secret: CiphertextHandle,

    /// Lifecycle status
    pub status: GameStatus,

    /// Ledger timestamp of creation (unix seconds)
    pub created_at: u64,

    /// Winner, zero until a win is claimed
    pub winner: Address,

    /// Guesses made by all players
    pub total_guesses: u64,

    /// Guesses made per player
    pub guess_counts: BTreeMap<Address, u64>,

    /// Encrypted result of each player's most recent guess
    pub last_results: BTreeMap<Address, CiphertextHandle>,
}

impl Debug for GameRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("GameRecord")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("winner", &self.winner)
            .field("total_guesses", &self.total_guesses)
            .finish()
    }
}

impl GameRecord {
    /// Create a new active game
    pub fn new(
        id: u64,
        host: Address,
        encrypted_secret: CiphertextHandle,
        created_at: u64,
    ) -> Self {
        GameRecord {
            id,
            host,
            encrypted_secret,
            status: GameStatus::Active,
            created_at,
            ..Default::default()
        }
    }

    /// Whether the game accepts guesses
    pub fn is_active(&self) -> bool {
        self.status == GameStatus::Active
    }

    /// Guesses made by `player`
    pub fn guess_count(&self, player: &Address) -> u64 {
        self.guess_counts.get(player).copied().unwrap_or(0)
    }

    /// Encrypted result of `player`'s latest guess
    pub fn last_result(&self, player: &Address) -> Option<CiphertextHandle> {
        self.last_results.get(player).copied()
    }

    /// Public summary of the game
    pub fn info(&self) -> GameInfo {
        GameInfo {
            host: self.host,
            is_active: self.is_active(),
            created_at: self.created_at,
            total_guesses: self.total_guesses,
            winner: self.winner,
        }
    }
}

/// Public summary returned by `get_game_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    /// Host address
    pub host: Address,

    /// Whether the game accepts guesses
    pub is_active: bool,

    /// Creation timestamp
    pub created_at: u64,

    /// Total number of guesses
    pub total_guesses: u64,

    /// Winner, zero if none
    pub winner: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_value_game() {
        let game = GameRecord::default();
        let info = game.info();

        assert!(!game.is_active());
        assert_eq!(info.host, Address::zero());
        assert_eq!(info.created_at, 0);
        assert_eq!(info.total_guesses, 0);
        assert_eq!(info.winner, Address::zero());
        assert!(!game.status.is_terminal());
    }

    #[test]
    fn test_new_game_is_active() {
        let host = Address::repeat_byte(0x11);
        let game = GameRecord::new(0, host, CiphertextHandle([7; 32]), 1_700_000_000);

        assert!(game.is_active());
        assert_eq!(game.guess_count(&host), 0);
        assert!(game.last_result(&host).is_none());
        assert_eq!(game.info().host, host);
    }
}
