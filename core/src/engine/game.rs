//! Encrypted number guessing game
//!
//! A host commits an encrypted secret; players submit encrypted guesses and
//! get back an encrypted TOO_LOW / CORRECT / TOO_HIGH result only they can
//! have decrypted. A player whose latest result decrypts to CORRECT proves it
//! with an oracle attestation and wins the game.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::VerifyingKey;
use ethers::types::Address;
use log::{debug, info};

use crate::disclosure::DecryptionAttestation;
use crate::error::{CoreError, Result};
use crate::fhe::{encrypted_ordering, FheRuntime};
use crate::models::{CiphertextHandle, ExternalInput, GameInfo, GameRecord, GameStatus};
use crate::store::RecordStore;
use crate::utils::Timer;

use super::events::{EventLog, LedgerEvent};
use super::TxContext;

/// Guess < secret
pub const RESULT_TOO_LOW: u8 = 0;

/// Guess == secret
pub const RESULT_CORRECT: u8 = 1;

/// Guess > secret
pub const RESULT_TOO_HIGH: u8 = 2;

/// Guessing game contract
#[derive(Debug)]
pub struct GuessNumber<R: FheRuntime> {
    address: Address,
    runtime: Arc<R>,

    /// Key of the oracle whose attestations prove a win
    oracle_key: VerifyingKey,

    games: RecordStore<GameRecord>,
    events: EventLog,
}

impl<R: FheRuntime> GuessNumber<R> {
    /// Deploy a game contract at `address` trusting `oracle_key` for win claims
    pub fn new(address: Address, runtime: Arc<R>, oracle_key: VerifyingKey) -> Self {
        GuessNumber {
            address,
            runtime,
            oracle_key,
            games: RecordStore::new("games"),
            events: EventLog::new(),
        }
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Start a game around an encrypted secret
    pub fn create_game(&self, ctx: &TxContext, encrypted_secret: &ExternalInput) -> Result<u64> {
        let secret = self.runtime.verify_input(encrypted_secret, self.address, ctx.sender)?;
        self.runtime.allow(&secret, self.address)?;

        let game_id = self
            .games
            .create(|id| GameRecord::new(id, ctx.sender, secret, ctx.timestamp))?;

        self.events.emit(LedgerEvent::GameCreated {
            game_id,
            host: ctx.sender,
            timestamp: ctx.timestamp,
        });
        info!("Game {} created by {:?}", game_id, ctx.sender);

        Ok(game_id)
    }

    /// Guess the secret of game `game_id`, returning the encrypted result
    pub fn make_guess(
        &self,
        ctx: &TxContext,
        game_id: u64,
        encrypted_guess: &ExternalInput,
    ) -> Result<CiphertextHandle> {
        let game = self
            .games
            .try_get(game_id)
            .filter(GameRecord::is_active)
            .ok_or(CoreError::GameNotActive(game_id))?;

        let _timer = Timer::new("make_guess").with_warning_threshold(Duration::from_millis(250));
        let guess = self.runtime.verify_input(encrypted_guess, self.address, ctx.sender)?;

        let result = encrypted_ordering(
            self.runtime.as_ref(),
            &guess,
            &game.encrypted_secret,
            [RESULT_TOO_LOW, RESULT_CORRECT, RESULT_TOO_HIGH],
        )?;

        self.runtime.allow(&result, self.address)?;
        self.runtime.allow(&result, ctx.sender)?;

        // The game may have closed between the check above and now
        let guess_number = self.games.append_guess(game_id, ctx.sender, result)?;

        self.events.emit(LedgerEvent::GuessMade {
            game_id,
            player: ctx.sender,
            guess_number,
        });
        debug!("Game {}: guess #{} by {:?}", game_id, guess_number, ctx.sender);

        Ok(result)
    }

    /// Claim game `game_id` with an attested decryption of the sender's latest result
    pub fn claim_win(
        &self,
        ctx: &TxContext,
        game_id: u64,
        attestation: &DecryptionAttestation,
    ) -> Result<()> {
        self.games.update(game_id, |game| {
            if !game.is_active() {
                return Err(CoreError::GameNotActive(game_id));
            }

            let latest = game.last_result(&ctx.sender).ok_or(CoreError::NoGuess {
                game_id,
                player: ctx.sender,
            })?;

            if attestation.handle != latest {
                return Err(CoreError::InvalidAttestation(format!(
                    "attests {}, latest result is {}",
                    attestation.handle, latest
                )));
            }
            if attestation.contract != self.address {
                return Err(CoreError::InvalidAttestation(format!(
                    "attestation is for contract {:?}",
                    attestation.contract
                )));
            }
            attestation.verify(&self.oracle_key)?;

            if attestation.plaintext != RESULT_CORRECT {
                return Err(CoreError::NotCorrect { game_id });
            }

            game.status = GameStatus::Won;
            game.winner = ctx.sender;
            Ok(())
        })
        .map_err(|e| match e {
            CoreError::InvalidId(id) => CoreError::GameNotActive(id),
            other => other,
        })?;

        self.events.emit(LedgerEvent::GameWon {
            game_id,
            winner: ctx.sender,
        });
        info!("Game {} won by {:?}", game_id, ctx.sender);

        Ok(())
    }

    /// End game `game_id`; host only
    pub fn end_game(&self, ctx: &TxContext, game_id: u64) -> Result<()> {
        self.games
            .update(game_id, |game| {
                if !game.is_active() {
                    return Err(CoreError::GameNotActive(game_id));
                }
                if game.host != ctx.sender {
                    return Err(CoreError::NotHost {
                        game_id,
                        caller: ctx.sender,
                    });
                }

                game.status = GameStatus::Ended;
                Ok(())
            })
            .map_err(|e| match e {
                CoreError::InvalidId(id) => CoreError::GameNotActive(id),
                other => other,
            })?;

        self.events.emit(LedgerEvent::GameEnded { game_id });
        info!("Game {} ended by host", game_id);

        Ok(())
    }

    /// Public summary; zero values for unknown ids
    pub fn get_game_info(&self, game_id: u64) -> GameInfo {
        self.games.get(game_id).info()
    }

    /// Guesses `player` made in game `game_id`
    pub fn get_player_guess_count(&self, game_id: u64, player: Address) -> u64 {
        self.games.get(game_id).guess_count(&player)
    }

    /// Encrypted result of `player`'s latest guess
    pub fn get_guess_result(&self, game_id: u64, player: Address) -> Result<CiphertextHandle> {
        self.games
            .try_get(game_id)
            .ok_or(CoreError::InvalidId(game_id))?
            .last_result(&player)
            .ok_or(CoreError::NoGuess { game_id, player })
    }

    /// Whether game `game_id` accepts guesses
    pub fn is_game_active(&self, game_id: u64) -> bool {
        self.games.get(game_id).is_active()
    }

    /// Raw game read; the zero value for unallocated ids
    pub fn games(&self, game_id: u64) -> GameRecord {
        self.games.get(game_id)
    }

    /// Winner of game `game_id`, zero if none
    pub fn winners(&self, game_id: u64) -> Address {
        self.games.get(game_id).winner
    }

    /// Guesses made in game `game_id` by all players
    pub fn guess_counts(&self, game_id: u64) -> u64 {
        self.games.get(game_id).total_guesses
    }

    /// Number of games created
    pub fn game_counter(&self) -> u64 {
        self.games.counter()
    }

    /// Events emitted so far
    pub fn events(&self) -> &EventLog {
        &self.events
    }
}
