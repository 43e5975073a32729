//! Encrypted number comparison engine
//!
//! `compare_numbers` takes an encrypted system number and an encrypted user
//! number, each with its input proof, and stores the encrypted ordering of
//! the user number relative to the system number.

use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use log::info;

use crate::error::{CoreError, Result};
use crate::fhe::{encrypted_ordering, FheRuntime};
use crate::models::{CiphertextHandle, ComparisonRecord, ExternalInput};
use crate::store::RecordStore;
use crate::utils::Timer;

use super::events::{EventLog, LedgerEvent};
use super::TxContext;

/// User number < system number
pub const RESULT_LOWER: u8 = 0;

/// User number == system number
pub const RESULT_EQUAL: u8 = 1;

/// User number > system number
pub const RESULT_HIGHER: u8 = 2;

/// Comparison contract
#[derive(Debug)]
pub struct NumberCompare<R: FheRuntime> {
    /// Address the contract is deployed at
    address: Address,

    /// FHE runtime
    runtime: Arc<R>,

    /// Comparison records
    records: RecordStore<ComparisonRecord>,

    /// Emitted events
    events: EventLog,
}

impl<R: FheRuntime> NumberCompare<R> {
    /// Deploy a comparison contract at `address`
    pub fn new(address: Address, runtime: Arc<R>) -> Self {
        NumberCompare {
            address,
            runtime,
            records: RecordStore::new("compare_records"),
            events: EventLog::new(),
        }
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Compare the user's number against the system's number
    ///
    /// Both proofs are verified before anything is stored; a rejected input
    /// leaves the counter untouched. The result handle is decryptable by the
    /// contract and the sender only. Returns the new record id.
    pub fn compare_numbers(
        &self,
        ctx: &TxContext,
        encrypted_system: &ExternalInput,
        encrypted_user: &ExternalInput,
    ) -> Result<u64> {
        let _timer =
            Timer::new("compare_numbers").with_warning_threshold(Duration::from_millis(250));

        let system = self.runtime.verify_input(encrypted_system, self.address, ctx.sender)?;
        let user = self.runtime.verify_input(encrypted_user, self.address, ctx.sender)?;

        let result = encrypted_ordering(
            self.runtime.as_ref(),
            &user,
            &system,
            [RESULT_LOWER, RESULT_EQUAL, RESULT_HIGHER],
        )?;

        self.runtime.allow(&result, self.address)?;
        self.runtime.allow(&result, ctx.sender)?;

        let compare_id = self
            .records
            .create(|id| ComparisonRecord::new(id, ctx.sender, ctx.timestamp, result))?;

        self.events.emit(LedgerEvent::NumbersCompared {
            compare_id,
            player: ctx.sender,
            timestamp: ctx.timestamp,
        });
        info!("Comparison {} stored for {:?}", compare_id, ctx.sender);

        Ok(compare_id)
    }

    /// Encrypted result of comparison `compare_id`
    pub fn get_result(&self, compare_id: u64) -> Result<CiphertextHandle> {
        self.records
            .try_get(compare_id)
            .map(|record| record.encrypted_result)
            .ok_or(CoreError::InvalidId(compare_id))
    }

    /// Submitter and timestamp of comparison `compare_id`
    pub fn get_record_info(&self, compare_id: u64) -> Result<(Address, u64)> {
        self.records
            .try_get(compare_id)
            .map(|record| (record.submitter, record.created_at))
            .ok_or(CoreError::InvalidId(compare_id))
    }

    /// Raw record read; the zero value for unallocated ids
    pub fn records(&self, compare_id: u64) -> ComparisonRecord {
        self.records.get(compare_id)
    }

    /// Number of comparisons stored
    pub fn compare_counter(&self) -> u64 {
        self.records.counter()
    }

    /// Events emitted so far
    pub fn events(&self) -> &EventLog {
        &self.events
    }
}
