// This file is part of validator-watcher.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::{Epoch, Pubkey, Slot, Validator, ValidatorIndex, ValidatorIndexSet};
use derive_more::Display;
use serde::Deserialize;
use std::{collections::HashMap, error::Error as StdError};

/// Beacon node abstraction.
#[trait_variant::make(Send)]
pub trait Beacon
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    async fn genesis(&self) -> Result<Genesis, Self::Error>;

    /// All validators known at the given state.
    async fn validators(&self, state_id: BlockId) -> Result<Vec<ValidatorInfo>, Self::Error>;

    /// Whether the given validators were live, i.e. had an attestation included, at the given
    /// epoch.
    async fn validators_liveness(
        &self,
        beacon_type: BeaconType,
        epoch: Epoch,
        indices: &ValidatorIndexSet,
    ) -> Result<HashMap<ValidatorIndex, bool>, Self::Error>;

    /// The proposer duties of the given epoch, in no particular order. Implementations memoize
    /// these per epoch, hence repeated calls for the same epoch are cheap.
    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, Self::Error>;

    /// The header of the block at the given location or `None`, if there is no block.
    async fn header(&self, block_id: BlockId) -> Result<Option<Header>, Self::Error>;

    /// The block at the given location or `None`, if there is no block.
    async fn block(&self, block_id: BlockId) -> Result<Option<Block>, Self::Error>;
}

/// Beacon node implementation; they differ in how validator liveness is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeaconType {
    Lighthouse,
    Nimbus,
    Prysm,
    Teku,
    #[default]
    Other,
}

/// Identifies a block or the state at a block.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    #[display("head")]
    Head,

    #[display("finalized")]
    Finalized,

    #[display("{_0}")]
    Slot(Slot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Genesis {
    /// Unix timestamp in seconds.
    pub genesis_time: u64,
}

/// Validator status as defined by the beacon API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    PendingInitialized,
    PendingQueued,
    ActiveOngoing,
    ActiveExiting,
    ActiveSlashed,
    ExitedUnslashed,
    ExitedSlashed,
    WithdrawalPossible,
    WithdrawalDone,
}

impl ValidatorStatus {
    /// Whether a validator with this status is expected to attest.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::ActiveOngoing | Self::ActiveExiting | Self::ActiveSlashed
        )
    }

    pub fn is_withdrawal(self) -> bool {
        matches!(self, Self::WithdrawalPossible | Self::WithdrawalDone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub index: ValidatorIndex,
    pub status: ValidatorStatus,
    pub validator: Validator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposerDuty {
    pub slot: Slot,
    pub validator_index: ValidatorIndex,
    pub pubkey: Pubkey,
}

/// Find the duty for the given slot. Duties are scanned, because the beacon API does not
/// guarantee any order.
pub fn find_proposer_duty(duties: &[ProposerDuty], slot: Slot) -> Option<&ProposerDuty> {
    duties.iter().find(|duty| duty.slot == slot)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub slot: Slot,
    pub proposer_index: ValidatorIndex,

    /// `None` for pre-merge blocks.
    pub execution_payload: Option<ExecutionPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPayload {
    pub fee_recipient: String,
    pub block_hash: String,
}
