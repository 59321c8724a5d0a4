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

pub mod beacon;
pub mod execution;
pub mod messenger;
pub mod metrics;

mod epoch_window;
mod exited_validators;
mod fee_recipient;
mod missed_attestations;
mod missed_blocks;
mod slashed_validators;

pub use epoch_window::*;
pub use exited_validators::*;
pub use fee_recipient::*;
pub use missed_attestations::*;
pub use missed_blocks::*;
pub use slashed_validators::*;

use derive_more::Display;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

pub type Epoch = u64;
pub type Slot = u64;
pub type ValidatorIndex = u64;

/// Set of validator indices, ordered to keep "first n" selections stable.
pub type ValidatorIndexSet = BTreeSet<ValidatorIndex>;

/// Validators by their index.
pub type IndexToValidator = HashMap<ValidatorIndex, Validator>;

/// Number of characters of a pubkey shown in messages, including the `0x` prefix.
const SHORT_PUBKEY_LEN: usize = 10;

/// Validator public key as lowercase hex string.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "String")]
pub struct Pubkey(String);

impl Pubkey {
    /// The truncated form used in messages.
    pub fn short(&self) -> &str {
        self.0.get(..SHORT_PUBKEY_LEN).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Pubkey {
    fn from(pubkey: String) -> Self {
        Self(pubkey.to_lowercase())
    }
}

impl From<&str> for Pubkey {
    fn from(pubkey: &str) -> Self {
        pubkey.to_owned().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub pubkey: Pubkey,

    /// In Gwei.
    pub effective_balance: u64,

    pub slashed: bool,
}

/// The epoch the given slot belongs to.
pub fn epoch_of(slot: Slot, slots_per_epoch: u64) -> Epoch {
    slot / slots_per_epoch
}
