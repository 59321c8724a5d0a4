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

use crate::domain::{
    IndexToValidator, epoch_of,
    beacon::Block,
    execution::Execution,
    messenger::{Messenger, Notifier},
    metrics::{Counter, Metrics},
};
use log::{debug, warn};

/// Checks that blocks proposed by our validators pay the expected fee recipient.
pub struct FeeRecipient<M, N> {
    /// Lowercase.
    expected_fee_recipient: Option<String>,
    slots_per_epoch: u64,
    metrics: M,
    notifier: Notifier<N>,
}

impl<M, N> FeeRecipient<M, N>
where
    M: Metrics,
    N: Messenger,
{
    pub fn new(
        expected_fee_recipient: Option<String>,
        slots_per_epoch: u64,
        metrics: M,
        notifier: Notifier<N>,
    ) -> Self {
        Self {
            expected_fee_recipient: expected_fee_recipient.map(|r| r.to_lowercase()),
            slots_per_epoch,
            metrics,
            notifier,
        }
    }

    /// Check the fee recipient of the given block, if proposed by one of our validators. Blocks
    /// built externally declare the builder as fee recipient; these are accepted if their last
    /// transaction pays the expected fee recipient.
    pub async fn check<E>(
        &self,
        block: &Block,
        our_index_to_validator: &IndexToValidator,
        execution: Option<&E>,
    ) -> Result<(), E::Error>
    where
        E: Execution,
    {
        let (Some(expected_fee_recipient), Some(execution)) =
            (&self.expected_fee_recipient, execution)
        else {
            return Ok(());
        };

        let Some(proposer) = our_index_to_validator.get(&block.proposer_index) else {
            return Ok(());
        };

        let Some(execution_payload) = &block.execution_payload else {
            debug!(slot = block.slot; "block without execution payload");
            return Ok(());
        };

        if execution_payload.fee_recipient.to_lowercase() == *expected_fee_recipient {
            return Ok(());
        }

        let execution_block = execution
            .block_by_hash(&execution_payload.block_hash)
            .await?;
        let pays_expected = execution_block
            .transactions
            .last()
            .and_then(|transaction| transaction.to.as_deref())
            .is_some_and(|to| to.to_lowercase() == *expected_fee_recipient);
        if pays_expected {
            return Ok(());
        }

        let slot = block.slot;
        let epoch = epoch_of(slot, self.slots_per_epoch);

        warn!(
            pubkey = proposer.pubkey.short(),
            epoch,
            slot,
            fee_recipient = execution_payload.fee_recipient.as_str();
            "🚩 our validator proposed block with the wrong fee recipient"
        );

        let explorer = self.notifier.explorer();
        let message = format!(
            "🚩 Our validator {} proposed block at epoch {} - slot {} with the wrong fee recipient",
            explorer.validator(&proposer.pubkey),
            explorer.epoch(epoch),
            explorer.slot(slot),
        );
        self.notifier.notify(&message).await;

        self.metrics
            .increment_counter(Counter::WrongFeeRecipientProposedBlock);

        Ok(())
    }
}
