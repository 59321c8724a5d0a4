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
    Pubkey, Slot, epoch_of,
    beacon::{Beacon, Block, BlockId, find_proposer_duty},
    messenger::{Messenger, Notifier},
    metrics::{Counter, Metrics},
};
use log::{info, warn};
use std::collections::HashSet;

/// Detects block proposals missed by our validators, both at head and at finalized.
pub struct MissedBlocks<M, N> {
    slots_per_epoch: u64,
    metrics: M,
    notifier: Notifier<N>,
}

impl<M, N> MissedBlocks<M, N>
where
    M: Metrics,
    N: Messenger,
{
    pub fn new(slots_per_epoch: u64, metrics: M, notifier: Notifier<N>) -> Self {
        Self {
            slots_per_epoch,
            metrics,
            notifier,
        }
    }

    /// Check the block at head for the given slot, `None` meaning that the slot is missed. Must
    /// be called exactly once per slot. Returns whether the proposer is one of ours.
    pub async fn check_head<B>(
        &self,
        beacon: &B,
        slot: Slot,
        potential_block: Option<&Block>,
        our_pubkeys: &HashSet<Pubkey>,
    ) -> Result<bool, B::Error>
    where
        B: Beacon,
    {
        let missed = potential_block.is_none();
        let epoch = epoch_of(slot, self.slots_per_epoch);

        let duties = beacon.proposer_duties(epoch).await?;
        let Some(duty) = find_proposer_duty(&duties, slot) else {
            warn!(epoch, slot; "no proposer duty for slot");
            return Ok(false);
        };

        let ours = our_pubkeys.contains(&duty.pubkey);
        let emoji = match (ours, missed) {
            (true, true) => "🔺",
            (true, false) => "✨",
            (false, true) => "💩",
            (false, false) => "✅",
        };
        let proposed_or_missed = if missed { "missed" } else { "proposed" };

        info!(
            pubkey = duty.pubkey.short(),
            ours,
            epoch,
            slot,
            keys_watched = our_pubkeys.len();
            "{emoji} validator {proposed_or_missed} block at head"
        );

        if ours && missed {
            self.metrics
                .increment_counter(Counter::MissedBlockProposalsHead);

            let explorer = self.notifier.explorer();
            let message = format!(
                "{emoji} Our validator {} missed block at head at epoch {} - slot {} {emoji}",
                explorer.validator(&duty.pubkey),
                explorer.epoch(epoch),
                explorer.slot(slot),
            );
            self.notifier.notify(&message).await;
        }

        Ok(ours)
    }

    /// Check all slots after `last_processed_finalized_slot` up to the latest finalized one for
    /// blocks missed by our validators. Returns the new watermark which must be passed as
    /// `last_processed_finalized_slot` to the next call, so that each finalized slot is checked
    /// exactly once.
    ///
    /// # Panics
    /// Panics if `last_processed_finalized_slot` is greater than `slot`.
    pub async fn check_finalized<B>(
        &self,
        beacon: &B,
        last_processed_finalized_slot: Slot,
        slot: Slot,
        our_pubkeys: &HashSet<Pubkey>,
    ) -> Result<Slot, B::Error>
    where
        B: Beacon,
    {
        assert!(
            last_processed_finalized_slot <= slot,
            "last processed finalized slot {last_processed_finalized_slot} must not be greater than slot {slot}"
        );

        let Some(last_finalized_header) = beacon.header(BlockId::Finalized).await? else {
            warn!("no finalized block");
            return Ok(last_processed_finalized_slot);
        };
        let last_finalized_slot = last_finalized_header.slot;

        // Fetched early in case the beacon node stops serving duties of old epochs.
        beacon
            .proposer_duties(epoch_of(last_finalized_slot, self.slots_per_epoch))
            .await?;

        for slot in last_processed_finalized_slot + 1..=last_finalized_slot {
            let epoch = epoch_of(slot, self.slots_per_epoch);

            let duties = beacon.proposer_duties(epoch).await?;
            let Some(duty) = find_proposer_duty(&duties, slot) else {
                warn!(epoch, slot; "no proposer duty for finalized slot");
                continue;
            };

            if !our_pubkeys.contains(&duty.pubkey) {
                continue;
            }

            if beacon.header(BlockId::Slot(slot)).await?.is_some() {
                continue;
            }

            warn!(
                pubkey = duty.pubkey.short(),
                epoch,
                slot;
                "❌ our validator missed block at finalized"
            );

            let explorer = self.notifier.explorer();
            let message = format!(
                "❌ Our validator {} missed block at finalized at epoch {} - slot {} ❌",
                explorer.validator(&duty.pubkey),
                explorer.epoch(epoch),
                explorer.slot(slot),
            );
            self.notifier.notify(&message).await;

            self.metrics
                .increment_counter(Counter::MissedBlockProposalsFinalized);
        }

        Ok(last_finalized_slot.max(last_processed_finalized_slot))
    }
}
