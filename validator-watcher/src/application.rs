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
    Epoch, EpochWindow, ExitedValidators, FeeRecipient, IndexToValidator, MissedAttestations,
    MissedBlocks, Pubkey, SlashedInput, SlashedValidators, Slot, ValidatorIndexSet,
    beacon::{Beacon, BeaconType, BlockId, ValidatorInfo, ValidatorStatus},
    epoch_of,
    execution::Execution,
    messenger::{Explorer, Messenger, Notifier},
    metrics::Metrics,
};
use anyhow::{Context, ensure};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::{
    collections::HashSet,
    num::NonZeroUsize,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{select, signal::unix::Signal, time::sleep};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub slots_per_epoch: u64,

    pub seconds_per_slot: u64,

    /// Number of epochs for which our active validators are kept.
    pub epoch_window_capacity: NonZeroUsize,

    /// Delay after the start of a slot before it is processed, giving its block time to
    /// propagate.
    #[serde(with = "humantime_serde")]
    pub head_lag: Duration,

    #[serde(default)]
    pub beacon_type: BeaconType,

    pub pubkeys: Vec<Pubkey>,

    pub expected_fee_recipient: Option<String>,

    pub explorer_url: Option<String>,
}

/// Watch our validators slot by slot until SIGTERM is received.
pub async fn run<B, E, N, M>(
    config: Config,
    beacon: B,
    execution: Option<E>,
    messenger: N,
    metrics: M,
    mut sigterm: Signal,
) -> anyhow::Result<()>
where
    B: Beacon,
    E: Execution,
    N: Messenger,
    M: Metrics,
{
    ensure!(config.slots_per_epoch > 0, "slots per epoch must be positive");
    ensure!(config.seconds_per_slot > 0, "seconds per slot must be positive");

    let genesis = beacon.genesis().await.context("get genesis")?;
    let genesis_time = genesis.genesis_time;
    let seconds_per_slot = config.seconds_per_slot;
    let head_lag = config.head_lag;

    let mut watcher = Watcher::new(config, metrics, messenger);
    info!(
        genesis_time,
        keys_watched = watcher.our_pubkeys.len(),
        fee_recipient_checked = execution.is_some();
        "watching validators"
    );

    let mut next_slot = None::<Slot>;

    loop {
        let now = unix_now();
        let current_slot = current_slot(genesis_time, seconds_per_slot, now);
        let slot = match next_slot {
            Some(next_slot) if next_slot < current_slot => {
                warn!(from = next_slot, to = current_slot; "falling behind, skipping slots");
                current_slot
            }
            Some(next_slot) => next_slot,
            None => current_slot,
        };

        let wait = (slot_start(genesis_time, seconds_per_slot, slot) + head_lag).saturating_sub(now);
        debug!(slot, wait:?; "waiting for slot");

        select! {
            _ = sleep(wait) => {}

            _ = sigterm.recv() => {
                warn!("SIGTERM received");
                return Ok(());
            }
        }

        if let Err(error) = watcher
            .process_slot(&beacon, execution.as_ref(), slot)
            .await
        {
            let error = format!("{error:#}");
            error!(slot, error; "cannot process slot");
        }

        next_slot = Some(slot + 1);
    }
}

/// Owns the trackers and the state carried from slot to slot.
struct Watcher<M, N> {
    slots_per_epoch: u64,
    our_pubkeys: HashSet<Pubkey>,

    /// Our active validators by epoch.
    window: EpochWindow<IndexToValidator>,

    /// All our validators as of the last processed epoch.
    our_index_to_validator: IndexToValidator,

    last_processed_epoch: Option<Epoch>,
    previous_dead_indices: Option<(Epoch, ValidatorIndexSet)>,
    last_processed_finalized_slot: Option<Slot>,

    exited_validators: ExitedValidators<M, N>,
    slashed_validators: SlashedValidators<M, N>,
    missed_attestations: MissedAttestations<M, N>,
    missed_blocks: MissedBlocks<M, N>,
    fee_recipient: FeeRecipient<M, N>,
}

impl<M, N> Watcher<M, N>
where
    M: Metrics,
    N: Messenger,
{
    fn new(config: Config, metrics: M, messenger: N) -> Self {
        let Config {
            slots_per_epoch,
            epoch_window_capacity,
            beacon_type,
            pubkeys,
            expected_fee_recipient,
            explorer_url,
            ..
        } = config;

        let notifier = Notifier::new(messenger, Explorer::new(explorer_url));

        Self {
            slots_per_epoch,
            our_pubkeys: pubkeys.into_iter().collect(),
            window: EpochWindow::new(epoch_window_capacity),
            our_index_to_validator: IndexToValidator::new(),
            last_processed_epoch: None,
            previous_dead_indices: None,
            last_processed_finalized_slot: None,
            exited_validators: ExitedValidators::new(metrics.clone(), notifier.clone()),
            slashed_validators: SlashedValidators::new(metrics.clone(), notifier.clone()),
            missed_attestations: MissedAttestations::new(
                beacon_type,
                metrics.clone(),
                notifier.clone(),
            ),
            missed_blocks: MissedBlocks::new(slots_per_epoch, metrics.clone(), notifier.clone()),
            fee_recipient: FeeRecipient::new(
                expected_fee_recipient,
                slots_per_epoch,
                metrics,
                notifier,
            ),
        }
    }

    async fn process_slot<B, E>(
        &mut self,
        beacon: &B,
        execution: Option<&E>,
        slot: Slot,
    ) -> anyhow::Result<()>
    where
        B: Beacon,
        E: Execution,
    {
        let epoch = epoch_of(slot, self.slots_per_epoch);
        // Block checks run even if the epoch cannot be processed; it is retried next slot.
        if self.last_processed_epoch != Some(epoch) {
            match self.process_epoch(beacon, epoch).await {
                Ok(()) => self.last_processed_epoch = Some(epoch),

                Err(error) => {
                    let error = format!("{error:#}");
                    error!(epoch, error; "cannot process epoch");
                }
            }
        }

        let block = beacon
            .block(BlockId::Slot(slot))
            .await
            .context("get block")?;

        let ours = self
            .missed_blocks
            .check_head(beacon, slot, block.as_ref(), &self.our_pubkeys)
            .await
            .context("check block at head")?;

        if let Some(block) = block.as_ref().filter(|_| ours) {
            self.fee_recipient
                .check(block, &self.our_index_to_validator, execution)
                .await
                .context("check fee recipient")?;
        }

        let last_processed_finalized_slot = match self.last_processed_finalized_slot {
            Some(last_processed_finalized_slot) => last_processed_finalized_slot,

            None => beacon
                .header(BlockId::Finalized)
                .await
                .context("get finalized header")?
                .map(|header| header.slot)
                .unwrap_or_default()
                .min(slot),
        };

        let last_processed_finalized_slot = self
            .missed_blocks
            .check_finalized(beacon, last_processed_finalized_slot, slot, &self.our_pubkeys)
            .await
            .context("check blocks at finalized")?;
        self.last_processed_finalized_slot = Some(last_processed_finalized_slot);

        Ok(())
    }

    async fn process_epoch<B>(&mut self, beacon: &B, epoch: Epoch) -> anyhow::Result<()>
    where
        B: Beacon,
    {
        let validators = beacon
            .validators(BlockId::Head)
            .await
            .context("get validators")?;

        let ValidatorSnapshot {
            ours,
            our_active,
            our_exited_unslashed,
            our_exited_slashed,
            our_withdrawal,
            total_exited_slashed,
            total_withdrawal,
        } = ValidatorSnapshot::classify(validators, &self.our_pubkeys);

        info!(
            epoch,
            ours = ours.len(),
            our_active = our_active.len();
            "processing epoch"
        );

        self.window.put(epoch, our_active);
        self.our_index_to_validator = ours;

        self.exited_validators
            .process(&our_exited_unslashed, &our_withdrawal)
            .await;

        self.slashed_validators
            .process(SlashedInput {
                total_exited_slashed: &total_exited_slashed,
                our_exited_slashed: &our_exited_slashed,
                total_withdrawal: &total_withdrawal,
                our_withdrawal: &our_withdrawal,
            })
            .await;

        if let Err(error) = self.process_attestations(beacon, epoch).await {
            self.previous_dead_indices = None;
            let error = format!("{error:#}");
            error!(epoch, error; "cannot check attestations");
        }

        Ok(())
    }

    async fn process_attestations<B>(&mut self, beacon: &B, epoch: Epoch) -> anyhow::Result<()>
    where
        B: Beacon,
    {
        let dead_indices = self
            .missed_attestations
            .detect_missed(beacon, &self.window, epoch)
            .await
            .context("detect missed attestations")?;

        // Only the dead indices of the directly preceding epoch count.
        let no_dead_indices = ValidatorIndexSet::new();
        let previous_dead_indices = match &self.previous_dead_indices {
            Some((previous_epoch, indices)) if previous_epoch + 1 == epoch => indices,
            _ => &no_dead_indices,
        };

        self.missed_attestations
            .detect_consecutive(&dead_indices, previous_dead_indices, &self.window, epoch)
            .await;

        self.previous_dead_indices = Some((epoch, dead_indices));

        Ok(())
    }
}

/// Validators classified by status and ownership, each keyed by index.
#[derive(Debug, Default)]
struct ValidatorSnapshot {
    ours: IndexToValidator,
    our_active: IndexToValidator,
    our_exited_unslashed: IndexToValidator,
    our_exited_slashed: IndexToValidator,
    our_withdrawal: IndexToValidator,
    total_exited_slashed: IndexToValidator,
    total_withdrawal: IndexToValidator,
}

impl ValidatorSnapshot {
    fn classify(
        validators: impl IntoIterator<Item = ValidatorInfo>,
        our_pubkeys: &HashSet<Pubkey>,
    ) -> Self {
        let mut snapshot = Self::default();

        for ValidatorInfo {
            index,
            status,
            validator,
        } in validators
        {
            let ours = our_pubkeys.contains(&validator.pubkey);

            match status {
                ValidatorStatus::ExitedSlashed => {
                    if ours {
                        snapshot.our_exited_slashed.insert(index, validator.clone());
                    }
                    snapshot
                        .total_exited_slashed
                        .insert(index, validator.clone());
                }

                ValidatorStatus::ExitedUnslashed if ours => {
                    snapshot
                        .our_exited_unslashed
                        .insert(index, validator.clone());
                }

                status if status.is_withdrawal() => {
                    if ours {
                        snapshot.our_withdrawal.insert(index, validator.clone());
                    }
                    snapshot.total_withdrawal.insert(index, validator.clone());
                }

                status if status.is_active() && ours => {
                    snapshot.our_active.insert(index, validator.clone());
                }

                _ => {}
            }

            if ours {
                snapshot.ours.insert(index, validator);
            }
        }

        snapshot
    }
}

fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// The slot at the given time since the Unix epoch; slot 0 before genesis.
fn current_slot(genesis_time: u64, seconds_per_slot: u64, now: Duration) -> Slot {
    now.as_secs().saturating_sub(genesis_time) / seconds_per_slot
}

fn slot_start(genesis_time: u64, seconds_per_slot: u64, slot: Slot) -> Duration {
    Duration::from_secs(genesis_time + slot * seconds_per_slot)
}
