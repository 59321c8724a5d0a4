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
    IndexToValidator, ValidatorIndexSet,
    messenger::{Messenger, Notifier},
    metrics::{Gauge, Metrics},
};
use log::{info, warn};

/// Input of [SlashedValidators::process], each keyed by validator index.
#[derive(Debug, Clone, Copy)]
pub struct SlashedInput<'a> {
    pub total_exited_slashed: &'a IndexToValidator,
    pub our_exited_slashed: &'a IndexToValidator,
    pub total_withdrawal: &'a IndexToValidator,
    pub our_withdrawal: &'a IndexToValidator,
}

/// Detects validators, ours and others, becoming slashed.
pub struct SlashedValidators<M, N> {
    total_exited_slashed_indices: Option<ValidatorIndexSet>,
    our_exited_slashed_indices: Option<ValidatorIndexSet>,
    metrics: M,
    notifier: Notifier<N>,
}

impl<M, N> SlashedValidators<M, N>
where
    M: Metrics,
    N: Messenger,
{
    pub fn new(metrics: M, notifier: Notifier<N>) -> Self {
        Self {
            total_exited_slashed_indices: None,
            our_exited_slashed_indices: None,
            metrics,
            notifier,
        }
    }

    /// Update the slashed validators gauges, log newly slashed validators and notify about our
    /// newly slashed ones. Slashed withdrawable validators only count for the gauges; new
    /// slashings are detected on the exited-slashed sets only. The first call only seeds the
    /// state. Returns the indices of our newly slashed validators.
    pub async fn process(&mut self, input: SlashedInput<'_>) -> ValidatorIndexSet {
        let SlashedInput {
            total_exited_slashed,
            our_exited_slashed,
            total_withdrawal,
            our_withdrawal,
        } = input;

        let total_exited_slashed_indices = indices(total_exited_slashed);
        let our_exited_slashed_indices = indices(our_exited_slashed);

        let total_slashed_indices = &total_exited_slashed_indices | &slashed_indices(total_withdrawal);
        let our_slashed_indices = &our_exited_slashed_indices | &slashed_indices(our_withdrawal);

        self.metrics
            .set_gauge(Gauge::TotalSlashedValidators, total_slashed_indices.len());
        self.metrics
            .set_gauge(Gauge::OurSlashedValidators, our_slashed_indices.len());

        let previous_total = self
            .total_exited_slashed_indices
            .replace(total_exited_slashed_indices.clone());
        let previous_ours = self
            .our_exited_slashed_indices
            .replace(our_exited_slashed_indices.clone());

        let (Some(previous_total), Some(previous_ours)) = (previous_total, previous_ours) else {
            return ValidatorIndexSet::new();
        };

        let new_total = &total_exited_slashed_indices - &previous_total;
        let new_ours = &our_exited_slashed_indices - &previous_ours;
        let new_not_ours = &new_total - &new_ours;

        for index in &new_not_ours {
            if let Some(validator) = total_exited_slashed.get(index) {
                info!(index, pubkey = validator.pubkey.short(); "🔪 validator is slashed");
            }
        }

        for index in &new_ours {
            let Some(validator) = our_exited_slashed.get(index) else {
                continue;
            };

            warn!(index, pubkey = validator.pubkey.short(); "🔕 our validator is slashed");

            let message = format!(
                "🔕 Our validator {} is slashed",
                self.notifier.explorer().validator(&validator.pubkey)
            );
            self.notifier.notify(&message).await;
        }

        new_ours
    }
}

fn indices(index_to_validator: &IndexToValidator) -> ValidatorIndexSet {
    index_to_validator.keys().copied().collect()
}

fn slashed_indices(index_to_validator: &IndexToValidator) -> ValidatorIndexSet {
    index_to_validator
        .iter()
        .filter(|(_, validator)| validator.slashed)
        .map(|(index, _)| *index)
        .collect()
}
