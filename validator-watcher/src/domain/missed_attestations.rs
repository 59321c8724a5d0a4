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
    Epoch, EpochWindow, IndexToValidator, ValidatorIndexSet,
    beacon::{Beacon, BeaconType},
    messenger::{Messenger, Notifier},
    metrics::{Gauge, Metrics},
};
use itertools::Itertools;
use log::warn;

/// Number of validators named in messages; the remaining ones are only counted.
const SHOWN_VALIDATORS: usize = 5;

/// Detects missed and twice-in-a-row missed attestations of our validators. Stateless: the
/// caller keeps the dead indices of the previous epoch.
pub struct MissedAttestations<M, N> {
    beacon_type: BeaconType,
    metrics: M,
    notifier: Notifier<N>,
}

impl<M, N> MissedAttestations<M, N>
where
    M: Metrics,
    N: Messenger,
{
    pub fn new(beacon_type: BeaconType, metrics: M, notifier: Notifier<N>) -> Self {
        Self {
            beacon_type,
            metrics,
            notifier,
        }
    }

    /// The indices of our validators which missed their attestation at `epoch - 1`, which is
    /// reliably observable only once `epoch` has started.
    ///
    /// The validators are taken from the window entry for `epoch - 1`, falling back to the one
    /// for `epoch`. This fallback is an approximation: the validator set rarely changes from
    /// one epoch to the next.
    pub async fn detect_missed<B>(
        &self,
        beacon: &B,
        window: &EpochWindow<IndexToValidator>,
        epoch: Epoch,
    ) -> Result<ValidatorIndexSet, B::Error>
    where
        B: Beacon,
    {
        if epoch < 1 {
            return Ok(ValidatorIndexSet::new());
        }

        let Some(index_to_validator) = validators_around(window, epoch) else {
            warn!(epoch; "no validators known for epoch, cannot check attestations");
            self.metrics.set_gauge(Gauge::MissedAttestations, 0);
            return Ok(ValidatorIndexSet::new());
        };

        let indices = index_to_validator.keys().copied().collect::<ValidatorIndexSet>();
        let liveness = beacon
            .validators_liveness(self.beacon_type, epoch - 1, &indices)
            .await?;

        let dead_indices = liveness
            .into_iter()
            .filter_map(|(index, is_live)| (!is_live).then_some(index))
            .collect::<ValidatorIndexSet>();

        self.metrics
            .set_gauge(Gauge::MissedAttestations, dead_indices.len());

        if !dead_indices.is_empty() {
            let (shown, more) = short_pubkeys(&dead_indices, Some(index_to_validator));
            warn!(
                validators = shown,
                more,
                epoch = epoch - 1;
                "🙁 our validators missed attestation"
            );
        }

        Ok(dead_indices)
    }

    /// The indices of our validators which missed their attestations at both `epoch - 2` and
    /// `epoch - 1`, given the results of [MissedAttestations::detect_missed] for `epoch` and
    /// `epoch - 1`.
    pub async fn detect_consecutive(
        &self,
        dead_indices: &ValidatorIndexSet,
        previous_dead_indices: &ValidatorIndexSet,
        window: &EpochWindow<IndexToValidator>,
        epoch: Epoch,
    ) -> ValidatorIndexSet {
        if epoch < 2 {
            return ValidatorIndexSet::new();
        }

        let double_dead_indices = dead_indices & previous_dead_indices;

        self.metrics
            .set_gauge(Gauge::DoubleMissedAttestations, double_dead_indices.len());

        if double_dead_indices.is_empty() {
            return double_dead_indices;
        }

        let streak_epoch = epoch - 2;
        let index_to_validator = validators_around(window, epoch);

        let (shown, more) = short_pubkeys(&double_dead_indices, index_to_validator);
        warn!(
            validators = shown,
            more,
            epoch = streak_epoch;
            "😱 our validators missed 2 attestations in a row"
        );

        let explorer = self.notifier.explorer();
        let names = double_dead_indices
            .iter()
            .map(|index| match index_to_validator.and_then(|v| v.get(index)) {
                Some(validator) => explorer.validator(&validator.pubkey),
                None => format!("`#{index}`"),
            })
            .collect::<Vec<_>>();
        let validators = names.iter().take(SHOWN_VALIDATORS).join(", ");

        let message = format!(
            "😱 Our validator {validators} and `{more}` more missed 2 attestations in a row from epoch {}",
            explorer.epoch(streak_epoch)
        );
        self.notifier.notify(&message).await;

        double_dead_indices
    }
}

fn validators_around(
    window: &EpochWindow<IndexToValidator>,
    epoch: Epoch,
) -> Option<&IndexToValidator> {
    window.get(epoch - 1).or_else(|| window.get(epoch))
}

/// The truncated pubkeys of the first validators and the number of remaining ones.
fn short_pubkeys(
    indices: &ValidatorIndexSet,
    index_to_validator: Option<&IndexToValidator>,
) -> (String, usize) {
    let shown = indices
        .iter()
        .take(SHOWN_VALIDATORS)
        .map(|index| match index_to_validator.and_then(|v| v.get(index)) {
            Some(validator) => validator.pubkey.short().to_owned(),
            None => format!("#{index}"),
        })
        .join(", ");

    (shown, indices.len().saturating_sub(SHOWN_VALIDATORS))
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        EpochWindow, IndexToValidator, MissedAttestations, Validator, ValidatorIndexSet,
        beacon::{
            BeaconType,
            tests::{MockBeacon, Request},
        },
        messenger::tests::{MockMessenger, notifier},
        metrics::{Gauge, tests::InMemMetrics},
    };
    use std::{collections::HashMap, num::NonZeroUsize};

    fn missed_attestations() -> (
        MissedAttestations<InMemMetrics, MockMessenger>,
        InMemMetrics,
        MockMessenger,
    ) {
        let metrics = InMemMetrics::default();
        let (notifier, messenger) = notifier();
        let missed_attestations =
            MissedAttestations::new(BeaconType::Other, metrics.clone(), notifier);
        (missed_attestations, metrics, messenger)
    }

    fn validators(indices: impl IntoIterator<Item = u64>) -> IndexToValidator {
        indices
            .into_iter()
            .map(|index| {
                let validator = Validator {
                    pubkey: format!("0x{index:08x}ffff").into(),
                    effective_balance: 32_000_000_000,
                    slashed: false,
                };
                (index, validator)
            })
            .collect()
    }

    fn epoch_window(
        entries: impl IntoIterator<Item = (u64, IndexToValidator)>,
    ) -> EpochWindow<IndexToValidator> {
        let mut window = EpochWindow::new(NonZeroUsize::new(3).expect("capacity is not zero"));
        for (epoch, index_to_validator) in entries {
            window.put(epoch, index_to_validator);
        }
        window
    }

    #[tokio::test]
    async fn test_detect_missed() {
        let (missed_attestations, metrics, messenger) = missed_attestations();

        let beacon = MockBeacon {
            liveness: HashMap::from([(1, true), (2, false), (3, false)]),
            ..Default::default()
        };
        let window = epoch_window([(4, validators([1, 2, 3])), (5, validators([1, 2]))]);

        let dead_indices = missed_attestations
            .detect_missed(&beacon, &window, 5)
            .await
            .expect("mock beacon does not fail");
        assert_eq!(dead_indices, ValidatorIndexSet::from([2, 3]));
        assert_eq!(metrics.gauge(Gauge::MissedAttestations), Some(2));
        assert_eq!(beacon.requests(), vec![Request::Liveness(4)]);
        assert!(messenger.messages().is_empty());
    }

    #[tokio::test]
    async fn test_detect_missed_fallback() {
        let (missed_attestations, metrics, _) = missed_attestations();

        let beacon = MockBeacon {
            liveness: HashMap::from([(7, false), (8, false)]),
            ..Default::default()
        };

        // Epoch 4 is unknown, hence the validators of epoch 5 are used.
        let window = epoch_window([(5, validators([7]))]);
        let dead_indices = missed_attestations
            .detect_missed(&beacon, &window, 5)
            .await
            .expect("mock beacon does not fail");
        assert_eq!(dead_indices, ValidatorIndexSet::from([7]));
        assert_eq!(beacon.requests(), vec![Request::Liveness(4)]);
        assert_eq!(metrics.gauge(Gauge::MissedAttestations), Some(1));

        // Neither epoch 5 nor 6 is known.
        let window = epoch_window([(2, validators([7]))]);
        let dead_indices = missed_attestations
            .detect_missed(&beacon, &window, 6)
            .await
            .expect("mock beacon does not fail");
        assert!(dead_indices.is_empty());
        assert_eq!(beacon.requests().len(), 1);
        assert_eq!(metrics.gauge(Gauge::MissedAttestations), Some(0));
    }

    #[tokio::test]
    async fn test_detect_missed_first_epoch() {
        let (missed_attestations, metrics, _) = missed_attestations();
        let beacon = MockBeacon::default();

        let dead_indices = missed_attestations
            .detect_missed(&beacon, &epoch_window([(0, validators([1]))]), 0)
            .await
            .expect("mock beacon does not fail");
        assert!(dead_indices.is_empty());
        assert!(beacon.requests().is_empty());
        assert_eq!(metrics.gauge(Gauge::MissedAttestations), None);
    }

    #[tokio::test]
    async fn test_detect_consecutive() {
        let (missed_attestations, metrics, messenger) = missed_attestations();
        let window = epoch_window([(4, validators([7, 9, 11]))]);

        let double_dead_indices = missed_attestations
            .detect_consecutive(
                &ValidatorIndexSet::from([7, 9]),
                &ValidatorIndexSet::from([9, 11]),
                &window,
                5,
            )
            .await;
        assert_eq!(double_dead_indices, ValidatorIndexSet::from([9]));
        assert_eq!(metrics.gauge(Gauge::DoubleMissedAttestations), Some(1));
        assert_eq!(
            messenger.messages(),
            vec![
                "😱 Our validator `0x00000009` and `0` more missed 2 attestations in a row from epoch `3`"
            ]
        );
    }

    #[tokio::test]
    async fn test_detect_consecutive_none() {
        let (missed_attestations, metrics, messenger) = missed_attestations();
        let window = epoch_window([(4, validators([7, 9, 11]))]);

        let double_dead_indices = missed_attestations
            .detect_consecutive(
                &ValidatorIndexSet::from([7]),
                &ValidatorIndexSet::from([9]),
                &window,
                5,
            )
            .await;
        assert!(double_dead_indices.is_empty());
        assert_eq!(metrics.gauge(Gauge::DoubleMissedAttestations), Some(0));
        assert!(messenger.messages().is_empty());

        // Too early for two epochs in a row.
        let double_dead_indices = missed_attestations
            .detect_consecutive(
                &ValidatorIndexSet::from([7]),
                &ValidatorIndexSet::from([7]),
                &window,
                1,
            )
            .await;
        assert!(double_dead_indices.is_empty());
        assert!(messenger.messages().is_empty());
    }

    #[tokio::test]
    async fn test_detect_consecutive_many() {
        let (missed_attestations, metrics, messenger) = missed_attestations();
        let window = epoch_window([(9, validators(1..=7))]);
        let dead_indices = (1..=7).collect::<ValidatorIndexSet>();

        let double_dead_indices = missed_attestations
            .detect_consecutive(&dead_indices, &dead_indices, &window, 10)
            .await;
        assert_eq!(double_dead_indices.len(), 7);

        assert_eq!(
            messenger.messages(),
            vec![
                "😱 Our validator `0x00000001`, `0x00000002`, `0x00000003`, `0x00000004`, `0x00000005` and `2` more missed 2 attestations in a row from epoch `8`"
            ]
        );
    }

    #[tokio::test]
    async fn test_detect_consecutive_unknown_validator() {
        let (missed_attestations, _, messenger) = missed_attestations();
        let window = epoch_window([(9, validators([1, 2, 3, 4, 5]))]);
        let dead_indices = (1..=7).collect::<ValidatorIndexSet>();

        missed_attestations
            .detect_consecutive(&dead_indices, &dead_indices, &window, 10)
            .await;

        // Validators 6 and 7 are not in the window but still counted.
        assert_eq!(
            messenger.messages(),
            vec![
                "😱 Our validator `0x00000001`, `0x00000002`, `0x00000003`, `0x00000004`, `0x00000005` and `2` more missed 2 attestations in a row from epoch `8`"
            ]
        );

        let dead_indices = ValidatorIndexSet::from([5, 6]);
        missed_attestations
            .detect_consecutive(&dead_indices, &dead_indices, &window, 10)
            .await;
        assert_eq!(
            messenger.messages()[1],
            "😱 Our validator `0x00000005`, `#6` and `0` more missed 2 attestations in a row from epoch `8`"
        );
    }
}
