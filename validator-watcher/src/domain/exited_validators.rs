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
use log::info;

/// Detects our validators becoming exited.
pub struct ExitedValidators<M, N> {
    /// `None` until the first call has seeded it.
    our_exited_unslashed_indices: Option<ValidatorIndexSet>,
    metrics: M,
    notifier: Notifier<N>,
}

impl<M, N> ExitedValidators<M, N>
where
    M: Metrics,
    N: Messenger,
{
    pub fn new(metrics: M, notifier: Notifier<N>) -> Self {
        Self {
            our_exited_unslashed_indices: None,
            metrics,
            notifier,
        }
    }

    /// Update the exited validators gauge and notify about each of our validators which has
    /// become exited since the previous call. The first call only seeds the state. Returns the
    /// indices of the newly exited validators.
    pub async fn process(
        &mut self,
        our_exited_unslashed: &IndexToValidator,
        our_withdrawal: &IndexToValidator,
    ) -> ValidatorIndexSet {
        let our_exited_unslashed_indices = our_exited_unslashed
            .keys()
            .copied()
            .collect::<ValidatorIndexSet>();

        let our_unslashed_withdrawal_indices = our_withdrawal
            .iter()
            .filter(|(_, validator)| !validator.slashed)
            .map(|(index, _)| *index);

        let our_exited_indices = our_exited_unslashed_indices
            .iter()
            .copied()
            .chain(our_unslashed_withdrawal_indices)
            .collect::<ValidatorIndexSet>();

        self.metrics
            .set_gauge(Gauge::OurExitedValidators, our_exited_indices.len());

        let Some(previous) = self
            .our_exited_unslashed_indices
            .replace(our_exited_unslashed_indices.clone())
        else {
            return ValidatorIndexSet::new();
        };

        let newly_exited = &our_exited_unslashed_indices - &previous;

        for index in &newly_exited {
            let Some(validator) = our_exited_unslashed.get(index) else {
                continue;
            };

            info!(index, pubkey = validator.pubkey.short(); "🚶 our validator is exited");

            let message = format!(
                "🚶 Our validator {} is exited",
                self.notifier.explorer().validator(&validator.pubkey)
            );
            self.notifier.notify(&message).await;
        }

        newly_exited
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        ExitedValidators, IndexToValidator, Validator, ValidatorIndexSet,
        messenger::{Explorer, Notifier, tests::MockMessenger, tests::notifier},
        metrics::{Gauge, tests::InMemMetrics},
    };

    fn validator(pubkey: &str, slashed: bool) -> Validator {
        Validator {
            pubkey: pubkey.into(),
            effective_balance: 32_000_000_000,
            slashed,
        }
    }

    fn our_withdrawal() -> IndexToValidator {
        IndexToValidator::from([
            (46, validator("0x1234", false)),
            (47, validator("0x5678", true)),
        ])
    }

    #[tokio::test]
    async fn test_process() {
        let metrics = InMemMetrics::default();
        let (notifier, messenger) = notifier();
        let mut exited_validators = ExitedValidators::new(metrics.clone(), notifier);

        let our_exited_unslashed = IndexToValidator::from([
            (44, validator("0x9012", false)),
            (45, validator("0x3456", false)),
        ]);

        // 47 is not counted, because it is slashed.
        let newly_exited = exited_validators
            .process(&our_exited_unslashed, &our_withdrawal())
            .await;
        assert!(newly_exited.is_empty());
        assert_eq!(metrics.gauge(Gauge::OurExitedValidators), Some(3));
        assert!(messenger.messages().is_empty());
        assert_eq!(
            exited_validators.our_exited_unslashed_indices,
            Some(ValidatorIndexSet::from([44, 45]))
        );

        let our_exited_unslashed = IndexToValidator::from([
            (44, validator("0x9012", false)),
            (45, validator("0x3456", false)),
            (48, validator("0x5432", false)),
        ]);

        let newly_exited = exited_validators
            .process(&our_exited_unslashed, &our_withdrawal())
            .await;
        assert_eq!(newly_exited, ValidatorIndexSet::from([48]));
        assert_eq!(metrics.gauge(Gauge::OurExitedValidators), Some(4));
        assert_eq!(
            messenger.messages(),
            vec!["🚶 Our validator `0x5432` is exited"]
        );
        assert_eq!(
            exited_validators.our_exited_unslashed_indices,
            Some(ValidatorIndexSet::from([44, 45, 48]))
        );

        // Same input again: nothing new.
        let newly_exited = exited_validators
            .process(&our_exited_unslashed, &our_withdrawal())
            .await;
        assert!(newly_exited.is_empty());
        assert_eq!(messenger.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_process_seeded_with_empty() {
        let metrics = InMemMetrics::default();
        let (notifier, messenger) = notifier();
        let mut exited_validators = ExitedValidators::new(metrics.clone(), notifier);

        exited_validators
            .process(&IndexToValidator::new(), &IndexToValidator::new())
            .await;
        assert_eq!(metrics.gauge(Gauge::OurExitedValidators), Some(0));
        assert_eq!(
            exited_validators.our_exited_unslashed_indices,
            Some(ValidatorIndexSet::new())
        );

        // Seeded with an empty set, hence the next exit is new.
        let our_exited_unslashed = IndexToValidator::from([(44, validator("0x9012", false))]);
        let newly_exited = exited_validators
            .process(&our_exited_unslashed, &IndexToValidator::new())
            .await;
        assert_eq!(newly_exited, ValidatorIndexSet::from([44]));
        assert_eq!(messenger.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_process_disappeared() {
        let metrics = InMemMetrics::default();
        let (notifier, messenger) = notifier();
        let mut exited_validators = ExitedValidators::new(metrics, notifier);

        let our_exited_unslashed = IndexToValidator::from([
            (44, validator("0x9012", false)),
            (45, validator("0x3456", false)),
        ]);
        exited_validators
            .process(&our_exited_unslashed, &IndexToValidator::new())
            .await;

        // 45 became withdrawable: no alert for it, neither now nor later.
        let our_exited_unslashed = IndexToValidator::from([(44, validator("0x9012", false))]);
        let our_withdrawal = IndexToValidator::from([(45, validator("0x3456", false))]);
        let newly_exited = exited_validators
            .process(&our_exited_unslashed, &our_withdrawal)
            .await;
        assert!(newly_exited.is_empty());
        assert!(messenger.messages().is_empty());
    }

    #[tokio::test]
    async fn test_process_explorer_link() {
        let messenger = MockMessenger::default();
        let explorer = Explorer::new(Some("https://beaconcha.in".to_owned()));
        let mut exited_validators = ExitedValidators::new(
            InMemMetrics::default(),
            Notifier::new(messenger.clone(), explorer),
        );

        exited_validators
            .process(&IndexToValidator::new(), &IndexToValidator::new())
            .await;
        let our_exited_unslashed =
            IndexToValidator::from([(44, validator("0xa1b2c3d4e5f6a7b8", false))]);
        exited_validators
            .process(&our_exited_unslashed, &IndexToValidator::new())
            .await;

        assert_eq!(
            messenger.messages(),
            vec![
                "🚶 Our validator [0xa1b2c3d4](https://beaconcha.in/validator/0xa1b2c3d4e5f6a7b8) is exited"
            ]
        );
    }
}
