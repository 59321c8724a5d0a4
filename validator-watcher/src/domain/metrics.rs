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

/// Metrics sink abstraction; set and increment only.
pub trait Metrics
where
    Self: Clone + Send + Sync + 'static,
{
    fn set_gauge(&self, gauge: Gauge, value: usize);

    fn increment_counter(&self, counter: Counter);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    OurExitedValidators,
    OurSlashedValidators,
    TotalSlashedValidators,
    MissedAttestations,
    DoubleMissedAttestations,
}

impl Gauge {
    pub const ALL: [Gauge; 5] = [
        Gauge::OurExitedValidators,
        Gauge::OurSlashedValidators,
        Gauge::TotalSlashedValidators,
        Gauge::MissedAttestations,
        Gauge::DoubleMissedAttestations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gauge::OurExitedValidators => "our_exited_validators_count",
            Gauge::OurSlashedValidators => "our_slashed_validators_count",
            Gauge::TotalSlashedValidators => "total_slashed_validators_count",
            Gauge::MissedAttestations => "missed_attestations_count",
            Gauge::DoubleMissedAttestations => "double_missed_attestations_count",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Gauge::OurExitedValidators => "Our exited validators count",
            Gauge::OurSlashedValidators => "Our slashed validators count",
            Gauge::TotalSlashedValidators => "Total slashed validators count",
            Gauge::MissedAttestations => "Missed attestations count",
            Gauge::DoubleMissedAttestations => "Double missed attestations count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    MissedBlockProposalsHead,
    MissedBlockProposalsFinalized,
    WrongFeeRecipientProposedBlock,
}

impl Counter {
    pub const ALL: [Counter; 3] = [
        Counter::MissedBlockProposalsHead,
        Counter::MissedBlockProposalsFinalized,
        Counter::WrongFeeRecipientProposedBlock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Counter::MissedBlockProposalsHead => "missed_block_proposals_head_count",
            Counter::MissedBlockProposalsFinalized => "missed_block_proposals_finalized_count",
            Counter::WrongFeeRecipientProposedBlock => "wrong_fee_recipient_proposed_block_count",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Counter::MissedBlockProposalsHead => "Missed block proposals head count",
            Counter::MissedBlockProposalsFinalized => "Missed block proposals finalized count",
            Counter::WrongFeeRecipientProposedBlock => "Wrong fee recipient proposed block count",
        }
    }
}
