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

use crate::domain::metrics::{Counter, Gauge, Metrics};
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// A [Metrics] implementation recording to the globally installed recorder, e.g. the Prometheus
/// exporter.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    /// Describes all gauges and counters; the recorder must already be installed.
    pub fn new() -> Self {
        for gauge in Gauge::ALL {
            describe_gauge!(gauge.name(), gauge.description());
        }
        for counter in Counter::ALL {
            describe_counter!(counter.name(), counter.description());
        }

        Self
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics for PrometheusMetrics {
    fn set_gauge(&self, gauge: Gauge, value: usize) {
        gauge!(gauge.name()).set(value as f64);
    }

    fn increment_counter(&self, counter: Counter) {
        counter!(counter.name()).increment(1);
    }
}
