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

use crate::domain::Epoch;
use std::{
    collections::{HashMap, VecDeque},
    num::NonZeroUsize,
};

/// Fixed-capacity mapping from epochs to values. Once more than `capacity` distinct epochs
/// have been stored, the least recently inserted one is evicted; reading an entry does not
/// affect eviction. An evicted epoch is unknown to the window, i.e. [EpochWindow::get]
/// returns `None` for it.
#[derive(Debug, Clone)]
pub struct EpochWindow<V> {
    capacity: NonZeroUsize,
    // Insertion order, oldest first; always has the same keys as `entries`.
    epochs: VecDeque<Epoch>,
    entries: HashMap<Epoch, V>,
}

impl<V> EpochWindow<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            epochs: VecDeque::with_capacity(capacity.get() + 1),
            entries: HashMap::with_capacity(capacity.get() + 1),
        }
    }

    /// Store the value for the given epoch. Overwriting a resident epoch keeps its original
    /// insertion position. Returns the evicted entry, if any.
    pub fn put(&mut self, epoch: Epoch, value: V) -> Option<(Epoch, V)> {
        if self.entries.insert(epoch, value).is_some() {
            return None;
        }

        self.epochs.push_back(epoch);
        if self.epochs.len() <= self.capacity.get() {
            return None;
        }

        self.epochs.pop_front().and_then(|evicted| {
            self.entries
                .remove(&evicted)
                .map(|value| (evicted, value))
        })
    }

    pub fn get(&self, epoch: Epoch) -> Option<&V> {
        self.entries.get(&epoch)
    }

    pub fn contains(&self, epoch: Epoch) -> bool {
        self.entries.contains_key(&epoch)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }
}
