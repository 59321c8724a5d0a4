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

use std::error::Error as StdError;

/// Execution node abstraction.
#[trait_variant::make(Send)]
pub trait Execution
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// The execution block with the given hash, including its transactions.
    async fn block_by_hash(&self, block_hash: &str) -> Result<ExecutionBlock, Self::Error>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionBlock {
    /// In block order; empty for an empty block.
    pub transactions: Vec<ExecutionTransaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTransaction {
    /// `None` for contract creations.
    pub to: Option<String>,
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::{collections::HashMap, convert::Infallible, sync::Arc};

    #[derive(Debug, Clone, Default)]
    pub struct MockExecution {
        pub blocks: HashMap<String, ExecutionBlock>,
        pub requests: Arc<Mutex<Vec<String>>>,
    }

    impl MockExecution {
        pub fn with_block(block_hash: &str, recipients: &[Option<&str>]) -> Self {
            let transactions = recipients
                .iter()
                .map(|to| ExecutionTransaction {
                    to: to.map(ToOwned::to_owned),
                })
                .collect();

            Self {
                blocks: HashMap::from([(block_hash.to_owned(), ExecutionBlock { transactions })]),
                ..Default::default()
            }
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl Execution for MockExecution {
        type Error = Infallible;

        async fn block_by_hash(&self, block_hash: &str) -> Result<ExecutionBlock, Self::Error> {
            self.requests.lock().push(block_hash.to_owned());
            Ok(self.blocks.get(block_hash).cloned().unwrap_or_default())
        }
    }
}
