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

use crate::domain::{Epoch, Pubkey, Slot};
use log::warn;
use std::error::Error as StdError;
use thiserror::Error;
use watcher_common::error::StdErrorExt;

/// Messenger abstraction, e.g. a chat service.
#[trait_variant::make(Send)]
pub trait Messenger
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Send the given Markdown formatted message.
    async fn send_message(&self, message: &str) -> Result<(), Self::Error>;
}

/// Fans a message out to zero or more messengers.
#[derive(Debug, Clone)]
pub struct MultiMessenger<M> {
    messengers: Vec<M>,
}

impl<M> MultiMessenger<M> {
    pub fn new(messengers: Vec<M>) -> Self {
        Self { messengers }
    }

    pub fn len(&self) -> usize {
        self.messengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messengers.is_empty()
    }
}

impl<M> Default for MultiMessenger<M> {
    fn default() -> Self {
        Self { messengers: vec![] }
    }
}

impl<M> Messenger for MultiMessenger<M>
where
    M: Messenger,
{
    type Error = FanOutError<M::Error>;

    /// Every messenger gets the message, even if sending to another one has failed.
    async fn send_message(&self, message: &str) -> Result<(), Self::Error> {
        let mut errors = vec![];
        for messenger in &self.messengers {
            if let Err(error) = messenger.send_message(message).await {
                errors.push(error);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FanOutError {
                errors,
                total: self.messengers.len(),
            })
        }
    }
}

#[derive(Debug, Error)]
#[error(
    "cannot send message via {} of {total} messengers: {}",
    .errors.len(),
    join_errors(.errors)
)]
pub struct FanOutError<E>
where
    E: StdError,
{
    pub errors: Vec<E>,
    pub total: usize,
}

fn join_errors<E>(errors: &[E]) -> String
where
    E: StdError,
{
    itertools::join(errors.iter().map(|error| error.as_chain()), "; ")
}

/// Renders validators, epochs and slots for messages: as Markdown links into a beacon chain
/// explorer if configured, else as inline code.
#[derive(Debug, Clone, Default)]
pub struct Explorer {
    url: Option<String>,
}

impl Explorer {
    pub fn new(url: Option<String>) -> Self {
        let url = url.map(|url| url.trim_end_matches('/').to_owned());
        Self { url }
    }

    pub fn validator(&self, pubkey: &Pubkey) -> String {
        match &self.url {
            Some(url) => format!("[{}]({url}/validator/{pubkey})", pubkey.short()),
            None => format!("`{}`", pubkey.short()),
        }
    }

    pub fn epoch(&self, epoch: Epoch) -> String {
        match &self.url {
            Some(url) => format!("[{epoch}]({url}/epoch/{epoch})"),
            None => format!("`{epoch}`"),
        }
    }

    pub fn slot(&self, slot: Slot) -> String {
        match &self.url {
            Some(url) => format!("[{slot}]({url}/slot/{slot})"),
            None => format!("`{slot}`"),
        }
    }
}

/// Sends messages and never fails: delivery errors are only logged.
#[derive(Debug, Clone)]
pub struct Notifier<M> {
    messenger: M,
    explorer: Explorer,
}

impl<M> Notifier<M>
where
    M: Messenger,
{
    pub fn new(messenger: M, explorer: Explorer) -> Self {
        Self {
            messenger,
            explorer,
        }
    }

    pub fn explorer(&self) -> &Explorer {
        &self.explorer
    }

    pub async fn notify(&self, message: &str) {
        if let Err(error) = self.messenger.send_message(message).await {
            warn!(error = error.as_chain(); "cannot send message");
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::{convert::Infallible, sync::Arc};

    /// Records all messages sent.
    #[derive(Debug, Clone, Default)]
    pub struct MockMessenger {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl MockMessenger {
        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().clone()
        }
    }

    impl Messenger for MockMessenger {
        type Error = Infallible;

        async fn send_message(&self, message: &str) -> Result<(), Self::Error> {
            self.messages.lock().push(message.to_owned());
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct FailingMessenger;

    #[derive(Debug, Error)]
    #[error("chat service unavailable")]
    pub struct Unavailable;

    impl Messenger for FailingMessenger {
        type Error = Unavailable;

        async fn send_message(&self, _message: &str) -> Result<(), Self::Error> {
            Err(Unavailable)
        }
    }

    /// A [Notifier] without explorer links, recording its messages.
    pub fn notifier() -> (Notifier<MockMessenger>, MockMessenger) {
        let messenger = MockMessenger::default();
        (
            Notifier::new(messenger.clone(), Explorer::default()),
            messenger,
        )
    }

    #[derive(Debug, Clone)]
    enum AnyMock {
        Mock(MockMessenger),
        Failing(FailingMessenger),
    }

    impl Messenger for AnyMock {
        type Error = Unavailable;

        async fn send_message(&self, message: &str) -> Result<(), Self::Error> {
            match self {
                AnyMock::Mock(messenger) => {
                    let _ = messenger.send_message(message).await;
                    Ok(())
                }
                AnyMock::Failing(messenger) => messenger.send_message(message).await,
            }
        }
    }

    #[tokio::test]
    async fn test_multi_messenger() {
        let first = MockMessenger::default();
        let second = MockMessenger::default();
        let messenger = MultiMessenger::new(vec![
            AnyMock::Mock(first.clone()),
            AnyMock::Failing(FailingMessenger),
            AnyMock::Mock(second.clone()),
        ]);

        let result = messenger.send_message("hello").await;
        let error = result.expect_err("one messenger fails");
        assert_eq!(error.errors.len(), 1);
        assert_eq!(error.total, 3);
        assert_eq!(
            error.to_string(),
            "cannot send message via 1 of 3 messengers: chat service unavailable"
        );

        assert_eq!(first.messages(), vec!["hello"]);
        assert_eq!(second.messages(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_multi_messenger_empty() {
        let messenger = MultiMessenger::<MockMessenger>::default();
        assert!(messenger.is_empty());
        assert!(messenger.send_message("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_notifier_swallows_errors() {
        let notifier = Notifier::new(FailingMessenger, Explorer::default());
        notifier.notify("hello").await;
    }

    #[test]
    fn test_explorer() {
        let pubkey = Pubkey::from("0xa1b2c3d4e5f6a7b8");

        let explorer = Explorer::default();
        assert_eq!(explorer.validator(&pubkey), "`0xa1b2c3d4`");
        assert_eq!(explorer.epoch(7), "`7`");
        assert_eq!(explorer.slot(230), "`230`");

        let explorer = Explorer::new(Some("https://beaconcha.in/".to_owned()));
        assert_eq!(
            explorer.validator(&pubkey),
            "[0xa1b2c3d4](https://beaconcha.in/validator/0xa1b2c3d4e5f6a7b8)"
        );
        assert_eq!(explorer.epoch(7), "[7](https://beaconcha.in/epoch/7)");
        assert_eq!(explorer.slot(230), "[230](https://beaconcha.in/slot/230)");
    }
}
