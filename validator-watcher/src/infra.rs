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

pub mod beacon_client;
pub mod execution_client;
pub mod prometheus;
pub mod slack;
pub mod telegram;

use crate::{
    domain::messenger::Messenger,
    infra::{
        slack::{Slack, SlackError},
        telegram::{Telegram, TelegramError},
    },
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "beacon")]
    pub beacon_config: beacon_client::Config,

    /// Without an execution node, fee recipients are not checked.
    #[serde(rename = "execution")]
    pub execution_config: Option<execution_client::Config>,

    #[serde(rename = "telegram")]
    pub telegram_config: Option<telegram::Config>,

    #[serde(rename = "slack")]
    pub slack_config: Option<slack::Config>,
}

/// One of the supported [Messenger] implementations.
#[derive(Debug, Clone)]
pub enum AnyMessenger {
    Telegram(Telegram),
    Slack(Slack),
}

impl Messenger for AnyMessenger {
    type Error = AnyMessengerError;

    async fn send_message(&self, message: &str) -> Result<(), Self::Error> {
        match self {
            AnyMessenger::Telegram(telegram) => telegram.send_message(message).await?,
            AnyMessenger::Slack(slack) => slack.send_message(message).await?,
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AnyMessengerError {
    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Slack(#[from] SlackError),
}

#[cfg(test)]
mod tests {
    use crate::infra::Config;
    use assert_matches::assert_matches;
    use figment::{
        Figment,
        providers::{Format, Yaml},
    };
    use indoc::indoc;
    use secrecy::ExposeSecret;
    use std::time::Duration;

    #[test]
    fn test_config() {
        let yaml = indoc! {"
            beacon:
              url: http://localhost:5052
              timeout: 30s
            telegram:
              chat_id: '-1001234'
              token: secret
              timeout: 10s
        "};

        let config = Figment::from(Yaml::string(yaml))
            .extract::<Config>()
            .expect("config can be extracted");

        assert_eq!(config.beacon_config.url, "http://localhost:5052");
        assert_eq!(config.beacon_config.timeout, Duration::from_secs(30));
        assert!(config.execution_config.is_none());
        assert!(config.slack_config.is_none());
        assert_matches!(
            config.telegram_config,
            Some(telegram) if telegram.token.expose_secret() == "secret"
        );
    }
}
