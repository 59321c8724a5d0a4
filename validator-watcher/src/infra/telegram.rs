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

use crate::domain::messenger::Messenger;
use reqwest::Client as HttpClient;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chat_id: String,

    pub token: SecretString,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// A [Messenger] implementation posting to a Telegram chat via a bot.
#[derive(Debug, Clone)]
pub struct Telegram {
    chat_id: String,
    token: SecretString,
    http: HttpClient,
}

impl Telegram {
    pub fn new(config: Config) -> Result<Self, TelegramError> {
        let Config {
            chat_id,
            token,
            timeout,
        } = config;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(TelegramError::Client)?;

        Ok(Self {
            chat_id,
            token,
            http,
        })
    }
}

impl Messenger for Telegram {
    type Error = TelegramError;

    async fn send_message(&self, message: &str) -> Result<(), Self::Error> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "Markdown",
        };

        self.http
            .post(format!(
                "{API_URL}/bot{}/sendMessage",
                self.token.expose_secret()
            ))
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            // The URL contains the token.
            .map_err(|error| TelegramError::Send(error.without_url()))?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot send message to Telegram")]
    Send(#[source] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}
