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

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub channel: String,

    pub token: SecretString,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// A [Messenger] implementation posting to a Slack channel.
#[derive(Debug, Clone)]
pub struct Slack {
    channel: String,
    token: SecretString,
    http: HttpClient,
}

impl Slack {
    pub fn new(config: Config) -> Result<Self, SlackError> {
        let Config {
            channel,
            token,
            timeout,
        } = config;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(SlackError::Client)?;

        Ok(Self {
            channel,
            token,
            http,
        })
    }
}

impl Messenger for Slack {
    type Error = SlackError;

    async fn send_message(&self, message: &str) -> Result<(), Self::Error> {
        let request = PostMessageRequest {
            channel: &self.channel,
            text: message,
        };

        let response = self
            .http
            .post(POST_MESSAGE_URL)
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(SlackError::Send)?
            .json::<PostMessageResponse>()
            .await
            .map_err(SlackError::Send)?;

        response.into_result()
    }
}

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot send message to Slack")]
    Send(#[source] reqwest::Error),

    #[error("Slack rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack answers with 200 OK even for failures.
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

impl PostMessageResponse {
    fn into_result(self) -> Result<(), SlackError> {
        if self.ok {
            Ok(())
        } else {
            let error = self.error.unwrap_or_else(|| "unknown error".to_owned());
            Err(SlackError::Rejected(error))
        }
    }
}
