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

#[tokio::main]
async fn main() {
    use log::error;
    use std::panic;
    use watcher_common::telemetry;

    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    use anyhow::Context;
    use log::{info, warn};
    use tokio::signal::unix::{SignalKind, signal};
    use validator_watcher::{
        application,
        config::Config,
        domain::messenger::MultiMessenger,
        infra::{
            self, AnyMessenger,
            beacon_client::BeaconClient,
            execution_client::ExecutionClient,
            prometheus::PrometheusMetrics,
            slack::Slack,
            telegram::Telegram,
        },
    };
    use watcher_common::{config::ConfigExt, telemetry};

    let sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler can be registered");
    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        application_config,
        infra_config,
        telemetry_config: telemetry::Config { metrics_config },
    } = config;

    telemetry::init_metrics(metrics_config).context("init metrics")?;

    let infra::Config {
        beacon_config,
        execution_config,
        telegram_config,
        slack_config,
    } = infra_config;

    let beacon = BeaconClient::new(beacon_config).context("create beacon client")?;

    let execution = execution_config
        .map(ExecutionClient::new)
        .transpose()
        .context("create execution client")?;

    let mut messengers = vec![];
    if let Some(telegram_config) = telegram_config {
        let telegram = Telegram::new(telegram_config).context("create Telegram messenger")?;
        messengers.push(AnyMessenger::Telegram(telegram));
    }
    if let Some(slack_config) = slack_config {
        let slack = Slack::new(slack_config).context("create Slack messenger")?;
        messengers.push(AnyMessenger::Slack(slack));
    }
    if messengers.is_empty() {
        warn!("no messenger configured, alerts are only logged");
    }
    let messenger = MultiMessenger::new(messengers);

    let metrics = PrometheusMetrics::new();

    application::run(
        application_config,
        beacon,
        execution,
        messenger,
        metrics,
        sigterm,
    )
    .await
    .context("run validator watcher application")
}
