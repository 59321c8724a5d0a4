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

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::de::DeserializeOwned;
use std::env;

const CONFIG_FILE: &str = "CONFIG_FILE";
const CONFIG_FILE_DEFAULT: &str = "config.yaml";
const ENV_PREFIX: &str = "APP__";

/// Extension methods for configuration types.
pub trait ConfigExt
where
    Self: DeserializeOwned,
{
    /// Load the configuration from the YAML file at `$CONFIG_FILE` (defaults to
    /// `config.yaml`), overridden by `APP__` prefixed environment variables, where `__`
    /// separates nested keys, e.g. `APP__INFRA__BEACON__URL`.
    fn load() -> Result<Self, Box<figment::Error>> {
        let config_file =
            env::var(CONFIG_FILE).unwrap_or_else(|_| CONFIG_FILE_DEFAULT.to_owned());

        Figment::new()
            .merge(Yaml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }
}

impl<T> ConfigExt for T where T: DeserializeOwned {}

#[cfg(test)]
mod tests {
    use crate::config::ConfigExt;
    use figment::Jail;
    use indoc::indoc;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Config {
        application: ApplicationConfig,
    }

    #[derive(Debug, Deserialize)]
    struct ApplicationConfig {
        slots_per_epoch: u64,
        explorer_url: Option<String>,
    }

    #[test]
    fn test_load() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "watcher.yaml",
                indoc! {"
                    application:
                      slots_per_epoch: 32
                "},
            )?;
            jail.set_env("CONFIG_FILE", "watcher.yaml");
            jail.set_env("APP__APPLICATION__EXPLORER_URL", "https://beaconcha.in");

            let config = Config::load().map_err(|error| *error)?;
            assert_eq!(config.application.slots_per_epoch, 32);
            assert_eq!(
                config.application.explorer_url.as_deref(),
                Some("https://beaconcha.in")
            );

            Ok(())
        });
    }
}
