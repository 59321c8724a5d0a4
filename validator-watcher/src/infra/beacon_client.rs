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

use crate::domain::{
    Epoch, EpochWindow, Pubkey, Slot, Validator, ValidatorIndex, ValidatorIndexSet,
    beacon::{
        Beacon, BeaconType, Block, BlockId, ExecutionPayload, Genesis, Header, ProposerDuty,
        ValidatorInfo, ValidatorStatus,
    },
};
use log::debug;
use parking_lot::Mutex;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_with::{DisplayFromStr, serde_as};
use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, time::Duration};
use thiserror::Error;

/// Number of epochs for which proposer duties are memoized.
const PROPOSER_DUTIES_EPOCHS: NonZeroUsize =
    NonZeroUsize::new(8).expect("proposer duties epochs is not zero");

/// Config for the beacon node connection.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// A [Beacon] implementation based on the beacon node HTTP API.
#[derive(Debug, Clone)]
pub struct BeaconClient {
    url: String,
    http: HttpClient,
    proposer_duties: Arc<Mutex<EpochWindow<Vec<ProposerDuty>>>>,
}

impl BeaconClient {
    /// Create a new [BeaconClient] with the given [Config].
    pub fn new(config: Config) -> Result<Self, BeaconClientError> {
        let Config { url, timeout } = config;

        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(BeaconClientError::Client)?;

        Ok(Self {
            url: url.trim_end_matches('/').to_owned(),
            http,
            proposer_duties: Arc::new(Mutex::new(EpochWindow::new(PROPOSER_DUTIES_EPOCHS))),
        })
    }

    /// Send the given request and decode its response; `None` for 404 Not Found.
    async fn fetch<T>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>, BeaconClientError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|error| BeaconClientError::Request(path.to_owned(), error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|error| BeaconClientError::Request(path.to_owned(), error))?;

        let body = response
            .json::<T>()
            .await
            .map_err(|error| BeaconClientError::Decode(path.to_owned(), error))?;

        Ok(Some(body))
    }

    async fn get<T>(&self, path: &str) -> Result<Option<T>, BeaconClientError>
    where
        T: DeserializeOwned,
    {
        let request = self.http.get(format!("{}{path}", self.url));
        self.fetch(path, request).await
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<Option<T>, BeaconClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.http.post(format!("{}{path}", self.url)).json(body);
        self.fetch(path, request).await
    }
}

impl Beacon for BeaconClient {
    type Error = BeaconClientError;

    async fn genesis(&self) -> Result<Genesis, Self::Error> {
        let path = "/eth/v1/beacon/genesis";
        let response = self
            .get::<Data<GenesisDto>>(path)
            .await?
            .ok_or_else(|| BeaconClientError::NotFound(path.to_owned()))?;

        Ok(Genesis {
            genesis_time: response.data.genesis_time,
        })
    }

    async fn validators(&self, state_id: BlockId) -> Result<Vec<ValidatorInfo>, Self::Error> {
        let path = format!("/eth/v1/beacon/states/{state_id}/validators");
        let response = self
            .get::<Data<Vec<ValidatorInfoDto>>>(&path)
            .await?
            .ok_or(BeaconClientError::NotFound(path))?;

        let validators = response.data.into_iter().map(Into::into).collect();
        Ok(validators)
    }

    async fn validators_liveness(
        &self,
        beacon_type: BeaconType,
        epoch: Epoch,
        indices: &ValidatorIndexSet,
    ) -> Result<HashMap<ValidatorIndex, bool>, Self::Error> {
        let response = match beacon_type {
            BeaconType::Lighthouse => {
                let path = "/lighthouse/liveness";
                let body = LighthouseLivenessRequest {
                    indices: indices.iter().copied().collect(),
                    epoch,
                };
                self.post::<Data<Vec<LivenessDto>>, _>(path, &body)
                    .await?
                    .ok_or_else(|| BeaconClientError::NotFound(path.to_owned()))?
            }

            _ => {
                let path = format!("/eth/v1/validator/liveness/{epoch}");
                let body = indices.iter().map(ToString::to_string).collect::<Vec<_>>();
                self.post::<Data<Vec<LivenessDto>>, _>(&path, &body)
                    .await?
                    .ok_or(BeaconClientError::NotFound(path))?
            }
        };

        let liveness = response
            .data
            .into_iter()
            .map(|liveness| (liveness.index, liveness.is_live))
            .collect();
        Ok(liveness)
    }

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, Self::Error> {
        let cached = self.proposer_duties.lock().get(epoch).cloned();
        if let Some(duties) = cached {
            return Ok(duties);
        }

        let path = format!("/eth/v1/validator/duties/proposer/{epoch}");
        let response = self
            .get::<Data<Vec<ProposerDutyDto>>>(&path)
            .await?
            .ok_or(BeaconClientError::NotFound(path))?;

        let duties = response
            .data
            .into_iter()
            .map(Into::into)
            .collect::<Vec<ProposerDuty>>();
        debug!(epoch, duties = duties.len(); "fetched proposer duties");

        self.proposer_duties.lock().put(epoch, duties.clone());
        Ok(duties)
    }

    async fn header(&self, block_id: BlockId) -> Result<Option<Header>, Self::Error> {
        let path = format!("/eth/v1/beacon/headers/{block_id}");
        let header = self
            .get::<Data<HeaderDto>>(&path)
            .await?
            .map(|response| Header {
                slot: response.data.header.message.slot,
            });
        Ok(header)
    }

    async fn block(&self, block_id: BlockId) -> Result<Option<Block>, Self::Error> {
        let path = format!("/eth/v2/beacon/blocks/{block_id}");
        let block = self
            .get::<Data<BlockDto>>(&path)
            .await?
            .map(|response| response.data.message.into());
        Ok(block)
    }
}

#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("cannot make request {0}")]
    Request(String, #[source] reqwest::Error),

    #[error("cannot decode response of {0}")]
    Decode(String, #[source] reqwest::Error),

    #[error("unexpected 404 Not Found for {0}")]
    NotFound(String),
}

#[derive(Debug, Deserialize)]
struct Data<T> {
    data: T,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct GenesisDto {
    #[serde_as(as = "DisplayFromStr")]
    genesis_time: u64,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct ValidatorInfoDto {
    #[serde_as(as = "DisplayFromStr")]
    index: ValidatorIndex,
    status: ValidatorStatus,
    validator: ValidatorDto,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct ValidatorDto {
    pubkey: Pubkey,
    #[serde_as(as = "DisplayFromStr")]
    effective_balance: u64,
    slashed: bool,
}

impl From<ValidatorInfoDto> for ValidatorInfo {
    fn from(dto: ValidatorInfoDto) -> Self {
        let ValidatorInfoDto {
            index,
            status,
            validator,
        } = dto;

        Self {
            index,
            status,
            validator: Validator {
                pubkey: validator.pubkey,
                effective_balance: validator.effective_balance,
                slashed: validator.slashed,
            },
        }
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
struct LighthouseLivenessRequest {
    #[serde_as(as = "Vec<DisplayFromStr>")]
    indices: Vec<ValidatorIndex>,
    #[serde_as(as = "DisplayFromStr")]
    epoch: Epoch,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct LivenessDto {
    #[serde_as(as = "DisplayFromStr")]
    index: ValidatorIndex,
    is_live: bool,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct ProposerDutyDto {
    pubkey: Pubkey,
    #[serde_as(as = "DisplayFromStr")]
    validator_index: ValidatorIndex,
    #[serde_as(as = "DisplayFromStr")]
    slot: Slot,
}

impl From<ProposerDutyDto> for ProposerDuty {
    fn from(dto: ProposerDutyDto) -> Self {
        Self {
            slot: dto.slot,
            validator_index: dto.validator_index,
            pubkey: dto.pubkey,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeaderDto {
    header: SignedHeaderDto,
}

#[derive(Debug, Deserialize)]
struct SignedHeaderDto {
    message: HeaderMessageDto,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct HeaderMessageDto {
    #[serde_as(as = "DisplayFromStr")]
    slot: Slot,
}

#[derive(Debug, Deserialize)]
struct BlockDto {
    message: BlockMessageDto,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct BlockMessageDto {
    #[serde_as(as = "DisplayFromStr")]
    slot: Slot,
    #[serde_as(as = "DisplayFromStr")]
    proposer_index: ValidatorIndex,
    body: BlockBodyDto,
}

/// Pre-merge blocks have no execution payload.
#[derive(Debug, Deserialize)]
struct BlockBodyDto {
    execution_payload: Option<ExecutionPayloadDto>,
}

#[derive(Debug, Deserialize)]
struct ExecutionPayloadDto {
    fee_recipient: String,
    block_hash: String,
}

impl From<BlockMessageDto> for Block {
    fn from(dto: BlockMessageDto) -> Self {
        Self {
            slot: dto.slot,
            proposer_index: dto.proposer_index,
            execution_payload: dto.body.execution_payload.map(|payload| ExecutionPayload {
                fee_recipient: payload.fee_recipient,
                block_hash: payload.block_hash,
            }),
        }
    }
}
