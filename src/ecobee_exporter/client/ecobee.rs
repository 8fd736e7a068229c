// Ecobee Exporter - Thermostat and sensor metrics exporter for Prometheus
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::client::core::{ClientError, ClientErrorKind, Selection, Thermostat, ThermostatProvider};
use reqwest::blocking::Client as BlockingClient;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{event, Level};

pub const DEFAULT_API_URL: &str = "https://api.ecobee.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const STATUS_OK: i64 = 0;
const STATUS_TOKEN_EXPIRED: i64 = 14;

/// Settings for talking to the Ecobee API on behalf of a single account.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Application key from the Ecobee developer portal
    pub app_id: String,
    /// JSON file holding OAuth access and refresh tokens
    pub cache_file: PathBuf,
    pub api_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new<P: Into<PathBuf>>(app_id: &str, cache_file: P) -> Self {
        ClientConfig {
            app_id: app_id.to_owned(),
            cache_file: cache_file.into(),
            api_url: DEFAULT_API_URL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Tokens persisted between runs. Additional fields written by other tools
/// (expiry, scope) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TokenCache {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

impl TokenCache {
    fn load(path: &Path) -> Result<Self, ClientError> {
        let bytes = fs::read(path).map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Io, "unable to read token cache", Box::new(e))
        })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to parse token cache", Box::new(e))
        })
    }

    fn store(&self, path: &Path) -> Result<(), ClientError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to encode token cache", Box::new(e))
        })?;

        fs::write(path, bytes).map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Io, "unable to write token cache", Box::new(e))
        })
    }
}

#[derive(Debug, Serialize)]
struct ThermostatRequest<'a> {
    selection: &'a Selection,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThermostatResponse {
    #[serde(default)]
    thermostat_list: Vec<Thermostat>,
    status: Status,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

/// Client for the Ecobee thermostat API.
///
/// OAuth tokens are read from the cache file on first use and refreshed (and
/// written back to the cache file) when the API reports they have expired. The
/// initial PIN authorization must be done out of band to seed the cache file.
#[derive(Debug)]
pub struct EcobeeClient {
    config: ClientConfig,
    tokens: Mutex<Option<TokenCache>>,
}

impl EcobeeClient {
    pub fn new(config: ClientConfig) -> Self {
        EcobeeClient {
            config,
            tokens: Mutex::new(None),
        }
    }

    // Built per fetch so that the blocking client (and the runtime it owns) is
    // created and dropped on the calling thread, never on an async worker.
    fn http_client(&self) -> Result<BlockingClient, ClientError> {
        BlockingClient::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Http, "unable to create HTTP client", Box::new(e)))
    }

    fn tokens(&self) -> Result<TokenCache, ClientError> {
        let mut tokens = self.tokens.lock().unwrap();
        if let Some(t) = tokens.as_ref() {
            return Ok(t.clone());
        }

        let loaded = TokenCache::load(&self.config.cache_file)?;
        *tokens = Some(loaded.clone());
        Ok(loaded)
    }

    fn refresh(&self, http: &BlockingClient, current: &TokenCache) -> Result<TokenCache, ClientError> {
        // Held for the entire refresh: refresh tokens are single use, so overlapping
        // fetches must not both spend the same one.
        let mut tokens = self.tokens.lock().unwrap();
        if let Some(t) = tokens.as_ref().filter(|t| *t != current) {
            return Ok(t.clone());
        }

        let refreshed = match self.request_refresh(http, current) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                // Re-read the cache file on the next fetch in case it has been re-seeded
                if e.kind() == ClientErrorKind::Authentication {
                    *tokens = None;
                }

                return Err(e);
            }
        };

        *tokens = Some(refreshed.clone());
        if let Err(e) = refreshed.store(&self.config.cache_file) {
            event!(
                Level::ERROR,
                message = "unable to persist refreshed tokens",
                cache_file = %self.config.cache_file.display(),
                error = %e,
            );
        }

        Ok(refreshed)
    }

    fn request_refresh(&self, http: &BlockingClient, current: &TokenCache) -> Result<TokenCache, ClientError> {
        let res = http
            .post(format!("{}/token", self.config.api_url))
            .query(&[
                ("grant_type", "refresh_token"),
                ("code", current.refresh_token.as_str()),
                ("client_id", self.config.app_id.as_str()),
            ])
            .send()
            .map_err(|e| {
                ClientError::KindMsgCause(ClientErrorKind::Authentication, "unable to refresh tokens", Box::new(e))
            })?;

        let status = res.status();
        if !status.is_success() {
            event!(
                Level::ERROR,
                message = "token refresh rejected",
                status = status.as_u16(),
                cache_file = %self.config.cache_file.display(),
            );

            return Err(ClientError::KindMsg(
                ClientErrorKind::Authentication,
                "token refresh rejected, re-authorize the application",
            ));
        }

        let refreshed: TokenResponse = res.json().map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to parse token response", Box::new(e))
        })?;

        Ok(TokenCache {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            token_type: refreshed.token_type,
        })
    }

    fn request_thermostats(
        &self,
        http: &BlockingClient,
        tokens: &TokenCache,
        selection: &Selection,
    ) -> Result<ThermostatResponse, ClientError> {
        let body = serde_json::to_string(&ThermostatRequest { selection }).map_err(|e| {
            ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to encode selection", Box::new(e))
        })?;

        let res = http
            .get(format!("{}/1/thermostat", self.config.api_url))
            .query(&[("format", "json"), ("body", body.as_str())])
            .bearer_auth(&tokens.access_token)
            .send()
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Http, "unable to fetch thermostats", Box::new(e)))?;

        let status = res.status();
        let bytes = res
            .bytes()
            .map_err(|e| ClientError::KindMsgCause(ClientErrorKind::Http, "unable to read response", Box::new(e)))?;

        // Errors, including expired tokens, come back with a non-2xx status and a
        // status object in the body. Only give up on the body if it can't be parsed.
        parse_response(&bytes).map_err(|e| {
            if status.is_success() {
                e
            } else {
                ClientError::HttpStatus(status.as_u16())
            }
        })
    }
}

fn parse_response(bytes: &[u8]) -> Result<ThermostatResponse, ClientError> {
    serde_json::from_slice(bytes).map_err(|e| {
        ClientError::KindMsgCause(ClientErrorKind::Decode, "unable to parse thermostat response", Box::new(e))
    })
}

impl ThermostatProvider for EcobeeClient {
    fn get_thermostats(&self, selection: &Selection) -> Result<Vec<Thermostat>, ClientError> {
        let http = self.http_client()?;
        let tokens = self.tokens()?;
        let mut res = self.request_thermostats(&http, &tokens, selection)?;

        if res.status.code == STATUS_TOKEN_EXPIRED {
            event!(
                Level::INFO,
                message = "access token expired, refreshing",
                cache_file = %self.config.cache_file.display(),
            );

            let tokens = self.refresh(&http, &tokens)?;
            res = self.request_thermostats(&http, &tokens, selection)?;
        }

        if res.status.code != STATUS_OK {
            return Err(ClientError::Api(res.status.code, res.status.message));
        }

        Ok(res.thermostat_list)
    }
}
