//! Sync configuration for client apps.
//!
//! `SyncConfig` is loaded from `HABIT_*` environment variables (or a JSON
//! document with the same fields) and tells the engine which server to talk
//! to, which owner's records to sync, and how aggressively to retry.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{canonical_base_url, normalize_text_option};
use crate::{Error, Result};

const ENV_API_BASE_URL: &str = "HABIT_API_BASE_URL";
const ENV_OWNER_ID: &str = "HABIT_OWNER_ID";
const ENV_SYNC_INTERVAL_SECS: &str = "HABIT_SYNC_INTERVAL_SECS";
const ENV_BACKOFF_BASE_SECS: &str = "HABIT_BACKOFF_BASE_SECS";
const ENV_BACKOFF_CAP_SECS: &str = "HABIT_BACKOFF_CAP_SECS";
const ENV_MAX_RETRIES: &str = "HABIT_MAX_RETRIES";
const ENV_REQUEST_TIMEOUT_SECS: &str = "HABIT_REQUEST_TIMEOUT_SECS";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_BACKOFF_BASE_SECS: u64 = 10;
const DEFAULT_BACKOFF_CAP_SECS: u64 = 10 * 60;
const DEFAULT_MAX_RETRIES: u32 = 8;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Remote sync settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Base URL of the habit API, without a trailing slash.
    pub api_base_url: String,
    /// Owner whose records this device syncs.
    pub owner_id: String,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Failed attempts before a record is quarantined; `0` retries forever.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl SyncConfig {
    /// Config with default timings for the given server and owner.
    pub fn new(api_base_url: impl Into<String>, owner_id: impl Into<String>) -> Result<Self> {
        Self {
            api_base_url: api_base_url.into(),
            owner_id: owner_id.into(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_cap_secs: DEFAULT_BACKOFF_CAP_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
        .validated()
    }

    /// Load sync configuration from environment variables.
    ///
    /// Returns `Ok(None)` when neither the base URL nor the owner is set.
    /// Returns an error when only one of them is set or a value is malformed.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Load sync configuration for an owner the caller already resolved.
    ///
    /// `HABIT_OWNER_ID` is ignored in favour of `owner_id`. Returns `Ok(None)`
    /// when no base URL is configured.
    pub fn from_lookup_for_owner(
        lookup: impl Fn(&str) -> Option<String>,
        owner_id: &str,
    ) -> Result<Option<Self>> {
        if normalize_text_option(lookup(ENV_API_BASE_URL)).is_none() {
            return Ok(None);
        }
        parse_config(|key| {
            if key == ENV_OWNER_ID {
                Some(owner_id.to_string())
            } else {
                lookup(key)
            }
        })
    }

    /// Parse a JSON config document.
    pub fn from_json(payload: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| Error::InvalidInput(format!("invalid sync config JSON: {error}")))?;
        config.validated()
    }

    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub const fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub const fn backoff_cap(&self) -> Duration {
        Duration::from_secs(self.backoff_cap_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validated(mut self) -> Result<Self> {
        self.api_base_url = canonical_base_url(&self.api_base_url)
            .map_err(|reason| Error::InvalidInput(format!("{ENV_API_BASE_URL} {reason}")))?;

        self.owner_id = normalize_text_option(Some(self.owner_id))
            .ok_or_else(|| Error::InvalidInput(format!("{ENV_OWNER_ID} must not be empty")))?;

        if self.sync_interval_secs == 0 {
            return Err(Error::InvalidInput(
                "sync interval must be at least one second".into(),
            ));
        }
        if self.backoff_base_secs == 0 {
            return Err(Error::InvalidInput(
                "backoff base must be at least one second".into(),
            ));
        }
        if self.backoff_cap_secs < self.backoff_base_secs {
            return Err(Error::InvalidInput(
                "backoff cap must not be below the backoff base".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request timeout must be at least one second".into(),
            ));
        }
        Ok(self)
    }
}

const fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

const fn default_backoff_base_secs() -> u64 {
    DEFAULT_BACKOFF_BASE_SECS
}

const fn default_backoff_cap_secs() -> u64 {
    DEFAULT_BACKOFF_CAP_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<SyncConfig>> {
    let api_base_url = normalize_text_option(lookup(ENV_API_BASE_URL));
    let owner_id = normalize_text_option(lookup(ENV_OWNER_ID));

    let (api_base_url, owner_id) = match (api_base_url, owner_id) {
        (None, None) => return Ok(None),
        (Some(api_base_url), Some(owner_id)) => (api_base_url, owner_id),
        (None, Some(_)) => {
            return Err(Error::InvalidInput(format!(
                "sync configuration is incomplete. Missing: {ENV_API_BASE_URL}"
            )))
        }
        (Some(_), None) => {
            return Err(Error::InvalidInput(format!(
                "sync configuration is incomplete. Missing: {ENV_OWNER_ID}"
            )))
        }
    };

    let mut config = SyncConfig::new(api_base_url, owner_id)?;
    if let Some(value) = parse_number(&lookup, ENV_SYNC_INTERVAL_SECS)? {
        config.sync_interval_secs = value;
    }
    if let Some(value) = parse_number(&lookup, ENV_BACKOFF_BASE_SECS)? {
        config.backoff_base_secs = value;
    }
    if let Some(value) = parse_number(&lookup, ENV_BACKOFF_CAP_SECS)? {
        config.backoff_cap_secs = value;
    }
    if let Some(value) = parse_number(&lookup, ENV_MAX_RETRIES)? {
        config.max_retries = value;
    }
    if let Some(value) = parse_number(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
        config.request_timeout_secs = value;
    }

    config.validated().map(Some)
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    normalize_text_option(lookup(key))
        .map(|value| {
            value.parse().map_err(|_| {
                Error::InvalidInput(format!("{key} must be a non-negative integer, got '{value}'"))
            })
        })
        .transpose()
}
