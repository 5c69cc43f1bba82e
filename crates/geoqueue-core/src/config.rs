//! Process-lifetime configuration.
//!
//! Values come from defaults, then `GEOQUEUE_*` environment variables, then
//! whatever the caller (usually CLI flags) overrides. Nothing here changes
//! once a chain or orchestrator has been built from it.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestratorConfig;
use crate::retry::RetryConfig;
use crate::source::parse_provider_list;
use crate::{ConfigError, ProviderId};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_INTER_BATCH_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_NOMINATIM_RPS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Resolution order, cheapest and most reliable first.
    pub providers: Vec<ProviderId>,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub nominatim_requests_per_second: u32,
    /// Reject coordinates outside Brazil's bounding box.
    pub restrict_to_brazil: bool,
    #[serde(skip_serializing)]
    pub google_maps_api_key: Option<String>,
    #[serde(skip_serializing)]
    pub positionstack_api_key: Option<String>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            providers: ProviderId::DEFAULT_CHAIN.to_vec(),
            request_timeout_ms: crate::http_client::DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay_ms: DEFAULT_INTER_BATCH_DELAY_MS,
            nominatim_requests_per_second: DEFAULT_NOMINATIM_RPS,
            restrict_to_brazil: true,
            google_maps_api_key: None,
            positionstack_api_key: None,
        }
    }
}

impl GeocoderConfig {
    /// Reads the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = read("GEOQUEUE_PROVIDERS") {
            config.providers = parse_provider_list(&value)?;
        }
        if let Some(value) = read("GEOQUEUE_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_number("GEOQUEUE_REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read("GEOQUEUE_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("GEOQUEUE_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read("GEOQUEUE_BATCH_SIZE") {
            config.batch_size = parse_number("GEOQUEUE_BATCH_SIZE", &value)?;
        }
        if let Some(value) = read("GEOQUEUE_INTER_BATCH_DELAY_MS") {
            config.inter_batch_delay_ms = parse_number("GEOQUEUE_INTER_BATCH_DELAY_MS", &value)?;
        }
        if let Some(value) = read("GEOQUEUE_NOMINATIM_RPS") {
            config.nominatim_requests_per_second = parse_number("GEOQUEUE_NOMINATIM_RPS", &value)?;
        }
        if let Some(value) = read("GEOQUEUE_RESTRICT_TO_BRAZIL") {
            config.restrict_to_brazil = parse_flag("GEOQUEUE_RESTRICT_TO_BRAZIL", &value)?;
        }

        config.google_maps_api_key =
            read("GEOQUEUE_GOOGLE_MAPS_API_KEY").or_else(|| read("GOOGLE_MAPS_API_KEY"));
        config.positionstack_api_key =
            read("GEOQUEUE_POSITIONSTACK_API_KEY").or_else(|| read("POSITIONSTACK_API_KEY"));

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::MustBePositive { field: "batch_size" });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::MustBePositive {
                field: "max_attempts",
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::MustBePositive {
                field: "request_timeout_ms",
            });
        }
        if self.nominatim_requests_per_second == 0 {
            return Err(ConfigError::MustBePositive {
                field: "nominatim_requests_per_second",
            });
        }
        Ok(())
    }

    pub fn api_key(&self, provider: ProviderId) -> Option<&str> {
        match provider {
            ProviderId::GoogleMaps => self.google_maps_api_key.as_deref(),
            ProviderId::Positionstack => self.positionstack_api_key.as_deref(),
            _ => None,
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::exponential(self.max_attempts)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            batch_size: self.batch_size,
            inter_batch_delay: Duration::from_millis(self.inter_batch_delay_ms),
        }
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_owned(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_match_free_provider_chain() {
        let config = GeocoderConfig::from_lookup(lookup(&[])).expect("defaults are valid");

        assert_eq!(config.providers, ProviderId::DEFAULT_CHAIN.to_vec());
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.inter_batch_delay_ms, 1_000);
        assert_eq!(config.max_attempts, 3);
        assert!(config.restrict_to_brazil);
    }

    #[test]
    fn prefixed_key_wins_over_plain_name() {
        let config = GeocoderConfig::from_lookup(lookup(&[
            ("GEOQUEUE_GOOGLE_MAPS_API_KEY", "prefixed"),
            ("GOOGLE_MAPS_API_KEY", "plain"),
            ("POSITIONSTACK_API_KEY", "ps"),
        ]))
        .expect("valid");

        assert_eq!(config.api_key(ProviderId::GoogleMaps), Some("prefixed"));
        assert_eq!(config.api_key(ProviderId::Positionstack), Some("ps"));
    }

    #[test]
    fn env_overrides_are_parsed_and_validated() {
        let config = GeocoderConfig::from_lookup(lookup(&[
            ("GEOQUEUE_PROVIDERS", "awesomeapi,nominatim"),
            ("GEOQUEUE_BATCH_SIZE", "25"),
            ("GEOQUEUE_RESTRICT_TO_BRAZIL", "off"),
        ]))
        .expect("valid");

        assert_eq!(
            config.providers,
            vec![ProviderId::Awesomeapi, ProviderId::Nominatim]
        );
        assert_eq!(config.orchestrator_config().batch_size, 25);
        assert!(!config.restrict_to_brazil);

        assert_eq!(
            GeocoderConfig::from_lookup(lookup(&[("GEOQUEUE_BATCH_SIZE", "0")])),
            Err(ConfigError::MustBePositive { field: "batch_size" })
        );
        assert!(matches!(
            GeocoderConfig::from_lookup(lookup(&[("GEOQUEUE_MAX_ATTEMPTS", "many")])),
            Err(ConfigError::InvalidEnv { .. })
        ));
    }
}
