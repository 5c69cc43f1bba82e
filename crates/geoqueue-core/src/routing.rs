use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::adapters::{
    AwesomeApiAdapter, BrasilApiNominatimAdapter, GoogleMapsAdapter, NominatimAdapter,
    NominatimSearch, PositionstackAdapter, ViacepNominatimAdapter,
};
use crate::config::GeocoderConfig;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::provider::GeocodeProvider;
use crate::retry::RetryingHttpClient;
use crate::throttling::ThrottledHttpClient;
use crate::{AddressQuery, BoundingBox, GeocodeError, ProviderId, ResolvedLocation};

/// Failed resolution after every provider was tried.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionFailure {
    /// Always `AllProvidersExhausted`; its cause is the last provider's failure.
    pub error: GeocodeError,
    pub last_provider: Option<String>,
    pub attempted: Vec<String>,
    pub latency_ms: u64,
}

pub type ResolutionOutcome = Result<ResolvedLocation, ResolutionFailure>;

/// Ordered provider fallback.
///
/// Providers are tried strictly in the order given; the first success wins and
/// later providers are never called. A failure is logged and the next provider
/// is tried, with no retry of the same provider at this level.
#[derive(Clone)]
pub struct ResolutionChain {
    providers: Vec<Arc<dyn GeocodeProvider>>,
    bounds: Option<BoundingBox>,
}

impl ResolutionChain {
    pub fn new(providers: Vec<Arc<dyn GeocodeProvider>>) -> Self {
        Self {
            providers,
            bounds: None,
        }
    }

    /// Treats coordinates outside `bounds` as a provider failure.
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn providers(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|provider| provider.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub async fn resolve(&self, query: &AddressQuery) -> ResolutionOutcome {
        let started = Instant::now();
        let mut attempted = Vec::with_capacity(self.providers.len());
        let mut last_error = None;

        for provider in &self.providers {
            let name = provider.name();
            attempted.push(name.to_owned());
            debug!(provider = name, "trying provider");

            let error = match provider.resolve(query).await {
                Ok(location) => match self.check_bounds(&location) {
                    Ok(()) => {
                        if attempted.len() > 1 {
                            info!(
                                provider = name,
                                failed_before = attempted.len() - 1,
                                "resolved after fallback"
                            );
                        }
                        return Ok(location);
                    }
                    Err(error) => error,
                },
                Err(error) => error,
            };

            warn!(provider = name, code = error.code(), error = %error, "provider failed");
            last_error = Some(error);
        }

        Err(ResolutionFailure {
            error: GeocodeError::exhausted(last_error),
            last_provider: attempted.last().cloned(),
            attempted,
            latency_ms: elapsed_ms(started),
        })
    }

    fn check_bounds(&self, location: &ResolvedLocation) -> Result<(), GeocodeError> {
        match self.bounds {
            Some(bounds) if !bounds.contains(location.latitude, location.longitude) => {
                Err(GeocodeError::out_of_region(format!(
                    "{}: ({}, {}) is outside the configured region",
                    location.provider, location.latitude, location.longitude
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Builds production chains from [`GeocoderConfig`].
///
/// Every adapter shares one retrying transport. Nominatim calls go through a
/// shared rate limiter placed beneath their own retry layer, so retried
/// attempts wait for budget like first attempts. Providers that need an API key are
/// skipped (with a warning) when no key is configured.
pub struct ResolutionChainBuilder {
    config: GeocoderConfig,
    transport: Option<Arc<dyn HttpClient>>,
}

impl ResolutionChainBuilder {
    pub fn new(config: GeocoderConfig) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Replaces the reqwest transport, e.g. with a replay client for offline runs.
    pub fn with_transport(mut self, transport: Arc<dyn HttpClient>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> ResolutionChain {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
        let resilient: Arc<dyn HttpClient> = Arc::new(RetryingHttpClient::new(
            transport.clone(),
            self.config.retry_config(),
        ));
        // The limiter sits under the retry layer so every attempt spends budget.
        let throttled: Arc<dyn HttpClient> = Arc::new(ThrottledHttpClient::per_second(
            transport,
            self.config.nominatim_requests_per_second,
        ));
        let nominatim_transport: Arc<dyn HttpClient> = Arc::new(RetryingHttpClient::new(
            throttled,
            self.config.retry_config(),
        ));
        let timeout_ms = self.config.request_timeout_ms;
        let nominatim = NominatimSearch::new(nominatim_transport).with_timeout_ms(timeout_ms);

        let mut providers: Vec<Arc<dyn GeocodeProvider>> =
            Vec::with_capacity(self.config.providers.len());
        for id in &self.config.providers {
            let provider: Arc<dyn GeocodeProvider> = match id {
                ProviderId::ViacepNominatim => Arc::new(
                    ViacepNominatimAdapter::new(resilient.clone(), nominatim.clone())
                        .with_timeout_ms(timeout_ms),
                ),
                ProviderId::Awesomeapi => Arc::new(
                    AwesomeApiAdapter::new(resilient.clone()).with_timeout_ms(timeout_ms),
                ),
                ProviderId::BrasilapiNominatim => Arc::new(
                    BrasilApiNominatimAdapter::new(resilient.clone(), nominatim.clone())
                        .with_timeout_ms(timeout_ms),
                ),
                ProviderId::Nominatim => Arc::new(NominatimAdapter::new(nominatim.clone())),
                ProviderId::GoogleMaps | ProviderId::Positionstack => {
                    let Some(key) = self.config.api_key(*id) else {
                        warn!(
                            provider = id.as_str(),
                            variable = id.api_key_var().unwrap_or_default(),
                            "no API key configured; provider skipped"
                        );
                        continue;
                    };
                    if *id == ProviderId::GoogleMaps {
                        Arc::new(
                            GoogleMapsAdapter::new(resilient.clone(), key)
                                .with_timeout_ms(timeout_ms),
                        )
                    } else {
                        Arc::new(
                            PositionstackAdapter::new(resilient.clone(), key)
                                .with_timeout_ms(timeout_ms),
                        )
                    }
                }
            };
            providers.push(provider);
        }

        let chain = ResolutionChain::new(providers);
        if self.config.restrict_to_brazil {
            chain.with_bounds(BoundingBox::BRAZIL)
        } else {
            chain
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
