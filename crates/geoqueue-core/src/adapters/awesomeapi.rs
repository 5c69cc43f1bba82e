use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::provider::{fetch_json, format_address, require_postal_code, GeocodeProvider, ProviderFuture};
use crate::{AddressQuery, LocationParts, ProviderId};

pub const AWESOMEAPI_BASE_URL: &str = "https://cep.awesomeapi.com.br";

#[derive(Debug, Deserialize)]
struct AwesomeApiPayload {
    lat: Option<Value>,
    lng: Option<Value>,
    address: Option<String>,
    district: Option<String>,
    city: Option<String>,
    state: Option<String>,
}

/// Single-call postal code lookup that returns coordinates directly.
#[derive(Clone)]
pub struct AwesomeApiAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
}

impl AwesomeApiAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(AWESOMEAPI_BASE_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

impl GeocodeProvider for AwesomeApiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Awesomeapi
    }

    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a> {
        Box::pin(async move {
            let name = self.name();
            let postal_code = require_postal_code(query, name)?;
            let request = HttpRequest::get(format!("{}/json/{}", self.base_url, postal_code.as_str()))
                .with_timeout_ms(self.timeout_ms);

            let payload: AwesomeApiPayload =
                fetch_json(self.http_client.as_ref(), request, name).await?;

            let display = format_address(
                payload.address.as_deref(),
                payload.district.as_deref(),
                payload.city.as_deref(),
                payload.state.as_deref(),
            );

            LocationParts::new(payload.lat, payload.lng)
                .display_address(Some(display))
                .locality(payload.city)
                .region(payload.state)
                .postal_code(Some(postal_code.formatted()))
                .into_location(name)
        })
    }
}
