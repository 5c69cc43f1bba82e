use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::provider::{fetch_json, GeocodeProvider, ProviderFuture};
use crate::{AddressQuery, GeocodeError, LocationParts, ProviderId};

pub const POSITIONSTACK_BASE_URL: &str = "http://api.positionstack.com";

#[derive(Debug, Deserialize)]
struct ForwardResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ForwardHit {
    latitude: Option<Value>,
    longitude: Option<Value>,
    label: Option<String>,
    locality: Option<String>,
    county: Option<String>,
    region_code: Option<String>,
    postal_code: Option<String>,
}

/// Positionstack forward geocoding.
#[derive(Clone)]
pub struct PositionstackAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl PositionstackAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(POSITIONSTACK_BASE_URL),
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

impl GeocodeProvider for PositionstackAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Positionstack
    }

    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a> {
        Box::pin(async move {
            let name = self.name();
            let text = match (query.free_text(), query.postal_code()) {
                (Some(text), _) => text,
                (None, Some(postal_code)) => postal_code.formatted(),
                (None, None) => {
                    return Err(GeocodeError::not_found(format!(
                        "{name}: query has nothing to geocode"
                    )))
                }
            };

            let request = HttpRequest::get(format!("{}/v1/forward", self.base_url))
                .with_query("access_key", &self.api_key)
                .with_query("query", &text)
                .with_query("country", "BR")
                .with_query("limit", "1")
                .with_timeout_ms(self.timeout_ms);

            let response: ForwardResponse =
                fetch_json(self.http_client.as_ref(), request, name).await?;

            // No match comes back as `[]` or as `[[]]`.
            let hit = response
                .data
                .into_iter()
                .find(Value::is_object)
                .ok_or_else(|| GeocodeError::not_found(format!("{name}: no results")))?;
            let hit: ForwardHit = serde_json::from_value(hit)
                .map_err(|error| GeocodeError::malformed(format!("{name}: {error}")))?;

            let postal_code = hit
                .postal_code
                .or_else(|| query.postal_code().map(|code| code.formatted()));

            LocationParts::new(hit.latitude, hit.longitude)
                .display_address(hit.label)
                .locality(hit.locality.or(hit.county))
                .region(hit.region_code)
                .postal_code(postal_code)
                .into_location(name)
        })
    }
}
