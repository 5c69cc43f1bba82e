use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::provider::{fetch_json, GeocodeProvider, ProviderFuture};
use crate::{AddressQuery, GeocodeError, LocationParts, ProviderId};

pub const GOOGLE_MAPS_BASE_URL: &str = "https://maps.googleapis.com";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: Option<Value>,
    lng: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<&AddressComponent> {
        self.address_components
            .iter()
            .find(|component| component.types.iter().any(|value| value == kind))
    }
}

/// Google Geocoding API; accepts postal codes and free text.
#[derive(Clone)]
pub struct GoogleMapsAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl GoogleMapsAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: String::from(GOOGLE_MAPS_BASE_URL),
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

    fn address_text(query: &AddressQuery) -> Option<String> {
        match query.postal_code() {
            Some(postal_code) => Some(format!("{}, Brazil", postal_code.formatted())),
            None => query.free_text(),
        }
    }
}

/// Maps Google's in-body status to the shared taxonomy.
fn status_error(provider: &str, status: &str, detail: Option<&str>) -> GeocodeError {
    let detail = detail.unwrap_or("no detail");
    match status {
        "ZERO_RESULTS" => GeocodeError::not_found(format!("{provider}: zero results")),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
            GeocodeError::http(429, format!("{provider}: {status}: {detail}"))
        }
        "REQUEST_DENIED" => GeocodeError::http(403, format!("{provider}: {status}: {detail}")),
        "INVALID_REQUEST" => GeocodeError::http(400, format!("{provider}: {status}: {detail}")),
        "UNKNOWN_ERROR" => GeocodeError::http(503, format!("{provider}: {status}: {detail}")),
        other => GeocodeError::malformed(format!("{provider}: unexpected status {other}")),
    }
}

impl GeocodeProvider for GoogleMapsAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::GoogleMaps
    }

    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a> {
        Box::pin(async move {
            let name = self.name();
            let address = Self::address_text(query).ok_or_else(|| {
                GeocodeError::not_found(format!("{name}: query has nothing to geocode"))
            })?;

            let request = HttpRequest::get(format!("{}/maps/api/geocode/json", self.base_url))
                .with_query("address", &address)
                .with_query("key", &self.api_key)
                .with_query("region", "br")
                .with_query("language", "pt-BR")
                .with_timeout_ms(self.timeout_ms);

            let response: GeocodeResponse =
                fetch_json(self.http_client.as_ref(), request, name).await?;

            if response.status != "OK" {
                return Err(status_error(
                    name,
                    &response.status,
                    response.error_message.as_deref(),
                ));
            }

            let result = response
                .results
                .into_iter()
                .next()
                .ok_or_else(|| GeocodeError::not_found(format!("{name}: empty result list")))?;

            let (latitude, longitude) = result
                .geometry
                .as_ref()
                .and_then(|geometry| geometry.location.as_ref())
                .map_or((None, None), |location| {
                    (location.lat.clone(), location.lng.clone())
                });

            let locality = result
                .component("administrative_area_level_2")
                .or_else(|| result.component("locality"))
                .map(|component| component.long_name.clone());
            let region = result
                .component("administrative_area_level_1")
                .map(|component| component.short_name.clone());
            let postal_code = result
                .component("postal_code")
                .map(|component| component.long_name.clone())
                .or_else(|| query.postal_code().map(|code| code.formatted()));

            LocationParts::new(latitude, longitude)
                .display_address(result.formatted_address)
                .locality(locality)
                .region(region)
                .postal_code(postal_code)
                .into_location(name)
        })
    }
}
