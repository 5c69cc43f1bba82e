use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::adapters::nominatim::{NominatimSearch, StructuredAddress};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::provider::{fetch_json, format_address, require_postal_code, GeocodeProvider, ProviderFuture};
use crate::{AddressQuery, GeocodeError, LocationParts, ProviderId};

pub const BRASILAPI_BASE_URL: &str = "https://brasilapi.com.br";

#[derive(Debug, Deserialize)]
struct BrasilApiPayload {
    street: Option<String>,
    neighborhood: Option<String>,
    city: Option<String>,
    state: Option<String>,
    #[serde(default)]
    location: Option<BrasilApiLocation>,
}

#[derive(Debug, Deserialize)]
struct BrasilApiLocation {
    #[serde(default)]
    coordinates: Option<BrasilApiCoordinates>,
}

#[derive(Debug, Deserialize)]
struct BrasilApiCoordinates {
    latitude: Option<Value>,
    longitude: Option<Value>,
}

impl BrasilApiPayload {
    /// v2 sometimes carries coordinates; an empty `{}` object means it did not.
    fn coordinates(&self) -> Option<(Value, Value)> {
        let coordinates = self.location.as_ref()?.coordinates.as_ref()?;
        Some((coordinates.latitude.clone()?, coordinates.longitude.clone()?))
    }
}

/// BrasilAPI CEP v2 lookup, geocoded through Nominatim when it has no coordinates.
#[derive(Clone)]
pub struct BrasilApiNominatimAdapter {
    http_client: Arc<dyn HttpClient>,
    nominatim: NominatimSearch,
    base_url: String,
    timeout_ms: u64,
}

impl BrasilApiNominatimAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, nominatim: NominatimSearch) -> Self {
        Self {
            http_client,
            nominatim,
            base_url: String::from(BRASILAPI_BASE_URL),
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

impl GeocodeProvider for BrasilApiNominatimAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::BrasilapiNominatim
    }

    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a> {
        Box::pin(async move {
            let name = self.name();
            let postal_code = require_postal_code(query, name)?;
            let request =
                HttpRequest::get(format!("{}/api/cep/v2/{}", self.base_url, postal_code.as_str()))
                    .with_timeout_ms(self.timeout_ms);

            let payload: BrasilApiPayload =
                fetch_json(self.http_client.as_ref(), request, name).await?;

            let display = format_address(
                payload.street.as_deref(),
                payload.neighborhood.as_deref(),
                payload.city.as_deref(),
                payload.state.as_deref(),
            );

            let parts = match payload.coordinates() {
                Some((latitude, longitude)) => {
                    debug!(provider = name, "using coordinates embedded in lookup");
                    LocationParts::new(Some(latitude), Some(longitude))
                }
                None => {
                    let address = StructuredAddress::new(
                        payload.street.clone(),
                        payload.neighborhood.clone(),
                        payload.city.clone(),
                        payload.state.clone(),
                    );
                    if !address.is_searchable() {
                        return Err(GeocodeError::not_found(format!(
                            "{name}: lookup returned no street or locality to geocode"
                        )));
                    }
                    self.nominatim.search_text(&address.search_text(), name).await?
                }
            };

            parts
                .display_address(Some(display))
                .locality(payload.city)
                .region(payload.state)
                .postal_code(Some(postal_code.formatted()))
                .into_location(name)
        })
    }
}
