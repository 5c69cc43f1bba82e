use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::provider::{fetch_json, GeocodeProvider, ProviderFuture};
use crate::{AddressQuery, GeocodeError, LocationParts, ProviderId};

pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Street-level address returned by a postal-code lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StructuredAddress {
    pub street: Option<String>,
    pub neighborhood: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
}

impl StructuredAddress {
    pub fn new(
        street: Option<String>,
        neighborhood: Option<String>,
        locality: Option<String>,
        region: Option<String>,
    ) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        Self {
            street: clean(street),
            neighborhood: clean(neighborhood),
            locality: clean(locality),
            region: clean(region),
        }
    }

    /// Free-text search needs at least a street or a locality to anchor on.
    pub fn is_searchable(&self) -> bool {
        self.street.is_some() || self.locality.is_some()
    }

    pub fn search_text(&self) -> String {
        let mut parts = [
            self.street.as_deref(),
            self.neighborhood.as_deref(),
            self.locality.as_deref(),
            self.region.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        parts.push("Brasil");
        parts.join(", ")
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: Option<Value>,
    lon: Option<Value>,
    display_name: Option<String>,
}

/// The shared Nominatim search step.
///
/// Nominatim's public instance allows one request per second, so the client
/// handed in here is normally a [`ThrottledHttpClient`](crate::ThrottledHttpClient)
/// shared by every adapter that ends in a Nominatim call.
#[derive(Clone)]
pub struct NominatimSearch {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
}

impl NominatimSearch {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(NOMINATIM_BASE_URL),
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

    fn search_request(&self) -> HttpRequest {
        HttpRequest::get(format!("{}/search", self.base_url))
            .with_query("format", "json")
            .with_query("limit", "1")
            .with_query("countrycodes", "br")
            .with_header("accept-language", "pt-BR")
            .with_timeout_ms(self.timeout_ms)
    }

    /// Geocodes free text; the first hit wins.
    pub(crate) async fn search_text(
        &self,
        text: &str,
        provider: &str,
    ) -> Result<LocationParts, GeocodeError> {
        debug!(provider, query = text, "nominatim free-text search");
        let request = self.search_request().with_query("q", text);
        self.first_hit(request, provider).await
    }

    /// Geocodes a bare postal code through Nominatim's structured search.
    pub(crate) async fn search_postal_code(
        &self,
        postal_code: &str,
        provider: &str,
    ) -> Result<LocationParts, GeocodeError> {
        debug!(provider, postal_code, "nominatim postal code search");
        let request = self.search_request().with_query("postalcode", postal_code);
        self.first_hit(request, provider).await
    }

    async fn first_hit(
        &self,
        request: HttpRequest,
        provider: &str,
    ) -> Result<LocationParts, GeocodeError> {
        let hits: Vec<SearchHit> = fetch_json(self.http_client.as_ref(), request, provider).await?;
        let hit = hits.into_iter().next().ok_or_else(|| {
            GeocodeError::not_found(format!("{provider}: nominatim returned no results"))
        })?;

        Ok(LocationParts::new(hit.lat, hit.lon).display_address(hit.display_name))
    }
}

/// Free-text geocoding against Nominatim alone.
///
/// Useful as the last link of a chain for records without a postal code.
#[derive(Clone)]
pub struct NominatimAdapter {
    search: NominatimSearch,
}

impl NominatimAdapter {
    pub fn new(search: NominatimSearch) -> Self {
        Self { search }
    }
}

impl GeocodeProvider for NominatimAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Nominatim
    }

    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a> {
        Box::pin(async move {
            let name = self.name();
            let parts = match (query.free_text(), query.postal_code()) {
                (Some(text), _) => self.search.search_text(&text, name).await?,
                (None, Some(postal_code)) => {
                    self.search
                        .search_postal_code(&postal_code.formatted(), name)
                        .await?
                }
                (None, None) => {
                    return Err(GeocodeError::not_found(format!(
                        "{name}: query has neither address text nor postal code"
                    )))
                }
            };

            let postal_code = query.postal_code().map(|code| code.formatted());
            parts
                .locality(query.locality())
                .region(query.region())
                .postal_code(postal_code)
                .into_location(name)
        })
    }
}
