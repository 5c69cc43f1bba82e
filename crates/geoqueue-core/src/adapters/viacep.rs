use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::nominatim::{NominatimSearch, StructuredAddress};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::provider::{fetch_json, format_address, require_postal_code, GeocodeProvider, ProviderFuture};
use crate::{AddressQuery, GeocodeError, ProviderId};

pub const VIACEP_BASE_URL: &str = "https://viacep.com.br";

#[derive(Debug, Deserialize)]
struct ViacepPayload {
    #[serde(default)]
    erro: Option<Value>,
    logradouro: Option<String>,
    bairro: Option<String>,
    localidade: Option<String>,
    uf: Option<String>,
}

impl ViacepPayload {
    /// ViaCEP answers unknown codes with 200 and `"erro": true` (or `"true"`).
    fn is_error(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// ViaCEP structured lookup followed by a Nominatim search.
#[derive(Clone)]
pub struct ViacepNominatimAdapter {
    http_client: Arc<dyn HttpClient>,
    nominatim: NominatimSearch,
    base_url: String,
    timeout_ms: u64,
}

impl ViacepNominatimAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, nominatim: NominatimSearch) -> Self {
        Self {
            http_client,
            nominatim,
            base_url: String::from(VIACEP_BASE_URL),
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

    async fn lookup(&self, postal_code: &str) -> Result<StructuredAddress, GeocodeError> {
        let request = HttpRequest::get(format!("{}/ws/{postal_code}/json/", self.base_url))
            .with_timeout_ms(self.timeout_ms);
        let payload: ViacepPayload =
            fetch_json(self.http_client.as_ref(), request, self.name()).await?;

        if payload.is_error() {
            return Err(GeocodeError::not_found(format!(
                "{}: postal code {postal_code} is unknown",
                self.name()
            )));
        }

        Ok(StructuredAddress::new(
            payload.logradouro,
            payload.bairro,
            payload.localidade,
            payload.uf,
        ))
    }
}

impl GeocodeProvider for ViacepNominatimAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::ViacepNominatim
    }

    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a> {
        Box::pin(async move {
            let name = self.name();
            let postal_code = require_postal_code(query, name)?;
            let address = self.lookup(postal_code.as_str()).await?;

            if !address.is_searchable() {
                return Err(GeocodeError::not_found(format!(
                    "{name}: lookup returned no street or locality to geocode"
                )));
            }

            let parts = self
                .nominatim
                .search_text(&address.search_text(), name)
                .await?;

            parts
                .display_address(Some(format_address(
                    address.street.as_deref(),
                    address.neighborhood.as_deref(),
                    address.locality.as_deref(),
                    address.region.as_deref(),
                )))
                .locality(address.locality)
                .region(address.region)
                .postal_code(Some(postal_code.formatted()))
                .into_location(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ReplayHttpClient;
    use crate::{GeocodeErrorKind, PostalCode};

    const PAULISTA: &str = r#"{
        "cep": "01310-100",
        "logradouro": "Avenida Paulista",
        "bairro": "Bela Vista",
        "localidade": "São Paulo",
        "uf": "SP"
    }"#;

    fn adapter(client: Arc<ReplayHttpClient>) -> ViacepNominatimAdapter {
        let search = NominatimSearch::new(client.clone()).with_base_url("https://nominatim.test");
        ViacepNominatimAdapter::new(client, search).with_base_url("https://viacep.test")
    }

    fn query(code: &str) -> AddressQuery {
        AddressQuery::from_postal_code(PostalCode::parse(code).expect("valid postal code"))
    }

    #[tokio::test]
    async fn chains_lookup_into_nominatim_search() {
        let client = Arc::new(
            ReplayHttpClient::new()
                .route_json("https://viacep.test/ws/01310100/json/", PAULISTA)
                .route_json(
                    "https://nominatim.test/search",
                    r#"[{"lat": "-23.5614", "lon": "-46.6559", "display_name": "x"}]"#,
                ),
        );

        let location = adapter(client.clone())
            .resolve(&query("01310100"))
            .await
            .expect("chain resolves");

        assert_eq!(location.provider, "viacep_nominatim");
        assert_eq!(location.display_address, "Avenida Paulista, Bela Vista, São Paulo - SP");
        assert_eq!(location.region, "SP");
        assert_eq!(location.postal_code, "01310-100");
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn erro_flag_is_not_found_and_skips_second_call() {
        for body in [r#"{"erro": true}"#, r#"{"erro": "true"}"#] {
            let client = Arc::new(ReplayHttpClient::new().route_json("https://viacep.test/", body));

            let error = adapter(client.clone())
                .resolve(&query("99999999"))
                .await
                .expect_err("unknown postal code");

            assert_eq!(error.kind(), GeocodeErrorKind::NotFound);
            assert_eq!(client.requests_to("https://nominatim.test"), 0);
        }
    }

    #[tokio::test]
    async fn lookup_without_street_or_locality_skips_second_call() {
        let client = Arc::new(
            ReplayHttpClient::new().route_json("https://viacep.test/", r#"{"logradouro": "", "uf": "SP"}"#),
        );

        let error = adapter(client.clone())
            .resolve(&query("01310100"))
            .await
            .expect_err("nothing to search");

        assert_eq!(error.kind(), GeocodeErrorKind::NotFound);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn free_text_query_is_not_found_without_network() {
        let client = Arc::new(ReplayHttpClient::new());
        let query = AddressQuery::from_address("Rua A", "Campinas").expect("valid");

        let error = adapter(client.clone()).resolve(&query).await.expect_err("needs cep");

        assert_eq!(error.kind(), GeocodeErrorKind::NotFound);
        assert_eq!(client.request_count(), 0);
    }
}
