//! Behavior of the resolution chain: ordering, exhaustion and validation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use geoqueue_core::adapters::{
    AWESOMEAPI_BASE_URL, BRASILAPI_BASE_URL, NOMINATIM_BASE_URL, VIACEP_BASE_URL,
};
use geoqueue_core::provider::ProviderFuture;
use geoqueue_core::{
    AddressQuery, AwesomeApiAdapter, BoundingBox, GeocodeError, GeocodeErrorKind, GeocodeProvider,
    GeocoderConfig, HttpResponse, PostalCode, ProviderId, ReplayHttpClient, ResolutionChain,
    ResolutionChainBuilder, ResolvedLocation,
};

struct ScriptedProvider {
    name: String,
    outcome: Result<(f64, f64), GeocodeError>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn succeeding(name: &str) -> Arc<Self> {
        Self::new(name, Ok((-23.5613, -46.6565)))
    }

    fn failing(name: &str, error: GeocodeError) -> Arc<Self> {
        Self::new(name, Err(error))
    }

    fn new(name: &str, outcome: Result<(f64, f64), GeocodeError>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_owned(),
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GeocodeProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Nominatim
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn resolve<'a>(&'a self, _query: &'a AddressQuery) -> ProviderFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let (latitude, longitude) = self.outcome.clone()?;
            Ok(ResolvedLocation {
                latitude,
                longitude,
                display_address: format!("resolved by {}", self.name),
                locality: String::from("São Paulo"),
                region: String::from("SP"),
                postal_code: String::from("01310-100"),
                provider: self.name.clone(),
            })
        })
    }
}

fn chain_of(providers: &[Arc<ScriptedProvider>]) -> ResolutionChain {
    ResolutionChain::new(
        providers
            .iter()
            .map(|provider| provider.clone() as Arc<dyn GeocodeProvider>)
            .collect(),
    )
}

fn query(raw: &str) -> AddressQuery {
    AddressQuery::from_postal_code(PostalCode::parse(raw).expect("valid postal code"))
}

#[tokio::test]
async fn first_succeeding_provider_wins_and_later_ones_are_never_called() {
    for winner in 0..4 {
        // Given: providers before `winner` fail, the rest would succeed
        let providers = (0..4)
            .map(|index| {
                let name = format!("p{index}");
                if index < winner {
                    ScriptedProvider::failing(&name, GeocodeError::not_found("nothing"))
                } else {
                    ScriptedProvider::succeeding(&name)
                }
            })
            .collect::<Vec<_>>();
        let chain = chain_of(&providers);

        // When: a query is resolved
        let location = chain.resolve(&query("01310100")).await.expect("resolves");

        // Then: the winner's result is returned and nobody after it was asked
        assert_eq!(location.provider, format!("p{winner}"));
        for (index, provider) in providers.iter().enumerate() {
            let expected = usize::from(index <= winner);
            assert_eq!(provider.calls(), expected, "winner {winner}, provider {index}");
        }
    }
}

#[tokio::test]
async fn exhausted_chain_reports_every_attempt_and_the_last_cause() {
    // Given: every provider fails differently
    let providers = vec![
        ScriptedProvider::failing("first", GeocodeError::timeout("slow")),
        ScriptedProvider::failing("second", GeocodeError::http(503, "busy")),
        ScriptedProvider::failing("third", GeocodeError::malformed("lat missing")),
    ];
    let chain = chain_of(&providers);

    // When: a query is resolved
    let failure = chain.resolve(&query("99999999")).await.expect_err("exhausted");

    // Then: the outcome is exhausted, carrying the last provider's failure
    assert_eq!(failure.error.kind(), GeocodeErrorKind::AllProvidersExhausted);
    assert_eq!(
        failure.error.cause().map(GeocodeError::kind),
        Some(GeocodeErrorKind::MalformedResponse)
    );
    assert_eq!(failure.attempted, vec!["first", "second", "third"]);
    assert_eq!(failure.last_provider.as_deref(), Some("third"));
    assert!(providers.iter().all(|provider| provider.calls() == 1));
}

#[tokio::test]
async fn coordinates_outside_brazil_fall_through_to_the_next_provider() {
    let providers = vec![
        ScriptedProvider::new("lisbon", Ok((38.72, -9.14))),
        ScriptedProvider::succeeding("local"),
    ];
    let chain = chain_of(&providers).with_bounds(BoundingBox::BRAZIL);

    let location = chain.resolve(&query("01310100")).await.expect("resolves");

    assert_eq!(location.provider, "local");
    assert_eq!(providers[0].calls(), 1);
}

#[tokio::test]
async fn known_postal_code_resolves_through_the_first_default_provider() {
    // Given: the default chain over a replayed network
    let transport = Arc::new(
        ReplayHttpClient::new()
            .route_json(
                format!("{VIACEP_BASE_URL}/ws/01310100/json/"),
                r#"{"cep": "01310-100", "logradouro": "Avenida Paulista",
                    "bairro": "Bela Vista", "localidade": "São Paulo", "uf": "SP"}"#,
            )
            .route_json(
                format!("{NOMINATIM_BASE_URL}/search"),
                r#"[{"lat": "-23.5613", "lon": "-46.6565", "display_name": "Avenida Paulista"}]"#,
            ),
    );
    let chain = ResolutionChainBuilder::new(GeocoderConfig::default())
        .with_transport(transport.clone())
        .build();

    // When: an 8-digit postal code is resolved
    let location = chain.resolve(&query("01310100")).await.expect("resolves");

    // Then: the first provider's declared name is on the result
    assert_eq!(location.provider, ProviderId::ViacepNominatim.as_str());
    assert_eq!(location.postal_code, "01310-100");
    assert_eq!(
        location.display_address,
        "Avenida Paulista, Bela Vista, São Paulo - SP"
    );
    assert_eq!(transport.requests_to(AWESOMEAPI_BASE_URL), 0);
    assert_eq!(transport.requests_to(BRASILAPI_BASE_URL), 0);
}

#[tokio::test]
async fn unknown_postal_code_exhausts_all_default_providers() {
    // Given: every default provider has nothing for the postal code
    let transport = Arc::new(
        ReplayHttpClient::new()
            .route_json(format!("{VIACEP_BASE_URL}/ws/99999999/json/"), r#"{"erro": true}"#)
            .route(
                format!("{AWESOMEAPI_BASE_URL}/json/99999999"),
                HttpResponse::with_status(404, r#"{"code": "not_found"}"#),
            )
            .route(
                format!("{BRASILAPI_BASE_URL}/api/cep/v2/99999999"),
                HttpResponse::with_status(404, r#"{"type": "service_error"}"#),
            ),
    );
    let chain = ResolutionChainBuilder::new(GeocoderConfig::default())
        .with_transport(transport.clone())
        .build();

    // When: it is resolved
    let failure = chain.resolve(&query("99999999")).await.expect_err("exhausted");

    // Then: each provider was asked once and none reached Nominatim
    assert_eq!(failure.error.kind(), GeocodeErrorKind::AllProvidersExhausted);
    assert_eq!(failure.attempted.len(), 3);
    assert_eq!(
        failure.error.cause().map(GeocodeError::kind),
        Some(GeocodeErrorKind::NotFound)
    );
    assert_eq!(transport.request_count(), 3);
    assert_eq!(transport.requests_to(NOMINATIM_BASE_URL), 0);
}

#[tokio::test]
async fn non_numeric_latitude_is_a_malformed_response() {
    // Given: a provider answering with a non-numeric latitude
    let transport = Arc::new(ReplayHttpClient::new().route_json(
        "https://awesome.test/json/01310100",
        r#"{"lat": "not-a-number", "lng": "-46.6565", "city": "São Paulo", "state": "SP"}"#,
    ));
    let adapter = AwesomeApiAdapter::new(transport).with_base_url("https://awesome.test");

    // When: the postal code is resolved
    let error = adapter.resolve(&query("01310100")).await.expect_err("malformed");

    // Then: no NaN-valued location is produced
    assert_eq!(error.kind(), GeocodeErrorKind::MalformedResponse);
    assert!(!error.retryable());
}

#[tokio::test]
async fn malformed_provider_does_not_stop_the_chain() {
    let transport = Arc::new(ReplayHttpClient::new().route_json(
        "https://awesome.test/json/01310100",
        r#"{"lat": "not-a-number", "lng": "NaN"}"#,
    ));
    let broken: Arc<dyn GeocodeProvider> =
        Arc::new(AwesomeApiAdapter::new(transport).with_base_url("https://awesome.test"));
    let fallback = ScriptedProvider::succeeding("fallback");
    let chain = ResolutionChain::new(vec![broken, fallback.clone() as Arc<dyn GeocodeProvider>]);

    let location = chain.resolve(&query("01310100")).await.expect("falls back");

    assert_eq!(location.provider, "fallback");
    assert!(location.latitude.is_finite());
}
