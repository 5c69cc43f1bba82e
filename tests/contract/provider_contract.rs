//! Contract every provider adapter must honor, whatever the upstream API.
//!
//! All adapters run against one replay transport so that the same failure
//! can be injected into every provider at once.

use std::sync::Arc;

use geoqueue_core::{
    AddressQuery, AwesomeApiAdapter, BoundingBox, BrasilApiNominatimAdapter, GeocodeErrorKind,
    GeocodeProvider, GoogleMapsAdapter, HttpClient, HttpResponse, NominatimAdapter,
    NominatimSearch, PositionstackAdapter, PostalCode, ProviderId, ReplayHttpClient, RequestError,
    ViacepNominatimAdapter,
};

const VIACEP: &str = r#"{
    "cep": "01310-100",
    "logradouro": "Avenida Paulista",
    "bairro": "Bela Vista",
    "localidade": "São Paulo",
    "uf": "SP"
}"#;

const NOMINATIM: &str = r#"[{
    "lat": "-23.5613",
    "lon": "-46.6565",
    "display_name": "Avenida Paulista, Bela Vista, São Paulo, Região Sudeste, Brasil"
}]"#;

const AWESOMEAPI: &str = r#"{
    "cep": "01310100",
    "address": "Avenida Paulista",
    "district": "Bela Vista",
    "city": "São Paulo",
    "state": "SP",
    "lat": "-23.5613",
    "lng": "-46.6565"
}"#;

const BRASILAPI: &str = r#"{
    "cep": "01310100",
    "state": "SP",
    "city": "São Paulo",
    "neighborhood": "Bela Vista",
    "street": "Avenida Paulista",
    "location": {"type": "Point", "coordinates": {}}
}"#;

const GOOGLE: &str = r#"{"status": "OK", "results": [{
    "formatted_address": "Av. Paulista - Bela Vista, São Paulo - SP, 01310-100, Brasil",
    "geometry": {"location": {"lat": -23.5613, "lng": -46.6565}},
    "address_components": [
        {"long_name": "São Paulo", "short_name": "São Paulo", "types": ["administrative_area_level_2"]},
        {"long_name": "São Paulo", "short_name": "SP", "types": ["administrative_area_level_1"]}
    ]}]}"#;

const POSITIONSTACK: &str = r#"{"data": [{
    "latitude": -23.5613,
    "longitude": -46.6565,
    "label": "Avenida Paulista, São Paulo, Brazil",
    "locality": "São Paulo",
    "region_code": "SP",
    "postal_code": "01310-100"
}]}"#;

fn providers(client: Arc<dyn HttpClient>) -> Vec<Arc<dyn GeocodeProvider>> {
    let nominatim = NominatimSearch::new(client.clone()).with_base_url("https://nominatim.test/");
    vec![
        Arc::new(
            ViacepNominatimAdapter::new(client.clone(), nominatim.clone())
                .with_base_url("https://viacep.test"),
        ),
        Arc::new(AwesomeApiAdapter::new(client.clone()).with_base_url("https://awesome.test")),
        Arc::new(
            BrasilApiNominatimAdapter::new(client.clone(), nominatim.clone())
                .with_base_url("https://brasilapi.test"),
        ),
        Arc::new(GoogleMapsAdapter::new(client.clone(), "key").with_base_url("https://maps.test")),
        Arc::new(
            PositionstackAdapter::new(client, "key").with_base_url("https://positionstack.test"),
        ),
        Arc::new(NominatimAdapter::new(nominatim)),
    ]
}

fn happy_transport() -> Arc<ReplayHttpClient> {
    Arc::new(
        ReplayHttpClient::new()
            .route_json("https://viacep.test/ws/01310100/json/", VIACEP)
            .route_json("https://nominatim.test/search", NOMINATIM)
            .route_json("https://awesome.test/json/01310100", AWESOMEAPI)
            .route_json("https://brasilapi.test/api/cep/v2/01310100", BRASILAPI)
            .route_json("https://maps.test/maps/api/geocode/json", GOOGLE)
            .route_json("https://positionstack.test/v1/forward", POSITIONSTACK),
    )
}

fn paulista() -> AddressQuery {
    AddressQuery::from_postal_code(PostalCode::parse("01310-100").expect("valid postal code"))
}

#[tokio::test]
async fn every_provider_resolves_a_known_postal_code() {
    let transport = happy_transport();

    for provider in providers(transport.clone()) {
        let location = provider
            .resolve(&paulista())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' failed: {error}", provider.name()));

        assert_eq!(location.provider, provider.id().as_str());
        assert!(
            BoundingBox::BRAZIL.contains(location.latitude, location.longitude),
            "provider '{}': coordinates outside Brazil",
            provider.name()
        );
        assert!((location.latitude + 23.5613).abs() < 1e-6);
        assert!(!location.display_address.is_empty(), "provider '{}': display", provider.name());
        if provider.id() != ProviderId::Nominatim {
            assert_eq!(location.region, "SP", "provider '{}': region", provider.name());
        }
    }
}

#[tokio::test]
async fn provider_names_match_their_identifiers() {
    let ids = providers(happy_transport())
        .iter()
        .map(|provider| provider.id())
        .collect::<Vec<_>>();

    assert_eq!(ids.len(), ProviderId::ALL.len());
    for id in ProviderId::ALL {
        assert!(ids.contains(&id), "missing adapter for {id}");
    }
}

#[tokio::test]
async fn transport_timeouts_surface_as_timeout_errors() {
    let transport: Arc<dyn HttpClient> = Arc::new(
        ReplayHttpClient::new().route_failure("https://", RequestError::timeout("deadline elapsed")),
    );

    for provider in providers(transport) {
        let error = provider.resolve(&paulista()).await.expect_err("timeout");

        assert_eq!(error.kind(), GeocodeErrorKind::Timeout, "provider '{}'", provider.name());
        assert!(error.retryable());
        assert!(error.message().contains(provider.name()));
    }
}

#[tokio::test]
async fn missing_resources_surface_as_not_found() {
    let transport: Arc<dyn HttpClient> =
        Arc::new(ReplayHttpClient::new().route("https://", HttpResponse::with_status(404, "")));

    for provider in providers(transport) {
        let error = provider.resolve(&paulista()).await.expect_err("404");

        assert_eq!(error.kind(), GeocodeErrorKind::NotFound, "provider '{}'", provider.name());
        assert!(!error.retryable());
    }
}

#[tokio::test]
async fn server_errors_keep_their_status() {
    let transport: Arc<dyn HttpClient> =
        Arc::new(ReplayHttpClient::new().route("https://", HttpResponse::with_status(503, "busy")));

    for provider in providers(transport) {
        let error = provider.resolve(&paulista()).await.expect_err("503");

        assert_eq!(error.kind(), GeocodeErrorKind::Http(503), "provider '{}'", provider.name());
    }
}

#[tokio::test]
async fn unparseable_bodies_surface_as_malformed_responses() {
    let transport: Arc<dyn HttpClient> =
        Arc::new(ReplayHttpClient::new().route_json("https://", "<html>maintenance</html>"));

    for provider in providers(transport) {
        let error = provider.resolve(&paulista()).await.expect_err("malformed");

        assert_eq!(
            error.kind(),
            GeocodeErrorKind::MalformedResponse,
            "provider '{}'",
            provider.name()
        );
    }
}

#[tokio::test]
async fn postal_code_lookups_decline_free_text_queries_without_calling_out() {
    let transport = happy_transport();
    let query = AddressQuery::from_address("Avenida Paulista, 1578", "São Paulo").expect("valid");

    for provider in providers(transport.clone()) {
        let result = provider.resolve(&query).await;
        match provider.id() {
            ProviderId::ViacepNominatim | ProviderId::Awesomeapi | ProviderId::BrasilapiNominatim => {
                let error = result.expect_err("postal code required");
                assert_eq!(error.kind(), GeocodeErrorKind::NotFound);
            }
            _ => {
                result.unwrap_or_else(|error| panic!("'{}' free text: {error}", provider.name()));
            }
        }
    }

    assert_eq!(transport.requests_to("https://viacep.test"), 0);
    assert_eq!(transport.requests_to("https://awesome.test"), 0);
    assert_eq!(transport.requests_to("https://brasilapi.test"), 0);
}
