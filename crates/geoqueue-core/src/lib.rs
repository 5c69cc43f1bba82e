//! # Geoqueue Core
//!
//! Postal-code and address geocoding over unreliable free-tier providers,
//! plus a paced batch queue that drives it across large record sets.
//!
//! ## Overview
//!
//! - **Transport** with per-request timeouts and normalized failures
//! - **Resilient client** retrying transient failures with exponential backoff
//! - **Provider adapters** (ViaCEP, AwesomeAPI, BrasilAPI, Nominatim, Google Maps, Positionstack)
//! - **Resolution chain** trying providers in a configured order
//! - **Batch orchestrator** with progress, ETA, lifecycle control and events
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters |
//! | [`config`] | Process-lifetime configuration |
//! | [`domain`] | Postal codes, queries, work items, locations |
//! | [`error`] | Error taxonomy |
//! | [`http_client`] | Transport abstraction (reqwest and replay) |
//! | [`orchestrator`] | Batch queue |
//! | [`provider`] | Adapter contract |
//! | [`response`] | Request-handler response shapes |
//! | [`retry`] | Backoff and the retrying client |
//! | [`routing`] | Resolution chain |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use geoqueue_core::{AddressQuery, GeocoderConfig, PostalCode, ResolutionChainBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chain = ResolutionChainBuilder::new(GeocoderConfig::from_env()?).build();
//!     let query = AddressQuery::from_postal_code(PostalCode::parse("01310-100")?);
//!
//!     match chain.resolve(&query).await {
//!         Ok(location) => println!("{}, {} via {}", location.latitude, location.longitude, location.provider),
//!         Err(failure) => eprintln!("{}", failure.error),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  Batch Orchestrator  │──▶ WorkSource / ResolutionSink
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │   Resolution Chain   │
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  Provider Adapters   │
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐     ┌──────────────────────┐
//! │   Retrying client    │────▶│ Throttle (Nominatim) │
//! └──────────┬───────────┘     └──────────┬───────────┘
//!            ▼                            ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 Transport (reqwest)                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use geoqueue_core::{GeocodeError, GeocodeErrorKind};
//!
//! fn describe(error: &GeocodeError) -> &'static str {
//!     match error.kind() {
//!         GeocodeErrorKind::InvalidInput => "fix the record",
//!         GeocodeErrorKind::AllProvidersExhausted => "try again later",
//!         _ if error.retryable() => "transient",
//!         _ => "terminal",
//!     }
//! }
//!
//! assert_eq!(describe(&GeocodeError::invalid_input("cep")), "fix the record");
//! ```
//!
//! ## Security
//!
//! - API keys come from configuration or environment variables and are never logged
//! - All HTTPS traffic uses rustls

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod orchestrator;
pub mod provider;
pub mod response;
pub mod retry;
pub mod routing;
pub mod source;
pub mod throttling;

// Adapter implementations
pub use adapters::{
    AwesomeApiAdapter, BrasilApiNominatimAdapter, GoogleMapsAdapter, NominatimAdapter,
    NominatimSearch, PositionstackAdapter, ViacepNominatimAdapter,
};

// Configuration
pub use config::GeocoderConfig;

// Domain models
pub use domain::{
    AddressQuery, BoundingBox, LocationParts, PostalCode, ResolvedLocation, WorkItem,
    POSTAL_CODE_DIGITS,
};

// Error types
pub use error::{CollaboratorError, ConfigError, GeocodeError, GeocodeErrorKind, OrchestratorError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, ReplayHttpClient, ReqwestHttpClient,
    RequestError, RequestErrorKind,
};

// Orchestration
pub use orchestrator::{
    BatchEvent, BatchJobState, BatchOrchestrator, ItemOutcome, OrchestratorConfig,
    OrchestratorStatus, ResolutionSink, RunReport, RunState, WorkSource,
};

// Provider contract
pub use provider::GeocodeProvider;

// Response shapes
pub use response::{BatchSummary, GeocodeResponse};

// Retry logic
pub use retry::{Backoff, RetryConfig, RetryingHttpClient};

// Routing types
pub use routing::{ResolutionChain, ResolutionChainBuilder, ResolutionFailure, ResolutionOutcome};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::ThrottledHttpClient;
