use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::http_client::{RequestError, RequestErrorKind};

/// Failure classification shared by transports, adapters and the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeocodeErrorKind {
    /// No complete response inside the configured window.
    Timeout,
    /// Connection-level failure before any HTTP response arrived.
    Network,
    /// A response arrived with a non-2xx status.
    Http(u16),
    /// A 2xx body that does not carry usable coordinates.
    MalformedResponse,
    /// The provider explicitly had nothing for the query.
    NotFound,
    /// Coordinates were valid but fell outside the configured region.
    OutOfRegion,
    /// Every configured provider failed; see [`GeocodeError::cause`].
    AllProvidersExhausted,
    /// The query could not be built from its input fields.
    InvalidInput,
    /// Processing the record failed inside geoqueue itself, e.g. a panic.
    Internal,
}

impl GeocodeErrorKind {
    /// Transient failures are the ones worth retrying against the same endpoint.
    pub const fn retryable(self) -> bool {
        match self {
            Self::Timeout | Self::Network => true,
            Self::Http(status) => status >= 500 && status < 600,
            Self::MalformedResponse
            | Self::NotFound
            | Self::OutOfRegion
            | Self::AllProvidersExhausted
            | Self::InvalidInput
            | Self::Internal => false,
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Timeout => "geocode.timeout",
            Self::Network => "geocode.network",
            Self::Http(_) => "geocode.http_status",
            Self::MalformedResponse => "geocode.malformed_response",
            Self::NotFound => "geocode.not_found",
            Self::OutOfRegion => "geocode.out_of_region",
            Self::AllProvidersExhausted => "geocode.all_providers_exhausted",
            Self::InvalidInput => "geocode.invalid_input",
            Self::Internal => "geocode.internal",
        }
    }
}

/// Structured geocoding failure.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeError {
    kind: GeocodeErrorKind,
    message: String,
    cause: Option<Box<GeocodeError>>,
}

impl GeocodeError {
    fn new(kind: GeocodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::Network, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::Http(status), message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::MalformedResponse, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::NotFound, message)
    }

    pub fn out_of_region(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::OutOfRegion, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GeocodeErrorKind::Internal, message)
    }

    /// Terminal chain failure wrapping the most proximate provider failure.
    pub fn exhausted(last: Option<GeocodeError>) -> Self {
        let message = match &last {
            Some(last) => format!("all providers failed; last error: {}", last.message),
            None => String::from("no providers configured"),
        };
        Self {
            kind: GeocodeErrorKind::AllProvidersExhausted,
            message,
            cause: last.map(Box::new),
        }
    }

    /// Prefixes the message, e.g. with the provider that produced it.
    pub fn with_context(mut self, context: &str) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub const fn kind(&self) -> GeocodeErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&GeocodeError> {
        self.cause.as_deref()
    }

    pub const fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Status used when a request handler fronts the resolver.
    pub const fn http_status(&self) -> u16 {
        match self.kind {
            GeocodeErrorKind::InvalidInput => 400,
            GeocodeErrorKind::NotFound
            | GeocodeErrorKind::OutOfRegion
            | GeocodeErrorKind::AllProvidersExhausted => 404,
            _ => 500,
        }
    }
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for GeocodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

impl From<RequestError> for GeocodeError {
    fn from(error: RequestError) -> Self {
        match error.kind() {
            RequestErrorKind::Timeout => Self::timeout(error.message()),
            RequestErrorKind::Network => Self::network(error.message()),
            RequestErrorKind::Status(status) => Self::http(status, error.message()),
        }
    }
}

/// Failures of the orchestration scaffolding itself, never of a single record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("work source failed: {0}")]
    WorkSource(String),
    #[error("batch loop panicked: {0}")]
    Panicked(String),
}

/// Error raised by external collaborators (work source, persistence sink).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Invalid configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown provider '{value}', expected one of viacep_nominatim, awesomeapi, brasilapi_nominatim, google_maps, positionstack, nominatim")]
    UnknownProvider { value: String },
    #[error("'{field}' must be greater than zero")]
    MustBePositive { field: &'static str },
    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },
}
