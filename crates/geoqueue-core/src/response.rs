//! Wire shapes used when the resolver is fronted by a request handler or the CLI.

use serde::{Deserialize, Serialize};

use crate::orchestrator::{BatchJobState, RunState};
use crate::routing::{ResolutionFailure, ResolutionOutcome};
use crate::GeocodeError;

/// `{ "success": true, ... }` on resolution, `{ "success": false, ... }` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeocodeResponse {
    Resolved {
        success: bool,
        latitude: f64,
        longitude: f64,
        address: String,
        locality: String,
        region: String,
        postal_code: String,
        provider: String,
    },
    Failed {
        success: bool,
        error: String,
        code: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        attempted_providers: Vec<String>,
        #[serde(skip)]
        status: u16,
    },
}

impl GeocodeResponse {
    pub fn from_outcome(outcome: &ResolutionOutcome) -> Self {
        match outcome {
            Ok(location) => Self::Resolved {
                success: true,
                latitude: location.latitude,
                longitude: location.longitude,
                address: location.display_address.clone(),
                locality: location.locality.clone(),
                region: location.region.clone(),
                postal_code: location.postal_code.clone(),
                provider: location.provider.clone(),
            },
            Err(ResolutionFailure {
                error, attempted, ..
            }) => Self::failure(error, attempted.clone()),
        }
    }

    pub fn from_error(error: &GeocodeError) -> Self {
        Self::failure(error, Vec::new())
    }

    fn failure(error: &GeocodeError, attempted_providers: Vec<String>) -> Self {
        Self::Failed {
            success: false,
            error: error.message().to_owned(),
            code: error.code().to_owned(),
            attempted_providers,
            status: error.http_status(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// 200 on success, otherwise the error's mapped status.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Resolved { .. } => 200,
            Self::Failed { status, .. } => *status,
        }
    }
}

/// Outcome of a batch run; partial success still reports `success: true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub success: bool,
    pub state: RunState,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
    pub percentage: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchSummary {
    pub fn from_job(state: RunState, job: &BatchJobState) -> Self {
        Self {
            success: state != RunState::Failed,
            state,
            processed: job.processed,
            successful: job.successful,
            failed: job.errors,
            skipped: job.skipped,
            total: job.total,
            percentage: job.percentage,
            error: None,
        }
    }

    pub fn failed(job: &BatchJobState, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_job(RunState::Failed, job)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeocodeErrorKind;

    #[test]
    fn exhausted_outcome_maps_to_404_with_attempted_providers() {
        let outcome: ResolutionOutcome = Err(ResolutionFailure {
            error: GeocodeError::exhausted(Some(GeocodeError::not_found("nothing"))),
            last_provider: Some(String::from("awesomeapi")),
            attempted: vec![String::from("viacep_nominatim"), String::from("awesomeapi")],
            latency_ms: 12,
        });

        let response = GeocodeResponse::from_outcome(&outcome);
        let json = serde_json::to_value(&response).expect("serializes");

        assert_eq!(response.http_status(), 404);
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], GeocodeErrorKind::AllProvidersExhausted.code());
        assert_eq!(json["attempted_providers"][1], "awesomeapi");
        assert!(json.get("status").is_none());
    }

    #[test]
    fn invalid_input_maps_to_400() {
        let response = GeocodeResponse::from_error(&GeocodeError::invalid_input("postal code must have 8 digits"));

        assert_eq!(response.http_status(), 400);
        assert!(!response.is_success());
    }

    #[test]
    fn partial_batch_success_is_still_success() {
        let job = BatchJobState {
            total: 10,
            processed: 10,
            successful: 7,
            errors: 3,
            skipped: 1,
            percentage: 100,
            ..BatchJobState::default()
        };

        let summary = BatchSummary::from_job(RunState::Completed, &job);

        assert!(summary.success);
        assert_eq!(summary.failed, 3);
    }
}
