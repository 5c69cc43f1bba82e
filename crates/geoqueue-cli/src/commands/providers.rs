use std::process::ExitCode;

use geoqueue_core::{GeocoderConfig, ProviderId};
use serde::Serialize;

use super::print_json;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ProviderRow {
    position: usize,
    id: ProviderId,
    requires_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_variable: Option<&'static str>,
    /// False when a required key is missing; the chain skips the provider.
    active: bool,
}

#[derive(Debug, Serialize)]
struct ProvidersReport<'a> {
    providers: Vec<ProviderRow>,
    config: &'a GeocoderConfig,
}

pub fn run(config: &GeocoderConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let report = ProvidersReport {
        providers: describe(config),
        config,
    };
    print_json(&report, pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn describe(config: &GeocoderConfig) -> Vec<ProviderRow> {
    config
        .providers
        .iter()
        .enumerate()
        .map(|(index, id)| ProviderRow {
            position: index + 1,
            id: *id,
            requires_key: id.requires_key(),
            key_variable: id.api_key_var(),
            active: !id.requires_key() || config.api_key(*id).is_some(),
        })
        .collect()
}
