use std::process::ExitCode;

use geoqueue_core::{
    AddressQuery, GeocodeError, GeocodeResponse, GeocoderConfig, ResolutionChainBuilder, WorkItem,
};
use tracing::debug;

use super::print_json;
use crate::cli::ResolveArgs;
use crate::error::CliError;

pub async fn run(args: &ResolveArgs, config: GeocoderConfig, pretty: bool) -> Result<ExitCode, CliError> {
    let response = match build_query(args) {
        Ok(query) => {
            let chain = ResolutionChainBuilder::new(config).build();
            if chain.is_empty() {
                return Err(CliError::Command(String::from(
                    "no provider is available; check the provider list and API keys",
                )));
            }
            debug!(providers = ?chain.providers(), "resolving");
            GeocodeResponse::from_outcome(&chain.resolve(&query).await)
        }
        Err(error) => GeocodeResponse::from_error(&error),
    };

    print_json(&response, pretty)?;
    Ok(ExitCode::from(exit_status(&response)))
}

fn build_query(args: &ResolveArgs) -> Result<AddressQuery, GeocodeError> {
    let item = WorkItem {
        id: String::from("cli"),
        postal_code: args.postal_code.clone(),
        street: args.street.clone(),
        neighborhood: args.neighborhood.clone(),
        locality: args.locality.clone(),
        region: args.region.clone(),
        ..WorkItem::default()
    };
    AddressQuery::from_work_item(&item)
}

/// 0 resolved, 2 unusable input, 3 nothing found.
fn exit_status(response: &GeocodeResponse) -> u8 {
    match response.http_status() {
        200 => 0,
        400 => 2,
        _ => 3,
    }
}
