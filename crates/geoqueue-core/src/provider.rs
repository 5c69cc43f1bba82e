//! Provider adapter contract.
//!
//! Every geocoding source implements [`GeocodeProvider`]. Adapters issue one
//! or two dependent calls, never retry on their own (the transport they are
//! handed may), and route every success through
//! [`LocationParts::into_location`](crate::LocationParts::into_location).

use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;

use crate::http_client::{HttpClient, HttpRequest, RequestError, RequestErrorKind};
use crate::{AddressQuery, GeocodeError, PostalCode, ProviderId, ResolvedLocation};

pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ResolvedLocation, GeocodeError>> + Send + 'a>>;

/// Geocoding source adapter contract.
///
/// Implementations must be `Send + Sync`; one chain is shared by every item
/// of a batch.
pub trait GeocodeProvider: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderId;

    /// Display name used in logs and in [`ResolvedLocation::provider`].
    fn name(&self) -> &str {
        self.id().as_str()
    }

    /// Resolves one query.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] with the transport classification intact for
    /// HTTP failures, `NotFound` when the provider has nothing for the query,
    /// and `MalformedResponse` when a 2xx body lacks usable coordinates.
    fn resolve<'a>(&'a self, query: &'a AddressQuery) -> ProviderFuture<'a>;
}

/// Sends one request and decodes a 2xx JSON body.
///
/// A 404 from a lookup endpoint means the provider does not know the query.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &dyn HttpClient,
    request: HttpRequest,
    provider: &str,
) -> Result<T, GeocodeError> {
    let response = client
        .execute(request)
        .await
        .and_then(|response| {
            if response.is_success() {
                Ok(response)
            } else {
                Err(RequestError::status(&response))
            }
        })
        .map_err(|error| match error.kind() {
            RequestErrorKind::Status(404) => {
                GeocodeError::not_found(format!("{provider}: no record for query"))
            }
            _ => GeocodeError::from(error).with_context(provider),
        })?;

    response
        .json::<T>()
        .map_err(|error| GeocodeError::malformed(format!("{provider}: unexpected body: {error}")))
}

/// Postal-code providers cannot do anything with a free-text-only query.
pub(crate) fn require_postal_code<'q>(
    query: &'q AddressQuery,
    provider: &str,
) -> Result<&'q PostalCode, GeocodeError> {
    query
        .postal_code()
        .ok_or_else(|| GeocodeError::not_found(format!("{provider}: query has no postal code")))
}

/// Renders `street, neighborhood, locality - region`, skipping blanks.
pub(crate) fn format_address(
    street: Option<&str>,
    neighborhood: Option<&str>,
    locality: Option<&str>,
    region: Option<&str>,
) -> String {
    fn present(value: Option<&str>) -> Option<&str> {
        value.map(str::trim).filter(|value| !value.is_empty())
    }

    let mut text = [present(street), present(neighborhood), present(locality)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

    if let Some(region) = present(region) {
        if text.is_empty() {
            text.push_str(region);
        } else {
            text.push_str(" - ");
            text.push_str(region);
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpResponse, ReplayHttpClient};
    use crate::GeocodeErrorKind;
    use serde_json::Value;

    #[test]
    fn format_address_skips_blank_parts() {
        assert_eq!(
            format_address(Some("Avenida Paulista"), Some(""), Some("São Paulo"), Some("SP")),
            "Avenida Paulista, São Paulo - SP"
        );
        assert_eq!(format_address(None, None, None, Some("SP")), "SP");
        assert_eq!(format_address(None, None, None, None), "");
    }

    #[tokio::test]
    async fn fetch_json_maps_404_to_not_found_and_keeps_5xx_status() {
        let client = ReplayHttpClient::new()
            .route("https://missing.test/", HttpResponse::with_status(404, ""))
            .route("https://broken.test/", HttpResponse::with_status(502, ""));

        let missing = fetch_json::<Value>(&client, HttpRequest::get("https://missing.test/x"), "p")
            .await
            .expect_err("404 fails");
        let broken = fetch_json::<Value>(&client, HttpRequest::get("https://broken.test/x"), "p")
            .await
            .expect_err("502 fails");

        assert_eq!(missing.kind(), GeocodeErrorKind::NotFound);
        assert_eq!(broken.kind(), GeocodeErrorKind::Http(502));
        assert!(broken.message().starts_with("p: "));
    }

    #[tokio::test]
    async fn fetch_json_rejects_non_json_bodies_as_malformed() {
        let client = ReplayHttpClient::new().route_json("https://html.test/", "<html>");

        let error = fetch_json::<Value>(&client, HttpRequest::get("https://html.test/"), "p")
            .await
            .expect_err("html is not json");

        assert_eq!(error.kind(), GeocodeErrorKind::MalformedResponse);
    }
}
