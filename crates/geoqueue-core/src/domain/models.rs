use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::PostalCode;
use crate::GeocodeError;

const COUNTRY_NAME: &str = "Brasil";

/// Record pending geocoding, as handed over by the work source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "cep", skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, alias = "address", skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, alias = "city", skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, alias = "state", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }

    pub fn with_street(mut self, street: impl Into<String>) -> Self {
        self.street = Some(street.into());
        self
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Input to resolution: a postal code and/or free-text address fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    postal_code: Option<PostalCode>,
    street: Option<String>,
    neighborhood: Option<String>,
    locality: Option<String>,
    region: Option<String>,
}

impl AddressQuery {
    pub fn from_postal_code(postal_code: PostalCode) -> Self {
        Self {
            postal_code: Some(postal_code),
            street: None,
            neighborhood: None,
            locality: None,
            region: None,
        }
    }

    pub fn from_address(street: &str, locality: &str) -> Result<Self, GeocodeError> {
        let query = Self {
            postal_code: None,
            street: clean(Some(street)),
            neighborhood: None,
            locality: clean(Some(locality)),
            region: None,
        };
        query.ensure_resolvable()?;
        Ok(query)
    }

    /// Build a query from a work item; fails before any network call.
    pub fn from_work_item(item: &WorkItem) -> Result<Self, GeocodeError> {
        let postal_code = clean(item.postal_code.as_deref())
            .map(|raw| PostalCode::parse(&raw))
            .transpose()?;

        let query = Self {
            postal_code,
            street: clean(item.street.as_deref()),
            neighborhood: clean(item.neighborhood.as_deref()),
            locality: clean(item.locality.as_deref()),
            region: clean(item.region.as_deref()),
        };
        query.ensure_resolvable()?;
        Ok(query)
    }

    pub fn with_neighborhood(mut self, neighborhood: &str) -> Self {
        self.neighborhood = clean(Some(neighborhood));
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = clean(Some(region));
        self
    }

    pub fn postal_code(&self) -> Option<&PostalCode> {
        self.postal_code.as_ref()
    }

    pub fn street(&self) -> Option<&str> {
        self.street.as_deref()
    }

    pub fn neighborhood(&self) -> Option<&str> {
        self.neighborhood.as_deref()
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// A postal code alone, or a street together with a locality.
    pub fn is_resolvable(&self) -> bool {
        self.postal_code.is_some() || (self.street.is_some() && self.locality.is_some())
    }

    /// Free-text form used by search-style geocoders; `None` without a street or locality.
    pub fn free_text(&self) -> Option<String> {
        if self.street.is_none() && self.locality.is_none() {
            return None;
        }

        let mut parts = [
            self.street.as_deref(),
            self.neighborhood.as_deref(),
            self.locality.as_deref(),
            self.region.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        parts.push(COUNTRY_NAME);
        Some(parts.join(", "))
    }

    fn ensure_resolvable(&self) -> Result<(), GeocodeError> {
        if self.is_resolvable() {
            Ok(())
        } else {
            Err(GeocodeError::invalid_input(
                "query needs a postal code or both street and locality",
            ))
        }
    }
}

/// Successful resolution, normalized across providers.
///
/// Latitude and longitude always travel together. Adapters build these only
/// through [`LocationParts::into_location`], which validates both; values read
/// back from storage are taken as they were persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_address: String,
    pub locality: String,
    pub region: String,
    pub postal_code: String,
    pub provider: String,
}

/// Raw, provider-shaped pieces of a location before validation.
///
/// Coordinates are kept as JSON values because providers disagree on
/// whether they are numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationParts {
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    pub display_address: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
}

impl LocationParts {
    pub fn new(latitude: Option<Value>, longitude: Option<Value>) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }

    pub fn display_address(mut self, value: Option<impl Into<String>>) -> Self {
        self.display_address = value.map(Into::into);
        self
    }

    pub fn locality(mut self, value: Option<impl Into<String>>) -> Self {
        self.locality = value.map(Into::into);
        self
    }

    pub fn region(mut self, value: Option<impl Into<String>>) -> Self {
        self.region = value.map(Into::into);
        self
    }

    pub fn postal_code(mut self, value: Option<impl Into<String>>) -> Self {
        self.postal_code = value.map(Into::into);
        self
    }

    /// Single choke point for coordinate validation.
    pub fn into_location(self, provider: &str) -> Result<ResolvedLocation, GeocodeError> {
        let latitude = parse_coordinate("latitude", self.latitude.as_ref(), 90.0)?;
        let longitude = parse_coordinate("longitude", self.longitude.as_ref(), 180.0)?;

        Ok(ResolvedLocation {
            latitude,
            longitude,
            display_address: self.display_address.unwrap_or_default().trim().to_owned(),
            locality: self.locality.unwrap_or_default().trim().to_owned(),
            region: self.region.unwrap_or_default().trim().to_owned(),
            postal_code: self.postal_code.unwrap_or_default(),
            provider: provider.to_owned(),
        })
    }
}

fn parse_coordinate(
    field: &'static str,
    value: Option<&Value>,
    limit: f64,
) -> Result<f64, GeocodeError> {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    let Some(parsed) = parsed else {
        return Err(GeocodeError::malformed(format!(
            "{field} is missing or not numeric: {}",
            value.map_or_else(|| String::from("<absent>"), Value::to_string)
        )));
    };

    if !parsed.is_finite() || parsed < -limit || parsed > limit {
        return Err(GeocodeError::malformed(format!(
            "{field} {parsed} is outside [-{limit}, {limit}]"
        )));
    }

    Ok(parsed)
}

/// Axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Approximate national bounds of Brazil.
    pub const BRAZIL: Self = Self {
        north: 5.3,
        south: -33.8,
        east: -28.8,
        west: -73.8,
    };

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeocodeErrorKind;
    use serde_json::json;

    #[test]
    fn parses_numeric_strings_and_fills_empty_text_fields() {
        let location = LocationParts::new(Some(json!("-23.5613")), Some(json!(-46.6565)))
            .locality(Some("São Paulo"))
            .into_location("viacep_nominatim")
            .expect("coordinates are valid");

        assert_eq!(location.latitude, -23.5613);
        assert_eq!(location.longitude, -46.6565);
        assert_eq!(location.locality, "São Paulo");
        assert_eq!(location.region, "");
        assert_eq!(location.provider, "viacep_nominatim");
    }

    #[test]
    fn non_numeric_latitude_is_malformed_not_nan() {
        let error = LocationParts::new(Some(json!("not-a-number")), Some(json!("-46.6")))
            .into_location("awesomeapi")
            .expect_err("must reject");

        assert_eq!(error.kind(), GeocodeErrorKind::MalformedResponse);
    }

    #[test]
    fn missing_or_out_of_range_coordinates_are_malformed() {
        let missing = LocationParts::new(Some(json!(-23.5)), None).into_location("p");
        let out_of_range = LocationParts::new(Some(json!(95.0)), Some(json!(0.0))).into_location("p");
        let infinite = LocationParts::new(Some(json!("inf")), Some(json!(0.0))).into_location("p");

        for result in [missing, out_of_range, infinite] {
            assert_eq!(
                result.expect_err("must reject").kind(),
                GeocodeErrorKind::MalformedResponse
            );
        }
    }

    #[test]
    fn work_item_with_short_postal_code_is_invalid_input() {
        let item = WorkItem::new("42").with_postal_code("123").with_street("Rua A");

        let error = AddressQuery::from_work_item(&item).expect_err("must reject");
        assert_eq!(error.kind(), GeocodeErrorKind::InvalidInput);
    }

    #[test]
    fn work_item_without_postal_code_needs_street_and_locality() {
        let street_only = WorkItem::new("1").with_street("Av. Paulista, 1000");
        let full = WorkItem::new("2")
            .with_street("Av. Paulista, 1000")
            .with_locality("São Paulo")
            .with_region("SP");

        assert!(AddressQuery::from_work_item(&street_only).is_err());
        let query = AddressQuery::from_work_item(&full).expect("street + locality resolves");
        assert_eq!(
            query.free_text().as_deref(),
            Some("Av. Paulista, 1000, São Paulo, SP, Brasil")
        );
    }

    #[test]
    fn blank_fields_are_treated_as_absent() {
        let item = WorkItem::new("3").with_postal_code("   ").with_street(" ");

        assert!(AddressQuery::from_work_item(&item).is_err());
    }

    #[test]
    fn brazil_bounds_contain_sao_paulo_but_not_lisbon() {
        assert!(BoundingBox::BRAZIL.contains(-23.55, -46.63));
        assert!(!BoundingBox::BRAZIL.contains(38.72, -9.14));
    }

    #[test]
    fn work_item_accepts_legacy_field_names() {
        let item: WorkItem = serde_json::from_value(json!({
            "id": "7",
            "cep": "01310-100",
            "address": "Av. Paulista",
            "city": "São Paulo",
            "state": "SP"
        }))
        .expect("legacy names deserialize");

        assert_eq!(item.postal_code.as_deref(), Some("01310-100"));
        assert_eq!(item.locality.as_deref(), Some("São Paulo"));
    }
}
