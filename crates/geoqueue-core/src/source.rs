use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Canonical geocoding provider identifiers used in configuration and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    ViacepNominatim,
    Awesomeapi,
    BrasilapiNominatim,
    GoogleMaps,
    Positionstack,
    Nominatim,
}

impl ProviderId {
    pub const ALL: [Self; 6] = [
        Self::ViacepNominatim,
        Self::Awesomeapi,
        Self::BrasilapiNominatim,
        Self::GoogleMaps,
        Self::Positionstack,
        Self::Nominatim,
    ];

    /// Free providers tried by default, cheapest and most reliable first.
    pub const DEFAULT_CHAIN: [Self; 3] = [
        Self::ViacepNominatim,
        Self::Awesomeapi,
        Self::BrasilapiNominatim,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViacepNominatim => "viacep_nominatim",
            Self::Awesomeapi => "awesomeapi",
            Self::BrasilapiNominatim => "brasilapi_nominatim",
            Self::GoogleMaps => "google_maps",
            Self::Positionstack => "positionstack",
            Self::Nominatim => "nominatim",
        }
    }

    /// Environment variable holding the API key, for providers that need one.
    pub const fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::GoogleMaps => Some("GOOGLE_MAPS_API_KEY"),
            Self::Positionstack => Some("POSITIONSTACK_API_KEY"),
            _ => None,
        }
    }

    pub const fn requires_key(self) -> bool {
        self.api_key_var().is_some()
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "viacep_nominatim" | "viacep" => Ok(Self::ViacepNominatim),
            "awesomeapi" => Ok(Self::Awesomeapi),
            "brasilapi_nominatim" | "brasilapi" => Ok(Self::BrasilapiNominatim),
            "google_maps" | "googlemaps" => Ok(Self::GoogleMaps),
            "positionstack" => Ok(Self::Positionstack),
            "nominatim" => Ok(Self::Nominatim),
            other => Err(ConfigError::UnknownProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Parses a comma-separated provider list, keeping order and dropping duplicates.
pub fn parse_provider_list(value: &str) -> Result<Vec<ProviderId>, ConfigError> {
    let mut providers = Vec::new();
    for part in value.split(',').filter(|part| !part.trim().is_empty()) {
        let id = part.parse::<ProviderId>()?;
        if !providers.contains(&id) {
            providers.push(id);
        }
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_short_aliases() {
        assert_eq!("viacep".parse::<ProviderId>(), Ok(ProviderId::ViacepNominatim));
        assert_eq!("Google-Maps".parse::<ProviderId>(), Ok(ProviderId::GoogleMaps));
        assert!(matches!(
            "mapquest".parse::<ProviderId>(),
            Err(ConfigError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn provider_list_keeps_order_without_duplicates() {
        let providers = parse_provider_list("awesomeapi, viacep_nominatim,awesomeapi,")
            .expect("list should parse");

        assert_eq!(
            providers,
            vec![ProviderId::Awesomeapi, ProviderId::ViacepNominatim]
        );
    }

    #[test]
    fn only_commercial_providers_need_keys() {
        let keyed = ProviderId::ALL
            .into_iter()
            .filter(|id| id.requires_key())
            .collect::<Vec<_>>();

        assert_eq!(keyed, vec![ProviderId::GoogleMaps, ProviderId::Positionstack]);
    }
}
