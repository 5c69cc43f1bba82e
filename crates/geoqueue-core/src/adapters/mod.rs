mod awesomeapi;
mod brasilapi;
mod google_maps;
mod nominatim;
mod positionstack;
mod viacep;

pub use awesomeapi::{AwesomeApiAdapter, AWESOMEAPI_BASE_URL};
pub use brasilapi::{BrasilApiNominatimAdapter, BRASILAPI_BASE_URL};
pub use google_maps::{GoogleMapsAdapter, GOOGLE_MAPS_BASE_URL};
pub use nominatim::{NominatimAdapter, NominatimSearch, NOMINATIM_BASE_URL};
pub use positionstack::{PositionstackAdapter, POSITIONSTACK_BASE_URL};
pub use viacep::{ViacepNominatimAdapter, VIACEP_BASE_URL};
