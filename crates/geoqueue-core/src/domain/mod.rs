mod models;
mod postal_code;

pub use models::{AddressQuery, BoundingBox, LocationParts, ResolvedLocation, WorkItem};
pub use postal_code::{PostalCode, POSTAL_CODE_DIGITS};
