use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::GeocodeError;

/// Number of digits in a Brazilian CEP.
pub const POSTAL_CODE_DIGITS: usize = 8;

/// Normalized Brazilian postal code (CEP), digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Strip punctuation and require exactly eight digits.
    pub fn parse(input: &str) -> Result<Self, GeocodeError> {
        let digits = input
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>();

        if digits.is_empty() {
            return Err(GeocodeError::invalid_input("postal code cannot be empty"));
        }

        if digits.len() != POSTAL_CODE_DIGITS {
            return Err(GeocodeError::invalid_input(format!(
                "postal code must have {POSTAL_CODE_DIGITS} digits, got {} in '{input}'",
                digits.len()
            )));
        }

        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human form, `01310-100`.
    pub fn formatted(&self) -> String {
        format!("{}-{}", &self.0[..5], &self.0[5..])
    }
}

impl Display for PostalCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for PostalCode {
    type Error = GeocodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for PostalCode {
    type Error = GeocodeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PostalCode> for String {
    fn from(value: PostalCode) -> Self {
        value.0
    }
}
