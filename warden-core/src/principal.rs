//! Principal identity type.
//!
//! A [`Principal`] is the login identity (usually an email address) being
//! authenticated. Throttling state is keyed by source address, not by
//! principal; the principal travels on attempt records as audit metadata.
//! Absence of a principal is expressed as `Option<Principal>` rather than a
//! placeholder string.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum accepted principal length, matching the practical limit for
/// email addresses.
const MAX_PRINCIPAL_LEN: usize = 254;

/// The login identity associated with an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create a principal from a login identifier.
    ///
    /// The identifier must be non-empty, free of control characters, and at
    /// most 254 bytes. The principal is otherwise treated as opaque: full
    /// address-format validation belongs to the authentication layer that
    /// owns it.
    pub fn new(identifier: impl Into<String>) -> Result<Self, ValidationError> {
        let identifier = identifier.into();

        if identifier.trim().is_empty() {
            return Err(ValidationError::MissingField(
                "Principal identifier is required".to_string(),
            ));
        }

        if identifier.len() > MAX_PRINCIPAL_LEN {
            return Err(ValidationError::InvalidPrincipal(
                "Identifier is too long".to_string(),
            ));
        }

        if identifier.chars().any(char::is_control) {
            return Err(ValidationError::InvalidPrincipal(
                "Identifier contains control characters".to_string(),
            ));
        }

        Ok(Self(identifier))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
