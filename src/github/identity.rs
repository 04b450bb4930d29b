//! Repository identity and owner/name validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rejected owner or repository name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The component was empty after trimming whitespace.
    #[error("{field} cannot be empty")]
    Blank {
        /// Which component was blank ("owner" or "repo").
        field: &'static str,
    },

    /// The component contains characters GitHub never allows in names.
    #[error("{field} contains invalid characters: {value}")]
    InvalidCharacters {
        /// Which component was rejected.
        field: &'static str,
        /// The offending value.
        value: String,
    },
}

/// A unique identifier for a GitHub repository.
///
/// Case is preserved because it is passed through to the GitHub API as-is;
/// persisted lookups go through [`RepositoryIdentity::lookup_key`] instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentity {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub name: String,
}

impl RepositoryIdentity {
    /// Builds an identity from raw path segments, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when either component is blank or contains
    /// characters outside `[A-Za-z0-9._-]`.
    pub fn parse(owner: &str, name: &str) -> Result<Self, IdentityError> {
        Ok(Self {
            owner: validate_owner(owner)?,
            name: validate_component("repo", name)?,
        })
    }

    /// Case-insensitive key used by the record store and the details cache.
    #[must_use]
    pub fn lookup_key(&self) -> (String, String) {
        (self.owner.to_lowercase(), self.name.to_lowercase())
    }
}

impl fmt::Display for RepositoryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Validates a bare owner (user or organisation) name.
///
/// # Errors
///
/// Same rules as [`RepositoryIdentity::parse`].
pub fn validate_owner(owner: &str) -> Result<String, IdentityError> {
    validate_component("owner", owner)
}

fn validate_component(field: &'static str, raw: &str) -> Result<String, IdentityError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(IdentityError::Blank { field });
    }

    // Names end up in request paths, so anything that could escape the segment is refused.
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !allowed || value == "." || value == ".." {
        return Err(IdentityError::InvalidCharacters {
            field,
            value: value.to_owned(),
        });
    }

    Ok(value.to_owned())
}
