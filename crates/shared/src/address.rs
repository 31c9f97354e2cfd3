//! State addressing for the marbles transaction family.
//!
//! An address is the first six hex digits of `SHA-512(family_name)` followed by
//! the first sixty-four hex digits of `SHA-512(entity_name)`.

use sha2::{Digest, Sha512};
use thiserror::Error;

pub const FAMILY_NAME: &str = "marbles";
pub const FAMILY_VERSION: &str = "1.0";

pub const PREFIX_LEN: usize = 6;
pub const BODY_LEN: usize = 64;
pub const ADDRESS_LEN: usize = PREFIX_LEN + BODY_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("entity name must not be empty")]
    EmptyName,
    #[error("address must be {ADDRESS_LEN} lowercase hex characters, got {0:?}")]
    Malformed(String),
}

/// Lowercase hex rendering of `SHA-512(data)`.
pub fn hex_digest(data: &[u8]) -> String {
    hex::encode(Sha512::digest(data))
}

/// Checks shape only: length and lowercase hex.
pub fn validate_address(address: &str) -> Result<(), AddressError> {
    let well_formed = address.len() == ADDRESS_LEN
        && address
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(AddressError::Malformed(address.to_string()))
    }
}

/// Immutable description of a transaction family's address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    family_name: String,
    family_version: String,
    prefix: String,
}

impl Namespace {
    pub fn new(family_name: impl Into<String>, family_version: impl Into<String>) -> Self {
        let family_name = family_name.into();
        let mut prefix = hex_digest(family_name.as_bytes());
        prefix.truncate(PREFIX_LEN);
        Self {
            family_name,
            family_version: family_version.into(),
            prefix,
        }
    }

    pub fn marbles() -> Self {
        Self::new(FAMILY_NAME, FAMILY_VERSION)
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn family_version(&self) -> &str {
        &self.family_version
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn address_for(&self, entity_name: &str) -> Result<String, AddressError> {
        if entity_name.is_empty() {
            return Err(AddressError::EmptyName);
        }
        let body = hex_digest(entity_name.as_bytes());
        Ok(format!("{}{}", self.prefix, &body[..BODY_LEN]))
    }

    pub fn contains(&self, address: &str) -> bool {
        validate_address(address).is_ok() && address.starts_with(&self.prefix)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::marbles()
    }
}

#[cfg(test)]
#[path = "tests/address_tests.rs"]
mod tests;
