//! UUID utilities

use crate::{Error, Result};
use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse an id supplied by a caller; malformed input is an invalid argument
pub fn parse(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim())
        .map_err(|e| Error::InvalidArgument(format!("Malformed id '{}': {}", s, e)))
}

/// Parse a guid read back from a TEXT column
pub fn from_db(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Corrupt guid '{}': {}", s, e)))
}
