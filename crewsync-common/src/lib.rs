//! # crewsync Common Library
//!
//! Shared code for the crewsync workspace:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Database bootstrap (schema, migrations) and row models
//! - Timestamp and guid helpers for TEXT-backed columns

pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
