//! # dcmp Common Library
//!
//! Shared code for the dcmp composition services:
//! - Plan / Track schema model and its validation
//! - Session-scoped provider credentials
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod credentials;
pub mod error;
pub mod schema;

pub use credentials::{ApiKey, CredentialStore};
pub use error::{Error, Result};
pub use schema::{
    Clef, Instrument, InstrumentStatus, Plan, SongInfo, SongSection, Track, ValidationError,
    Violation, ViolationKind,
};
