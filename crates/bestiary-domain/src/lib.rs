//! Bestiary Domain Layer
//!
//! This crate contains the domain model for Bestiary. It has ZERO external
//! dependencies and defines the value objects and trait interfaces that all
//! other layers depend upon.
//!
//! ## Key Concepts
//!
//! - **Record**: One catalogue row (category, Latin, German, Russian names)
//! - **Natural key**: `(latin, russian, german)`, identifies a record across
//!   batches and retry rounds
//! - **ModelClient**: The boundary to the remote language model
//! - **CredentialProvider**: The boundary to static credential storage
//!
//! ## Architecture
//!
//! - No external crate dependencies
//! - Pure domain logic only
//! - Infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod traits;

// Re-exports for convenience
pub use record::{NaturalKey, Record};
pub use traits::{CredentialProvider, ModelClient};
