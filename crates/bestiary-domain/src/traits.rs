//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the reconciliation core and
//! infrastructure. Implementations live in other crates.

use std::fmt::Display;
use std::future::Future;

/// Trait for sending a rendered prompt to a remote model
///
/// Implemented by the infrastructure layer (bestiary-llm)
pub trait ModelClient {
    /// Error type for model calls
    type Error: Display;

    /// Send a prompt and return the raw response text
    ///
    /// The text may or may not be valid JSON and may be wrapped in code
    /// fences. Callers treat any error as "no usable text".
    fn send(&self, prompt: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// Trait for looking up static credentials by name
///
/// Implemented by the infrastructure layer (bestiary-llm)
pub trait CredentialProvider {
    /// Look up a credential, returning `None` if it is not known
    fn lookup(&self, name: &str) -> Option<String>;
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for Box<T> {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }
}
