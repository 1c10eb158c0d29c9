//! Credential providers
//!
//! Static credentials only: a `.env`-style file, the process environment, or
//! an in-memory map for tests.

use bestiary_domain::CredentialProvider;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Looks up `NAME=value` lines in a `.env`-style file
///
/// The file is read on every lookup so the secret is not kept in memory
/// longer than needed. Blank lines and `#` comments are ignored.
#[derive(Debug, Clone)]
pub struct EnvFileCredentials {
    path: PathBuf,
}

impl EnvFileCredentials {
    /// Create a provider reading from the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for EnvFileCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot read credential file {}: {}", self.path.display(), e);
                return None;
            }
        };

        for line in BufReader::new(file).lines().map_while(Result::ok) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == name {
                    debug!("Credential {} found in {}", name, self.path.display());
                    return Some(value.trim().to_string());
                }
            }
        }

        None
    }
}

/// Reads credentials from process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVarCredentials;

impl CredentialProvider for EnvVarCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// In-memory credentials, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Asks each provider in turn; the first answer wins
#[derive(Default)]
pub struct ChainedCredentials {
    providers: Vec<Box<dyn CredentialProvider + Send + Sync>>,
}

impl ChainedCredentials {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider to the chain
    pub fn push(mut self, provider: impl CredentialProvider + Send + Sync + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }
}

impl CredentialProvider for ChainedCredentials {
    fn lookup(&self, name: &str) -> Option<String> {
        self.providers.iter().find_map(|p| p.lookup(name))
    }
}
