pub mod config;
pub mod env;

pub use config::{DEFAULT_HOST, Endpoint, ProviderSettings, SettingsManager, SettingsSource};
pub use env::EnvCredentials;

use anyhow::{Context, bail};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Credential lookup
// ---------------------------------------------------------------------------

/// Turns a credential identifier from the settings into the plaintext secret.
pub trait CredentialLookup: Send + Sync {
    fn resolve(&self, identifier: &str) -> anyhow::Result<String>;
}

/// In-memory secrets, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    secrets: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        self.secrets.insert(identifier.into(), secret.into());
        self
    }
}

impl CredentialLookup for StaticCredentials {
    fn resolve(&self, identifier: &str) -> anyhow::Result<String> {
        let secret = self
            .secrets
            .get(identifier)
            .with_context(|| format!("No credential stored for `{}`", identifier))?;
        if secret.trim().is_empty() {
            bail!("Credential `{}` is empty", identifier);
        }
        Ok(secret.clone())
    }
}
