use crate::providers::AiError;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_HOST: &str = "llm.aihosting.mittwald.de/v1";

fn default_moderation() -> bool {
    true
}

/// Provider configuration as the host stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Identifier handed to the credential lookup, not the secret itself.
    #[serde(default)]
    pub api_key: String,

    /// Endpoint override. Blank means the mittwald default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_moderation")]
    pub moderation: bool,

    /// Global request options merged into every payload (temperature, dimensions, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: None,
            moderation: default_moderation(),
            options: Map::new(),
        }
    }
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn endpoint(&self) -> Result<Endpoint, AiError> {
        Endpoint::resolve(self.host.as_deref())
    }
}

/// Where the adapter reads its settings from.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> anyhow::Result<ProviderSettings>;
}

impl SettingsSource for ProviderSettings {
    fn load(&self) -> anyhow::Result<ProviderSettings> {
        Ok(self.clone())
    }
}

/// Resolved API base URL, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(String);

impl Endpoint {
    /// A host with a scheme is used as-is, a bare host gets `https://`.
    pub fn resolve(host: Option<&str>) -> Result<Self, AiError> {
        let host = host.map(str::trim).filter(|h| !h.is_empty()).unwrap_or(DEFAULT_HOST);
        let candidate = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let candidate = candidate.trim_end_matches('/').to_string();
        url::Url::parse(&candidate).map_err(|e| {
            AiError::setup(format!("Invalid mittwald endpoint `{}`", candidate), e)
        })?;
        debug!(endpoint = %candidate, "resolved mittwald endpoint");
        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads and writes the settings file with an exclusive lock and atomic replace.
#[derive(Clone)]
pub struct SettingsManager {
    path: PathBuf,
}

impl SettingsManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.mittai/settings.json`
    pub fn default_path() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(".mittai").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn ensure_parent(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(parent, fs::Permissions::from_mode(0o700));
            }
        }
        Ok(())
    }

    fn with_exclusive_lock<T>(&self, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
        self.ensure_parent()?;
        let lock_file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path())?;

        lock_file.lock_exclusive()?;
        let out = f();
        let _ = lock_file.unlock();
        out
    }

    /// Missing file yields defaults.
    pub fn read(&self) -> anyhow::Result<ProviderSettings> {
        self.with_exclusive_lock(|| {
            if !self.path.exists() {
                return Ok(ProviderSettings::default());
            }
            let content = fs::read_to_string(&self.path)?;
            Ok(serde_json::from_str(&content)?)
        })
    }

    pub fn save(&self, settings: &ProviderSettings) -> anyhow::Result<()> {
        self.with_exclusive_lock(|| {
            let json = serde_json::to_string_pretty(settings)?;

            let tmp_path = self.path.with_extension("json.tmp");
            {
                let mut file = fs::File::create(&tmp_path)?;
                file.write_all(json.as_bytes())?;
                file.sync_all()?;
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600));
            }

            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut ProviderSettings)) -> anyhow::Result<ProviderSettings> {
        let mut settings = self.read()?;
        f(&mut settings);
        self.save(&settings)?;
        Ok(settings)
    }
}

impl SettingsSource for SettingsManager {
    fn load(&self) -> anyhow::Result<ProviderSettings> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_defaults_to_mittwald() {
        let e = Endpoint::resolve(None).unwrap();
        assert_eq!(e.as_str(), "https://llm.aihosting.mittwald.de/v1");
        assert_eq!(
            e.url("chat/completions"),
            "https://llm.aihosting.mittwald.de/v1/chat/completions"
        );
        assert_eq!(Endpoint::resolve(Some("  ")).unwrap(), e);
    }

    #[test]
    fn endpoint_override_keeps_or_adds_scheme() {
        assert_eq!(
            Endpoint::resolve(Some("llm.example.test/v1/")).unwrap().as_str(),
            "https://llm.example.test/v1"
        );
        assert_eq!(
            Endpoint::resolve(Some("http://127.0.0.1:8080/v1")).unwrap().as_str(),
            "http://127.0.0.1:8080/v1"
        );
    }

    #[test]
    fn unparseable_endpoint_is_a_setup_failure() {
        let err = Endpoint::resolve(Some("http://")).unwrap_err();
        assert!(matches!(err, AiError::SetupFailure { .. }));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SettingsManager::new(dir.path().join("nested").join("settings.json"));
        let s = mgr.read().unwrap();
        assert_eq!(s, ProviderSettings::default());
        assert!(s.moderation);
    }

    #[test]
    fn save_then_read_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SettingsManager::new(dir.path().join("settings.json"));
        let settings = ProviderSettings::new("MITTWALD_API_KEY")
            .with_host("llm.example.test/v1")
            .with_option("temperature", json!(0.2));
        mgr.save(&settings).unwrap();

        assert_eq!(mgr.load().unwrap(), settings);
        assert!(!dir.path().join("settings.json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(mgr.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn update_modifies_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = SettingsManager::new(dir.path().join("settings.json"));
        mgr.update(|s| s.moderation = false).unwrap();
        let s = mgr.update(|s| s.api_key = "KEY".into()).unwrap();
        assert!(!s.moderation);
        assert_eq!(mgr.read().unwrap().api_key, "KEY");
    }

    #[test]
    fn moderation_defaults_on_when_absent() {
        let s: ProviderSettings = serde_json::from_str(r#"{"api_key":"K"}"#).unwrap();
        assert!(s.moderation);
        assert!(s.options.is_empty());
    }
}
