//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the IDPORT_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use idport_auth::ClientConfig;
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub provider: ProviderSection,
    #[serde(default)]
    pub client: ClientSection,
}

/// Identity-provider and app registration settings
#[derive(Debug, Deserialize)]
pub struct ProviderSection {
    pub server_url: String,
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// IDPORT_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    pub app_scheme: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

/// Orchestration tuning
#[derive(Debug, Deserialize)]
pub struct ClientSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_expiry_leeway_secs")]
    pub expiry_leeway_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_credential_path")]
    pub credential_path: PathBuf,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            queue_capacity: default_queue_capacity(),
            expiry_leeway_secs: default_expiry_leeway_secs(),
            timeout_secs: default_timeout_secs(),
            credential_path: default_credential_path(),
        }
    }
}

fn default_api_version() -> String {
    "2".into()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_queue_capacity() -> usize {
    32
}

fn default_expiry_leeway_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_credential_path() -> PathBuf {
    PathBuf::from("idport-credential.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Client secret resolution order:
    /// 1. IDPORT_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.client.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        // Resolve the client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("IDPORT_CLIENT_SECRET") {
            config.provider.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.provider.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.provider.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve the config file path from the CLI arg or IDPORT_CONFIG env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("IDPORT_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("idport.toml")
    }

    /// Build and validate the SDK configuration.
    pub fn to_client_config(&self) -> common::Result<ClientConfig> {
        let secret = self.provider.client_secret.as_ref().ok_or_else(|| {
            common::Error::Config(
                "client secret not configured; set IDPORT_CLIENT_SECRET or client_secret_file"
                    .into(),
            )
        })?;

        let mut client_config = ClientConfig::new(
            self.provider.server_url.clone(),
            self.provider.client_id.clone(),
            secret.clone(),
            self.provider.app_scheme.clone(),
        );
        client_config.scope = self.provider.scope.clone();
        client_config.api_version = self.provider.api_version.clone();
        client_config.max_attempts = self.client.max_attempts;
        client_config.queue_capacity = self.client.queue_capacity;
        client_config.expiry_leeway = Duration::from_secs(self.client.expiry_leeway_secs);
        client_config.validate()?;
        Ok(client_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[provider]
server_url = "https://id.example.com"
client_id = "client-1"
app_scheme = "exampleapp"
scope = "profile email"

[client]
max_attempts = 4
"#
    }

    #[test]
    fn load_valid_config_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("IDPORT_CLIENT_SECRET") };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idport.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.provider.server_url, "https://id.example.com");
        assert_eq!(config.provider.client_id, "client-1");
        assert_eq!(config.provider.api_version, "2");
        assert_eq!(config.client.max_attempts, 4);
        assert_eq!(config.client.queue_capacity, 32);
        assert_eq!(config.client.timeout_secs, 60);
        assert!(config.provider.client_secret.is_none());
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Config::load(Path::new("/nonexistent/idport.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{{{ toml").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn client_secret_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idport.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        unsafe { set_env("IDPORT_CLIENT_SECRET", "secret-from-env") };
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.provider.client_secret.as_ref().unwrap().expose(),
            "secret-from-env"
        );
        unsafe { remove_env("IDPORT_CLIENT_SECRET") };
    }

    #[test]
    fn client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("IDPORT_CLIENT_SECRET") };

        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("secret");
        std::fs::write(&secret_path, "secret-from-file\n").unwrap();

        let toml_content = format!(
            r#"
[provider]
server_url = "https://id.example.com"
client_id = "client-1"
app_scheme = "exampleapp"
client_secret_file = "{}"
"#,
            secret_path.display()
        );
        let path = dir.path().join("idport.toml");
        std::fs::write(&path, toml_content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.provider.client_secret.as_ref().unwrap().expose(),
            "secret-from-file"
        );
    }

    #[test]
    fn to_client_config_requires_a_secret() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("IDPORT_CLIENT_SECRET") };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idport.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.to_client_config().is_err());
    }

    #[test]
    fn to_client_config_applies_tuning() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idport.toml");
        std::fs::write(&path, valid_toml()).unwrap();

        unsafe { set_env("IDPORT_CLIENT_SECRET", "s") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("IDPORT_CLIENT_SECRET") };

        let client_config = config.to_client_config().unwrap();
        assert_eq!(client_config.max_attempts, 4);
        assert_eq!(client_config.scope.as_deref(), Some("profile email"));
        assert_eq!(client_config.expiry_leeway, Duration::from_secs(30));
    }

    #[test]
    fn resolve_path_prefers_cli_arg() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("IDPORT_CONFIG") };

        assert_eq!(
            Config::resolve_path(Some("/tmp/custom.toml")),
            PathBuf::from("/tmp/custom.toml")
        );
        assert_eq!(Config::resolve_path(None), PathBuf::from("idport.toml"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("idport.toml");
        std::fs::write(
            &path,
            r#"
[provider]
server_url = "https://id.example.com"
client_id = "client-1"
app_scheme = "exampleapp"

[client]
timeout_secs = 0
"#,
        )
        .unwrap();
        assert!(Config::load(&path).is_err());
    }
}
