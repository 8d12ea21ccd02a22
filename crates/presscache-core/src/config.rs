//! Application configuration management.
//!
//! Configuration is read from a YAML file (`./config.yaml`, or
//! `~/.config/presscache/config.yaml` when no local file exists) and can be
//! overridden with `PRESSCACHE_*` environment variables, nested with `__`
//! (e.g. `PRESSCACHE_CACHE__MAX_ENTRIES=500`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::auth::{Credential, CredentialStore, SessionOptions};
use crate::cache::CachePolicy;

/// Application name used for config directory paths
const APP_NAME: &str = "presscache";

/// Config file name
const CONFIG_FILE: &str = "config.yaml";

/// Prefix for environment overrides
const ENV_PREFIX: &str = "PRESSCACHE";

/// Path prefixes of the remote API, relative to `apihost`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Prefix of the token endpoints (`{auth}/token`, `{auth}/token/validate`).
    pub auth: String,
    /// Prefix of the content endpoint (`{content}/{type}/{id}`).
    pub content: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth: "auth".to_string(),
            content: "content".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    /// Request timeout for every upstream call.
    pub timeout_secs: u64,
    /// How many times a 429 answer is retried before giving up.
    pub rate_limit_retries: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            rate_limit_retries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the remote API.
    #[serde(alias = "apihost")]
    pub api_host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub pass: Option<String>,
    /// Pre-provisioned token, as printed by `presscache token`.
    #[serde(default, alias = "authKey", alias = "authkey")]
    pub auth_key: Option<String>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpOptions,
    #[serde(default)]
    pub session: SessionOptions,
    #[serde(default)]
    pub cache: CachePolicy,
    /// Directory for daily rolling log files; stderr only when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_path()).required(required))
            .add_source(
                ::config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(self.api_host.starts_with("http://") || self.api_host.starts_with("https://")) {
            bail!("apihost must be an http(s) URL, got {:?}", self.api_host);
        }
        if self.cache.max_entries == Some(0) {
            bail!("cache.max_entries must be at least 1 when set");
        }
        Ok(())
    }

    /// `./config.yaml` if present, otherwise the per-user config directory.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
            .unwrap_or(local)
    }

    /// Resolve the login credential, falling back to the OS keychain when
    /// the config has a user but no password.
    pub fn credential(&self) -> Result<Credential> {
        let username = self
            .user
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("config is missing `user`"))?;

        let password = match self.pass.clone() {
            Some(pass) => pass,
            None => CredentialStore::get_password(&username).with_context(|| {
                format!("no `pass` configured and no keychain entry for {}", username)
            })?,
        };

        Ok(Credential::new(username, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_original_keys() {
        let file = write_config(
            "apihost: https://blog.example.org\nuser: editor\npass: hunter2\nauthKey: abc.def\n",
        );
        let config = Config::load_with_prefix(Some(file.path()), "PRESSCACHE_TEST_ORIGINAL").unwrap();

        assert_eq!(config.api_host, "https://blog.example.org");
        assert_eq!(config.auth_key.as_deref(), Some("abc.def"));
        assert_eq!(config.endpoints, Endpoints::default());
        assert_eq!(config.http, HttpOptions::default());
        assert_eq!(config.cache.max_entries, None);

        let cred = config.credential().unwrap();
        assert_eq!(cred, Credential::new("editor", "hunter2"));
    }

    #[test]
    fn test_load_nested_sections() {
        let file = write_config(
            r#"
apihost: https://blog.example.org
user: editor
pass: hunter2
endpoints:
  auth: wp-json/jwt-auth/v1
  content: wp-json/wp/v2
server:
  bind: 0.0.0.0:8080
session:
  reopen_cooldown_secs: 5
cache:
  max_entries: 100
"#,
        );
        let config = Config::load_with_prefix(Some(file.path()), "PRESSCACHE_TEST_NESTED").unwrap();

        assert_eq!(config.endpoints.auth, "wp-json/jwt-auth/v1");
        assert_eq!(config.endpoints.content, "wp-json/wp/v2");
        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.session.reopen_cooldown_secs, 5);
        assert_eq!(config.cache.max_entries, Some(100));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("apihost: https://blog.example.org\nuser: editor\npass: hunter2\n");
        std::env::set_var("PRESSCACHE_TEST_ENV_CACHE__MAX_ENTRIES", "7");
        let config = Config::load_with_prefix(Some(file.path()), "PRESSCACHE_TEST_ENV").unwrap();
        std::env::remove_var("PRESSCACHE_TEST_ENV_CACHE__MAX_ENTRIES");

        assert_eq!(config.cache.max_entries, Some(7));
    }

    #[test]
    fn test_rejects_non_http_host() {
        let file = write_config("apihost: blog.example.org\n");
        let err = Config::load_with_prefix(Some(file.path()), "PRESSCACHE_TEST_HOST").unwrap_err();
        assert!(err.to_string().contains("apihost"));
    }

    #[test]
    fn test_rejects_zero_max_entries() {
        let file = write_config("apihost: https://blog.example.org\ncache:\n  max_entries: 0\n");
        assert!(Config::load_with_prefix(Some(file.path()), "PRESSCACHE_TEST_ZERO").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = Path::new("/nonexistent/presscache/config.yaml");
        assert!(Config::load_with_prefix(Some(missing), "PRESSCACHE_TEST_MISSING").is_err());
    }

    #[test]
    fn test_credential_requires_user() {
        let file = write_config("apihost: https://blog.example.org\npass: hunter2\n");
        let config = Config::load_with_prefix(Some(file.path()), "PRESSCACHE_TEST_NOUSER").unwrap();
        assert!(config.credential().is_err());
    }
}
