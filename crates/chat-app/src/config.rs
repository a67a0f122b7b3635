use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use learnovate_i18n::{DEFAULT_LANGUAGE, Language};
use learnovate_llm::ClientConfig;
use learnovate_storage::FileStore;
use learnovate_support::{
    DEFAULT_HIDDEN_ROUTES, DEFAULT_HISTORY_LIMIT, DEFAULT_HISTORY_MAX_CHARS, SessionConfig,
};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{AppResult, ExtractConfigSnafu};

pub const CONFIG_DIRECTORY_NAME: &str = "learnovate";
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "LEARNOVATE_CONFIG";
pub const ENV_PREFIX: &str = "LEARNOVATE_";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EXTERNAL_SYNC_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Bearer token for the chat endpoint; empty sends none.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_history_max_chars")]
    pub history_max_chars: usize,
    #[serde(default)]
    pub default_language: Language,
    /// Preference storage file; the platform data directory when unset.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// Directory of `<code>.json` dictionaries merged over the built-in strings.
    #[serde(default)]
    pub translations_dir: Option<PathBuf>,
    #[serde(default = "default_external_sync_interval_ms")]
    pub external_sync_interval_ms: u64,
    #[serde(default = "default_hidden_routes")]
    pub hidden_routes: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            history_limit: default_history_limit(),
            history_max_chars: default_history_max_chars(),
            default_language: DEFAULT_LANGUAGE,
            storage_path: None,
            translations_dir: None,
            external_sync_interval_ms: default_external_sync_interval_ms(),
            hidden_routes: default_hidden_routes(),
        }
    }
}

impl AppConfig {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(CONFIG_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".learnovate"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(CONFIG_FILE_NAME)
    }

    /// `LEARNOVATE_CONFIG` when set and non-blank, else the default path.
    pub fn config_path_from_env() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path)
    }

    /// Defaults, then the JSON file if present, then `LEARNOVATE_*` variables.
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults and environment");
        }

        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]));

        let config = figment
            .extract::<Self>()
            .map_err(Box::new)
            .context(ExtractConfigSnafu {
                stage: "extract-app-config",
                path: path.to_path_buf(),
            })?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        self.api_base_url = if self.api_base_url.trim().is_empty() {
            default_api_base_url()
        } else {
            self.api_base_url.trim().to_string()
        };
        self.auth_token = self.auth_token.trim().to_string();
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = default_connect_timeout_secs();
        }
        if self.history_limit == 0 {
            self.history_limit = default_history_limit();
        }
        if self.history_max_chars == 0 {
            self.history_max_chars = default_history_max_chars();
        }
        if self.external_sync_interval_ms == 0 {
            self.external_sync_interval_ms = default_external_sync_interval_ms();
        }
        self.storage_path = self.storage_path.filter(|path| !path.as_os_str().is_empty());
        self.translations_dir = self
            .translations_dir
            .filter(|path| !path.as_os_str().is_empty());

        // Blank rows would hide nothing; keep the list meaningful.
        self.hidden_routes = self
            .hidden_routes
            .into_iter()
            .map(|route| route.trim().to_string())
            .filter(|route| !route.is_empty())
            .collect();

        self
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(FileStore::default_path)
    }

    pub fn external_sync_interval(&self) -> Duration {
        Duration::from_millis(self.external_sync_interval_ms)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.api_base_url)
            .with_auth_token(&self.auth_token)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            history_limit: self.history_limit,
            history_max_chars: self.history_max_chars,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            hidden_routes: self.hidden_routes.clone(),
            ..SessionConfig::default()
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_history_max_chars() -> usize {
    DEFAULT_HISTORY_MAX_CHARS
}

fn default_external_sync_interval_ms() -> u64 {
    DEFAULT_EXTERNAL_SYNC_INTERVAL_MS
}

fn default_hidden_routes() -> Vec<String> {
    DEFAULT_HIDDEN_ROUTES
        .iter()
        .map(|route| route.to_string())
        .collect()
}
