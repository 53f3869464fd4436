use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub log_level: String,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub spool_path: PathBuf,
    pub fetch_concurrency: usize,
    pub request_timeout_secs: u64,
    pub debug_console: bool,
}

#[derive(Debug, Default)]
pub struct AppConfigOverrides {
    pub log_level: Option<String>,
    pub base_url: Option<String>,
    pub spool_path: Option<PathBuf>,
    pub fetch_concurrency: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub debug_console: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".arda")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl AppConfig {
    /// Read the config file (missing is fine) and `ARDA_*` environment variables.
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(default_config_path);
        let cfg = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("ARDA"))
            .build()
            .unwrap_or_default();

        let log_level = cfg
            .get_string("log_level")
            .unwrap_or_else(|_| "info".to_string());
        let base_url = cfg
            .get_string("base_url")
            .unwrap_or_else(|_| api_client::DEFAULT_BASE_URL.to_string());
        let data_dir = cfg
            .get_string("data_dir")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        let spool_path = cfg
            .get_string("spool_path")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("spool"));
        let fetch_concurrency = cfg
            .get_int("fetch_concurrency")
            .map(|n| n.max(1) as usize)
            .unwrap_or(linking::DEFAULT_CONCURRENCY);
        let request_timeout_secs = cfg
            .get_int("request_timeout_secs")
            .map(|n| n.max(1) as u64)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let debug_console = cfg.get_bool("debug_console").unwrap_or(false);

        Self {
            log_level,
            base_url,
            data_dir,
            spool_path,
            fetch_concurrency,
            request_timeout_secs,
            debug_console,
        }
    }

    pub fn apply_overrides(mut self, ov: &AppConfigOverrides) -> Self {
        if let Some(l) = &ov.log_level {
            self.log_level = l.clone();
        }
        if let Some(u) = &ov.base_url {
            self.base_url = u.clone();
        }
        if let Some(p) = &ov.spool_path {
            self.spool_path = p.clone();
        }
        if let Some(c) = ov.fetch_concurrency {
            self.fetch_concurrency = c.max(1);
        }
        if let Some(t) = ov.request_timeout_secs {
            self.request_timeout_secs = t.max(1);
        }
        if ov.debug_console {
            self.debug_console = true;
        }
        self
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }

    pub fn save_to(&self, path: Option<PathBuf>) -> std::io::Result<()> {
        let path = path.unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, data)
    }
}
