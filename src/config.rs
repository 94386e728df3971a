use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Upper bound on `max_connections`.
pub const MAX_CONNECTIONS_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// First port tried; 0 lets the OS pick
    pub port: u16,
    /// How many consecutive ports to try when `port` is taken
    pub port_scan_window: u16,
    pub max_connections: usize,
    /// Idle read deadline, in seconds
    pub read_timeout: u64,
    pub document_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10000,
            port_scan_window: 100,
            max_connections: 100,
            read_timeout: 5,
            document_root: PathBuf::from("resources"),
        }
    }
}

impl ServerConfig {
    /// Reads the YAML file at `path` if given, applies `WHARF_*`
    /// environment overrides, then validates.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Some(port) = env_parse("WHARF_PORT")? {
            self.port = port;
        }
        if let Some(max) = env_parse("WHARF_MAX_CONNECTIONS")? {
            self.max_connections = max;
        }
        if let Some(secs) = env_parse("WHARF_READ_TIMEOUT")? {
            self.read_timeout = secs;
        }
        if let Ok(root) = std::env::var("WHARF_DOC_ROOT") {
            self.document_root = PathBuf::from(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port_scan_window == 0 {
            anyhow::bail!("port_scan_window must be at least 1");
        }
        if self.max_connections == 0 || self.max_connections > MAX_CONNECTIONS_LIMIT {
            anyhow::bail!(
                "max_connections must be between 1 and {}, got {}",
                MAX_CONNECTIONS_LIMIT,
                self.max_connections
            );
        }
        if self.read_timeout == 0 {
            anyhow::bail!("read_timeout must be at least 1 second");
        }
        Ok(())
    }
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        Err(_) => Ok(None),
    }
}
