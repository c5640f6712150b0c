use anyhow::{Context, Result};
use hbup_server::ServerOptions;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "hbup.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Connections served at once.
    pub max_connections: usize,
    /// When set, every connection writes a JSONL exchange log here.
    pub exchange_log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 7373)),
            max_connections: 64,
            exchange_log_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load the configuration from `path`, or from [`DEFAULT_CONFIG_PATH`].
    ///
    /// The default file is optional and a broken one falls back to defaults
    /// with a warning. An explicitly requested file must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_strict(path),
            None => Ok(Self::load_lenient(Path::new(DEFAULT_CONFIG_PATH))),
        }
    }

    fn load_strict(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    fn load_lenient(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ServerConfig::default(),
            Err(err) => {
                warn!("Failed to read {}: {err}. Using defaults", path.display());
                ServerConfig::default()
            }
        }
    }

    /// Listener options derived from this configuration.
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            max_connections: self.max_connections,
            exchange_log_dir: self.exchange_log_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: ServerConfig = toml::from_str("max_connections = 4").unwrap();
        assert_eq!(cfg.max_connections, 4);
        assert_eq!(cfg.bind_addr, ServerConfig::default().bind_addr);
        assert_eq!(cfg.exchange_log_dir, None);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn explicit_path_must_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "bind_addr = 12").unwrap();
        assert!(ServerConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn lenient_load_falls_back_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hbup.toml");
        fs::write(&path, "this is not toml = =").unwrap();
        assert_eq!(ServerConfig::load_lenient(&path), ServerConfig::default());
    }

    #[test]
    fn full_file_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hbup.toml");
        let cfg = ServerConfig {
            bind_addr: "0.0.0.0:9000".parse().unwrap(),
            max_connections: 2,
            exchange_log_dir: Some(PathBuf::from("logs/exchanges")),
        };
        fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();
        assert_eq!(ServerConfig::load(Some(&path)).unwrap(), cfg);
        assert_eq!(cfg.server_options().max_connections, 2);
    }
}
