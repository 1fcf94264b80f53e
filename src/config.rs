use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Application configuration, read from TOML and overridden by the environment
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the collection files; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Some(PathBuf::from("data")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret used to verify bearer tokens
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `$APP_CONFIG` (or `config.toml`), then apply `PORT`, `DATA_DIR`, `JWT_SECRET`
    pub fn load() -> Result<Self> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Missing file means defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("PORT") {
            self.server.port = port.parse().with_context(|| format!("invalid PORT {port:?}"))?;
        }
        if let Some(dir) = var("DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(secret) = var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9090

            [auth]
            jwt_secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("data")));
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> =
            HashMap::from([("PORT", "3000"), ("DATA_DIR", "/tmp/films"), ("JWT_SECRET", "env")]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/films")));
        assert_eq!(config.auth.jwt_secret, "env");
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(|k| (k == "PORT").then(|| "http".to_string())).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::from_file(Path::new("/nonexistent/movie-review-api.toml")).unwrap();
        assert_eq!(config.server.port, 8000);
    }
}
