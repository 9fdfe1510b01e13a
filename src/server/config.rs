//! Server configuration

use std::net::SocketAddr;

use crate::env::env_override;
use crate::error::ConfigError;

/// Default mount point for stream routes
pub const DEFAULT_BASE_PATH: &str = "/live";

/// Server configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path prefix; streams are served at `<base_path>/<channel>`
    pub base_path: String,

    /// Maximum concurrent streams (0 = unlimited)
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            base_path: DEFAULT_BASE_PATH.to_string(),
            max_connections: 0, // Unlimited
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Build from defaults overridden by environment variables
    ///
    /// - `LIVESYNC_BIND_ADDR` (default 0.0.0.0:8080)
    /// - `LIVESYNC_BASE_PATH` (default /live)
    /// - `LIVESYNC_MAX_CONNECTIONS` (default 0, unlimited)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = env_override::<SocketAddr>("LIVESYNC_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(path) = env_override::<String>("LIVESYNC_BASE_PATH")? {
            config.base_path = path;
        }
        if let Some(max) = env_override::<usize>("LIVESYNC_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the base path
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    /// Set maximum concurrent streams
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Check the base path is `/segment[/segment...]`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = &self.base_path;
        let valid = path.len() > 1
            && path.starts_with('/')
            && !path.ends_with('/')
            && !path.contains("//")
            && !path.contains(':')
            && !path.contains('*');

        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidBasePath(path.clone()))
        }
    }

    /// Route pattern for stream requests
    pub(crate) fn route(&self) -> String {
        format!("{}/:channel", self.base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.base_path, "/live");
        assert_eq!(config.max_connections, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.route(), "/live/:channel");
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8081);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .base_path("/api/events")
            .max_connections(50);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.base_path, "/api/events");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.route(), "/api/events/:channel");
    }

    #[test]
    fn test_invalid_base_paths() {
        for path in ["", "/", "live", "/live/", "//live", "/live/:x", "/*rest"] {
            let config = ServerConfig::default().base_path(path);
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidBasePath(path.to_string())),
                "{path:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_from_env() {
        // The only test that sets these variables
        std::env::set_var("LIVESYNC_BIND_ADDR", "127.0.0.1:7000");
        std::env::set_var("LIVESYNC_BASE_PATH", "/sse");
        std::env::set_var("LIVESYNC_MAX_CONNECTIONS", "10");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.base_path, "/sse");
        assert_eq!(config.max_connections, 10);

        std::env::set_var("LIVESYNC_BASE_PATH", "sse/");
        assert_eq!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidBasePath("sse/".into()))
        );

        std::env::remove_var("LIVESYNC_BIND_ADDR");
        std::env::remove_var("LIVESYNC_BASE_PATH");
        std::env::remove_var("LIVESYNC_MAX_CONNECTIONS");
    }
}
