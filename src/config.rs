//! # Configuration Management
//!
//! This module handles loading application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! Configuration is read once at startup and never mutated afterwards. Handlers
//! receive a clone through `AppState`.
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER__HOST, APP_SERVER__PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// ## Sections:
/// - `server`: where the HTTP listener binds
/// - `uploads`: where job files live and how large an upload may be
/// - `transcoder`: which ffmpeg binary to run and for how long
/// - `performance`: load-reporting thresholds for the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub uploads: UploadsConfig,
    pub transcoder: TranscoderConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,  // u16 = unsigned 16-bit integer (0-65535), perfect for port numbers
}

/// Upload handling settings.
///
/// ## Fields:
/// - `dir`: directory for in-flight input/output files (created at startup)
/// - `max_upload_bytes`: uploads larger than this are rejected with 413
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// External transcoder settings.
///
/// ## Fields:
/// - `ffmpeg_path`: binary name (looked up on PATH) or absolute path
/// - `timeout_secs`: a transcode running longer than this is killed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    pub ffmpeg_path: PathBuf,
    pub timeout_secs: u64,
}

/// Load-reporting thresholds.
///
/// `max_concurrent_jobs` does not limit anything; the health endpoint compares
/// the number of active jobs against it to report load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_jobs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 3000,
            },
            uploads: UploadsConfig {
                dir: PathBuf::from("uploads"),
                max_upload_bytes: 100 * 1024 * 1024,  // 100 MB
            },
            transcoder: TranscoderConfig {
                ffmpeg_path: PathBuf::from("ffmpeg"),
                timeout_secs: 300,
            },
            performance: PerformanceConfig {
                max_concurrent_jobs: 4,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=8080`: Override server port
    /// - `APP_UPLOADS__DIR=/tmp/bpm`: Override the upload directory
    /// - `APP_TRANSCODER__FFMPEG_PATH=/usr/local/bin/ffmpeg`: Use a specific ffmpeg
    /// - `HOST=0.0.0.0` / `PORT=8080`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // APP_SERVER__HOST becomes server.host; nesting uses a double
            // underscore because field names like max_upload_bytes contain single ones
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - Upload directory and ffmpeg path are not empty
    /// - Upload limit and transcoder timeout are greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.uploads.dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Upload directory cannot be empty"));
        }

        if self.uploads.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.transcoder.ffmpeg_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("ffmpeg path cannot be empty"));
        }

        if self.transcoder.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Transcoder timeout must be greater than 0"));
        }

        if self.performance.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!("Max concurrent jobs must be greater than 0"));
        }

        Ok(())  // All validation passed
    }

    pub fn transcoder_timeout(&self) -> Duration {
        Duration::from_secs(self.transcoder.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;  // Import everything from the parent module

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.uploads.dir, PathBuf::from("uploads"));
        assert_eq!(config.transcoder_timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.uploads.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transcoder.ffmpeg_path = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.transcoder.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    /// Defaults survive a round trip through the config crate unchanged.
    #[test]
    fn test_defaults_through_config_builder() {
        let built: AppConfig = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default()).unwrap())
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(built.server.port, 3000);
        assert_eq!(built.uploads.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(built.transcoder.ffmpeg_path, PathBuf::from("ffmpeg"));
    }
}
