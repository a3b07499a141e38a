//! Configuration module for the voxgate server
//!
//! This module handles server configuration from various sources: YAML files and
//! environment variables. Environment variables always override YAML values.
//! The configuration is split into logical submodules for maintainability.
//!
//! # Modules
//! - `sections`: typed configuration sections and their defaults
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voxgate::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod sections;
mod utils;
mod validation;
mod yaml;

pub use sections::{
    AsrConfig, AudioConfig, AuthConfig, AuthToken, InferenceConfig, LlmConfig, LogConfig,
    SessionConfig, TtsConfig, VadConfig,
};

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port)
/// - Audio parameters negotiated with devices
/// - Session limits (idle timeout, queue capacities)
/// - Collaborator endpoints (VAD, ASR, LLM, TTS)
/// - Device authentication
/// - Readiness probing and logging
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub audio: AudioConfig,
    pub session: SessionConfig,
    pub vad: VadConfig,
    pub asr: AsrConfig,
    pub llm: LlmConfig,
    pub tts: TtsConfig,
    pub auth: AuthConfig,
    pub inference: InferenceConfig,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            audio: AudioConfig::default(),
            session: SessionConfig::default(),
            vad: VadConfig::default(),
            asr: AsrConfig::default(),
            llm: LlmConfig::default(),
            tts: TtsConfig::default(),
            auth: AuthConfig::default(),
            inference: InferenceConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables
    /// 2. YAML file values
    /// 3. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // The .env file is not consulted here: the YAML file is the source of
        // truth and only real environment variables override it.
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;

        validation::validate_config(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
