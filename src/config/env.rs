use super::ServerConfig;
use super::merge::merge_config;
use super::validation::validate_config;

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads configuration from environment variables, with sensible defaults.
    /// Also loads from .env file if present using dotenvy.
    ///
    /// # Returns
    /// * `Result<Self, Box<dyn std::error::Error>>` - The loaded configuration or an error
    ///
    /// # Errors
    /// Returns an error if:
    /// - Environment variables are malformed
    /// - Authentication configuration is invalid
    /// - Queue capacities or collaborator URLs are invalid
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = merge_config(None)?;
        validate_config(&config)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("HOST");
            env::remove_var("PORT");
            env::remove_var("AUTH_REQUIRED");
            env::remove_var("AUTH_TOKENS");
            env::remove_var("LLM_URL");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("HOST", "127.0.0.1");
            env::set_var("PORT", "8765");
            env::set_var("LLM_URL", "http://llm.internal:9000/llm");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.address(), "127.0.0.1:8765");
        assert_eq!(config.llm.url, "http://llm.internal:9000/llm");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_auth_required_without_tokens_fails() {
        cleanup_env_vars();
        unsafe {
            env::set_var("AUTH_REQUIRED", "true");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_auth_required_with_tokens() {
        cleanup_env_vars();
        unsafe {
            env::set_var("AUTH_REQUIRED", "yes");
            env::set_var("AUTH_TOKENS", "desk:s3cret");
        }

        let config = ServerConfig::from_env().unwrap();
        assert!(config.auth.required);
        assert_eq!(config.auth.tokens[0].name, "desk");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_non_http_collaborator() {
        cleanup_env_vars();
        unsafe {
            env::set_var("LLM_URL", "ftp://llm");
        }

        assert!(ServerConfig::from_env().is_err());

        cleanup_env_vars();
    }
}
