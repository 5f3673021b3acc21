//! Application configuration. Load from TOML or env.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global application configuration (gateway + collaborators).
/// Precedence: env `BOTAN_CONFIG` path > `config/gateway.toml` > defaults,
/// with `BOTAN__`-prefixed environment overrides on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown on the banner endpoint.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Ollama-compatible generation endpoint base URL.
    pub ollama_host: String,
    /// Conversation model name.
    pub model: String,
    /// Lightweight model used by the reflect/reason stages.
    pub analysis_model: String,
    /// Whether the reflect/reason stage runs when a request does not say.
    #[serde(default)]
    pub enable_reflection: bool,
    /// Bounded timeout (seconds) for any single collaborator call.
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    /// Synthesis collaborator base URL (voice service).
    pub voice_service_url: String,
    /// Directory for best-effort persisted session records.
    pub session_dir: String,
}

fn default_generation_timeout() -> u64 {
    30
}

impl CoreConfig {
    /// Load config from file and environment.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("BOTAN_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Botan AI Gateway")?
            .set_default("port", 8000_i64)?
            .set_default("ollama_host", "http://localhost:11434")?
            .set_default("model", "elyza:botan_custom")?
            .set_default("analysis_model", "qwen2.5:3b")?
            .set_default("enable_reflection", false)?
            .set_default("generation_timeout_secs", 30_i64)?
            .set_default("voice_service_url", "http://localhost:8002")?
            .set_default("session_dir", "./data/sessions")?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("BOTAN").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Botan AI Gateway".to_string(),
            port: 8000,
            ollama_host: "http://localhost:11434".to_string(),
            model: "elyza:botan_custom".to_string(),
            analysis_model: "qwen2.5:3b".to_string(),
            enable_reflection: false,
            generation_timeout_secs: 30,
            voice_service_url: "http://localhost:8002".to_string(),
            session_dir: "./data/sessions".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.generation_timeout_secs, 30);
        assert!(!cfg.enable_reflection);
    }
}
