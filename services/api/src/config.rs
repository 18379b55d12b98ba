//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. A blank value counts as missing.

use feedback_core::{ChainOrder, GenerationConfig, KeySuffix, Provenance};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    pub project_id: String,
    pub location: String,
    pub tuned_model_name: String,
    pub fallback_model: String,
    pub raw_bucket_name: String,
    pub raw_prefix: String,
    pub storage_base_url: String,
    pub access_token: String,
    pub chain_order: ChainOrder,
    pub generation: GenerationConfig,
    pub provenance: Provenance,
    pub key_suffix: KeySuffix,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        // --- Server Settings ---
        let bind_address = vars.parsed("BIND_ADDRESS", "0.0.0.0:3000")?;
        let log_level = vars.parsed("RUST_LOG", "INFO")?;
        let cors_origin = vars.or("CORS_ORIGIN", "http://localhost:3000");

        // --- Model Host ---
        let project_id = vars.required("PROJECT_ID")?;
        let location = vars.or("LOCATION", "us-central1");
        let tuned_model_name = vars.required("TUNED_MODEL_NAME")?;
        let fallback_model = vars.or("FALLBACK_MODEL", "gemini-1.5-pro-002");

        // --- Object Storage ---
        let raw_bucket_name = vars.required("RAW_BUCKET_NAME")?;
        let raw_prefix = vars
            .or("RAW_PREFIX", "raw_submissions")
            .trim_matches('/')
            .to_string();
        let storage_base_url = vars.or("STORAGE_BASE_URL", "https://storage.googleapis.com");

        // --- Credentials ---
        let access_token = vars.required("GCP_ACCESS_TOKEN")?;

        // --- Generation Behaviour ---
        let chain_order = vars.parsed("GENERATION_CHAIN", "streaming_first")?;
        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            max_output_tokens: vars.parsed("MAX_OUTPUT_TOKENS", &defaults.max_output_tokens.to_string())?,
            temperature: vars.parsed("TEMPERATURE", &defaults.temperature.to_string())?,
            top_p: vars.parsed("TOP_P", &defaults.top_p.to_string())?,
            top_k: vars.optional_parsed("TOP_K")?,
            response_mime_type: vars.get("RESPONSE_MIME_TYPE"),
        };

        // --- Record Metadata ---
        let provenance_field = vars.or("PROVENANCE_FIELD", "source_app");
        let provenance = Provenance::from_field(&provenance_field, vars.or("SOURCE_TAG", "public"))
            .map_err(|e| ConfigError::InvalidValue("PROVENANCE_FIELD".to_string(), e))?;
        let key_suffix = vars.parsed("KEY_SUFFIX", "random_hex")?;

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            project_id,
            location,
            tuned_model_name,
            fallback_model,
            raw_bucket_name,
            raw_prefix,
            storage_base_url,
            access_token,
            chain_order,
            generation,
            provenance,
            key_suffix,
        })
    }

    /// Where raw submissions land, e.g. `gs://feedback-raw/raw_submissions`.
    pub fn raw_location(&self) -> String {
        format!("gs://{}/{}", self.raw_bucket_name, self.raw_prefix)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::MissingVar(name.to_string()))
    }

    fn or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.or(name, default);
        raw.parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
    }

    fn optional_parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| {
                    ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn minimal_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("PROJECT_ID", "feedback-ai-prototype"),
            ("TUNED_MODEL_NAME", "projects/feedback-ai-prototype/locations/us-central1/endpoints/42"),
            ("RAW_BUCKET_NAME", "feedback-proto-ai-raw"),
            ("GCP_ACCESS_TOKEN", "ya29.test-token"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_fill_optional_values() {
        let config = load(&minimal_env()).unwrap();

        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.location, "us-central1");
        assert_eq!(config.fallback_model, "gemini-1.5-pro-002");
        assert_eq!(config.raw_prefix, "raw_submissions");
        assert_eq!(config.chain_order, ChainOrder::StreamingFirst);
        assert_eq!(config.generation, GenerationConfig::default());
        assert_eq!(config.provenance, Provenance::SourceApp("public".to_string()));
        assert_eq!(config.key_suffix, KeySuffix::RandomHex);
        assert_eq!(config.raw_location(), "gs://feedback-proto-ai-raw/raw_submissions");
    }

    #[test]
    fn each_required_value_is_enforced() {
        for name in ["PROJECT_ID", "TUNED_MODEL_NAME", "RAW_BUCKET_NAME", "GCP_ACCESS_TOKEN"] {
            let mut env = minimal_env();
            env.remove(name);
            match load(&env) {
                Err(ConfigError::MissingVar(missing)) => assert_eq!(missing, name),
                other => panic!("expected {} to be required, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut env = minimal_env();
        env.insert("RAW_BUCKET_NAME", "   ");
        assert!(matches!(load(&env), Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = minimal_env();
        env.insert("RAW_PREFIX", "/custom/raw/");
        env.insert("GENERATION_CHAIN", "sync_first");
        env.insert("MAX_OUTPUT_TOKENS", "4096");
        env.insert("TOP_K", "40");
        env.insert("RESPONSE_MIME_TYPE", "text/plain");
        env.insert("PROVENANCE_FIELD", "submitted_by");
        env.insert("KEY_SUFFIX", "timestamp_random");

        let config = load(&env).unwrap();

        assert_eq!(config.raw_prefix, "custom/raw");
        assert_eq!(config.chain_order, ChainOrder::SyncFirst);
        assert_eq!(config.generation.max_output_tokens, 4096);
        assert_eq!(config.generation.top_k, Some(40));
        assert_eq!(config.generation.response_mime_type.as_deref(), Some("text/plain"));
        assert_eq!(config.provenance, Provenance::SubmittedBy("public".to_string()));
        assert_eq!(config.key_suffix, KeySuffix::TimestampRandom);
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut env = minimal_env();
        env.insert("TEMPERATURE", "warm");
        match load(&env) {
            Err(ConfigError::InvalidValue(name, _)) => assert_eq!(name, "TEMPERATURE"),
            other => panic!("expected an invalid value, got {:?}", other),
        }
    }
}
