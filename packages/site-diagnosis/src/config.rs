use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::analyzer::DEFAULT_NEIGHBORS;
use crate::diagnosis::DEFAULT_MAX_EXTRACTION_ATTEMPTS;
use crate::error::{DiagnosisError, Result};
use crate::fetch::DEFAULT_TIMEOUT;
use crate::invoker::DEFAULT_MAX_SHRINK_ATTEMPTS;
use crate::models::{ModelKind, ModelRegistry, CHAT_MODEL_ID, DEFAULT_MODEL_TIMEOUT, EMBEDDING_MODEL_ID};

/// Pipeline configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub max_shrink_attempts: usize,
    pub max_extraction_attempts: usize,
    pub fetch_timeout: Duration,
    pub model_timeout: Duration,
    pub neighbors: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let chat_model = lookup("SITE_DIAGNOSIS_CHAT_MODEL").unwrap_or_else(|| CHAT_MODEL_ID.to_string());
        let embedding_model =
            lookup("SITE_DIAGNOSIS_EMBEDDING_MODEL").unwrap_or_else(|| EMBEDDING_MODEL_ID.to_string());

        ModelRegistry::get_kind(&chat_model, ModelKind::Chat)?;
        ModelRegistry::get_kind(&embedding_model, ModelKind::Embedding)?;

        Ok(Self {
            openai_api_key: lookup("OPENAI_API_KEY")
                .filter(|key| !key.is_empty())
                .ok_or_else(|| DiagnosisError::Config("OPENAI_API_KEY must be set".into()))?,
            openai_base_url: lookup("OPENAI_BASE_URL").filter(|url| !url.is_empty()),
            chat_model,
            embedding_model,
            max_shrink_attempts: parse_or(
                &lookup,
                "SITE_DIAGNOSIS_MAX_SHRINK_ATTEMPTS",
                DEFAULT_MAX_SHRINK_ATTEMPTS,
            )?,
            max_extraction_attempts: parse_or(
                &lookup,
                "SITE_DIAGNOSIS_MAX_EXTRACTION_ATTEMPTS",
                DEFAULT_MAX_EXTRACTION_ATTEMPTS,
            )?,
            fetch_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SITE_DIAGNOSIS_FETCH_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )?),
            model_timeout: Duration::from_secs(parse_or(
                &lookup,
                "SITE_DIAGNOSIS_MODEL_TIMEOUT_SECS",
                DEFAULT_MODEL_TIMEOUT.as_secs(),
            )?),
            neighbors: parse_or(&lookup, "SITE_DIAGNOSIS_NEIGHBORS", DEFAULT_NEIGHBORS)?,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DiagnosisError::Config(format!("{} must be a valid number, got {:?}", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("OPENAI_API_KEY", "sk-test")]).unwrap();

        assert_eq!(config.chat_model, "gpt-3.5-turbo");
        assert_eq!(config.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.max_shrink_attempts, 40);
        assert_eq!(config.max_extraction_attempts, 5);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.model_timeout, Duration::from_secs(120));
        assert_eq!(config.neighbors, 3);
        assert!(config.openai_base_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SITE_DIAGNOSIS_CHAT_MODEL", "gpt-4o-mini"),
            ("SITE_DIAGNOSIS_NEIGHBORS", " 5 "),
            ("SITE_DIAGNOSIS_FETCH_TIMEOUT_SECS", "10"),
            ("SITE_DIAGNOSIS_MODEL_TIMEOUT_SECS", "45"),
        ])
        .unwrap();

        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.neighbors, 5);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.model_timeout, Duration::from_secs(45));
    }

    #[test]
    fn test_missing_key() {
        assert!(matches!(config(&[]), Err(DiagnosisError::Config(_))));
        assert!(matches!(
            config(&[("OPENAI_API_KEY", "")]),
            Err(DiagnosisError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("OPENAI_API_KEY", "k"), ("SITE_DIAGNOSIS_NEIGHBORS", "three")]),
            Err(DiagnosisError::Config(_))
        ));
        assert!(matches!(
            config(&[("OPENAI_API_KEY", "k"), ("SITE_DIAGNOSIS_CHAT_MODEL", "gpt-9")]),
            Err(DiagnosisError::UnknownModel { .. })
        ));
        assert!(matches!(
            config(&[
                ("OPENAI_API_KEY", "k"),
                ("SITE_DIAGNOSIS_EMBEDDING_MODEL", "gpt-4o-mini")
            ]),
            Err(DiagnosisError::ModelKindMismatch { .. })
        ));
    }
}
