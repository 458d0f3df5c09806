use std::env;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::LlmConfigError;

/// Connection and sampling settings for the chat completion endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct LlmConfig {
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl LlmConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";
    pub const DEFAULT_TEMPERATURE: f32 = 0.5;
    pub const DEFAULT_MAX_TOKENS: u32 = 1000;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read the configuration from `TUTOR_*` environment variables.
    ///
    /// Returns `Ok(None)` when no API key is set.
    ///
    /// # Errors
    ///
    /// Returns `LlmConfigError` if the base URL or a numeric setting cannot be parsed.
    pub fn from_env() -> Result<Option<Self>, LlmConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// Returns `LlmConfigError` if the base URL or a numeric setting cannot be parsed.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, LlmConfigError> {
        let Some(api_key) = lookup("TUTOR_API_KEY").filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let raw_url = lookup("TUTOR_BASE_URL").unwrap_or_else(|| Self::DEFAULT_BASE_URL.into());
        let base_url = Url::parse(&raw_url).map_err(|source| LlmConfigError::InvalidBaseUrl {
            value: raw_url.clone(),
            source,
        })?;
        let model = lookup("TUTOR_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.into());

        Ok(Some(Self {
            base_url,
            api_key: api_key.trim().to_owned(),
            model,
            temperature: parse_var(&lookup, "TUTOR_TEMPERATURE", Self::DEFAULT_TEMPERATURE)?,
            max_tokens: parse_var(&lookup, "TUTOR_MAX_TOKENS", Self::DEFAULT_MAX_TOKENS)?,
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "TUTOR_TIMEOUT_SECS",
                Self::DEFAULT_TIMEOUT_SECS,
            )?),
        }))
    }

    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.base_url.as_str().trim_end_matches('/')
        )
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, LlmConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| LlmConfigError::InvalidNumber { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_or_blank_key_disables() {
        assert!(LlmConfig::from_lookup(lookup(&[])).unwrap().is_none());
        assert!(
            LlmConfig::from_lookup(lookup(&[("TUTOR_API_KEY", "  ")]))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn applies_defaults() {
        let config = LlmConfig::from_lookup(lookup(&[("TUTOR_API_KEY", "sk-test")]))
            .unwrap()
            .unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!((config.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(
            config.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn reads_overrides() {
        let config = LlmConfig::from_lookup(lookup(&[
            ("TUTOR_API_KEY", "sk-test"),
            ("TUTOR_BASE_URL", "http://localhost:11434/v1/"),
            ("TUTOR_MODEL", "llama3"),
            ("TUTOR_MAX_TOKENS", "256"),
            ("TUTOR_TIMEOUT_SECS", "5"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(config.model, "llama3");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(
            config.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn rejects_bad_values() {
        let err = LlmConfig::from_lookup(lookup(&[
            ("TUTOR_API_KEY", "sk-test"),
            ("TUTOR_BASE_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, LlmConfigError::InvalidBaseUrl { .. }));

        let err = LlmConfig::from_lookup(lookup(&[
            ("TUTOR_API_KEY", "sk-test"),
            ("TUTOR_MAX_TOKENS", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            LlmConfigError::InvalidNumber { var: "TUTOR_MAX_TOKENS", .. }
        ));
    }
}
