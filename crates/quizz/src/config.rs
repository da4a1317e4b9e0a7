// config.rs: environment-driven settings for the OpenAI-compatible capability.

use secrecy::{ExposeSecret, SecretString};

use quizz_types::{AdapterTimeout, Error};

use crate::providers::openai_compat::{OpenAICompatibleCapability, DEFAULT_MODEL};

/// Base URL used when `OPENAI_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Everything needed to build an `OpenAICompatibleCapability`.
#[derive(Debug)]
pub struct Settings {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout: AdapterTimeout,
}

impl Settings {
    /// Read settings from the environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `OPENAI_API_KEY` | required |
    /// | `OPENAI_BASE_URL` | `https://api.openai.com` |
    /// | `QUIZZ_MODEL` | `gpt-3.5-turbo` |
    /// | `QUIZZ_CONNECT_TIMEOUT` / `QUIZZ_REQUEST_TIMEOUT` / `QUIZZ_STREAM_READ_TIMEOUT` | 10 / 120 / 30 seconds |
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::configuration("OPENAI_API_KEY is not set"))?;
        let base_url = std::env::var("OPENAI_BASE_URL")
            .map(|url| crate::util::normalize_base_url(&url))
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("QUIZZ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self {
            api_key: SecretString::from(api_key),
            base_url,
            model,
            timeout: timeout_from_env(),
        })
    }

    /// Build the capability these settings describe.
    pub fn capability(&self) -> Result<OpenAICompatibleCapability, Error> {
        let api_key = SecretString::from(self.api_key.expose_secret().to_string());
        OpenAICompatibleCapability::builder(api_key, self.base_url.clone())
            .model(self.model.clone())
            .timeout(self.timeout.clone())
            .build()
    }
}

/// Parse timeout configuration from environment variables.
/// Falls back to `AdapterTimeout::default()` for any unset or unparseable values.
pub fn timeout_from_env() -> AdapterTimeout {
    let defaults = AdapterTimeout::default();
    AdapterTimeout {
        connect: secs_from_env("QUIZZ_CONNECT_TIMEOUT").unwrap_or(defaults.connect),
        request: secs_from_env("QUIZZ_REQUEST_TIMEOUT").unwrap_or(defaults.request),
        stream_read: secs_from_env("QUIZZ_STREAM_READ_TIMEOUT").unwrap_or(defaults.stream_read),
    }
}

fn secs_from_env(name: &str) -> Option<f64> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
}
