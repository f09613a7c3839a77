//! Worker configuration collected from the process environment.
//!
//! Everything is read once per invocation into [`WorkerConfig`] and passed
//! down to provider construction; nothing below this module touches
//! `std::env`.
use std::time::Duration;

pub const PROVIDER_ENV: &str = "WHY_AI_PROVIDER";
pub const LOG_ENV: &str = "WHY_WORKER_LOG";
pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential and model settings for one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Environment variable names for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderEnv {
    pub api_key: &'static str,
    pub model: &'static str,
}

pub const OPENAI_ENV: ProviderEnv = ProviderEnv {
    api_key: "WHY_AI_API_KEY",
    model: "WHY_AI_MODEL",
};
pub const GEMINI_ENV: ProviderEnv = ProviderEnv {
    api_key: "WHY_GEMINI_API_KEY",
    model: "WHY_GEMINI_MODEL",
};
pub const CLAUDE_ENV: ProviderEnv = ProviderEnv {
    api_key: "WHY_CLAUDE_API_KEY",
    model: "WHY_CLAUDE_MODEL",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub provider_override: Option<String>,
    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
    pub claude: ProviderSettings,
    pub timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            provider_override: None,
            openai: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
            claude: ProviderSettings::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WorkerConfig {
    /// Snapshot the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| non_blank(lookup(key));
        let settings = |env: ProviderEnv| ProviderSettings {
            api_key: read(env.api_key),
            model: read(env.model),
        };
        Self {
            provider_override: read(PROVIDER_ENV),
            openai: settings(OPENAI_ENV),
            gemini: settings(GEMINI_ENV),
            claude: settings(CLAUDE_ENV),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
