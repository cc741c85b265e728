pub mod domain;
pub mod llm;
pub mod prompt;
pub mod service;

pub mod config {
    use std::fmt;

    /// A required setting is missing or unusable.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ConfigurationError {
        pub key: &'static str,
        pub reason: &'static str,
    }

    impl fmt::Display for ConfigurationError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "configuration error: {} {}", self.key, self.reason)
        }
    }

    impl std::error::Error for ConfigurationError {}

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub openai_api_key: Option<String>,
        pub openai_base_url: Option<String>,
        pub openai_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
                openai_base_url: std::env::var("OPENAI_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                openai_timeout_secs: parse_timeout_secs(
                    std::env::var("OPENAI_TIMEOUT_SECS").ok(),
                )?,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_openai_api_key(&self) -> Result<&str, ConfigurationError> {
            match self.openai_api_key.as_deref().map(str::trim) {
                None => Err(ConfigurationError {
                    key: "OPENAI_API_KEY",
                    reason: "is required",
                }),
                Some("") => Err(ConfigurationError {
                    key: "OPENAI_API_KEY",
                    reason: "must not be blank",
                }),
                Some(key) => Ok(key),
            }
        }
    }

    /// Unset or blank means no timeout; anything else must be whole seconds.
    fn parse_timeout_secs(raw: Option<String>) -> Result<Option<u64>, ConfigurationError> {
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigurationError {
                key: "OPENAI_TIMEOUT_SECS",
                reason: "must be a positive whole number of seconds",
            }),
            Ok(secs) => Ok(Some(secs)),
        }
    }

}
