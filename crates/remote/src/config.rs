/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Connection settings for the hosted project.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project base URL, without a trailing slash.
    pub project_url: String,
    /// Public (anon) API key sent as the `apikey` header.
    pub anon_key: String,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(project_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            project_url: project_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                         | Required | Default |
    /// |---------------------------------|----------|---------|
    /// | `FLOWLINE_URL`                  | **yes**  | --      |
    /// | `FLOWLINE_ANON_KEY`             | **yes**  | --      |
    /// | `FLOWLINE_REQUEST_TIMEOUT_SECS` | no       | `30`    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(var))
        };

        let project_url = required("FLOWLINE_URL")?;
        if !project_url.starts_with("http://") && !project_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "FLOWLINE_URL",
                expected: "an http(s) URL",
                value: project_url,
            });
        }
        let anon_key = required("FLOWLINE_ANON_KEY")?;

        let request_timeout_secs = match lookup("FLOWLINE_REQUEST_TIMEOUT_SECS") {
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "FLOWLINE_REQUEST_TIMEOUT_SECS",
                expected: "a valid u64",
                value: raw,
            })?,
        };

        let mut config = Self::new(project_url, anon_key);
        config.request_timeout_secs = request_timeout_secs;
        Ok(config)
    }
}
