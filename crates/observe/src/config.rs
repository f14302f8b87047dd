use tracing::Level;

/// Logging setup of a binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// `EnvFilter` directives, e.g. `warn,ad_auction=debug`.
    pub(crate) env_filter: String,
    /// Events at this level or more severe go to stderr, everything else to
    /// stdout. Defaults to `ERROR`.
    pub(crate) stderr_threshold: Option<Level>,
    pub(crate) use_json_format: bool,
}

impl Config {
    pub fn new(env_filter: &str, stderr_threshold: Option<Level>, use_json_format: bool) -> Self {
        Self {
            env_filter: env_filter.to_owned(),
            stderr_threshold,
            use_json_format,
        }
    }

    pub fn with_env_filter(self, env_filter: &str) -> Self {
        Self {
            env_filter: env_filter.to_owned(),
            ..self
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("info", None, false)
    }
}
