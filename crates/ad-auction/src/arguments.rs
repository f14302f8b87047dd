use {std::path::PathBuf, tracing::Level};

#[derive(clap::Parser)]
pub struct Arguments {
    #[clap(long, env, default_value = "warn,ad_auction=debug,buyer_input=debug")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: Level,

    /// Whether to use JSON format for the logs.
    #[clap(long, env, default_value = "false")]
    pub use_json_logs: bool,

    /// Path to the TOML configuration file.
    #[clap(long, env)]
    pub config: PathBuf,

    /// Path to a JSON file with the candidates and buyer signals to pack.
    #[clap(long, env)]
    pub candidates: PathBuf,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
            use_json_logs,
            config,
            candidates,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_stderr_threshold: {log_stderr_threshold}")?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        writeln!(f, "config: {}", config.display())?;
        writeln!(f, "candidates: {}", candidates.display())?;
        Ok(())
    }
}
