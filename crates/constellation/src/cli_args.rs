//! All the CLI arguments for Constellation

/// A drifting particle constellation for your terminal's background
#[derive(clap::Parser, Debug, Clone)]
#[command(
    version,
    about,
    long_about = "A drifting particle constellation for your terminal's background. Reads host \
                  messages as JSON on STDIN and writes frames of pixels as JSON to STDOUT."
)]
#[non_exhaustive]
pub struct CliArgs {
    /// Use a custom config directory.
    #[arg(long)]
    pub config_dir: Option<std::path::PathBuf>,

    /// The name of the main config file, inside the config directory.
    #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE_NAME)]
    pub main_config: std::path::PathBuf,

    /// Override the log level from the config.
    #[arg(long, value_enum)]
    pub log_level: Option<crate::config::LogLevel>,

    /// Override the log path from the config.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,

    /// Seed the particles, for a repeatable constellation.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::Parser as _;

    #[test]
    fn defaults() {
        let cli_args = CliArgs::parse_from(["constellation"]);
        assert_eq!(
            cli_args.main_config,
            std::path::PathBuf::from("constellation.toml")
        );
        assert!(cli_args.config_dir.is_none());
        assert!(cli_args.log_level.is_none());
        assert!(cli_args.seed.is_none());
    }

    #[test]
    fn overrides() {
        let cli_args = CliArgs::parse_from([
            "constellation",
            "--config-dir",
            "/tmp/stars",
            "--log-level",
            "trace",
            "--seed",
            "42",
        ]);
        assert_eq!(
            cli_args.config_dir,
            Some(std::path::PathBuf::from("/tmp/stars"))
        );
        assert_eq!(cli_args.log_level, Some(crate::config::LogLevel::Trace));
        assert_eq!(cli_args.seed, Some(42));
    }
}
