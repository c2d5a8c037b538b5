//! Main entrypoint for running Constellation

use clap::Parser as _;
use color_eyre::eyre::{ContextCompat as _, Result};
use rand::SeedableRng as _;
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _, Layer as _};

use crate::cli_args::CliArgs;
use crate::config::{Config, LogLevel, SimulationConfig};
use crate::render_loop::RenderLoop;

/// How many host events can queue up between frames.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Main entrypoint
pub async fn run() -> Result<()> {
    let cli_args = CliArgs::parse();
    let config = setup(&cli_args)?;
    let simulation = SimulationConfig::try_from(&config)?;

    let seed = cli_args.seed.unwrap_or_else(rand::random);
    tracing::info!("Seeding particles with: {seed}");
    let rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

    let (events_tx, events_rx) = tokio::sync::mpsc::channel(EVENT_CHANNEL_SIZE);
    let (output_tx, output_rx) = tokio::sync::mpsc::channel(1);

    let input_thread_handle = crate::plugin::start_listener(std::io::stdin(), events_tx);
    let output_handle = tokio::spawn(crate::plugin::send_output(output_rx));

    RenderLoop::new(simulation, rng)
        .run(events_rx, output_tx)
        .await?;

    output_handle.await??;
    if input_thread_handle.is_finished() {
        // Reading STDIN blocks, so we can only join the thread if the host has closed it.
        input_thread_handle
            .join()
            .map_err(|err| color_eyre::eyre::eyre!("STDIN handle: {err:?}"))?;
    }

    tracing::trace!("Leaving Constellation's main `run()` function");
    Ok(())
}

/// Prepare the application to start.
fn setup(cli_args: &CliArgs) -> Result<Config> {
    let directory_result = Config::setup_directory(cli_args.config_dir.clone());
    let directory = match directory_result {
        Ok(directory) => directory,
        Err(directory_error) => {
            color_eyre::eyre::bail!("Error setting up config directory: {directory_error:?}")
        }
    };

    let config_result = Config::load(&directory, &cli_args.main_config);
    let config = match config_result {
        Ok(config) => config,
        Err(config_error) => {
            let path = directory.join(&cli_args.main_config);
            color_eyre::eyre::bail!(
                "Bad config file: {config_error:?}\n\nConfig path: {}",
                path.display()
            );
        }
    };

    setup_logging(cli_args, &config)?;

    tracing::info!("Starting Constellation");
    tracing::debug!("Loaded config: {config:?}");

    Ok(config)
}

/// Setup logging. Everything goes to a file, STDOUT belongs to the host.
fn setup_logging(cli_args: &CliArgs, config: &Config) -> Result<()> {
    let are_log_filters_manually_set = std::env::var("CONSTELLATION_LOG").is_ok();
    let path = cli_args
        .log_path
        .clone()
        .unwrap_or_else(|| config.log_path.clone());
    let level = cli_args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    let level_as_string = format!("{level:?}").to_lowercase();

    let is_loggable = !matches!(level, LogLevel::Off) || are_log_filters_manually_set;
    if !is_loggable {
        return Ok(());
    }

    let directory = path.parent().context("Couldn't get log path's parent")?;
    std::fs::create_dir_all(directory)?;
    let file = std::fs::File::create(path)?;

    let filters = if are_log_filters_manually_set {
        if let Ok(user_filters) = std::env::var("CONSTELLATION_LOG") {
            std::env::set_var("RUST_LOG", user_filters);
        }

        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("error".parse()?)
            .from_env_lossy()
    } else {
        tracing_subscriber::EnvFilter::builder()
            .with_default_directive("off".parse()?)
            .from_env_lossy()
            .add_directive(format!("constellation={level_as_string}").parse()?)
            .add_directive(format!("constellation_protocol={level_as_string}").parse()?)
    };

    let logfile_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file)
        .with_filter(filters);

    tracing_subscriber::registry().with(logfile_layer).init();

    Ok(())
}
