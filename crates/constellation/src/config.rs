//! All of the user config for Constellation.
//!
//! There are 2 layers. [`Config`] is exactly what is in the user's TOML file, colours are still
//! hex strings and nothing has been checked. [`SimulationConfig`] is built from it once at
//! startup, and is the validated, immutable set of constants that the render loop runs with.

use std::str::FromStr as _;

use color_eyre::eyre::{ContextCompat as _, Result};
use snafu::{ensure, ResultExt as _};

use crate::Colour;

/// A copy of the default config file. It gets copied to the user's config folder the first time
/// they start Constellation.
static DEFAULT_CONFIG: &str = include_str!("../default_config.toml");

/// The furthest, in terminal pixels, that a glow, particle or line may reach. Every frame visits
/// every pixel within this reach of every particle.
pub const MAX_DRAW_REACH: f32 = 256.0;

/// The name of the config file that is used when no other is given on the CLI.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "constellation.toml";

/// The valid log levels. Based on our `tracing` crate.
#[derive(serde::Serialize, serde::Deserialize, clap::ValueEnum, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LogLevel {
    /// Error
    Error,
    /// Warnings
    Warn,
    /// Info
    Info,
    /// Debug
    Debug,
    /// Trace
    Trace,
    /// No logging
    Off,
}

/// The user's config file.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Config {
    /// The maximum log level
    pub log_level: LogLevel,
    /// The location of the log file.
    pub log_path: std::path::PathBuf,
    /// Target frame rate
    pub frame_rate: u32,
    /// Particle counts above this use the R-tree to find connections.
    pub spatial_index_threshold: usize,
    /// The particles themselves
    pub simulation: Simulation,
}

impl Default for Config {
    fn default() -> Self {
        let log_directory = match dirs::state_dir() {
            Some(directory) => directory,
            None => std::path::PathBuf::new().join("./"),
        };
        let log_path = log_directory
            .join("constellation")
            .join("constellation.log");

        Self {
            log_level: LogLevel::Off,
            log_path,
            frame_rate: 30,
            spatial_index_threshold: 500,
            simulation: Simulation::default(),
        }
    }
}

/// The raw, unvalidated, simulation settings.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Simulation {
    /// How many particles there are.
    pub particle_count: usize,
    /// Particles closer than this are joined by a line.
    pub connection_radius: f32,
    /// The reach of the pointer's push.
    pub mouse_radius: f32,
    /// Hex colours, particles pick one at random.
    pub palette: Vec<String>,
    /// The maximum initial speed of a particle, per axis.
    pub base_speed: f32,
    /// The width of the glow around each particle.
    pub glow_blur: f32,
    /// The fraction of pointer-induced momentum that survives each tick.
    pub damping: f32,
    /// How hard the pointer pushes.
    pub push_strength: f32,
    /// Surface units per terminal pixel.
    pub scale: f32,
    /// The smallest and largest particle radius.
    pub size_range: (f32, f32),
    /// The faintest and most opaque a particle can be.
    pub alpha_range: (f32, f32),
    /// Connection lines
    pub lines: Lines,
    /// The backdrop painted behind everything
    pub background: Background,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            particle_count: 120,
            connection_radius: 120.0,
            mouse_radius: 180.0,
            palette: ["#ff79c6", "#7ab8ff", "#bd93f9", "#8be9fd", "#f8f8f2"]
                .map(String::from)
                .to_vec(),
            base_speed: 0.8,
            glow_blur: 15.0,
            damping: 0.96,
            push_strength: 0.05,
            scale: 10.0,
            size_range: (0.5, 2.5),
            alpha_range: (0.5, 1.0),
            lines: Lines::default(),
            background: Background::default(),
        }
    }
}

/// How the connections between particles look.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Lines {
    /// Hex colour of every line
    pub colour: String,
    /// Line width in pixels
    pub width: f32,
    /// The opacity of a line joining 2 particles that are on top of each other.
    pub opacity: f32,
}

impl Default for Lines {
    fn default() -> Self {
        Self {
            colour: "#b4c8ff".into(),
            width: 1.0,
            opacity: 0.4,
        }
    }
}

/// A radial gradient filling the whole layer.
#[derive(serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
#[non_exhaustive]
pub struct Background {
    /// Whether to paint it at all. When disabled the layer is transparent between particles.
    pub enabled: bool,
    /// Hex colour at the centre of the surface
    pub inner: String,
    /// Hex colour at the corners
    pub outer: String,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            enabled: true,
            inner: "#1b1b3a".into(),
            outer: "#0a0a1a".into(),
        }
    }
}

impl Config {
    /// Get the stable location of Constellation's config directory on the user's system.
    pub fn default_directory() -> Result<std::path::PathBuf> {
        Ok(dirs::config_dir()
            .context("Couldn't get standard config directory")?
            .join("constellation"))
    }

    /// Figure out where our config is being stored, and create the directory if needed.
    pub fn setup_directory(
        maybe_custom_path: Option<std::path::PathBuf>,
    ) -> Result<std::path::PathBuf> {
        let path = match maybe_custom_path {
            None => Self::default_directory()?,
            Some(path_string) => std::path::PathBuf::new().join(path_string),
        };

        std::fs::create_dir_all(path.clone())?;

        Ok(path)
    }

    /// Load the main config. The default config is written out first if the user doesn't have
    /// one yet.
    pub fn load(directory: &std::path::Path, file_name: &std::path::Path) -> Result<Self> {
        let config_path = directory.join(file_name);
        let is_default_config = file_name == std::path::Path::new(DEFAULT_CONFIG_FILE_NAME);
        if is_default_config && !config_path.exists() {
            std::fs::write(config_path.clone(), DEFAULT_CONFIG)?;
        }

        tracing::info!("Loading the main Constellation config from: {config_path:?}");
        let result = std::fs::read_to_string(config_path.clone());
        match result {
            Ok(data) => {
                tracing::trace!("Using config file:\n{data}");
                let config = toml::from_str::<Self>(&data)?;
                Ok(config)
            }
            Err(err) => {
                tracing::error!("Loading config: {err:?}");
                color_eyre::eyre::bail!(
                    "Couldn't load config at {config_path:?}: {}",
                    err.to_string()
                );
            }
        }
    }
}

/// Everything that can be wrong with the simulation's settings.
#[derive(Debug, snafu::Snafu)]
#[non_exhaustive]
pub enum ConfigError {
    #[snafu(display("`particle_count` must be at least 1"))]
    /// There has to be something to simulate.
    NoParticles,

    #[snafu(display("`{name}` must be positive and finite, got {value}"))]
    /// Radii and scale are divisors.
    NonPositive {
        /// The setting's name
        name: &'static str,
        /// What it was set to
        value: f32,
    },

    #[snafu(display("`{name}` must not be negative, got {value}"))]
    /// Speeds, blurs and widths.
    Negative {
        /// The setting's name
        name: &'static str,
        /// What it was set to
        value: f32,
    },

    #[snafu(display("`palette` must contain at least one colour"))]
    /// Particles pick their colour from the palette.
    EmptyPalette,

    #[snafu(display("Couldn't parse `{name}` colour: '{colour}'"))]
    /// Colours are hex strings like "#ff79c6".
    BadColour {
        /// The setting's name
        name: &'static str,
        /// The offending string
        colour: String,
        /// The parent error type
        source: palette::rgb::FromHexError,
    },

    #[snafu(display("`damping` must be greater than 0 and less than 1, got {value}"))]
    /// Damping outside (0, 1) either kills the push instantly or makes it grow forever.
    DampingOutOfRange {
        /// What it was set to
        value: f32,
    },

    #[snafu(display("`{name}` must be between 0 and 1, got {value}"))]
    /// Opacities.
    NotAFraction {
        /// The setting's name
        name: &'static str,
        /// What it was set to
        value: f32,
    },

    #[snafu(display("`{name}` must be an ascending range within {floor}..={ceiling}, got {min}..={max}"))]
    /// Random ranges.
    BadRange {
        /// The setting's name
        name: &'static str,
        /// Lower end
        min: f32,
        /// Upper end
        max: f32,
        /// The lowest allowed value
        floor: f32,
        /// The highest allowed value
        ceiling: f32,
    },

    #[snafu(display("`{name}` reaches {value} pixels, the most allowed is {limit}"))]
    /// Glows, particles and lines are drawn pixel by pixel.
    TooLarge {
        /// The setting's name
        name: &'static str,
        /// How many pixels it would reach
        value: f32,
        /// The most pixels allowed
        limit: f32,
    },

    #[snafu(display("`frame_rate` must be at least 1"))]
    /// The frame interval is derived from the frame rate.
    ZeroFrameRate,
}

/// The validated constants for one running instance of the simulation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct SimulationConfig {
    /// How many particles there are.
    pub particle_count: usize,
    /// Particles closer than this are joined by a line.
    pub connection_radius: f32,
    /// The reach of the pointer's push.
    pub mouse_radius: f32,
    /// Particles pick one of these at random.
    pub palette: Vec<Colour>,
    /// The maximum initial speed of a particle, per axis.
    pub base_speed: f32,
    /// The width of the glow around each particle, in surface units.
    pub glow_blur: f32,
    /// The fraction of pointer-induced momentum that survives each tick.
    pub damping: f32,
    /// How hard the pointer pushes.
    pub push_strength: f32,
    /// Surface units per terminal pixel.
    pub scale: f32,
    /// The smallest and largest particle radius.
    pub size_range: (f32, f32),
    /// The faintest and most opaque a particle can be.
    pub alpha_range: (f32, f32),
    /// The colour of connections.
    pub line_colour: Colour,
    /// The width of connections, in pixels.
    pub line_width: f32,
    /// The opacity of the strongest possible connection.
    pub line_opacity: f32,
    /// Inner and outer colours of the backdrop, if there is one.
    pub background: Option<(Colour, Colour)>,
    /// Target frame rate.
    pub frame_rate: u32,
    /// Particle counts above this use the R-tree to find connections.
    pub spatial_index_threshold: usize,
}

impl TryFrom<&Config> for SimulationConfig {
    type Error = ConfigError;

    fn try_from(config: &Config) -> Result<Self, Self::Error> {
        let settings = &config.simulation;
        let palette = settings
            .palette
            .iter()
            .map(|hex| parse_colour("palette", hex))
            .collect::<Result<Vec<_>, _>>()?;

        let background = if settings.background.enabled {
            Some((
                parse_colour("background.inner", &settings.background.inner)?,
                parse_colour("background.outer", &settings.background.outer)?,
            ))
        } else {
            None
        };

        let simulation_config = Self {
            particle_count: settings.particle_count,
            connection_radius: settings.connection_radius,
            mouse_radius: settings.mouse_radius,
            palette,
            base_speed: settings.base_speed,
            glow_blur: settings.glow_blur,
            damping: settings.damping,
            push_strength: settings.push_strength,
            scale: settings.scale,
            size_range: settings.size_range,
            alpha_range: settings.alpha_range,
            line_colour: parse_colour("lines.colour", &settings.lines.colour)?,
            line_width: settings.lines.width,
            line_opacity: settings.lines.opacity,
            background,
            frame_rate: config.frame_rate,
            spatial_index_threshold: config.spatial_index_threshold,
        };
        simulation_config.validate()?;

        Ok(simulation_config)
    }
}

impl SimulationConfig {
    /// Reject anything that would put NaNs, empty selections or runaway values into the
    /// per-frame loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.particle_count > 0, NoParticlesSnafu);
        ensure!(self.frame_rate > 0, ZeroFrameRateSnafu);
        ensure!(!self.palette.is_empty(), EmptyPaletteSnafu);

        for (name, value) in [
            ("connection_radius", self.connection_radius),
            ("mouse_radius", self.mouse_radius),
            ("scale", self.scale),
        ] {
            ensure!(
                value.is_finite() && value > 0.0,
                NonPositiveSnafu { name, value }
            );
        }

        for (name, value) in [
            ("base_speed", self.base_speed),
            ("glow_blur", self.glow_blur),
            ("push_strength", self.push_strength),
            ("lines.width", self.line_width),
        ] {
            ensure!(
                value.is_finite() && value >= 0.0,
                NegativeSnafu { name, value }
            );
        }

        ensure!(
            self.damping > 0.0 && self.damping < 1.0,
            DampingOutOfRangeSnafu {
                value: self.damping
            }
        );
        ensure!(
            (0.0..=1.0).contains(&self.line_opacity),
            NotAFractionSnafu {
                name: "lines.opacity",
                value: self.line_opacity
            }
        );

        Self::validate_range("size_range", self.size_range, f32::MIN_POSITIVE, f32::MAX)?;
        Self::validate_range("alpha_range", self.alpha_range, 0.0, 1.0)?;

        for (name, value) in [
            ("glow_blur", self.glow_blur / self.scale),
            ("size_range", self.size_range.1 / self.scale),
            ("lines.width", self.line_width),
        ] {
            ensure!(
                value <= MAX_DRAW_REACH,
                TooLargeSnafu {
                    name,
                    value,
                    limit: MAX_DRAW_REACH
                }
            );
        }

        Ok(())
    }

    /// Check a `(min, max)` pair sits inside `floor..=ceiling` and isn't back to front.
    fn validate_range(
        name: &'static str,
        (min, max): (f32, f32),
        floor: f32,
        ceiling: f32,
    ) -> Result<(), ConfigError> {
        ensure!(
            min >= floor && max <= ceiling && min <= max,
            BadRangeSnafu {
                name,
                min,
                max,
                floor,
                ceiling
            }
        );
        Ok(())
    }
}

/// Convert a hex string like "#ff79c6" into an opaque RGBA colour.
pub fn parse_colour(name: &'static str, hex: &str) -> Result<Colour, ConfigError> {
    let rgb = palette::Srgb::<u8>::from_str(hex).context(BadColourSnafu { name, colour: hex })?;
    let rgb: palette::Srgb<f32> = rgb.into_format();
    Ok((rgb.red, rgb.green, rgb.blue, 1.0))
}
