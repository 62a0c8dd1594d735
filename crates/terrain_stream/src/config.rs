//! Streaming configuration loaded from TOML.
//!
//! Every field has a default, so a partial file (or none at all) yields a
//! usable configuration.

use std::error::Error;
use std::path::Path;
use std::{fmt, io};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::sampler::{FlatSampler, NodeSampler, PerlinSampler};
use crate::error::PolicyError;
use crate::layout::{LAYOUT_TOLERANCE, Layout, LayoutError};
use crate::world::StreamingPolicy;

/// Errors raised while loading, saving or validating a configuration.
#[derive(Debug)]
pub enum ConfigError {
  /// The file could not be read or written.
  Io(io::Error),
  /// The file is not valid TOML for this schema.
  Parse(toml::de::Error),
  /// The configuration could not be serialized.
  Serialize(toml::ser::Error),
  /// The layout section is malformed.
  InvalidLayout(LayoutError),
  /// A policy threshold is out of range.
  InvalidPolicy(PolicyError),
  /// `worker_threads` is zero.
  ZeroWorkerThreads,
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(e) => write!(f, "config I/O error: {e}"),
      Self::Parse(e) => write!(f, "config parse error: {e}"),
      Self::Serialize(e) => write!(f, "config serialize error: {e}"),
      Self::InvalidLayout(e) => write!(f, "invalid layout: {e}"),
      Self::InvalidPolicy(e) => write!(f, "invalid streaming policy: {e}"),
      Self::ZeroWorkerThreads => write!(f, "worker_threads must be at least 1"),
    }
  }
}

impl Error for ConfigError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      Self::Parse(e) => Some(e),
      Self::Serialize(e) => Some(e),
      Self::InvalidLayout(e) => Some(e),
      Self::InvalidPolicy(e) => Some(e),
      Self::ZeroWorkerThreads => None,
    }
  }
}

impl From<io::Error> for ConfigError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

impl From<toml::de::Error> for ConfigError {
  fn from(err: toml::de::Error) -> Self {
    Self::Parse(err)
  }
}

impl From<toml::ser::Error> for ConfigError {
  fn from(err: toml::ser::Error) -> Self {
    Self::Serialize(err)
  }
}

impl From<LayoutError> for ConfigError {
  fn from(err: LayoutError) -> Self {
    Self::InvalidLayout(err)
  }
}

impl From<PolicyError> for ConfigError {
  fn from(err: PolicyError) -> Self {
    Self::InvalidPolicy(err)
  }
}

/// Which node sampler the local engine generates chunks with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerConfig {
  /// Solid below a horizontal plane.
  Flat { height: f32 },
  /// Seeded 3D Perlin noise.
  Perlin { seed: u32, frequency: f64 },
}

impl Default for SamplerConfig {
  fn default() -> Self {
    Self::Perlin {
      seed: 0,
      frequency: 0.01,
    }
  }
}

impl SamplerConfig {
  /// Builds the configured sampler.
  pub fn build(&self) -> Box<dyn NodeSampler> {
    match *self {
      Self::Flat { height } => Box::new(FlatSampler { height }),
      Self::Perlin { seed, frequency } => Box::new(PerlinSampler::new(seed, frequency)),
    }
  }
}

/// Configuration for a [`StreamingController`](crate::StreamingController)
/// and the bundled local engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
  /// Initial pool shape.
  pub layout: Layout,
  /// Worker threads for the local engine.
  pub worker_threads: usize,
  /// Minimum center movement, in world units, that triggers a recenter.
  pub recenter_threshold: f32,
  /// Extra unload distance past the view radius, in chunk-size units.
  pub unload_margin: f32,
  /// Chunk-size tolerance when deciding whether a layout changed.
  pub layout_tolerance: f32,
  /// Completions installed per [`tick`](crate::StreamingController::tick).
  /// Zero drains everything that is ready.
  pub max_completions_per_tick: usize,
  /// Node sampler used by the local engine.
  pub sampler: SamplerConfig,
}

impl Default for StreamingConfig {
  fn default() -> Self {
    Self {
      layout: Layout::default(),
      worker_threads: default_worker_threads(),
      recenter_threshold: 1.0,
      unload_margin: 0.5,
      layout_tolerance: LAYOUT_TOLERANCE,
      max_completions_per_tick: 8,
      sampler: SamplerConfig::default(),
    }
  }
}

fn default_worker_threads() -> usize {
  std::thread::available_parallelism()
    .map(|n| n.get())
    .unwrap_or(1)
}

impl StreamingConfig {
  /// Parses and validates a TOML document.
  pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
    let config: Self = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
  }

  /// Serializes to a pretty-printed TOML document.
  pub fn to_toml_string(&self) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(self)?)
  }

  /// Reads and validates a configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config = Self::from_toml_str(&contents)?;
    info!("Loaded streaming config from {}", path.display());
    Ok(config)
  }

  /// Loads a configuration file, falling back to defaults.
  ///
  /// A missing file is not an error; an unreadable or invalid one is logged.
  pub fn load_or_default(path: &Path) -> Self {
    if !path.exists() {
      debug!("No streaming config at {}, using defaults", path.display());
      return Self::default();
    }
    match Self::load(path) {
      Ok(config) => config,
      Err(e) => {
        warn!("Failed to load streaming config: {e}, using defaults");
        Self::default()
      }
    }
  }

  /// Writes the configuration to `path`, creating parent directories.
  pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, self.to_toml_string()?)?;
    debug!("Saved streaming config to {}", path.display());
    Ok(())
  }

  /// Checks the layout, the policy thresholds and the worker count.
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.layout.validate()?;
    StreamingPolicy::from(self).validate()?;
    if self.worker_threads == 0 {
      return Err(ConfigError::ZeroWorkerThreads);
    }
    Ok(())
  }
}
