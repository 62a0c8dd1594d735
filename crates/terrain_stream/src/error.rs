//! Error types for the streaming core.
//!
//! Stale completions are not errors: they are an expected race under
//! center/layout churn and are only counted (see
//! [`StreamStats`](crate::world::StreamStats)).

use std::error::Error;
use std::{fmt, io};

use crate::layout::LayoutError;

/// Reasons a generation engine refuses to start.
#[derive(Debug)]
pub enum EngineInitError {
  /// View distance of zero chunks.
  ZeroViewDistance,
  /// Chunk size was zero, negative or not finite.
  NonPositiveChunkSize(f32),
  /// No worker threads requested.
  ZeroWorkerThreads,
  /// The worker thread pool could not be built.
  ThreadPool(String),
  /// The scheduler thread could not be spawned.
  Spawn(io::Error),
}

impl fmt::Display for EngineInitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ZeroViewDistance => write!(f, "view distance must be at least 1"),
      Self::NonPositiveChunkSize(size) => write!(f, "chunk size must be positive, got {size}"),
      Self::ZeroWorkerThreads => write!(f, "at least one worker thread is required"),
      Self::ThreadPool(msg) => write!(f, "failed to build worker pool: {msg}"),
      Self::Spawn(e) => write!(f, "failed to spawn scheduler thread: {e}"),
    }
  }
}

impl Error for EngineInitError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Spawn(e) => Some(e),
      _ => None,
    }
  }
}

/// Rejected streaming policy thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PolicyError {
  /// Recenter threshold was negative or not finite.
  RecenterThreshold(f32),
  /// Unload margin was negative or not finite.
  UnloadMargin(f32),
  /// Layout tolerance was negative or not finite.
  LayoutTolerance(f32),
}

impl fmt::Display for PolicyError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::RecenterThreshold(v) => {
        write!(f, "recenter threshold must be finite and non-negative, got {v}")
      }
      Self::UnloadMargin(v) => write!(f, "unload margin must be finite and non-negative, got {v}"),
      Self::LayoutTolerance(v) => {
        write!(f, "layout tolerance must be finite and non-negative, got {v}")
      }
    }
  }
}

impl Error for PolicyError {}

/// Error returned by [`StreamingController`](crate::StreamingController)
/// operations and by engine calls.
#[derive(Debug)]
pub enum StreamError {
  /// Layout parameters were rejected before reaching the engine.
  InvalidLayout(LayoutError),
  /// Policy thresholds were rejected before the engine was built.
  InvalidPolicy(PolicyError),
  /// The engine could not be created. No controller state exists.
  EngineInit(EngineInitError),
  /// The engine was disposed or its channels are closed.
  ///
  /// Fatal: the controller refuses every further operation.
  EngineUnavailable,
}

impl fmt::Display for StreamError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::InvalidLayout(e) => write!(f, "invalid layout: {e}"),
      Self::InvalidPolicy(e) => write!(f, "invalid streaming policy: {e}"),
      Self::EngineInit(e) => write!(f, "engine initialization failed: {e}"),
      Self::EngineUnavailable => write!(f, "generation engine is unavailable"),
    }
  }
}

impl Error for StreamError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::InvalidLayout(e) => Some(e),
      Self::InvalidPolicy(e) => Some(e),
      Self::EngineInit(e) => Some(e),
      Self::EngineUnavailable => None,
    }
  }
}

impl From<LayoutError> for StreamError {
  fn from(err: LayoutError) -> Self {
    Self::InvalidLayout(err)
  }
}

impl From<PolicyError> for StreamError {
  fn from(err: PolicyError) -> Self {
    Self::InvalidPolicy(err)
  }
}

impl From<EngineInitError> for StreamError {
  fn from(err: EngineInitError) -> Self {
    Self::EngineInit(err)
  }
}
