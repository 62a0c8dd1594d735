//! Generation engine interface.
//!
//! The controller drives an engine through [`GenerationEngine`]: center and
//! layout updates and unload hints go in, and completed chunks come out
//! through a non-blocking poll. Engines generate on their own threads; the
//! only cross-thread boundary the controller sees is the completion queue.
//!
//! Engines must address slots with [`slot_index_of`](crate::coords::slot_index_of)
//! and echo back the [`LayoutEpoch`] they were configured with. The controller
//! drops completions that do not match its own view of the window.

pub mod local;
pub mod sampler;

use std::fmt;
use std::time::Duration;

use glam::Vec3;

use crate::coords::ChunkCoord;
use crate::error::{EngineInitError, StreamError};
use crate::layout::Layout;

/// Generation counter for layouts.
///
/// Bumped by the controller on every layout change and rebuild. Results
/// computed under an older epoch are stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayoutEpoch(pub u64);

impl LayoutEpoch {
  /// Returns the following epoch.
  #[must_use]
  pub fn next(self) -> Self {
    Self(self.0.wrapping_add(1))
  }
}

impl fmt::Display for LayoutEpoch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "epoch {}", self.0)
  }
}

/// A chunk addressed both by slot and by grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkTarget {
  pub slot: usize,
  pub coord: ChunkCoord,
}

/// A finished chunk reported by an engine.
#[derive(Clone, Debug)]
pub struct ChunkCompletion {
  /// Pool slot the engine generated for.
  pub slot: usize,
  /// Grid coordinate the engine generated for.
  pub coord: ChunkCoord,
  /// Layout epoch the chunk was generated under.
  pub epoch: LayoutEpoch,
  /// Origin corner in world space.
  pub world_position: Vec3,
  /// Edge length in world units.
  pub size: f32,
  /// Subdivisions per edge.
  pub divisions: u16,
  /// Node weights, x-major then y then z.
  pub node_weights: Box<[u16]>,
  /// Wall time spent generating.
  pub build_time: Duration,
}

impl ChunkCompletion {
  /// Slot and coordinate this completion claims.
  pub fn target(&self) -> ChunkTarget {
    ChunkTarget {
      slot: self.slot,
      coord: self.coord,
    }
  }
}

/// Asynchronous chunk generator driven by the controller.
///
/// Every call is fire-and-forget except [`poll_completed`], which must return
/// immediately. After [`dispose`] every other call fails with
/// [`StreamError::EngineUnavailable`].
///
/// [`poll_completed`]: GenerationEngine::poll_completed
/// [`dispose`]: GenerationEngine::dispose
pub trait GenerationEngine {
  /// Moves the generation center.
  fn set_center(&mut self, center: Vec3) -> Result<(), StreamError>;

  /// Replaces the layout. Work for earlier epochs may be dropped or still
  /// reported; the controller filters it.
  fn set_layout(&mut self, layout: Layout, epoch: LayoutEpoch) -> Result<(), StreamError>;

  /// Returns one finished chunk if any is ready. Never blocks.
  fn poll_completed(&mut self) -> Result<Option<ChunkCompletion>, StreamError>;

  /// Hints that a chunk is no longer wanted.
  fn unload(&mut self, target: ChunkTarget) -> Result<(), StreamError>;

  /// Cancels outstanding work and releases engine resources. Idempotent.
  fn dispose(&mut self);
}

impl<E: GenerationEngine + ?Sized> GenerationEngine for Box<E> {
  fn set_center(&mut self, center: Vec3) -> Result<(), StreamError> {
    (**self).set_center(center)
  }

  fn set_layout(&mut self, layout: Layout, epoch: LayoutEpoch) -> Result<(), StreamError> {
    (**self).set_layout(layout, epoch)
  }

  fn poll_completed(&mut self) -> Result<Option<ChunkCompletion>, StreamError> {
    (**self).poll_completed()
  }

  fn unload(&mut self, target: ChunkTarget) -> Result<(), StreamError> {
    (**self).unload(target)
  }

  fn dispose(&mut self) {
    (**self).dispose()
  }
}

/// Creates an engine for an initial center and layout.
///
/// The layout has already been validated when `build` runs.
pub trait EngineBuilder {
  type Engine: GenerationEngine;

  fn build(self, center: Vec3, layout: Layout) -> Result<Self::Engine, EngineInitError>;
}
