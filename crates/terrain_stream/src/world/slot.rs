//! Chunk handles stored in the pool.

use std::time::Duration;

use glam::Vec3;

use crate::coords::ChunkCoord;
use crate::engine::sampler::nodes_per_axis;
use crate::engine::{ChunkCompletion, LayoutEpoch};

/// Lifecycle state of a handle held in the pool.
///
/// A requested chunk has no handle yet; see
/// [`SlotState`](super::SlotState) for the per-slot view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkLifecycle {
  /// Node data is present and matches the layout it was generated under.
  Loaded,
  /// Node data was released; position and size are kept for diagnostics.
  Unloaded,
}

/// Snapshot of one chunk for renderers and debug views.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkView {
  pub slot: usize,
  pub coord: ChunkCoord,
  /// Origin corner in world space.
  pub position: Vec3,
  pub size: f32,
  pub state: ChunkLifecycle,
}

/// One generated chunk and its node data.
///
/// The handle exclusively owns its node buffer. [`release`](Self::release)
/// frees it early; dropping the handle frees whatever remains.
#[derive(Debug)]
pub struct ChunkHandle {
  slot: usize,
  coord: ChunkCoord,
  epoch: LayoutEpoch,
  world_position: Vec3,
  size: f32,
  divisions: u16,
  /// `None` once released.
  nodes: Option<Box<[u16]>>,
  build_time: Duration,
}

impl From<ChunkCompletion> for ChunkHandle {
  fn from(c: ChunkCompletion) -> Self {
    Self {
      slot: c.slot,
      coord: c.coord,
      epoch: c.epoch,
      world_position: c.world_position,
      size: c.size,
      divisions: c.divisions,
      nodes: Some(c.node_weights),
      build_time: c.build_time,
    }
  }
}

impl ChunkHandle {
  pub fn slot(&self) -> usize {
    self.slot
  }

  pub fn coord(&self) -> ChunkCoord {
    self.coord
  }

  /// Layout epoch the chunk was generated under.
  pub fn epoch(&self) -> LayoutEpoch {
    self.epoch
  }

  /// Origin corner in world space.
  pub fn world_position(&self) -> Vec3 {
    self.world_position
  }

  pub fn size(&self) -> f32 {
    self.size
  }

  pub fn center(&self) -> Vec3 {
    self.world_position + Vec3::splat(self.size * 0.5)
  }

  pub fn divisions(&self) -> u16 {
    self.divisions
  }

  /// Time the engine spent generating this chunk.
  pub fn build_time(&self) -> Duration {
    self.build_time
  }

  pub fn state(&self) -> ChunkLifecycle {
    if self.nodes.is_some() {
      ChunkLifecycle::Loaded
    } else {
      ChunkLifecycle::Unloaded
    }
  }

  #[inline]
  pub fn is_loaded(&self) -> bool {
    self.nodes.is_some()
  }

  /// Node weights, or `None` after release.
  pub fn nodes(&self) -> Option<&[u16]> {
    self.nodes.as_deref()
  }

  /// Nodes along one axis of the grid.
  pub fn axis_nodes(&self) -> usize {
    nodes_per_axis(self.divisions)
  }

  /// Weight of the node at grid position `(x, y, z)`.
  ///
  /// Returns `None` after release or if the position is outside the grid.
  pub fn node(&self, x: usize, y: usize, z: usize) -> Option<u16> {
    let n = self.axis_nodes();
    if x >= n || y >= n || z >= n {
      return None;
    }
    self.nodes()?.get(x + y * n + z * n * n).copied()
  }

  /// Frees the node data, keeping position metadata.
  ///
  /// Returns true if data was freed by this call.
  pub fn release(&mut self) -> bool {
    self.nodes.take().is_some()
  }

  pub fn view(&self) -> ChunkView {
    ChunkView {
      slot: self.slot,
      coord: self.coord,
      position: self.world_position,
      size: self.size,
      state: self.state(),
    }
  }
}
