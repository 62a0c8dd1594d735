//! Chunk layout: the (view distance, chunk size, divisions) triple that
//! defines pool shape and per-chunk resolution.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default chunk-size comparison tolerance used by [`Layout::same_as`].
pub const LAYOUT_TOLERANCE: f32 = 1e-3;

/// Rejected layout parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayoutError {
  /// View distance of zero chunks.
  ZeroViewDistance,
  /// Chunk size was zero, negative or not finite.
  NonPositiveChunkSize(f32),
  /// Zero subdivisions per chunk edge.
  ZeroDivisions,
}

impl fmt::Display for LayoutError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ZeroViewDistance => write!(f, "view distance must be at least 1"),
      Self::NonPositiveChunkSize(size) => write!(f, "chunk size must be positive, got {size}"),
      Self::ZeroDivisions => write!(f, "chunk divisions must be at least 1"),
    }
  }
}

impl Error for LayoutError {}

/// Streaming layout.
///
/// Changing any field invalidates every resident chunk.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
  /// Chunks per axis-radius around the center.
  pub view_distance: u8,
  /// World units per chunk edge.
  pub chunk_size: f32,
  /// Subdivisions per chunk edge. Opaque to the streaming core.
  pub chunk_divisions: u16,
}

impl Default for Layout {
  fn default() -> Self {
    Self {
      view_distance: 8,
      chunk_size: 32.0,
      chunk_divisions: 32,
    }
  }
}

impl Layout {
  /// Creates a layout without validating it.
  pub const fn new(view_distance: u8, chunk_size: f32, chunk_divisions: u16) -> Self {
    Self {
      view_distance,
      chunk_size,
      chunk_divisions,
    }
  }

  /// Creates a layout, rejecting malformed parameters.
  pub fn try_new(
    view_distance: u8,
    chunk_size: f32,
    chunk_divisions: u16,
  ) -> Result<Self, LayoutError> {
    let layout = Self::new(view_distance, chunk_size, chunk_divisions);
    layout.validate()?;
    Ok(layout)
  }

  /// Checks every field.
  pub fn validate(&self) -> Result<(), LayoutError> {
    if self.view_distance == 0 {
      return Err(LayoutError::ZeroViewDistance);
    }
    if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
      return Err(LayoutError::NonPositiveChunkSize(self.chunk_size));
    }
    if self.chunk_divisions == 0 {
      return Err(LayoutError::ZeroDivisions);
    }
    Ok(())
  }

  /// Number of chunks along one axis of the resident window.
  #[inline]
  pub fn axis_len(&self) -> usize {
    self.view_distance as usize * 2
  }

  /// Number of pool slots, `(2 * view_distance)^3`.
  #[inline]
  pub fn capacity(&self) -> usize {
    let axis = self.axis_len();
    axis * axis * axis
  }

  /// Distance past which a loaded chunk's center is unloaded.
  ///
  /// `margin` is measured in chunk-size units; half a chunk keeps chunks
  /// sitting exactly on the window boundary from flickering.
  #[inline]
  pub fn unload_distance(&self, margin: f32) -> f32 {
    self.chunk_size * self.view_distance as f32 + self.chunk_size * margin
  }

  /// Returns true if both layouts describe the same pool, comparing the chunk
  /// size within `tolerance`.
  pub fn same_as(&self, other: &Layout, tolerance: f32) -> bool {
    self.view_distance == other.view_distance
      && self.chunk_divisions == other.chunk_divisions
      && (self.chunk_size - other.chunk_size).abs() <= tolerance
  }
}
