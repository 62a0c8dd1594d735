//! Chunk grid coordinates and the ring-buffer slot index.
//!
//! Defines the addressing scheme shared by the controller and every
//! generation engine:
//! - [`ChunkCoord`]: integer position on the chunk grid
//! - [`chunk_coordinate_of`]: world position to containing chunk (floor)
//! - [`slot_index_of`]: chunk coordinate to pool slot (wrap-around)
//! - [`ResidentWindow`]: the cube of chunks that should be resident
//!
//! The wrap-around scheme is frozen: an engine that computes slots any other
//! way will have its completions rejected as stale.

use glam::{IVec3, Vec3};

use crate::error::StreamError;
use crate::layout::LayoutError;

/// Position on the chunk grid, relative to the world origin.
///
/// Chunk `(x, y, z)` spans `[x * size, (x + 1) * size)` on each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

impl ChunkCoord {
  /// Creates a new chunk coordinate.
  pub const fn new(x: i32, y: i32, z: i32) -> Self {
    Self { x, y, z }
  }

  /// Origin corner of the chunk in world space.
  #[inline]
  pub fn origin(self, chunk_size: f32) -> Vec3 {
    Vec3::new(self.x as f32, self.y as f32, self.z as f32) * chunk_size
  }

  /// Center of the chunk in world space.
  #[inline]
  pub fn center(self, chunk_size: f32) -> Vec3 {
    self.origin(chunk_size) + Vec3::splat(chunk_size * 0.5)
  }

  /// Recovers the coordinate from a chunk's origin corner.
  ///
  /// Samples the chunk center so float error in the origin never lands on
  /// the neighbouring chunk.
  #[inline]
  pub fn from_origin(origin: Vec3, chunk_size: f32) -> Self {
    chunk_coordinate_of(origin + Vec3::splat(chunk_size * 0.5), chunk_size)
  }
}

impl From<IVec3> for ChunkCoord {
  fn from(v: IVec3) -> Self {
    Self::new(v.x, v.y, v.z)
  }
}

impl From<ChunkCoord> for IVec3 {
  fn from(c: ChunkCoord) -> Self {
    IVec3::new(c.x, c.y, c.z)
  }
}

/// Returns the chunk containing `world_position`.
///
/// Uses floor division so negative positions map correctly: with a chunk size
/// of 32, x = -1 lies in chunk -1.
#[inline]
pub fn chunk_coordinate_of(world_position: Vec3, chunk_size: f32) -> ChunkCoord {
  let c = (world_position / chunk_size).floor();
  ChunkCoord::new(c.x as i32, c.y as i32, c.z as i32)
}

/// Maps a chunk coordinate to its pool slot.
///
/// Each axis wraps into `[0, 2 * view_distance)` and the result flattens
/// x-major. Any `2 * view_distance` consecutive coordinates per axis map to
/// distinct slots, so a moving window reuses the slot of every chunk that
/// stays inside it.
#[inline]
pub fn slot_index_of(coord: ChunkCoord, view_distance: u8) -> usize {
  let n = view_distance as i32 * 2;
  debug_assert!(n > 0, "slot_index_of with zero view distance");
  let x = coord.x.rem_euclid(n) as usize;
  let y = coord.y.rem_euclid(n) as usize;
  let z = coord.z.rem_euclid(n) as usize;
  let n = n as usize;
  x + y * n + z * n * n
}

/// Number of pool slots for a view distance, `(2 * view_distance)^3`.
pub fn pool_capacity(view_distance: u8) -> Result<usize, StreamError> {
  if view_distance == 0 {
    return Err(StreamError::InvalidLayout(LayoutError::ZeroViewDistance));
  }
  let axis = view_distance as usize * 2;
  Ok(axis * axis * axis)
}

/// Largest per-axis distance between two points.
///
/// The resident window is a cube, so this is the distance the unload policy
/// compares against.
#[inline]
pub fn axis_distance(a: Vec3, b: Vec3) -> f32 {
  (a - b).abs().max_element()
}

/// The cube of chunk coordinates that should be resident for a center.
///
/// Spans `[anchor - view_distance, anchor + view_distance)` on each axis,
/// where `anchor` is the chunk-grid vertex nearest the center. Every chunk in
/// the window has its center within `view_distance * chunk_size` of the
/// world center on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResidentWindow {
  anchor: ChunkCoord,
  view_distance: u8,
}

impl ResidentWindow {
  /// Computes the window for a world-space center.
  pub fn around(center: Vec3, chunk_size: f32, view_distance: u8) -> Self {
    let a = (center / chunk_size).round();
    Self {
      anchor: ChunkCoord::new(a.x as i32, a.y as i32, a.z as i32),
      view_distance,
    }
  }

  /// Grid vertex the window is centered on.
  pub fn anchor(&self) -> ChunkCoord {
    self.anchor
  }

  /// Lowest coordinate in the window on every axis.
  pub fn min(&self) -> ChunkCoord {
    let r = self.view_distance as i32;
    ChunkCoord::new(self.anchor.x - r, self.anchor.y - r, self.anchor.z - r)
  }

  /// Number of chunks along one axis.
  pub fn axis_len(&self) -> usize {
    self.view_distance as usize * 2
  }

  /// Number of chunks in the window.
  pub fn len(&self) -> usize {
    let n = self.axis_len();
    n * n * n
  }

  /// Returns true for a zero view distance.
  pub fn is_empty(&self) -> bool {
    self.view_distance == 0
  }

  /// Returns true if the coordinate lies inside the window.
  pub fn contains(&self, coord: ChunkCoord) -> bool {
    let min = self.min();
    let n = self.axis_len() as i32;
    let inside = |c: i32, lo: i32| c >= lo && c < lo + n;
    inside(coord.x, min.x) && inside(coord.y, min.y) && inside(coord.z, min.z)
  }

  /// Inverse of [`slot_index_of`] restricted to this window.
  ///
  /// Returns the unique in-window coordinate that maps to `slot`.
  pub fn coord_for_slot(&self, slot: usize) -> ChunkCoord {
    let n = self.axis_len();
    let min = self.min();
    let wrap = |axis_slot: usize, lo: i32| {
      let n = n as i32;
      (axis_slot as i32 - lo).rem_euclid(n) + lo
    };
    ChunkCoord::new(
      wrap(slot % n, min.x),
      wrap((slot / n) % n, min.y),
      wrap(slot / (n * n), min.z),
    )
  }

  /// Iterates every coordinate in the window, x fastest.
  pub fn iter(&self) -> impl Iterator<Item = ChunkCoord> + use<> {
    let min = self.min();
    let n = self.axis_len() as i32;
    (0..n).flat_map(move |dz| {
      (0..n).flat_map(move |dy| {
        (0..n).map(move |dx| ChunkCoord::new(min.x + dx, min.y + dy, min.z + dz))
      })
    })
  }
}
