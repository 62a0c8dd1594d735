//! Node samplers and the per-chunk node grid.
//!
//! A chunk of `divisions` subdivisions holds `divisions + 2` nodes per axis
//! spaced `size / (divisions + 1)` apart, so neighbouring chunks sample
//! identical boundary points.

use std::sync::atomic::{AtomicBool, Ordering};

use glam::Vec3;
use noise::{NoiseFn, Perlin};

/// Maps a world-space point to a node weight.
pub trait NodeSampler: Send + Sync {
  fn sample(&self, point: Vec3) -> u16;
}

impl<S: NodeSampler + ?Sized> NodeSampler for Box<S> {
  fn sample(&self, point: Vec3) -> u16 {
    (**self).sample(point)
  }
}

/// Solid below a horizontal plane, empty above.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlatSampler {
  /// World-space height of the surface.
  pub height: f32,
}

impl NodeSampler for FlatSampler {
  fn sample(&self, point: Vec3) -> u16 {
    if point.y < self.height { u16::MAX } else { 0 }
  }
}

/// Seeded 3D Perlin noise spread over the full weight range.
#[derive(Clone, Debug)]
pub struct PerlinSampler {
  noise: Perlin,
  frequency: f64,
}

impl PerlinSampler {
  pub fn new(seed: u32, frequency: f64) -> Self {
    Self {
      noise: Perlin::new(seed),
      frequency,
    }
  }
}

impl NodeSampler for PerlinSampler {
  fn sample(&self, point: Vec3) -> u16 {
    let p = point.as_dvec3() * self.frequency;
    let value = self.noise.get([p.x, p.y, p.z]);
    let weight = (value + 1.0) * 0.5 * u16::MAX as f64;
    weight.clamp(0.0, u16::MAX as f64) as u16
  }
}

/// Nodes per axis for a division count.
#[inline]
pub fn nodes_per_axis(divisions: u16) -> usize {
  divisions as usize + 2
}

/// Samples the node grid of one chunk, x-major then y then z.
pub fn generate_nodes(
  origin: Vec3,
  size: f32,
  divisions: u16,
  sampler: &dyn NodeSampler,
) -> Box<[u16]> {
  let n = nodes_per_axis(divisions);
  let step = node_step(size, divisions);
  let mut nodes = Vec::with_capacity(n * n * n);
  for z in 0..n {
    sample_layer(&mut nodes, origin, step, n, z, sampler);
  }
  nodes.into_boxed_slice()
}

/// Like [`generate_nodes`] but checks `cancel` between z layers.
///
/// Returns `None` once `cancel` is set.
pub fn generate_nodes_cancellable(
  origin: Vec3,
  size: f32,
  divisions: u16,
  sampler: &dyn NodeSampler,
  cancel: &AtomicBool,
) -> Option<Box<[u16]>> {
  let n = nodes_per_axis(divisions);
  let step = node_step(size, divisions);
  let mut nodes = Vec::with_capacity(n * n * n);
  for z in 0..n {
    if cancel.load(Ordering::Relaxed) {
      return None;
    }
    sample_layer(&mut nodes, origin, step, n, z, sampler);
  }
  Some(nodes.into_boxed_slice())
}

#[inline]
fn node_step(size: f32, divisions: u16) -> f32 {
  size / (divisions as f32 + 1.0)
}

fn sample_layer(
  nodes: &mut Vec<u16>,
  origin: Vec3,
  step: f32,
  n: usize,
  z: usize,
  sampler: &dyn NodeSampler,
) {
  for y in 0..n {
    for x in 0..n {
      let offset = Vec3::new(x as f32, y as f32, z as f32) * step;
      nodes.push(sampler.sample(origin + offset));
    }
  }
}
