//! Terrain Stream - keeps a bounded set of procedurally generated 3D terrain
//! chunks loaded around a moving center.
//!
//! The [`StreamingController`] maps the center onto a ring-buffer pool of
//! `(2 * view_distance)^3` slots, forwards updates to an asynchronous
//! [`GenerationEngine`], and installs finished chunks without blocking.
//! [`LocalEngine`] is an in-process engine backed by a rayon worker pool.

pub mod config;
pub mod coords;
pub mod engine;
pub mod error;
pub mod layout;
#[cfg(feature = "tracy")]
mod tracy_init;
pub mod world;

pub use config::{ConfigError, SamplerConfig, StreamingConfig};
pub use coords::{ChunkCoord, ResidentWindow, chunk_coordinate_of, pool_capacity, slot_index_of};
pub use engine::local::{LocalEngine, LocalEngineBuilder};
pub use engine::sampler::{FlatSampler, NodeSampler, PerlinSampler};
pub use engine::{ChunkCompletion, ChunkTarget, EngineBuilder, GenerationEngine, LayoutEpoch};
pub use error::{EngineInitError, PolicyError, StreamError};
pub use layout::{Layout, LayoutError};
#[cfg(feature = "tracy")]
pub use tracy_init::init_tracy;
pub use world::{
  CenterUpdate, ChunkHandle, ChunkLifecycle, ChunkPool, ChunkView, SlotState, StaleReason,
  StreamStats, StreamingController, StreamingPolicy, TickReport,
};
