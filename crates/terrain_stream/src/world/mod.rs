//! StreamingController - keeps a pool of generated chunks around a moving
//! center.
//!
//! The controller is single-threaded and owns the pool. It:
//! - forwards center and layout updates to the engine
//! - unloads chunks that drift past the unload distance
//! - drains completions without blocking and drops stale ones
//!
//! Sub-modules:
//! - [`pool`]: slot storage
//! - [`slot`]: chunk handles and render views
//! - [`stats`]: counters

pub mod pool;
pub mod slot;
pub mod stats;

use glam::Vec3;
use log::{debug, info, trace, warn};
pub use pool::ChunkPool;
pub use slot::{ChunkHandle, ChunkLifecycle, ChunkView};
pub use stats::{StaleReason, StreamStats};

use crate::config::StreamingConfig;
use crate::coords::{ChunkCoord, ResidentWindow, axis_distance, pool_capacity, slot_index_of};
use crate::engine::{ChunkCompletion, ChunkTarget, EngineBuilder, GenerationEngine, LayoutEpoch};
use crate::error::{PolicyError, StreamError};
use crate::layout::{LAYOUT_TOLERANCE, Layout};

/// Tunable thresholds of the streaming policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamingPolicy {
  /// Minimum center movement that triggers a recenter, in world units.
  pub recenter_threshold: f32,
  /// Extra unload distance past the view radius, in chunk-size units.
  pub unload_margin: f32,
  /// Chunk-size tolerance when comparing layouts.
  pub layout_tolerance: f32,
  /// Completions installed per [`tick`](StreamingController::tick); zero
  /// means unbounded.
  pub max_completions_per_tick: usize,
}

impl Default for StreamingPolicy {
  fn default() -> Self {
    Self {
      recenter_threshold: 1.0,
      unload_margin: 0.5,
      layout_tolerance: LAYOUT_TOLERANCE,
      max_completions_per_tick: 8,
    }
  }
}

impl From<&StreamingConfig> for StreamingPolicy {
  fn from(config: &StreamingConfig) -> Self {
    Self {
      recenter_threshold: config.recenter_threshold,
      unload_margin: config.unload_margin,
      layout_tolerance: config.layout_tolerance,
      max_completions_per_tick: config.max_completions_per_tick,
    }
  }
}

impl StreamingPolicy {
  /// Rejects thresholds that would stall or corrupt streaming.
  ///
  /// A negative unload margin would unload chunks still inside the window,
  /// which are never requested again.
  pub fn validate(&self) -> Result<(), PolicyError> {
    let non_negative = |v: f32| v.is_finite() && v >= 0.0;
    if !non_negative(self.recenter_threshold) {
      return Err(PolicyError::RecenterThreshold(self.recenter_threshold));
    }
    if !non_negative(self.unload_margin) {
      return Err(PolicyError::UnloadMargin(self.unload_margin));
    }
    if !non_negative(self.layout_tolerance) {
      return Err(PolicyError::LayoutTolerance(self.layout_tolerance));
    }
    Ok(())
  }
}

/// What a slot is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
  /// No handle and nothing requested.
  Empty,
  /// Waiting for the engine to generate the slot's current coordinate.
  Requested,
  /// Holds node data.
  Loaded,
  /// Holds a released handle kept for diagnostics.
  Unloaded,
}

impl From<ChunkLifecycle> for SlotState {
  fn from(state: ChunkLifecycle) -> Self {
    match state {
      ChunkLifecycle::Loaded => Self::Loaded,
      ChunkLifecycle::Unloaded => Self::Unloaded,
    }
  }
}

/// Result of [`StreamingController::set_center`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CenterUpdate {
  /// Movement was below the recenter threshold; nothing happened.
  Ignored,
  /// The engine was recentered after unloading `unloaded` chunks.
  Recentered { unloaded: usize },
}

/// Result of one [`StreamingController::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
  pub recentered: bool,
  pub unloaded: usize,
  pub installed: usize,
}

/// Streams chunks from a [`GenerationEngine`] into a [`ChunkPool`].
///
/// Slot `i` holds the chunk whose coordinate maps to `i` under
/// [`slot_index_of`]. After [`shutdown`](Self::shutdown) or an engine
/// failure every operation returns [`StreamError::EngineUnavailable`].
pub struct StreamingController<E: GenerationEngine> {
  engine: E,
  pool: ChunkPool,
  /// Coordinate requested for each slot and not yet installed.
  pending: Vec<Option<ChunkCoord>>,
  center: Vec3,
  layout: Layout,
  epoch: LayoutEpoch,
  policy: StreamingPolicy,
  stats: StreamStats,
  closed: bool,
}

impl<E: GenerationEngine> StreamingController<E> {
  /// Validates the layout, builds the engine and allocates an empty pool.
  ///
  /// On failure nothing is allocated and no engine is left running.
  pub fn initialize<B>(builder: B, center: Vec3, layout: Layout) -> Result<Self, StreamError>
  where
    B: EngineBuilder<Engine = E>,
  {
    Self::with_policy(builder, center, layout, StreamingPolicy::default())
  }

  /// Like [`initialize`](Self::initialize), taking layout and policy from a
  /// configuration.
  pub fn from_config<B>(
    builder: B,
    center: Vec3,
    config: &StreamingConfig,
  ) -> Result<Self, StreamError>
  where
    B: EngineBuilder<Engine = E>,
  {
    Self::with_policy(builder, center, config.layout, StreamingPolicy::from(config))
  }

  /// Like [`initialize`](Self::initialize) with explicit policy thresholds.
  pub fn with_policy<B>(
    builder: B,
    center: Vec3,
    layout: Layout,
    policy: StreamingPolicy,
  ) -> Result<Self, StreamError>
  where
    B: EngineBuilder<Engine = E>,
  {
    layout.validate()?;
    policy.validate()?;
    let capacity = pool_capacity(layout.view_distance)?;
    let engine = builder.build(center, layout)?;

    let mut controller = Self {
      engine,
      pool: ChunkPool::new(capacity),
      pending: Vec::new(),
      center,
      layout,
      epoch: LayoutEpoch::default(),
      policy,
      stats: StreamStats::default(),
      closed: false,
    };
    controller.request_all();

    info!(
      "Streaming initialized at {center}: view distance {}, chunk size {}, {capacity} slots",
      layout.view_distance, layout.chunk_size
    );
    Ok(controller)
  }

  /// Moves the streaming center.
  ///
  /// Ignored if the center moved less than the recenter threshold. Otherwise
  /// chunks farther than the unload distance are unloaded (engine first, then
  /// locally) before the engine sees the new center.
  #[cfg_attr(feature = "tracy", tracing::instrument(skip_all))]
  pub fn set_center(&mut self, new_center: Vec3) -> Result<CenterUpdate, StreamError> {
    self.ensure_open()?;
    if new_center.distance(self.center) < self.policy.recenter_threshold {
      return Ok(CenterUpdate::Ignored);
    }

    let unload_distance = self.layout.unload_distance(self.policy.unload_margin);
    let targets: Vec<ChunkTarget> = self
      .pool
      .iter_loaded()
      .filter(|h| axis_distance(h.center(), new_center) > unload_distance)
      .map(|h| ChunkTarget {
        slot: h.slot(),
        coord: h.coord(),
      })
      .collect();

    for target in &targets {
      let sent = self.engine.unload(*target);
      sent.map_err(|e| self.fail(e))?;
      self.pool.mark_unloaded(target.slot);
    }
    self.stats.unloaded += targets.len() as u64;

    let old_window = self.window();
    self.center = new_center;
    let sent = self.engine.set_center(new_center);
    sent.map_err(|e| self.fail(e))?;
    self.stats.recenters += 1;

    let new_window = self.window();
    for (slot, pending) in self.pending.iter_mut().enumerate() {
      let coord = new_window.coord_for_slot(slot);
      if old_window.coord_for_slot(slot) != coord {
        *pending = Some(coord);
      }
    }

    debug!(
      "Recentered to {new_center}: unloaded {} chunks, {} pending",
      targets.len(),
      self.pending_count()
    );
    Ok(CenterUpdate::Recentered {
      unloaded: targets.len(),
    })
  }

  /// Replaces the layout.
  ///
  /// Returns `Ok(false)` if the layout matches the current one within the
  /// policy tolerance. Otherwise releases every handle, resizes the pool and
  /// re-requests every slot under a new epoch.
  pub fn set_layout(&mut self, layout: Layout) -> Result<bool, StreamError> {
    self.ensure_open()?;
    layout.validate()?;
    if layout.same_as(&self.layout, self.policy.layout_tolerance) {
      return Ok(false);
    }
    let capacity = pool_capacity(layout.view_distance)?;

    self.pool.clear_all();
    self.pool.resize(capacity);
    self.relayout(layout)?;

    info!(
      "Layout changed: view distance {}, chunk size {}, divisions {}, {capacity} slots",
      layout.view_distance, layout.chunk_size, layout.chunk_divisions
    );
    Ok(true)
  }

  /// Releases every chunk and requests all of them again under the current
  /// layout.
  pub fn rebuild_all(&mut self) -> Result<(), StreamError> {
    self.ensure_open()?;
    self.pool.clear_all();
    self.relayout(self.layout)?;
    info!("Rebuilding all {} chunks", self.pool.capacity());
    Ok(())
  }

  /// Installs every completion the engine has ready.
  ///
  /// Returns the number of completions drained, stale ones included.
  pub fn pull_completed(&mut self) -> Result<usize, StreamError> {
    self.pull_completed_up_to(usize::MAX)
  }

  /// Installs at most `max_count` ready completions. Never blocks.
  #[cfg_attr(feature = "tracy", tracing::instrument(skip_all))]
  pub fn pull_completed_up_to(&mut self, max_count: usize) -> Result<usize, StreamError> {
    self.ensure_open()?;
    let mut drained = 0;
    while drained < max_count {
      let polled = self.engine.poll_completed();
      let Some(completion) = polled.map_err(|e| self.fail(e))? else {
        break;
      };
      drained += 1;
      self.accept(completion);
    }
    Ok(drained)
  }

  /// Per-frame entry point: recenters, then drains up to the policy's
  /// per-tick budget.
  pub fn tick(&mut self, center: Vec3) -> Result<TickReport, StreamError> {
    let mut report = TickReport::default();
    if let CenterUpdate::Recentered { unloaded } = self.set_center(center)? {
      report.recentered = true;
      report.unloaded = unloaded;
    }

    let before = self.stats.installed;
    let budget = match self.policy.max_completions_per_tick {
      0 => usize::MAX,
      n => n,
    };
    self.pull_completed_up_to(budget)?;
    report.installed = (self.stats.installed - before) as usize;
    Ok(report)
  }

  /// Releases every chunk and disposes the engine. Final.
  pub fn shutdown(&mut self) -> Result<(), StreamError> {
    self.ensure_open()?;
    self.closed = true;
    self.pool.clear_all();
    self.pending.iter_mut().for_each(|p| *p = None);
    self.engine.dispose();
    info!("Streaming shut down");
    Ok(())
  }

  /// Loaded chunks, for rendering and debug views.
  pub fn iter_loaded(&self) -> impl Iterator<Item = ChunkView> + '_ {
    self.pool.iter_loaded().map(ChunkHandle::view)
  }

  /// Loaded handles with their node data.
  pub fn loaded_handles(&self) -> impl Iterator<Item = &ChunkHandle> + '_ {
    self.pool.iter_loaded()
  }

  /// Every handle in the pool, including unloaded ones.
  pub fn iter_slots(&self) -> impl Iterator<Item = (usize, &ChunkHandle)> + '_ {
    self.pool.iter()
  }

  /// State of one slot, or `None` if the index is out of range.
  pub fn slot_state(&self, index: usize) -> Option<SlotState> {
    let pending = self.pending.get(index)?;
    Some(match (pending, self.pool.get(index)) {
      (Some(_), _) => SlotState::Requested,
      (None, Some(handle)) => handle.state().into(),
      (None, None) => SlotState::Empty,
    })
  }

  pub fn current_center(&self) -> Vec3 {
    self.center
  }

  pub fn current_layout(&self) -> Layout {
    self.layout
  }

  pub fn epoch(&self) -> LayoutEpoch {
    self.epoch
  }

  pub fn policy(&self) -> &StreamingPolicy {
    &self.policy
  }

  pub fn capacity(&self) -> usize {
    self.pool.capacity()
  }

  /// Slots waiting for their current coordinate.
  pub fn pending_count(&self) -> usize {
    self.pending.iter().filter(|p| p.is_some()).count()
  }

  pub fn loaded_count(&self) -> usize {
    self.pool.loaded_count()
  }

  pub fn stats(&self) -> &StreamStats {
    &self.stats
  }

  /// Node buffers released since initialization.
  pub fn released_count(&self) -> u64 {
    self.pool.released_count()
  }

  /// Returns true after shutdown or an engine failure.
  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// The engine, for inspection.
  pub fn engine(&self) -> &E {
    &self.engine
  }

  /// The engine, for engine-specific controls such as reseeding before
  /// [`rebuild_all`](Self::rebuild_all).
  pub fn engine_mut(&mut self) -> &mut E {
    &mut self.engine
  }

  fn window(&self) -> ResidentWindow {
    ResidentWindow::around(self.center, self.layout.chunk_size, self.layout.view_distance)
  }

  fn request_all(&mut self) {
    let window = self.window();
    self.pending = (0..window.len())
      .map(|slot| Some(window.coord_for_slot(slot)))
      .collect();
  }

  fn relayout(&mut self, layout: Layout) -> Result<(), StreamError> {
    let epoch = self.epoch.next();
    let sent = self.engine.set_layout(layout, epoch);
    sent.map_err(|e| self.fail(e))?;
    self.epoch = epoch;
    self.layout = layout;
    self.stats.relayouts += 1;
    self.request_all();
    Ok(())
  }

  fn ensure_open(&self) -> Result<(), StreamError> {
    if self.closed {
      Err(StreamError::EngineUnavailable)
    } else {
      Ok(())
    }
  }

  fn fail(&mut self, err: StreamError) -> StreamError {
    if matches!(err, StreamError::EngineUnavailable) && !self.closed {
      warn!("Generation engine became unavailable, closing controller");
      self.closed = true;
    }
    err
  }

  fn accept(&mut self, completion: ChunkCompletion) {
    let target = completion.target();
    if let Err(reason) = self.check(&completion) {
      if reason == StaleReason::SlotMismatch {
        warn!(
          "Dropped completion for {:?}: engine reported slot {}, expected {}",
          target.coord,
          target.slot,
          slot_index_of(target.coord, self.layout.view_distance)
        );
      } else {
        debug!(
          "Dropped stale completion for {:?} in slot {}: {reason}",
          target.coord, target.slot
        );
      }
      self.stats.record_stale(reason);
      return;
    }

    trace!(
      "Installing {:?} in slot {} ({:?})",
      target.coord, target.slot, completion.build_time
    );
    self.pool.set(target.slot, ChunkHandle::from(completion));
    if let Some(pending) = self.pending.get_mut(target.slot) {
      *pending = None;
    }
    self.stats.installed += 1;
  }

  fn check(&self, c: &ChunkCompletion) -> Result<(), StaleReason> {
    if c.epoch != self.epoch {
      return Err(StaleReason::SupersededEpoch);
    }
    if !self.window().contains(c.coord) {
      return Err(StaleReason::OutsideWindow);
    }
    if c.slot != slot_index_of(c.coord, self.layout.view_distance) {
      return Err(StaleReason::SlotMismatch);
    }
    let size_matches = (c.size - self.layout.chunk_size).abs() <= self.policy.layout_tolerance;
    if !size_matches || c.divisions != self.layout.chunk_divisions || c.node_weights.is_empty() {
      return Err(StaleReason::LayoutMismatch);
    }
    Ok(())
  }
}

impl<E: GenerationEngine> Drop for StreamingController<E> {
  fn drop(&mut self) {
    self.pool.clear_all();
    self.engine.dispose();
  }
}
