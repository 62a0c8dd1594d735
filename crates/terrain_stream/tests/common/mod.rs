//! Scripted generation engine shared by the integration tests.
//!
//! Records every call the controller makes and only produces completions
//! that a test pushes, so ordering and staleness are fully controlled.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use glam::Vec3;
use terrain_stream::{
  ChunkCompletion, ChunkCoord, ChunkTarget, EngineBuilder, EngineInitError, GenerationEngine,
  Layout, LayoutEpoch, ResidentWindow, StreamError, StreamingController, slot_index_of,
};

/// One call received by [`ScriptedEngine`].
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCall {
  SetCenter(Vec3),
  SetLayout(Layout, LayoutEpoch),
  Unload(ChunkTarget),
  Dispose,
}

/// Engine that mirrors the controller's view and emits completions on demand.
pub struct ScriptedEngine {
  pub calls: Vec<EngineCall>,
  pub ready: VecDeque<ChunkCompletion>,
  pub center: Vec3,
  pub layout: Layout,
  pub epoch: LayoutEpoch,
  pub disposed: bool,
}

impl ScriptedEngine {
  fn new(center: Vec3, layout: Layout) -> Self {
    Self {
      calls: Vec::new(),
      ready: VecDeque::new(),
      center,
      layout,
      epoch: LayoutEpoch::default(),
      disposed: false,
    }
  }

  /// Queues a completion for every chunk of the engine's current window.
  pub fn complete_window(&mut self) {
    let window = self.window();
    for coord in window.iter() {
      let done = completion_for(coord, self.layout, self.epoch);
      self.ready.push_back(done);
    }
  }

  /// Queues one completion under the engine's current layout and epoch.
  pub fn complete(&mut self, coord: ChunkCoord) {
    let done = completion_for(coord, self.layout, self.epoch);
    self.ready.push_back(done);
  }

  pub fn window(&self) -> ResidentWindow {
    ResidentWindow::around(self.center, self.layout.chunk_size, self.layout.view_distance)
  }

  pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
    self.calls.iter().filter(|c| pred(c)).count()
  }

  pub fn unloads(&self) -> Vec<ChunkTarget> {
    self
      .calls
      .iter()
      .filter_map(|c| match c {
        EngineCall::Unload(target) => Some(*target),
        _ => None,
      })
      .collect()
  }

  fn check_alive(&self) -> Result<(), StreamError> {
    if self.disposed {
      Err(StreamError::EngineUnavailable)
    } else {
      Ok(())
    }
  }
}

impl GenerationEngine for ScriptedEngine {
  fn set_center(&mut self, center: Vec3) -> Result<(), StreamError> {
    self.check_alive()?;
    self.center = center;
    self.calls.push(EngineCall::SetCenter(center));
    Ok(())
  }

  fn set_layout(&mut self, layout: Layout, epoch: LayoutEpoch) -> Result<(), StreamError> {
    self.check_alive()?;
    self.layout = layout;
    self.epoch = epoch;
    self.calls.push(EngineCall::SetLayout(layout, epoch));
    Ok(())
  }

  fn poll_completed(&mut self) -> Result<Option<ChunkCompletion>, StreamError> {
    self.check_alive()?;
    Ok(self.ready.pop_front())
  }

  fn unload(&mut self, target: ChunkTarget) -> Result<(), StreamError> {
    self.check_alive()?;
    self.calls.push(EngineCall::Unload(target));
    Ok(())
  }

  fn dispose(&mut self) {
    if !self.disposed {
      self.disposed = true;
      self.calls.push(EngineCall::Dispose);
    }
  }
}

/// Builds a [`ScriptedEngine`].
pub struct Scripted;

impl EngineBuilder for Scripted {
  type Engine = ScriptedEngine;

  fn build(self, center: Vec3, layout: Layout) -> Result<ScriptedEngine, EngineInitError> {
    Ok(ScriptedEngine::new(center, layout))
  }
}

/// Builder whose engine never starts.
pub struct Refusing;

impl EngineBuilder for Refusing {
  type Engine = ScriptedEngine;

  fn build(self, _center: Vec3, _layout: Layout) -> Result<ScriptedEngine, EngineInitError> {
    Err(EngineInitError::ZeroWorkerThreads)
  }
}

/// A well-formed completion for `coord`.
pub fn completion_for(coord: ChunkCoord, layout: Layout, epoch: LayoutEpoch) -> ChunkCompletion {
  let n = layout.chunk_divisions as usize + 2;
  ChunkCompletion {
    slot: slot_index_of(coord, layout.view_distance),
    coord,
    epoch,
    world_position: coord.origin(layout.chunk_size),
    size: layout.chunk_size,
    divisions: layout.chunk_divisions,
    node_weights: vec![u16::MAX / 2; n * n * n].into_boxed_slice(),
    build_time: Duration::from_micros(250),
  }
}

/// The layout used by the worked scenarios: view distance 2, 32-unit chunks.
pub fn small_layout() -> Layout {
  Layout::new(2, 32.0, 16)
}

/// A controller at the origin with every chunk of its window loaded.
pub fn loaded_controller() -> StreamingController<ScriptedEngine> {
  let mut controller = StreamingController::initialize(Scripted, Vec3::ZERO, small_layout())
    .expect("scripted engine always starts");
  controller.engine_mut().complete_window();
  let drained = controller.pull_completed().expect("engine alive");
  assert_eq!(drained, 64);
  controller
}
