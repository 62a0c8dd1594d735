//! In-process generation engine.
//!
//! A scheduler thread owns the slot table and hands jobs to a rayon pool.
//! The handle talks to it through two unbounded `async-channel`s:
//! - commands: handle → scheduler
//! - completions: workers → handle (polled with `try_recv`)

mod scheduler;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use async_channel::{Receiver, Sender, TryRecvError};
use glam::Vec3;
use log::{debug, warn};

use self::scheduler::{Command, Scheduler};
use super::sampler::NodeSampler;
use super::{ChunkCompletion, ChunkTarget, EngineBuilder, GenerationEngine, LayoutEpoch};
use crate::config::StreamingConfig;
use crate::error::{EngineInitError, StreamError};
use crate::layout::Layout;

/// Reference engine generating chunks with a [`NodeSampler`] on a local
/// worker pool.
pub struct LocalEngine {
  cmd_tx: Sender<Command>,
  done_rx: Receiver<ChunkCompletion>,
  stop: Arc<AtomicBool>,
  scheduler: Option<JoinHandle<()>>,
}

impl LocalEngine {
  /// Returns a builder for use with
  /// [`StreamingController::initialize`](crate::StreamingController::initialize).
  pub fn builder(sampler: impl NodeSampler + 'static, worker_threads: usize) -> LocalEngineBuilder {
    LocalEngineBuilder {
      sampler: Arc::new(sampler),
      worker_threads,
    }
  }

  /// Starts the worker pool and the scheduler thread.
  ///
  /// Generation starts immediately for every slot of `layout` around
  /// `center`, at [`LayoutEpoch::default`].
  pub fn create(
    center: Vec3,
    layout: Layout,
    sampler: Arc<dyn NodeSampler>,
    worker_threads: usize,
  ) -> Result<Self, EngineInitError> {
    if layout.view_distance == 0 {
      return Err(EngineInitError::ZeroViewDistance);
    }
    if !(layout.chunk_size.is_finite() && layout.chunk_size > 0.0) {
      return Err(EngineInitError::NonPositiveChunkSize(layout.chunk_size));
    }
    if worker_threads == 0 {
      return Err(EngineInitError::ZeroWorkerThreads);
    }

    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(worker_threads)
      .thread_name(|i| format!("chunk-gen-{i}"))
      .build()
      .map_err(|e| EngineInitError::ThreadPool(e.to_string()))?;

    let (cmd_tx, cmd_rx) = async_channel::unbounded::<Command>();
    let (done_tx, done_rx) = async_channel::unbounded::<ChunkCompletion>();
    let stop = Arc::new(AtomicBool::new(false));

    let scheduler = Scheduler::new(center, layout, sampler, Arc::clone(&stop), cmd_rx, done_tx);
    let handle = thread::Builder::new()
      .name("chunk-scheduler".into())
      .spawn(move || scheduler.run(&pool))
      .map_err(EngineInitError::Spawn)?;

    debug!(
      "Local engine started: {} workers, {} slots",
      worker_threads,
      layout.capacity()
    );

    Ok(Self {
      cmd_tx,
      done_rx,
      stop,
      scheduler: Some(handle),
    })
  }

  /// Returns true once [`dispose`](GenerationEngine::dispose) has run.
  pub fn is_disposed(&self) -> bool {
    self.scheduler.is_none()
  }

  fn send(&self, cmd: Command) -> Result<(), StreamError> {
    if self.is_disposed() {
      return Err(StreamError::EngineUnavailable);
    }
    self.cmd_tx.try_send(cmd).map_err(|e| {
      warn!("Chunk scheduler unreachable: {e}");
      StreamError::EngineUnavailable
    })
  }
}

impl GenerationEngine for LocalEngine {
  fn set_center(&mut self, center: Vec3) -> Result<(), StreamError> {
    self.send(Command::SetCenter(center))
  }

  fn set_layout(&mut self, layout: Layout, epoch: LayoutEpoch) -> Result<(), StreamError> {
    self.send(Command::SetLayout { layout, epoch })
  }

  fn poll_completed(&mut self) -> Result<Option<ChunkCompletion>, StreamError> {
    if self.is_disposed() {
      return Err(StreamError::EngineUnavailable);
    }
    match self.done_rx.try_recv() {
      Ok(completion) => Ok(Some(completion)),
      Err(TryRecvError::Empty) => Ok(None),
      Err(TryRecvError::Closed) => Err(StreamError::EngineUnavailable),
    }
  }

  fn unload(&mut self, target: ChunkTarget) -> Result<(), StreamError> {
    self.send(Command::Unload(target))
  }

  fn dispose(&mut self) {
    let Some(handle) = self.scheduler.take() else {
      return;
    };
    self.stop.store(true, Ordering::Relaxed);
    let _ = self.cmd_tx.try_send(Command::Shutdown);
    if handle.join().is_err() {
      warn!("Chunk scheduler panicked");
    }
    self.cmd_tx.close();
    self.done_rx.close();
    debug!("Local engine disposed");
  }
}

impl Drop for LocalEngine {
  fn drop(&mut self) {
    self.dispose();
  }
}

/// [`EngineBuilder`] for [`LocalEngine`].
#[derive(Clone)]
pub struct LocalEngineBuilder {
  sampler: Arc<dyn NodeSampler>,
  worker_threads: usize,
}

impl LocalEngineBuilder {
  /// Uses the sampler and worker count from a configuration.
  pub fn from_config(config: &StreamingConfig) -> Self {
    Self {
      sampler: Arc::from(config.sampler.build()),
      worker_threads: config.worker_threads,
    }
  }
}

impl EngineBuilder for LocalEngineBuilder {
  type Engine = LocalEngine;

  fn build(self, center: Vec3, layout: Layout) -> Result<LocalEngine, EngineInitError> {
    LocalEngine::create(center, layout, self.sampler, self.worker_threads)
  }
}
