//! Scheduler thread for the local engine.
//!
//! Keeps the same slot table as the controller and feeds pending slots,
//! nearest first, to the rayon pool through `par_bridge`. Commands are
//! drained between dispatches so center and layout churn is seen promptly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_channel::{Receiver, Sender, TryRecvError};
use glam::Vec3;
use log::{debug, trace};
use rayon::ThreadPool;
use rayon::iter::{ParallelBridge, ParallelIterator};
// WASM compat: std::time::Instant panics on wasm32
use web_time::Instant;

use crate::coords::{ChunkCoord, ResidentWindow, axis_distance, slot_index_of};
use crate::engine::sampler::{NodeSampler, generate_nodes_cancellable};
use crate::engine::{ChunkCompletion, ChunkTarget, LayoutEpoch};
use crate::layout::Layout;

/// Messages from the engine handle to the scheduler.
#[derive(Debug)]
pub(super) enum Command {
  SetCenter(Vec3),
  SetLayout { layout: Layout, epoch: LayoutEpoch },
  Unload(ChunkTarget),
  Shutdown,
}

/// Generation state of one slot.
enum SlotJob {
  /// Waiting for a worker.
  Pending,
  /// Handed to a worker; the token cancels it.
  Dispatched(Arc<AtomicBool>),
  /// Unloaded by the controller; regenerated only when the slot's
  /// coordinate changes.
  Idle,
}

struct Slot {
  coord: ChunkCoord,
  job: SlotJob,
}

impl Slot {
  fn cancel(&mut self) {
    if let SlotJob::Dispatched(token) = &self.job {
      token.store(true, Ordering::Relaxed);
    }
  }
}

/// One chunk to generate.
pub(super) struct Job {
  slot: usize,
  coord: ChunkCoord,
  epoch: LayoutEpoch,
  layout: Layout,
  cancel: Arc<AtomicBool>,
  sampler: Arc<dyn NodeSampler>,
  done_tx: Sender<ChunkCompletion>,
}

pub(super) struct Scheduler {
  cmd_rx: Receiver<Command>,
  done_tx: Sender<ChunkCompletion>,
  sampler: Arc<dyn NodeSampler>,
  stop: Arc<AtomicBool>,
  center: Vec3,
  layout: Layout,
  epoch: LayoutEpoch,
  slots: Vec<Slot>,
  /// Pending slots, farthest first so `pop` yields the nearest.
  queue: Vec<usize>,
  shutdown: bool,
}

impl Scheduler {
  pub(super) fn new(
    center: Vec3,
    layout: Layout,
    sampler: Arc<dyn NodeSampler>,
    stop: Arc<AtomicBool>,
    cmd_rx: Receiver<Command>,
    done_tx: Sender<ChunkCompletion>,
  ) -> Self {
    let mut scheduler = Self {
      cmd_rx,
      done_tx,
      sampler,
      stop,
      center,
      layout,
      epoch: LayoutEpoch::default(),
      slots: Vec::new(),
      queue: Vec::new(),
      shutdown: false,
    };
    scheduler.reset_slots();
    scheduler
  }

  /// Runs until shutdown or until the engine handle is dropped.
  pub(super) fn run(mut self, pool: &ThreadPool) {
    loop {
      pool.install(|| {
        PendingJobs {
          scheduler: &mut self,
        }
        .par_bridge()
        .for_each(run_job)
      });

      if self.shutdown {
        break;
      }

      // Idle: every slot is dispatched or unloaded.
      match self.cmd_rx.recv_blocking() {
        Ok(cmd) => self.apply(cmd),
        Err(_) => break,
      }
      if self.shutdown {
        break;
      }
    }
    self.cancel_all();
    debug!("Chunk scheduler stopped");
  }

  fn apply(&mut self, cmd: Command) {
    match cmd {
      Command::SetCenter(center) => {
        self.center = center;
        self.retarget();
      }
      Command::SetLayout { layout, epoch } => {
        self.layout = layout;
        self.epoch = epoch;
        self.reset_slots();
      }
      Command::Unload(target) => self.unload(target),
      Command::Shutdown => self.begin_shutdown(),
    }
  }

  fn begin_shutdown(&mut self) {
    self.shutdown = true;
    self.cancel_all();
  }

  fn window(&self) -> ResidentWindow {
    ResidentWindow::around(self.center, self.layout.chunk_size, self.layout.view_distance)
  }

  /// Drops all jobs and queues every slot of the current layout.
  fn reset_slots(&mut self) {
    self.cancel_all();
    let window = self.window();
    self.slots = (0..window.len())
      .map(|slot| Slot {
        coord: window.coord_for_slot(slot),
        job: SlotJob::Pending,
      })
      .collect();
    self.rebuild_queue();
  }

  /// Reassigns slots whose coordinate left the window.
  fn retarget(&mut self) {
    let window = self.window();
    let mut moved = 0;
    for (index, slot) in self.slots.iter_mut().enumerate() {
      let coord = window.coord_for_slot(index);
      if slot.coord != coord {
        slot.cancel();
        slot.coord = coord;
        slot.job = SlotJob::Pending;
        moved += 1;
      }
    }
    trace!("Recentered scheduler, {moved} slots reassigned");
    self.rebuild_queue();
  }

  fn unload(&mut self, target: ChunkTarget) {
    match self.slots.get_mut(target.slot) {
      Some(slot) if slot.coord == target.coord => {
        slot.cancel();
        slot.job = SlotJob::Idle;
      }
      _ => debug!(
        "Unload hint for {:?} in slot {} matches no job",
        target.coord, target.slot
      ),
    }
  }

  fn cancel_all(&mut self) {
    for slot in &mut self.slots {
      slot.cancel();
    }
  }

  fn rebuild_queue(&mut self) {
    let size = self.layout.chunk_size;
    let center = self.center;
    let slots = &self.slots;
    self.queue = (0..slots.len())
      .filter(|&i| matches!(slots[i].job, SlotJob::Pending))
      .collect();
    self.queue.sort_by(|&a, &b| {
      let da = slots[a].coord.center(size).distance_squared(center);
      let db = slots[b].coord.center(size).distance_squared(center);
      db.total_cmp(&da)
    });
  }

  fn drain_commands(&mut self) {
    loop {
      match self.cmd_rx.try_recv() {
        Ok(cmd) => self.apply(cmd),
        Err(TryRecvError::Empty) => break,
        Err(TryRecvError::Closed) => {
          self.begin_shutdown();
          break;
        }
      }
      if self.shutdown {
        break;
      }
    }
  }

  fn next_job(&mut self) -> Option<Job> {
    while let Some(index) = self.queue.pop() {
      let slot = &mut self.slots[index];
      if !matches!(slot.job, SlotJob::Pending) {
        continue;
      }
      debug_assert_eq!(slot_index_of(slot.coord, self.layout.view_distance), index);
      let cancel = Arc::new(AtomicBool::new(false));
      slot.job = SlotJob::Dispatched(Arc::clone(&cancel));
      trace!(
        "Dispatching {:?} to slot {index}, {:.1} from center",
        slot.coord,
        axis_distance(slot.coord.center(self.layout.chunk_size), self.center)
      );
      return Some(Job {
        slot: index,
        coord: slot.coord,
        epoch: self.epoch,
        layout: self.layout,
        cancel,
        sampler: Arc::clone(&self.sampler),
        done_tx: self.done_tx.clone(),
      });
    }
    None
  }
}

/// Pulls jobs for the worker pool until nothing is pending.
struct PendingJobs<'a> {
  scheduler: &'a mut Scheduler,
}

impl Iterator for PendingJobs<'_> {
  type Item = Job;

  fn next(&mut self) -> Option<Job> {
    if !self.scheduler.shutdown && self.scheduler.stop.load(Ordering::Relaxed) {
      self.scheduler.begin_shutdown();
    }
    if !self.scheduler.shutdown {
      self.scheduler.drain_commands();
    }
    if self.scheduler.shutdown {
      return None;
    }
    self.scheduler.next_job()
  }
}

#[cfg_attr(feature = "tracy", tracing::instrument(skip_all))]
fn run_job(job: Job) {
  if job.cancel.load(Ordering::Relaxed) {
    return;
  }
  let started = Instant::now();
  let size = job.layout.chunk_size;
  let divisions = job.layout.chunk_divisions;
  let world_position = job.coord.origin(size);

  let Some(node_weights) =
    generate_nodes_cancellable(world_position, size, divisions, &*job.sampler, &job.cancel)
  else {
    trace!("Cancelled {:?} in slot {}", job.coord, job.slot);
    return;
  };

  let completion = ChunkCompletion {
    slot: job.slot,
    coord: job.coord,
    epoch: job.epoch,
    world_position,
    size,
    divisions,
    node_weights,
    build_time: started.elapsed(),
  };
  // Closed only once the engine handle is gone.
  let _ = job.done_tx.try_send(completion);
}
