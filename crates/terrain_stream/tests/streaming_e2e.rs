//! E2E tests for the streaming controller against a scripted engine.
//!
//! Covers the load/unload policy:
//! 1. Initial fill of a 64-slot pool
//! 2. Recentering with the half-chunk unload margin
//! 3. Hysteresis and idempotence of center updates
//! 4. Layout changes, rebuilds and shutdown

mod common;

use std::collections::HashSet;

use common::{EngineCall, Refusing, Scripted, loaded_controller, small_layout};
use glam::Vec3;
use rand::Rng;
use terrain_stream::{
  CenterUpdate, ChunkLifecycle, EngineInitError, Layout, LayoutEpoch, LayoutError,
  ResidentWindow, SlotState, StreamError, StreamingController,
};

#[test]
fn initial_window_loads_all_64_chunks() {
  let controller = loaded_controller();

  assert_eq!(controller.capacity(), 64);
  assert_eq!(controller.loaded_count(), 64);
  assert_eq!(controller.pending_count(), 0);

  let expected: HashSet<[i32; 3]> = ResidentWindow::around(Vec3::ZERO, 32.0, 2)
    .iter()
    .map(|c| {
      let p = c.origin(32.0);
      [p.x as i32, p.y as i32, p.z as i32]
    })
    .collect();
  let loaded: HashSet<[i32; 3]> = controller
    .iter_loaded()
    .map(|v| [v.position.x as i32, v.position.y as i32, v.position.z as i32])
    .collect();
  assert_eq!(loaded, expected);
  assert!(controller.iter_loaded().all(|v| v.size == 32.0));
}

#[test]
fn recenter_unloads_chunks_beyond_margin() {
  let mut controller = loaded_controller();

  let update = controller.set_center(Vec3::new(40.0, 0.0, 0.0)).unwrap();
  assert_eq!(update, CenterUpdate::Recentered { unloaded: 16 });
  assert_eq!(controller.loaded_count(), 48);

  // Only the x = -2 layer (centers at x = -48, 88 units away) exceeds 80.
  for view in controller.iter_loaded() {
    assert!(view.coord.x >= -1, "{:?} should have been unloaded", view.coord);
  }
  let unloaded: Vec<_> = controller
    .iter_slots()
    .filter(|(_, h)| h.state() == ChunkLifecycle::Unloaded)
    .map(|(_, h)| h.coord())
    .collect();
  assert_eq!(unloaded.len(), 16);
  assert!(unloaded.iter().all(|c| c.x == -2));

  // Unloads reach the engine before the new center does.
  let calls = &controller.engine().calls;
  let center_at = calls
    .iter()
    .position(|c| matches!(c, EngineCall::SetCenter(_)))
    .unwrap();
  assert_eq!(center_at, 16);
  assert!(calls[..16].iter().all(|c| matches!(c, EngineCall::Unload(_))));
  assert_eq!(controller.current_center(), Vec3::new(40.0, 0.0, 0.0));
}

#[test]
fn unloaded_slots_are_requested_for_the_new_window() {
  let mut controller = loaded_controller();
  controller.set_center(Vec3::new(40.0, 0.0, 0.0)).unwrap();

  // Anchor moved from x = 0 to x = 1: the x = -2 layer becomes x = 2.
  assert_eq!(controller.pending_count(), 16);
  let released = controller.engine().unloads();
  for target in &released {
    assert_eq!(controller.slot_state(target.slot), Some(SlotState::Requested));
  }

  controller.engine_mut().complete_window();
  controller.pull_completed().unwrap();
  assert_eq!(controller.loaded_count(), 64);
  assert_eq!(controller.pending_count(), 0);
  assert_eq!(controller.stats().installed, 128);
}

#[test]
fn repeated_center_is_ignored() {
  let mut controller = loaded_controller();
  let target = Vec3::new(40.0, 0.0, 0.0);

  controller.set_center(target).unwrap();
  let calls = controller.engine().calls.len();
  let released = controller.released_count();

  assert_eq!(controller.set_center(target).unwrap(), CenterUpdate::Ignored);
  assert_eq!(controller.engine().calls.len(), calls);
  assert_eq!(controller.released_count(), released);
  assert_eq!(controller.loaded_count(), 48);
}

#[test]
fn sub_unit_jitter_is_ignored() {
  let mut controller = loaded_controller();
  let mut rng = rand::thread_rng();

  for _ in 0..100 {
    let dir = Vec3::new(
      rng.gen_range(-1.0..1.0),
      rng.gen_range(-1.0..1.0),
      rng.gen_range(-1.0..1.0),
    )
    .normalize_or(Vec3::X);
    let jitter = dir * rng.gen_range(0.0..0.99);
    assert_eq!(controller.set_center(jitter).unwrap(), CenterUpdate::Ignored);
  }
  assert!(controller.engine().calls.is_empty());
  assert_eq!(controller.current_center(), Vec3::ZERO);

  let update = controller.set_center(Vec3::new(0.0, 1.0, 0.0)).unwrap();
  assert_eq!(update, CenterUpdate::Recentered { unloaded: 0 });
  assert_eq!(
    controller.engine().calls,
    vec![EngineCall::SetCenter(Vec3::new(0.0, 1.0, 0.0))]
  );
}

#[test]
fn unload_margin_boundary() {
  // Chunks at x = -2 have centers at x = -48; unload distance is 80.
  let mut near = loaded_controller();
  near.set_center(Vec3::new(31.0, 0.0, 0.0)).unwrap();
  assert_eq!(near.loaded_count(), 64, "79 units away stays loaded");

  let mut far = loaded_controller();
  far.set_center(Vec3::new(33.0, 0.0, 0.0)).unwrap();
  assert_eq!(far.loaded_count(), 48, "81 units away is unloaded");
}

#[test]
fn retained_chunks_unload_once_they_drift_past_the_margin() {
  let mut controller = loaded_controller();
  controller.set_center(Vec3::new(31.0, 0.0, 0.0)).unwrap();
  assert_eq!(controller.loaded_count(), 64);

  controller.set_center(Vec3::new(34.0, 0.0, 0.0)).unwrap();
  assert_eq!(controller.loaded_count(), 48);
  assert_eq!(controller.stats().unloaded, 16);
}

#[test]
fn layout_change_releases_every_chunk() {
  let mut controller = loaded_controller();
  let layout = Layout::new(3, 32.0, 16);

  assert!(controller.set_layout(layout).unwrap());
  assert_eq!(controller.iter_loaded().count(), 0);
  assert_eq!(controller.iter_slots().count(), 0);
  assert_eq!(controller.released_count(), 64);
  assert_eq!(controller.capacity(), 216);
  assert_eq!(controller.pending_count(), 216);
  assert_eq!(controller.current_layout(), layout);
  assert_eq!(controller.epoch(), LayoutEpoch(1));
  assert_eq!(
    controller.engine().calls.last(),
    Some(&EngineCall::SetLayout(layout, LayoutEpoch(1)))
  );

  controller.engine_mut().complete_window();
  controller.pull_completed().unwrap();
  assert_eq!(controller.loaded_count(), 216);
}

#[test]
fn unchanged_layout_is_a_noop() {
  let mut controller = loaded_controller();
  let same = Layout::new(2, 32.0004, 16);

  assert!(!controller.set_layout(same).unwrap());
  assert!(controller.engine().calls.is_empty());
  assert_eq!(controller.loaded_count(), 64);
  assert_eq!(controller.epoch(), LayoutEpoch(0));
}

#[test]
fn shrinking_layout_keeps_controller_consistent() {
  let mut controller = loaded_controller();
  controller.set_layout(Layout::new(1, 16.0, 8)).unwrap();
  assert_eq!(controller.capacity(), 8);

  controller.engine_mut().complete_window();
  assert_eq!(controller.pull_completed().unwrap(), 8);
  assert_eq!(controller.loaded_count(), 8);
  assert!(controller.iter_loaded().all(|v| v.size == 16.0));
}

#[test]
fn invalid_layout_is_rejected_without_engine_call() {
  let mut controller = loaded_controller();

  let err = controller.set_layout(Layout::new(0, 32.0, 16)).unwrap_err();
  assert!(matches!(
    err,
    StreamError::InvalidLayout(LayoutError::ZeroViewDistance)
  ));
  let err = controller.set_layout(Layout::new(2, -1.0, 16)).unwrap_err();
  assert!(matches!(
    err,
    StreamError::InvalidLayout(LayoutError::NonPositiveChunkSize(_))
  ));
  let err = controller.set_layout(Layout::new(2, 32.0, 0)).unwrap_err();
  assert!(matches!(
    err,
    StreamError::InvalidLayout(LayoutError::ZeroDivisions)
  ));

  assert!(controller.engine().calls.is_empty());
  assert_eq!(controller.loaded_count(), 64);
  assert!(!controller.is_closed());
}

#[test]
fn initialize_failures_leave_nothing_behind() {
  let invalid = StreamingController::initialize(Scripted, Vec3::ZERO, Layout::new(0, 32.0, 16));
  assert!(matches!(
    invalid,
    Err(StreamError::InvalidLayout(LayoutError::ZeroViewDistance))
  ));

  let refused = StreamingController::initialize(Refusing, Vec3::ZERO, small_layout());
  assert!(matches!(
    refused,
    Err(StreamError::EngineInit(EngineInitError::ZeroWorkerThreads))
  ));
}

#[test]
fn rebuild_all_rerequests_under_a_new_epoch() {
  let mut controller = loaded_controller();

  controller.rebuild_all().unwrap();
  assert_eq!(controller.loaded_count(), 0);
  assert_eq!(controller.pending_count(), 64);
  assert_eq!(controller.epoch(), LayoutEpoch(1));
  assert_eq!(
    controller.engine().calls,
    vec![EngineCall::SetLayout(small_layout(), LayoutEpoch(1))]
  );

  controller.engine_mut().complete_window();
  controller.pull_completed().unwrap();
  assert_eq!(controller.loaded_count(), 64);
  assert!(
    controller
      .loaded_handles()
      .all(|h| h.epoch() == LayoutEpoch(1))
  );
}

#[test]
fn shutdown_is_final() {
  let mut controller = loaded_controller();

  controller.shutdown().unwrap();
  assert!(controller.is_closed());
  assert_eq!(controller.loaded_count(), 0);
  assert_eq!(controller.released_count(), 64);
  assert_eq!(controller.engine().calls, vec![EngineCall::Dispose]);
  assert_eq!(controller.slot_state(0), Some(SlotState::Empty));

  assert!(matches!(
    controller.shutdown(),
    Err(StreamError::EngineUnavailable)
  ));
  assert!(matches!(
    controller.set_center(Vec3::splat(500.0)),
    Err(StreamError::EngineUnavailable)
  ));
  assert!(matches!(
    controller.set_layout(Layout::new(3, 8.0, 4)),
    Err(StreamError::EngineUnavailable)
  ));
  assert!(matches!(
    controller.pull_completed(),
    Err(StreamError::EngineUnavailable)
  ));
  assert!(matches!(
    controller.rebuild_all(),
    Err(StreamError::EngineUnavailable)
  ));
  assert_eq!(controller.engine().calls, vec![EngineCall::Dispose]);
}

#[test]
fn tick_recenters_then_drains() {
  let mut controller =
    StreamingController::initialize(Scripted, Vec3::ZERO, small_layout()).unwrap();
  controller.engine_mut().complete_window();

  let report = controller.tick(Vec3::ZERO).unwrap();
  assert!(!report.recentered);
  assert_eq!(report.installed, 8);

  let report = controller.tick(Vec3::new(200.0, 0.0, 0.0)).unwrap();
  assert!(report.recentered);
  assert_eq!(report.unloaded, 8);
  // Remaining queued chunks now lie outside the window.
  assert_eq!(report.installed, 0);
  assert_eq!(controller.stats().stale_outside_window, 8);
}
