//! Streaming counters.

use std::fmt;

/// Why a completion was dropped instead of installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleReason {
  /// Generated under a layout epoch that has since been replaced.
  SupersededEpoch,
  /// The chunk is no longer inside the resident window.
  OutsideWindow,
  /// The reported slot is not where the chunk's coordinate maps.
  SlotMismatch,
  /// Size, divisions or payload disagree with the current layout.
  LayoutMismatch,
}

impl fmt::Display for StaleReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = match self {
      Self::SupersededEpoch => "superseded layout epoch",
      Self::OutsideWindow => "outside resident window",
      Self::SlotMismatch => "slot mismatch",
      Self::LayoutMismatch => "layout mismatch",
    };
    f.write_str(text)
  }
}

/// Cumulative controller counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
  /// Completions written into the pool.
  pub installed: u64,
  /// Handles unloaded by the distance policy.
  pub unloaded: u64,
  /// Center updates forwarded to the engine.
  pub recenters: u64,
  /// Layout changes and explicit rebuilds.
  pub relayouts: u64,
  pub stale_epoch: u64,
  pub stale_outside_window: u64,
  pub stale_slot_mismatch: u64,
  pub stale_layout_mismatch: u64,
}

impl StreamStats {
  pub(crate) fn record_stale(&mut self, reason: StaleReason) {
    match reason {
      StaleReason::SupersededEpoch => self.stale_epoch += 1,
      StaleReason::OutsideWindow => self.stale_outside_window += 1,
      StaleReason::SlotMismatch => self.stale_slot_mismatch += 1,
      StaleReason::LayoutMismatch => self.stale_layout_mismatch += 1,
    }
  }

  /// Total completions dropped as stale.
  pub fn stale_total(&self) -> u64 {
    self.stale_epoch
      + self.stale_outside_window
      + self.stale_slot_mismatch
      + self.stale_layout_mismatch
  }
}
