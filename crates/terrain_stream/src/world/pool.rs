//! Chunk pool for managing slot storage.
//!
//! A flat arena of optional handles addressed by slot index. Indices are
//! stable across resizes so engine-side slot references stay valid.

use super::slot::{ChunkHandle, ChunkLifecycle};

/// Fixed-capacity storage of chunk handles.
///
/// Every path that removes or replaces a handle releases its node data first.
#[derive(Debug, Default)]
pub struct ChunkPool {
  slots: Vec<Option<ChunkHandle>>,
  released: u64,
}

impl ChunkPool {
  /// Creates a pool of empty slots.
  pub fn new(capacity: usize) -> Self {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || None);
    Self { slots, released: 0 }
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  /// Grows with empty slots or drops slots from the end.
  ///
  /// Surviving slots keep their indices.
  pub fn resize(&mut self, new_capacity: usize) {
    while self.slots.len() > new_capacity {
      if let Some(mut handle) = self.slots.pop().flatten() {
        self.release(&mut handle);
      }
    }
    self.slots.resize_with(new_capacity, || None);
  }

  /// Gets the handle in a slot.
  #[inline]
  pub fn get(&self, index: usize) -> Option<&ChunkHandle> {
    self.slots.get(index)?.as_ref()
  }

  /// Gets the handle in a slot mutably.
  #[inline]
  pub fn get_mut(&mut self, index: usize) -> Option<&mut ChunkHandle> {
    self.slots.get_mut(index)?.as_mut()
  }

  /// Stores a handle, releasing whatever the slot held.
  ///
  /// Returns false and drops `handle` if `index` is out of range.
  pub fn set(&mut self, index: usize, handle: ChunkHandle) -> bool {
    let Some(entry) = self.slots.get_mut(index) else {
      return false;
    };
    let previous = entry.replace(handle);
    if let Some(mut previous) = previous {
      self.release(&mut previous);
    }
    true
  }

  /// Releases and removes the handle in a slot.
  pub fn clear(&mut self, index: usize) {
    if let Some(mut handle) = self.slots.get_mut(index).and_then(Option::take) {
      self.release(&mut handle);
    }
  }

  /// Releases and removes every handle.
  pub fn clear_all(&mut self) {
    for index in 0..self.slots.len() {
      self.clear(index);
    }
  }

  /// Releases a slot's node data but keeps the handle for diagnostics.
  ///
  /// Returns true if the slot held a loaded handle.
  pub fn mark_unloaded(&mut self, index: usize) -> bool {
    let released = match self.get_mut(index) {
      Some(handle) => handle.release(),
      None => false,
    };
    if released {
      self.released += 1;
    }
    released
  }

  /// Iterates every occupied slot, loaded or not.
  pub fn iter(&self) -> impl Iterator<Item = (usize, &ChunkHandle)> + '_ {
    self
      .slots
      .iter()
      .enumerate()
      .filter_map(|(i, slot)| slot.as_ref().map(|h| (i, h)))
  }

  /// Iterates loaded handles in slot order.
  pub fn iter_loaded(&self) -> impl Iterator<Item = &ChunkHandle> + '_ {
    self
      .slots
      .iter()
      .flatten()
      .filter(|h| h.state() == ChunkLifecycle::Loaded)
  }

  pub fn loaded_count(&self) -> usize {
    self.iter_loaded().count()
  }

  /// Number of node buffers released since creation.
  pub fn released_count(&self) -> u64 {
    self.released
  }

  fn release(&mut self, handle: &mut ChunkHandle) {
    if handle.release() {
      self.released += 1;
    }
  }
}
