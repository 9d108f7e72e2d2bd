// tidemark/src/mirror.rs

//! Shared, lockable local copy of one remote table.

use crate::entity::Entity;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// The state a container owns: ordered items plus bookkeeping for idempotent folding.
#[derive(Debug, Clone)]
pub struct MirrorState<E> {
  pub loading: bool,
  pub items: Vec<E>,
  /// Ids of rows this mirror held and removed. Server ids are never reused,
  /// so late insert/update events for them are stale.
  pub tombstones: HashSet<Uuid>,
  // Insertion order of `tombstones`, oldest first; bounds the set.
  tombstone_order: VecDeque<Uuid>,
}

/// Most tombstones a mirror keeps; the oldest are forgotten first.
pub const MAX_TOMBSTONES: usize = 4096;

impl<E> Default for MirrorState<E> {
  fn default() -> Self {
    Self {
      loading: false,
      items: Vec::new(),
      tombstones: HashSet::new(),
      tombstone_order: VecDeque::new(),
    }
  }
}

impl<E: Entity> MirrorState<E> {
  pub fn position(&self, id: Uuid) -> Option<usize> {
    self.items.iter().position(|e| e.id() == id)
  }

  pub fn contains(&self, id: Uuid) -> bool {
    self.position(id).is_some()
  }

  /// Replaces the whole collection with a fresh snapshot.
  pub fn replace_all(&mut self, items: Vec<E>) {
    self.items = items;
    self.tombstones.clear();
    self.tombstone_order.clear();
  }

  /// Inserts at the front unless the id is already present or tombstoned. Returns whether it applied.
  pub fn prepend_if_absent(&mut self, item: E) -> bool {
    let id = item.id();
    if self.tombstones.contains(&id) || self.contains(id) {
      return false;
    }
    self.items.insert(0, item);
    true
  }

  /// Replaces the entry with the same id. Absent ids are dropped.
  pub fn replace_by_id(&mut self, item: E) -> bool {
    match self.position(item.id()) {
      Some(idx) => {
        self.items[idx] = item;
        true
      }
      None => false,
    }
  }

  /// Replace when present, otherwise prepend (unless tombstoned).
  pub fn upsert_local(&mut self, item: E) -> bool {
    let id = item.id();
    if self.contains(id) {
      self.replace_by_id(item)
    } else {
      self.prepend_if_absent(item)
    }
  }

  /// Removes the entry with `id` and tombstones it. Ids never held are not
  /// recorded, so deletes of rows outside this mirror leave no trace.
  pub fn remove_by_id(&mut self, id: Uuid) -> bool {
    match self.position(id) {
      Some(idx) => {
        self.items.remove(idx);
        self.tombstone(id);
        true
      }
      None => false,
    }
  }

  fn tombstone(&mut self, id: Uuid) {
    if !self.tombstones.insert(id) {
      return;
    }
    self.tombstone_order.push_back(id);
    while self.tombstone_order.len() > MAX_TOMBSTONES {
      if let Some(oldest) = self.tombstone_order.pop_front() {
        self.tombstones.remove(&oldest);
      }
    }
  }
}

/// Shared ownership of a [`MirrorState`] behind a `parking_lot::RwLock`,
/// plus a revision counter that ticks after every applied change.
///
/// IMPORTANT: guards are blocking and MUST NOT be held across `.await` points.
#[derive(Debug)]
pub struct Mirror<E> {
  state: Arc<RwLock<MirrorState<E>>>,
  revision: Arc<watch::Sender<u64>>,
}

impl<E: Entity> Mirror<E> {
  pub fn new() -> Self {
    Mirror {
      state: Arc::new(RwLock::new(MirrorState::default())),
      revision: Arc::new(watch::channel(0).0),
    }
  }

  pub fn read(&self) -> RwLockReadGuard<'_, MirrorState<E>> {
    self.state.read()
  }

  /// Write access without a revision bump; prefer [`Mirror::apply`].
  pub fn write(&self) -> RwLockWriteGuard<'_, MirrorState<E>> {
    self.state.write()
  }

  /// Runs `f` under the write lock and bumps the revision when it reports a change.
  pub fn apply<R>(&self, f: impl FnOnce(&mut MirrorState<E>) -> R) -> R
  where
    R: Changed,
  {
    let result = {
      let mut guard = self.state.write();
      f(&mut guard)
    };
    if result.changed() {
      self.touch();
    }
    result
  }

  pub fn touch(&self) {
    self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
  }

  /// Receiver that wakes whenever the collection (or the loading flag) changes.
  pub fn watch(&self) -> watch::Receiver<u64> {
    self.revision.subscribe()
  }

  pub fn revision(&self) -> u64 {
    *self.revision.borrow()
  }

  /// Read guard narrowed to the item slice.
  pub fn items(&self) -> MappedRwLockReadGuard<'_, [E]> {
    RwLockReadGuard::map(self.read(), |s| s.items.as_slice())
  }

  pub fn snapshot(&self) -> Vec<E> {
    self.read().items.clone()
  }

  pub fn is_loading(&self) -> bool {
    self.read().loading
  }
}

/// Whether a mirror mutation actually changed anything.
pub trait Changed {
  fn changed(&self) -> bool;
}

impl Changed for bool {
  fn changed(&self) -> bool {
    *self
  }
}

impl Changed for () {
  fn changed(&self) -> bool {
    true
  }
}

impl<E> Clone for Mirror<E> {
  fn clone(&self) -> Self {
    Mirror {
      state: Arc::clone(&self.state),
      revision: Arc::clone(&self.revision),
    }
  }
}

impl<E: Entity> Default for Mirror<E> {
  fn default() -> Self {
    Self::new()
  }
}
