// tidemark/src/container.rs

//! `Container<E>`: an in-memory mirror of one remote table plus its CRUD operations.
//!
//! One generic implementation serves every entity; what differs per table is
//! the `Entity` impl (table name, snapshot order) and the [`Scope`] chosen when
//! the container is built (a customer's own rows vs. every row for an admin).
//!
//! Every successful write patches the mirror immediately; the change-feed echo
//! of the same write is then a no-op because folding is idempotent.

use crate::bridge::{self, BridgeHandle};
use crate::entity::{to_row, Entity};
use crate::error::{SyncError, SyncResult};
use crate::mirror::Mirror;
use crate::store::query::{Filter, Query, Row, Upsert};
use crate::store::RemoteStore;

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Which rows of the table a container mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
  Global,
  /// Only rows whose `column` equals `user_id`, on both the snapshot and the feed.
  Owner { column: &'static str, user_id: Uuid },
}

impl Scope {
  pub fn owner(user_id: Uuid) -> Self {
    Scope::Owner {
      column: "user_id",
      user_id,
    }
  }

  pub fn filter(&self) -> Filter {
    match self {
      Scope::Global => Filter::all(),
      Scope::Owner { column, user_id } => Filter::all().eq(*column, user_id.to_string()),
    }
  }
}

pub struct Container<E: Entity> {
  store: Arc<dyn RemoteStore>,
  scope: Scope,
  mirror: Mirror<E>,
  mounted: AtomicBool,
  generation: AtomicU64,
  bridge: Mutex<Option<BridgeHandle>>,
}

impl<E: Entity> Container<E> {
  pub fn new(store: Arc<dyn RemoteStore>, scope: Scope) -> Self {
    Self {
      store,
      scope,
      mirror: Mirror::new(),
      mounted: AtomicBool::new(false),
      generation: AtomicU64::new(0),
      bridge: Mutex::new(None),
    }
  }

  pub fn global(store: Arc<dyn RemoteStore>) -> Self {
    Self::new(store, Scope::Global)
  }

  pub fn store(&self) -> &Arc<dyn RemoteStore> {
    &self.store
  }

  pub fn scope(&self) -> Scope {
    self.scope
  }

  pub fn mirror(&self) -> &Mirror<E> {
    &self.mirror
  }

  pub fn is_mounted(&self) -> bool {
    self.mounted.load(Ordering::SeqCst)
  }

  /// Late results belong to the mount they were started under.
  fn is_current(&self, generation: u64) -> bool {
    self.is_mounted() && self.generation.load(Ordering::SeqCst) == generation
  }

  fn current_generation(&self) -> u64 {
    self.generation.load(Ordering::SeqCst)
  }

  fn report(&self, op: &'static str, err: &SyncError) {
    event!(Level::ERROR, table = E::TABLE, op, kind = ?err.kind(), error = %err, "Remote operation failed.");
  }

  /// Fetches the snapshot and starts following the change feed.
  ///
  /// The feed is opened before the snapshot is read so nothing committed in
  /// between is missed. A fetch failure leaves the collection empty and
  /// `loading` cleared; nothing is retried. A failure to open the feed only
  /// means the mirror stops following remote changes.
  #[instrument(name = "Container::initialize", skip_all, fields(table = E::TABLE, scope = ?self.scope), err(Display))]
  pub async fn initialize(&self) -> SyncResult<()> {
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    self.mounted.store(true, Ordering::SeqCst);
    self.bridge.lock().take();
    self.mirror.apply(|s| s.loading = true);

    let filter = self.scope.filter();
    let stream = match self.store.subscribe(E::TABLE, filter.clone()).await {
      Ok(stream) => Some(stream),
      Err(e) => {
        event!(Level::WARN, error = %e, "Change feed unavailable; mirror will not follow remote changes.");
        None
      }
    };

    let fetched = self
      .store
      .fetch(E::TABLE, &Query::new().filter(filter).order(E::ORDER))
      .await;

    if !self.is_current(generation) {
      event!(Level::DEBUG, "Container remounted or unmounted during initialize; result discarded.");
      return Ok(());
    }

    let rows = match fetched {
      Ok(rows) => rows,
      Err(e) => {
        self.report("fetch", &e);
        self.mirror.apply(|s| {
          s.replace_all(Vec::new());
          s.loading = false;
        });
        return Err(e);
      }
    };

    let items: Vec<E> = rows
      .into_iter()
      .filter_map(|row| match E::from_row(row) {
        Ok(item) => Some(item),
        Err(e) => {
          event!(Level::WARN, error = %e, "Skipping undecodable row in snapshot.");
          None
        }
      })
      .collect();
    event!(Level::INFO, count = items.len(), "Snapshot loaded.");
    self.mirror.apply(|s| {
      s.replace_all(items);
      s.loading = false;
    });

    if let Some(stream) = stream {
      *self.bridge.lock() = Some(bridge::spawn(stream, self.mirror.clone()));
    }
    Ok(())
  }

  /// Tears down the feed; results of calls still in flight are discarded when they land.
  pub fn unmount(&self) {
    self.mounted.store(false, Ordering::SeqCst);
    self.generation.fetch_add(1, Ordering::SeqCst);
    if let Some(bridge) = self.bridge.lock().take() {
      bridge.abort();
    }
    event!(Level::DEBUG, table = E::TABLE, "Container unmounted.");
  }

  pub fn is_following(&self) -> bool {
    self.bridge.lock().as_ref().map_or(false, |b| !b.is_finished())
  }

  // --- Writes ---

  pub async fn create<I: Serialize + ?Sized>(&self, input: &I) -> SyncResult<E> {
    self.create_row(to_row(E::TABLE, input)?).await
  }

  #[instrument(name = "Container::create", skip_all, fields(table = E::TABLE), err(Display))]
  pub async fn create_row(&self, row: Row) -> SyncResult<E> {
    let generation = self.current_generation();
    let inserted = self.store.insert(E::TABLE, row).await.map_err(|e| {
      self.report("insert", &e);
      e
    })?;
    let item = E::from_row(inserted)?;
    if self.is_current(generation) {
      self.mirror.apply(|s| s.prepend_if_absent(item.clone()));
    }
    Ok(item)
  }

  pub async fn update<P: Serialize + ?Sized>(&self, id: Uuid, patch: &P) -> SyncResult<E> {
    self.update_row(id, to_row(E::TABLE, patch)?).await
  }

  #[instrument(name = "Container::update", skip(self, patch), fields(table = E::TABLE), err(Display))]
  pub async fn update_row(&self, id: Uuid, patch: Row) -> SyncResult<E> {
    let generation = self.current_generation();
    let updated = self.store.update(E::TABLE, id, patch).await.map_err(|e| {
      self.report("update", &e);
      e
    })?;
    let item = E::from_row(updated)?;
    if self.is_current(generation) {
      self.mirror.apply(|s| s.replace_by_id(item.clone()));
    }
    Ok(item)
  }

  #[instrument(name = "Container::delete", skip(self), fields(table = E::TABLE), err(Display))]
  pub async fn delete(&self, id: Uuid) -> SyncResult<()> {
    let generation = self.current_generation();
    self.store.delete(E::TABLE, id).await.map_err(|e| {
      self.report("delete", &e);
      e
    })?;
    if self.is_current(generation) {
      self.mirror.apply(|s| s.remove_by_id(id));
    }
    Ok(())
  }

  #[instrument(name = "Container::upsert", skip(self, row), fields(table = E::TABLE), err(Display))]
  pub async fn upsert(&self, row: Row, upsert: &Upsert) -> SyncResult<E> {
    let generation = self.current_generation();
    let stored = self.store.upsert(E::TABLE, row, upsert).await.map_err(|e| {
      self.report("upsert", &e);
      e
    })?;
    let item = E::from_row(stored)?;
    if self.is_current(generation) {
      self.mirror.apply(|s| s.upsert_local(item.clone()));
    }
    Ok(item)
  }

  // --- Reads ---

  pub fn is_loading(&self) -> bool {
    self.mirror.is_loading()
  }

  pub fn items(&self) -> Vec<E> {
    self.mirror.snapshot()
  }

  /// Runs `f` over the current items without cloning them.
  pub fn view<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
    f(&self.mirror.items())
  }

  pub fn find_by_id(&self, id: Uuid) -> Option<E> {
    self.view(|items| crate::views::find_by_id(items, id).cloned())
  }

  pub fn len(&self) -> usize {
    self.mirror.read().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Wakes whenever the mirrored collection changes; what a presentation layer re-renders on.
  pub fn watch(&self) -> watch::Receiver<u64> {
    self.mirror.watch()
  }
}

impl<E: Entity> Drop for Container<E> {
  fn drop(&mut self) {
    if let Some(bridge) = self.bridge.get_mut().take() {
      bridge.abort();
    }
  }
}
