// tidemark/src/store/memory.rs

//! In-process backend.
//!
//! Tables live behind one `parking_lot::RwLock`; every mutation and its
//! change event are committed under the same write guard so subscribers see
//! events in commit order. Each declared table owns a `broadcast` channel;
//! a subscription forwards the events its principal may read into its own
//! bounded `ChangeStream`.

use crate::error::{SyncError, SyncResult};
use crate::store::change::{ChangeEvent, ChangeOp, ChangeStream};
use crate::store::query::{Filter, Merge, Query, Row, Upsert};
use crate::store::schema::{Principal, ReadScope, Schema, StoreKeys, TableSchema};
use crate::store::{sanitize_patch, stamp_new_row, Connector, RemoteStore};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{event, instrument, Level};
use uuid::Uuid;

const FEED_CAPACITY: usize = 1024;

struct Blob {
  bytes: Vec<u8>,
  content_type: String,
}

struct MemoryBackend {
  schema: Schema,
  keys: StoreKeys,
  public_base: String,
  tables: RwLock<HashMap<&'static str, Vec<Row>>>,
  feeds: HashMap<&'static str, broadcast::Sender<ChangeEvent>>,
  blobs: RwLock<HashMap<(String, String), Blob>>,
  clock: Mutex<DateTime<Utc>>,
  offline: AtomicBool,
  blob_outage: AtomicBool,
}

impl MemoryBackend {
  /// Strictly increasing timestamps, so `created_at` ordering is total even for back-to-back inserts.
  fn tick(&self) -> DateTime<Utc> {
    let mut last = self.clock.lock();
    let mut now = Utc::now();
    if now <= *last {
      now = *last + Duration::microseconds(1);
    }
    *last = now;
    now
  }

  fn is_admin(&self, tables: &HashMap<&'static str, Vec<Row>>, principal: Principal) -> bool {
    match (principal, self.schema.role_source()) {
      (Principal::User(user), Some(roles)) => tables
        .get(roles.table)
        .map_or(false, |rows| roles.grants_admin(user, rows.iter())),
      _ => false,
    }
  }

  fn publish(&self, table: &TableSchema, op: ChangeOp, row: &Row) {
    if let Some(feed) = self.feeds.get(table.name) {
      // No receivers is fine: nobody is subscribed to this table yet.
      let _ = feed.send(ChangeEvent::new(table.name, op, row.clone()));
    }
  }
}

/// In-process implementation of the hosted store.
///
/// Cloning is cheap; clones share the same tables, feeds and blobs.
#[derive(Clone)]
pub struct MemoryStore {
  inner: Arc<MemoryBackend>,
}

impl MemoryStore {
  pub fn new(schema: Schema, keys: StoreKeys) -> Self {
    Self::with_public_base(schema, keys, "memory://blobs")
  }

  pub fn with_public_base(schema: Schema, keys: StoreKeys, public_base: impl Into<String>) -> Self {
    let mut tables = HashMap::new();
    let mut feeds = HashMap::new();
    for t in schema.tables() {
      tables.insert(t.name, Vec::new());
      feeds.insert(t.name, broadcast::channel(FEED_CAPACITY).0);
    }
    Self {
      inner: Arc::new(MemoryBackend {
        schema,
        keys,
        public_base: public_base.into().trim_end_matches('/').to_string(),
        tables: RwLock::new(tables),
        feeds,
        blobs: RwLock::new(HashMap::new()),
        clock: Mutex::new(DateTime::<Utc>::MIN_UTC),
        offline: AtomicBool::new(false),
        blob_outage: AtomicBool::new(false),
      }),
    }
  }

  /// A handle acting as `principal`, bypassing key checks.
  pub fn client(&self, principal: Principal) -> MemoryClient {
    MemoryClient {
      backend: self.inner.clone(),
      principal,
    }
  }

  /// Simulates a network outage: every call fails with `Unavailable` until switched back.
  pub fn set_offline(&self, offline: bool) {
    event!(Level::INFO, offline, "Memory store connectivity changed.");
    self.inner.offline.store(offline, Ordering::SeqCst);
  }

  /// Simulates a storage outage that only affects blob uploads.
  pub fn set_blob_outage(&self, down: bool) {
    self.inner.blob_outage.store(down, Ordering::SeqCst);
  }

  /// Raw table contents, bypassing the access policy.
  pub fn rows(&self, table: &str) -> Vec<Row> {
    self.inner.tables.read().get(table).cloned().unwrap_or_default()
  }

  pub fn blob(&self, bucket: &str, path: &str) -> Option<(Vec<u8>, String)> {
    self
      .inner
      .blobs
      .read()
      .get(&(bucket.to_string(), path.to_string()))
      .map(|b| (b.bytes.clone(), b.content_type.clone()))
  }

  pub fn blob_count(&self) -> usize {
    self.inner.blobs.read().len()
  }
}

impl Connector for MemoryStore {
  fn connect(&self, key: &str, user: Option<Uuid>) -> SyncResult<Arc<dyn RemoteStore>> {
    let principal = self.inner.keys.principal_for(key, user)?;
    Ok(Arc::new(self.client(principal)))
  }
}

/// A [`MemoryStore`] handle bound to one principal.
#[derive(Clone)]
pub struct MemoryClient {
  backend: Arc<MemoryBackend>,
  principal: Principal,
}

impl MemoryClient {
  fn ensure_online(&self) -> SyncResult<()> {
    if self.backend.offline.load(Ordering::SeqCst) {
      return Err(SyncError::Unavailable("memory store is offline".to_string()));
    }
    Ok(())
  }

  fn scope(&self, tables: &HashMap<&'static str, Vec<Row>>, table: &TableSchema) -> SyncResult<ReadScope> {
    let is_admin = self.backend.is_admin(tables, self.principal);
    match self.backend.schema.read_scope(table, self.principal, is_admin) {
      ReadScope::Denied => Err(SyncError::Unauthorized(format!(
        "{:?} may not read '{}'",
        self.principal, table.name
      ))),
      scope => Ok(scope),
    }
  }

  fn check_write(&self, tables: &HashMap<&'static str, Vec<Row>>, table: &TableSchema, row: &Row) -> SyncResult<()> {
    let is_admin = self.backend.is_admin(tables, self.principal);
    self.backend.schema.check_write(table, self.principal, is_admin, row)
  }
}

fn id_value(id: Uuid) -> Value {
  Value::String(id.to_string())
}

fn add_numbers(stored: Option<&Value>, incoming: Option<&Value>) -> Value {
  match (stored.and_then(Value::as_i64), incoming.and_then(Value::as_i64)) {
    (Some(a), Some(b)) => json!(a + b),
    _ => {
      let a = stored.and_then(Value::as_f64).unwrap_or(0.0);
      let b = incoming.and_then(Value::as_f64).unwrap_or(0.0);
      json!(a + b)
    }
  }
}

#[async_trait]
impl RemoteStore for MemoryClient {
  fn principal(&self) -> Principal {
    self.principal
  }

  #[instrument(name = "MemoryClient::fetch", skip_all, fields(table = table), err(Display))]
  async fn fetch(&self, table: &str, query: &Query) -> SyncResult<Vec<Row>> {
    self.ensure_online()?;
    let schema = self.backend.schema.get(table)?;
    let tables = self.backend.tables.read();
    let scope = self.scope(&tables, schema)?;
    let mut rows: Vec<Row> = tables
      .get(schema.name)
      .map(|rows| {
        rows
          .iter()
          .filter(|r| scope.admits(r) && query.filter.matches(r))
          .cloned()
          .collect()
      })
      .unwrap_or_default();
    drop(tables);
    if let Some(order) = &query.order {
      order.sort(&mut rows);
    }
    event!(Level::DEBUG, rows = rows.len(), "Fetched rows.");
    Ok(rows)
  }

  #[instrument(name = "MemoryClient::insert", skip_all, fields(table = table), err(Display))]
  async fn insert(&self, table: &str, mut row: Row) -> SyncResult<Row> {
    self.ensure_online()?;
    let schema = self.backend.schema.get(table)?;
    let mut tables = self.backend.tables.write();
    self.check_write(&tables, schema, &row)?;
    stamp_new_row(&mut row, self.backend.tick());

    let rows = tables.entry(schema.name).or_default();
    if rows.iter().any(|r| r.get("id") == row.get("id")) {
      return Err(SyncError::Conflict {
        table: table.to_string(),
        key: "id".to_string(),
      });
    }
    if let Some(key) = schema.conflicting_key(&row, rows.iter(), None) {
      event!(Level::WARN, key = %key, "Insert rejected by unique key.");
      return Err(SyncError::Conflict {
        table: table.to_string(),
        key,
      });
    }
    rows.push(row.clone());
    self.backend.publish(schema, ChangeOp::Insert, &row);
    Ok(row)
  }

  #[instrument(name = "MemoryClient::update", skip_all, fields(table = table, id = %id), err(Display))]
  async fn update(&self, table: &str, id: Uuid, mut patch: Row) -> SyncResult<Row> {
    self.ensure_online()?;
    sanitize_patch(&mut patch);
    let schema = self.backend.schema.get(table)?;
    let mut tables = self.backend.tables.write();
    let scope = self.scope(&tables, schema)?;
    let id = id_value(id);

    let stored = tables
      .get(schema.name)
      .and_then(|rows| rows.iter().find(|r| r.get("id") == Some(&id) && scope.admits(r)))
      .cloned()
      .ok_or_else(|| SyncError::not_found(table, format!("no row with id {}", id)))?;
    self.check_write(&tables, schema, &stored)?;

    let mut merged = stored;
    merged.extend(patch);
    self.check_write(&tables, schema, &merged)?;

    let rows = tables.entry(schema.name).or_default();
    if let Some(key) = schema.conflicting_key(&merged, rows.iter(), Some(&id)) {
      return Err(SyncError::Conflict {
        table: table.to_string(),
        key,
      });
    }
    if let Some(slot) = rows.iter_mut().find(|r| r.get("id") == Some(&id)) {
      *slot = merged.clone();
    }
    self.backend.publish(schema, ChangeOp::Update, &merged);
    Ok(merged)
  }

  #[instrument(name = "MemoryClient::delete", skip_all, fields(table = table, id = %id), err(Display))]
  async fn delete(&self, table: &str, id: Uuid) -> SyncResult<()> {
    self.ensure_online()?;
    let schema = self.backend.schema.get(table)?;
    let mut tables = self.backend.tables.write();
    let scope = self.scope(&tables, schema)?;
    let id = id_value(id);

    let position = tables
      .get(schema.name)
      .and_then(|rows| rows.iter().position(|r| r.get("id") == Some(&id) && scope.admits(r)))
      .ok_or_else(|| SyncError::not_found(table, format!("no row with id {}", id)))?;
    if let Some(stored) = tables.get(schema.name).and_then(|rows| rows.get(position)) {
      self.check_write(&tables, schema, stored)?;
    }
    let removed = tables.entry(schema.name).or_default().remove(position);
    self.backend.publish(schema, ChangeOp::Delete, &removed);
    Ok(())
  }

  #[instrument(name = "MemoryClient::upsert", skip_all, fields(table = table, conflict = ?upsert.conflict), err(Display))]
  async fn upsert(&self, table: &str, mut row: Row, upsert: &Upsert) -> SyncResult<Row> {
    self.ensure_online()?;
    let schema = self.backend.schema.get(table)?;
    let key = schema.find_key(&upsert.conflict).cloned().ok_or_else(|| {
      SyncError::Internal(format!(
        "no unique key ({}) declared on '{}'",
        upsert.conflict.join(", "),
        table
      ))
    })?;
    let mut tables = self.backend.tables.write();
    self.check_write(&tables, schema, &row)?;

    let existing = tables.get(schema.name).and_then(|rows| {
      rows.iter().position(|stored| {
        key
          .iter()
          .all(|col| row.get(*col).map_or(false, |v| !v.is_null() && stored.get(*col) == Some(v)))
      })
    });

    let Some(position) = existing else {
      stamp_new_row(&mut row, self.backend.tick());
      let rows = tables.entry(schema.name).or_default();
      if let Some(clash) = schema.conflicting_key(&row, rows.iter(), None) {
        return Err(SyncError::Conflict {
          table: table.to_string(),
          key: clash,
        });
      }
      rows.push(row.clone());
      self.backend.publish(schema, ChangeOp::Insert, &row);
      event!(Level::DEBUG, "Upsert inserted a new row.");
      return Ok(row);
    };

    let stored = tables
      .get(schema.name)
      .and_then(|rows| rows.get(position))
      .cloned()
      .ok_or_else(|| SyncError::Internal("upsert target vanished under the write lock".to_string()))?;
    self.check_write(&tables, schema, &stored)?;

    let merged = match &upsert.merge {
      Merge::Keep => return Ok(stored),
      Merge::Replace => {
        let mut merged = stored;
        sanitize_patch(&mut row);
        merged.extend(row);
        merged
      }
      Merge::Increment(column) => {
        let mut merged = stored;
        let sum = add_numbers(merged.get(column.as_str()), row.get(column.as_str()));
        merged.insert(column.clone(), sum);
        merged
      }
    };
    if let Some(slot) = tables.entry(schema.name).or_default().get_mut(position) {
      *slot = merged.clone();
    }
    self.backend.publish(schema, ChangeOp::Update, &merged);
    event!(Level::DEBUG, merge = ?upsert.merge, "Upsert merged into an existing row.");
    Ok(merged)
  }

  #[instrument(name = "MemoryClient::subscribe", skip_all, fields(table = table), err(Display))]
  async fn subscribe(&self, table: &str, filter: Filter) -> SyncResult<ChangeStream> {
    self.ensure_online()?;
    let schema = self.backend.schema.get(table)?;
    let scope = {
      let tables = self.backend.tables.read();
      self.scope(&tables, schema)?
    };
    let mut feed = self
      .backend
      .feeds
      .get(schema.name)
      .map(broadcast::Sender::subscribe)
      .ok_or_else(|| SyncError::Internal(format!("no change feed for '{}'", table)))?;

    let (tx, stream) = ChangeStream::channel(schema.name);
    let table_name = schema.name;
    tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = tx.closed() => break,
          received = feed.recv() => match received {
            Ok(change) => {
              if !scope.admits(&change.row) || !filter.matches(&change.row) {
                continue;
              }
              if tx.send(change).await.is_err() {
                break;
              }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
              event!(Level::WARN, table = table_name, missed, "Subscriber lagged; change events dropped.");
            }
            Err(broadcast::error::RecvError::Closed) => break,
          }
        }
      }
      event!(Level::DEBUG, table = table_name, "Subscription forwarder finished.");
    });
    Ok(stream)
  }

  #[instrument(name = "MemoryClient::upload_blob", skip(self, bytes), fields(size = bytes.len()), err(Display))]
  async fn upload_blob(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> SyncResult<String> {
    self.ensure_online()?;
    if self.backend.blob_outage.load(Ordering::SeqCst) {
      return Err(SyncError::Unavailable("blob storage is unavailable".to_string()));
    }
    if self.principal == Principal::Anonymous {
      return Err(SyncError::Unauthorized("anonymous uploads are not allowed".to_string()));
    }
    if bucket.is_empty() || path.is_empty() || path.contains("..") {
      return Err(SyncError::Internal(format!("invalid blob location '{}/{}'", bucket, path)));
    }
    self.backend.blobs.write().insert(
      (bucket.to_string(), path.to_string()),
      Blob {
        bytes,
        content_type: content_type.to_string(),
      },
    );
    Ok(format!("{}/{}/{}", self.backend.public_base, bucket, path))
  }
}
