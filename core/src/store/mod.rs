// tidemark/src/store/mod.rs

//! The remote store seam: the `RemoteStore` trait every backend implements,
//! the query vocabulary, the change feed and the access policy.

pub mod blob;
pub mod change;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod query;
pub mod schema;

pub use change::{ChangeEvent, ChangeOp, ChangeStream};
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;
pub use query::{Filter, Merge, Order, Predicate, Query, Row, Upsert};
pub use schema::{Access, Principal, ReadScope, RoleSource, Schema, StoreKeys, TableSchema};

use crate::error::SyncResult;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A handle to the hosted tables, bound to one [`Principal`].
///
/// Every side effect is remote; implementations keep no durable local state.
/// All methods are cancellation-safe in the sense that dropping the future
/// never leaves the handle unusable, but a write that already reached the
/// backend is not rolled back.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
  /// The principal this handle acts as.
  fn principal(&self) -> Principal;

  async fn fetch(&self, table: &str, query: &Query) -> SyncResult<Vec<Row>>;

  /// Inserts a row; the store assigns `id` and `created_at` when the row carries none.
  async fn insert(&self, table: &str, row: Row) -> SyncResult<Row>;

  /// Applies `patch` to the row with `id` and returns the row as stored.
  async fn update(&self, table: &str, id: Uuid, patch: Row) -> SyncResult<Row>;

  async fn delete(&self, table: &str, id: Uuid) -> SyncResult<()>;

  /// Atomic insert-or-merge against a declared unique key.
  async fn upsert(&self, table: &str, row: Row, upsert: &Upsert) -> SyncResult<Row>;

  /// Opens a change feed on `table`. Events outside the principal's read scope
  /// or not matching `filter` are never delivered.
  async fn subscribe(&self, table: &str, filter: Filter) -> SyncResult<ChangeStream>;

  /// Stores `bytes` under `bucket/path` and returns its public URL.
  async fn upload_blob(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> SyncResult<String>;
}

/// Hands out [`RemoteStore`] handles against an API key.
pub trait Connector: Send + Sync + 'static {
  /// `user` is the signed-in identity for restricted handles; ignored for the service key.
  fn connect(&self, key: &str, user: Option<Uuid>) -> SyncResult<Arc<dyn RemoteStore>>;
}

/// Fills in the server-generated columns of a row about to be inserted.
pub fn stamp_new_row(row: &mut Row, now: DateTime<Utc>) {
  if row.get("id").map_or(true, Value::is_null) {
    row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
  }
  if row.get("created_at").map_or(true, Value::is_null) {
    row.insert(
      "created_at".to_string(),
      Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );
  }
}

/// Columns a patch may never rewrite.
pub fn sanitize_patch(patch: &mut Row) {
  patch.remove("id");
  patch.remove("created_at");
}
