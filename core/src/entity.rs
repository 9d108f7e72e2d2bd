// tidemark/src/entity.rs

//! The `Entity` trait: the data-only configuration that turns the generic
//! container into a mirror of one specific table.

use crate::error::{SyncError, SyncResult};
use crate::store::query::{Order, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A typed row of a remote table.
///
/// Implementors only supply table metadata and the id accessor; row
/// conversion goes through serde, so field names are the wire column names.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
  /// Remote table name.
  const TABLE: &'static str;

  /// Sort applied to the initial snapshot.
  const ORDER: Order = Order::desc("created_at");

  fn id(&self) -> Uuid;

  fn from_row(row: Row) -> SyncResult<Self> {
    serde_json::from_value(Value::Object(row)).map_err(|e| SyncError::decode(Self::TABLE, e))
  }

  fn to_row(&self) -> SyncResult<Row> {
    to_row(Self::TABLE, self)
  }
}

/// Serializes any struct (an insert input or a patch) into a [`Row`].
pub fn to_row<T: Serialize + ?Sized>(table: &str, value: &T) -> SyncResult<Row> {
  match serde_json::to_value(value).map_err(|e| SyncError::decode(table, e))? {
    Value::Object(map) => Ok(map),
    other => Err(SyncError::Internal(format!(
      "value for '{}' serialized to {} instead of an object",
      table, other
    ))),
  }
}
