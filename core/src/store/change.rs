// tidemark/src/store/change.rs

//! Change-feed events and the receiving end of a subscription.

use crate::store::query::Row;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
  Insert,
  Update,
  Delete,
}

/// One row-level change on a table. Delete events carry the row as it was before removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub table: String,
  pub op: ChangeOp,
  pub row: Row,
}

impl ChangeEvent {
  pub fn new(table: impl Into<String>, op: ChangeOp, row: Row) -> Self {
    Self {
      table: table.into(),
      op,
      row,
    }
  }

  /// The `id` column of the carried row, if it is a well-formed uuid.
  pub fn row_id(&self) -> Option<Uuid> {
    self.row.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())
  }
}

/// Receiving end of a table subscription.
///
/// Dropping the stream ends the subscription; the backend notices on its next send.
#[derive(Debug)]
pub struct ChangeStream {
  table: String,
  rx: mpsc::Receiver<ChangeEvent>,
}

impl ChangeStream {
  /// Capacity of the per-subscription buffer between a backend and its consumer.
  pub const BUFFER: usize = 256;

  pub fn new(table: impl Into<String>, rx: mpsc::Receiver<ChangeEvent>) -> Self {
    Self { table: table.into(), rx }
  }

  /// Builds a connected sender/stream pair; backends keep the sender.
  pub fn channel(table: impl Into<String>) -> (mpsc::Sender<ChangeEvent>, Self) {
    let (tx, rx) = mpsc::channel(Self::BUFFER);
    (tx, Self::new(table, rx))
  }

  pub fn table(&self) -> &str {
    &self.table
  }

  /// Next event in delivery order; `None` once the backend side has closed.
  pub async fn next(&mut self) -> Option<ChangeEvent> {
    self.rx.recv().await
  }

  /// Non-blocking variant used when draining already-buffered events.
  pub fn try_next(&mut self) -> Option<ChangeEvent> {
    self.rx.try_recv().ok()
  }
}
