// tidemark/src/bridge.rs

//! Folds a table's change feed into a container's mirror.
//!
//! Folding is idempotent, so the echo of a write the container already
//! patched optimistically is a no-op:
//!  - insert → prepend unless the id is present (or tombstoned)
//!  - update → replace by id; unknown ids are dropped, there is no reconciliation
//!  - delete → remove by id and tombstone it; deletes of unknown ids are dropped

use crate::entity::Entity;
use crate::mirror::{Mirror, MirrorState};
use crate::store::change::{ChangeEvent, ChangeOp, ChangeStream};
use tokio::task::JoinHandle;
use tracing::{event, Level};

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folded {
  Applied,
  /// Duplicate, stale or unknown-id event; the mirror is unchanged.
  Ignored,
  /// The row could not be decoded into the entity type; dropped.
  Undecodable,
}

impl crate::mirror::Changed for Folded {
  fn changed(&self) -> bool {
    *self == Folded::Applied
  }
}

/// Applies one event to the mirror state.
pub fn fold<E: Entity>(state: &mut MirrorState<E>, change: &ChangeEvent) -> Folded {
  if change.table != E::TABLE {
    return Folded::Ignored;
  }
  match change.op {
    ChangeOp::Delete => match change.row_id() {
      Some(id) if state.remove_by_id(id) => Folded::Applied,
      Some(_) => Folded::Ignored,
      None => Folded::Undecodable,
    },
    ChangeOp::Insert | ChangeOp::Update => {
      let item = match E::from_row(change.row.clone()) {
        Ok(item) => item,
        Err(e) => {
          event!(Level::WARN, table = E::TABLE, error = %e, "Dropping change event with an undecodable row.");
          return Folded::Undecodable;
        }
      };
      let applied = if change.op == ChangeOp::Insert {
        state.prepend_if_absent(item)
      } else {
        state.replace_by_id(item)
      };
      if applied {
        Folded::Applied
      } else {
        Folded::Ignored
      }
    }
  }
}

/// Background task owning one subscription. Aborted on drop.
#[derive(Debug)]
pub struct BridgeHandle {
  table: &'static str,
  task: JoinHandle<()>,
}

impl BridgeHandle {
  pub fn table(&self) -> &'static str {
    self.table
  }

  pub fn is_finished(&self) -> bool {
    self.task.is_finished()
  }

  pub fn abort(&self) {
    self.task.abort();
  }
}

impl Drop for BridgeHandle {
  fn drop(&mut self) {
    self.task.abort();
  }
}

/// Spawns the task that drains `stream` into `mirror`, in delivery order.
///
/// Already-buffered events (delivered while the snapshot was being fetched)
/// are applied first; thanks to idempotent folding replaying them over the
/// snapshot converges to the same state.
pub fn spawn<E: Entity>(mut stream: ChangeStream, mirror: Mirror<E>) -> BridgeHandle {
  let task = tokio::spawn(async move {
    event!(Level::DEBUG, table = E::TABLE, "Bridge started.");
    while let Some(change) = stream.next().await {
      let outcome = mirror.apply(|state| fold(state, &change));
      event!(Level::TRACE, table = E::TABLE, op = ?change.op, outcome = ?outcome, "Folded change event.");
    }
    event!(Level::DEBUG, table = E::TABLE, "Change feed closed; bridge stopped.");
  });
  BridgeHandle { table: E::TABLE, task }
}
