// src/lib.rs

//! Tidemark: an async, type-safe mirror of remote tables for Rust.
//!
//! Tidemark keeps an in-memory, ordered copy of a hosted table consistent
//! under local writes and out-of-band remote changes:
//!  - One generic `Container<E>` per table; per-table behaviour is data-only (`Entity`).
//!  - Snapshot on mount, then an idempotent change-feed bridge.
//!  - Optimistic local patch on every successful write; the echo is a no-op.
//!  - Atomic upserts against declared unique keys instead of check-then-insert.
//!  - A closed `ErrorKind` on every failure instead of a bare boolean.
//!  - Pure derived views (search, key/range filters, flag partitions).
//!  - A `RemoteStore` seam with an in-process backend and, behind the
//!    `postgres` feature, a PostgreSQL backend using LISTEN/NOTIFY.

pub mod bridge;
pub mod container;
pub mod entity;
pub mod error;
pub mod mirror;
pub mod store;
pub mod views;

// --- Re-exports for the Public API ---

pub use crate::bridge::{BridgeHandle, Folded};
pub use crate::container::{Container, Scope};
pub use crate::entity::{to_row, Entity};
pub use crate::error::{ErrorKind, SyncError, SyncResult};
pub use crate::mirror::{Mirror, MirrorState};
pub use crate::store::{
  ChangeEvent, ChangeOp, ChangeStream, Connector, Filter, MemoryStore, Merge, Order, Principal, Query, RemoteStore,
  Row, Schema, StoreKeys, TableSchema, Upsert,
};
#[cfg(feature = "postgres")]
pub use crate::store::PgStore;

/*
    Core Workflow:
    1. Declare the tables in a `Schema` (access class, owner column, unique keys).
    2. Build a backend (`MemoryStore` or `PgStore`) and `connect` with a key to get an
       `Arc<dyn RemoteStore>` bound to the acting principal.
    3. Implement `Entity` for each row type (table name, snapshot order, id).
    4. Construct a `Container<E>` per table with the scope it should mirror and hand it
       explicitly to whoever renders it.
    5. `initialize().await` once; read with `items()` / `view()` and the `views` helpers;
       write with `create` / `update` / `delete` / `upsert`.
    6. `unmount()` when the identity changes, then build and initialize again.
*/
