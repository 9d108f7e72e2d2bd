// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidemark::{
  Container, Entity, MemoryStore, Order, Principal, Schema, StoreKeys, TableSchema,
};
use tidemark::store::RoleSource;
use tracing::Level;
use uuid::Uuid;

pub const PUBLIC_KEY: &str = "test-anon-key";
pub const SERVICE_KEY: &str = "test-service-key";

// --- Common Entities ---

/// Catalog-style entity: everyone reads, admins write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub id: Uuid,
  pub name: String,
  pub price: f64,
  pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for Item {
  const TABLE: &'static str = "items";
  fn id(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewItem<'a> {
  pub name: &'a str,
  pub price: f64,
}

/// Owned entity with a unique (user_id, label) key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
  pub id: Uuid,
  pub user_id: Uuid,
  pub label: String,
  pub count: i64,
  pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for Task {
  const TABLE: &'static str = "tasks";
  const ORDER: Order = Order::asc("label");
  fn id(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTask<'a> {
  pub user_id: Uuid,
  pub label: &'a str,
  pub count: i64,
}

// --- Store Setup ---

pub fn schema() -> Schema {
  Schema::new()
    .table(TableSchema::catalog("items"))
    .table(TableSchema::owned("tasks", "user_id").unique(&["user_id", "label"]))
    .table(TableSchema::owned("roles", "user_id").unique(&["user_id"]))
    .roles(RoleSource {
      table: "roles",
      user_column: "user_id",
      role_column: "role",
      admin_value: "admin",
    })
}

pub fn memory_store() -> MemoryStore {
  MemoryStore::new(schema(), StoreKeys::new(PUBLIC_KEY, SERVICE_KEY))
}

/// Creates a user with the admin role and returns its id.
pub async fn admin_user(store: &MemoryStore) -> Uuid {
  use tidemark::RemoteStore;
  let admin = Uuid::new_v4();
  let mut row = tidemark::Row::new();
  row.insert("user_id".into(), admin.to_string().into());
  row.insert("role".into(), "admin".into());
  store
    .client(Principal::Elevated)
    .insert("roles", row)
    .await
    .expect("seeding admin role");
  admin
}

/// Polls until `check` holds over the container's items, or panics after a second.
pub async fn eventually<E: Entity>(container: &Container<E>, check: impl Fn(&[E]) -> bool) {
  for _ in 0..100 {
    if container.view(|items| check(items)) {
      return;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("condition on '{}' not reached in time", E::TABLE);
}

/// Gives the bridge a chance to process anything already queued.
pub async fn settle() {
  tokio::time::sleep(Duration::from_millis(50)).await;
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
