// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use cardshop::models::{NewProduct, Role};
use cardshop::schema::storefront_schema;
use cardshop::{AppConfig, Profiles, Storefront};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tidemark::{Connector, MemoryStore, Principal, RemoteStore, StoreKeys};
use tracing::Level;
use uuid::Uuid;

pub const PUBLIC_KEY: &str = "shop-anon-key";
pub const SERVICE_KEY: &str = "shop-service-key";

pub fn memory_store() -> MemoryStore {
  MemoryStore::new(storefront_schema(), StoreKeys::new(PUBLIC_KEY, SERVICE_KEY))
}

pub fn config() -> AppConfig {
  let mut config = AppConfig::in_memory(PUBLIC_KEY, SERVICE_KEY);
  config.order_phone_number = Some("+55 11 98765-4321".to_string());
  config
}

pub fn storefront(store: &MemoryStore) -> Storefront {
  Storefront::new(Arc::new(config()), Arc::new(store.clone())).expect("storefront")
}

pub fn elevated(store: &MemoryStore) -> Arc<dyn RemoteStore> {
  store.connect(SERVICE_KEY, None).expect("service key")
}

/// A fresh user id that already holds the admin role.
pub async fn admin_user(store: &MemoryStore) -> Uuid {
  let admin = Uuid::new_v4();
  Profiles::set_role(elevated(store).as_ref(), admin, Role::Admin)
    .await
    .expect("promote admin");
  admin
}

/// Inserts a product directly through the elevated store and returns its id.
pub async fn seed_product(store: &MemoryStore, name: &str, price: f64, category_id: Option<Uuid>) -> Uuid {
  let input = NewProduct {
    name: name.to_string(),
    price,
    condition: "NM".to_string(),
    category_id,
    ..Default::default()
  };
  let row = store
    .client(Principal::Elevated)
    .insert("products", tidemark::to_row("products", &input).unwrap())
    .await
    .expect("seed product");
  Uuid::parse_str(row["id"].as_str().unwrap()).unwrap()
}

pub fn rows_for(store: &MemoryStore, table: &str, user_id: Uuid) -> Vec<tidemark::Row> {
  let user = user_id.to_string();
  store
    .rows(table)
    .into_iter()
    .filter(|r| r.get("user_id").and_then(|v| v.as_str()) == Some(user.as_str()))
    .collect()
}

/// Polls `check` until it holds, or panics after a second.
pub async fn eventually(what: &str, check: impl Fn() -> bool) {
  for _ in 0..100 {
    if check() {
      return;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("{} not reached in time", what);
}

pub async fn settle() {
  tokio::time::sleep(Duration::from_millis(50)).await;
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
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
