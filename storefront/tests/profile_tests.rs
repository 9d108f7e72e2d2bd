// tests/profile_tests.rs
mod common;

use cardshop::models::Role;
use cardshop::Profiles;
use common::*;
use std::sync::Arc;
use tidemark::store::RoleSource;
use tidemark::{Connector, ErrorKind, MemoryStore, Principal, RemoteStore, Schema, StoreKeys, TableSchema};
use uuid::Uuid;

#[tokio::test]
async fn test_first_access_creates_exactly_one_customer_row() {
  setup_tracing();
  let store = memory_store();
  let user = Uuid::new_v4();
  let profiles = Profiles::new(store.connect(PUBLIC_KEY, Some(user)).unwrap(), user);

  let (a, b) = tokio::join!(profiles.ensure(), profiles.ensure());
  let (a, b) = (a.unwrap(), b.unwrap());
  assert_eq!(a.id, b.id);
  assert_eq!(a.role, Role::Customer);

  let rows = rows_for(&store, "users", user);
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0]["role"], serde_json::json!("customer"));
  assert!(!profiles.is_admin());
}

#[tokio::test]
async fn test_concurrent_sessions_still_share_one_row() {
  setup_tracing();
  let store = memory_store();
  let user = Uuid::new_v4();
  // Two tabs: separate sessions, separate guards.
  let tab_a = Profiles::new(store.connect(PUBLIC_KEY, Some(user)).unwrap(), user);
  let tab_b = Profiles::new(store.connect(PUBLIC_KEY, Some(user)).unwrap(), user);

  let (a, b) = tokio::join!(tab_a.ensure(), tab_b.ensure());
  assert_eq!(a.unwrap().id, b.unwrap().id);
  assert_eq!(rows_for(&store, "users", user).len(), 1);
}

#[tokio::test]
async fn test_existing_admin_row_is_kept() {
  setup_tracing();
  let store = memory_store();
  let admin = admin_user(&store).await;
  let profiles = Profiles::new(store.connect(PUBLIC_KEY, Some(admin)).unwrap(), admin);

  let details = profiles.ensure().await.unwrap();
  assert_eq!(details.role, Role::Admin);
  assert!(profiles.is_admin());
  assert_eq!(rows_for(&store, "users", admin).len(), 1);
}

#[tokio::test]
async fn test_customers_cannot_promote_themselves() {
  setup_tracing();
  let store = memory_store();
  let user = Uuid::new_v4();
  let client: Arc<dyn RemoteStore> = Arc::new(store.client(Principal::User(user)));
  let profiles = Profiles::new(client.clone(), user);
  let details = profiles.ensure().await.unwrap();

  let patch = tidemark::to_row("users", &serde_json::json!({ "role": "admin" })).unwrap();
  let err = client.update("users", details.id, patch).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unauthorized);

  // Changing roles needs the service key.
  let err = Profiles::set_role(client.as_ref(), user, Role::Admin).await.unwrap_err();
  assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
  Profiles::set_role(elevated(&store).as_ref(), user, Role::Admin).await.unwrap();
}

#[tokio::test]
async fn test_role_change_reaches_a_signed_in_session() {
  setup_tracing();
  let store = memory_store();
  let user = Uuid::new_v4();
  let shop = storefront(&store);
  let session = shop.sign_in(user).await.unwrap();
  assert!(!session.is_admin());

  Profiles::set_role(elevated(&store).as_ref(), user, Role::Admin).await.unwrap();
  eventually("role update through the feed", || session.is_admin()).await;
}

#[tokio::test]
async fn test_duplicate_rows_resolve_to_the_oldest() {
  setup_tracing();
  // A legacy table without the unique key, already holding two rows for one user.
  let schema = Schema::new()
    .table(TableSchema::owned("users", "user_id").guard("role", "customer"))
    .roles(RoleSource {
      table: "users",
      user_column: "user_id",
      role_column: "role",
      admin_value: "admin",
    });
  let store = MemoryStore::new(schema, StoreKeys::new(PUBLIC_KEY, SERVICE_KEY));
  let user = Uuid::new_v4();
  let service = store.client(Principal::Elevated);
  let mut ids = Vec::new();
  for created_at in ["2024-05-02T10:00:00Z", "2024-05-01T10:00:00Z"] {
    let row = tidemark::to_row(
      "users",
      &serde_json::json!({ "user_id": user, "role": "customer", "created_at": created_at }),
    )
    .unwrap();
    let stored = service.insert("users", row).await.unwrap();
    ids.push(Uuid::parse_str(stored["id"].as_str().unwrap()).unwrap());
  }
  let oldest = ids[1];

  let profiles = Profiles::new(store.connect(PUBLIC_KEY, Some(user)).unwrap(), user);
  let details = profiles.ensure().await.unwrap();
  assert_eq!(details.id, oldest);
  assert_eq!(profiles.ensure().await.unwrap().id, oldest);
  assert_eq!(profiles.current().unwrap().id, oldest);
  assert_eq!(rows_for(&store, "users", user).len(), 2);
}
