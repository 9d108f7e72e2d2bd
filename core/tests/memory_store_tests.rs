// tests/memory_store_tests.rs
mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use tidemark::{ChangeOp, Connector, ErrorKind, Filter, Merge, Order, Principal, Query, RemoteStore, Row, Upsert};
use uuid::Uuid;

fn row(value: serde_json::Value) -> Row {
  value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_keys_select_the_principal() {
  let store = memory_store();
  let user = Uuid::new_v4();
  assert_eq!(store.connect(SERVICE_KEY, None).unwrap().principal(), Principal::Elevated);
  assert_eq!(store.connect(PUBLIC_KEY, None).unwrap().principal(), Principal::Anonymous);
  assert_eq!(store.connect(PUBLIC_KEY, Some(user)).unwrap().principal(), Principal::User(user));

  let err = store.connect("not-a-key", None).err().unwrap();
  assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_insert_stamps_id_and_created_at() {
  let store = memory_store();
  let client = store.client(Principal::Elevated);
  let stored = client.insert("items", row(json!({ "name": "Mew", "price": 5.0 }))).await.unwrap();

  let id = stored.get("id").and_then(|v| v.as_str()).unwrap();
  assert!(Uuid::parse_str(id).is_ok());
  let created = stored.get("created_at").and_then(|v| v.as_str()).unwrap();
  assert!(chrono::DateTime::parse_from_rfc3339(created).is_ok());
}

#[tokio::test]
async fn test_owned_rows_are_invisible_to_other_users() {
  let store = memory_store();
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();
  store
    .client(Principal::User(alice))
    .insert("tasks", row(json!({ "user_id": alice, "label": "mine", "count": 1 })))
    .await
    .unwrap();

  let bobs_view = store.client(Principal::User(bob)).fetch("tasks", &Query::new()).await.unwrap();
  assert!(bobs_view.is_empty());

  let anon = store.client(Principal::Anonymous).fetch("tasks", &Query::new()).await.unwrap_err();
  assert_eq!(anon.kind(), ErrorKind::Unauthorized);

  let admin = admin_user(&store).await;
  let all = store.client(Principal::User(admin)).fetch("tasks", &Query::new()).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_update_cannot_move_a_row_to_another_owner() {
  let store = memory_store();
  let alice = Uuid::new_v4();
  let client = store.client(Principal::User(alice));
  let stored = client
    .insert("tasks", row(json!({ "user_id": alice, "label": "a", "count": 1 })))
    .await
    .unwrap();
  let id = Uuid::parse_str(stored["id"].as_str().unwrap()).unwrap();

  let err = client
    .update("tasks", id, row(json!({ "user_id": Uuid::new_v4() })))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unauthorized);

  // id and created_at in a patch are ignored.
  let patched = client
    .update("tasks", id, row(json!({ "id": Uuid::new_v4(), "created_at": "1999-01-01T00:00:00Z", "count": 9 })))
    .await
    .unwrap();
  assert_eq!(patched["id"], stored["id"]);
  assert_eq!(patched["created_at"], stored["created_at"]);
  assert_eq!(patched["count"], json!(9));
}

#[tokio::test]
async fn test_upsert_merge_strategies() {
  let store = memory_store();
  let user = Uuid::new_v4();
  let client = store.client(Principal::User(user));
  let key = |merge| Upsert::on(["user_id", "label"], merge);
  let task = |count: i64| row(json!({ "user_id": user, "label": "x", "count": count }));

  let first = client.upsert("tasks", task(2), &key(Merge::Keep)).await.unwrap();
  let kept = client.upsert("tasks", task(7), &key(Merge::Keep)).await.unwrap();
  assert_eq!(kept, first);

  let bumped = client
    .upsert("tasks", task(3), &key(Merge::Increment("count".into())))
    .await
    .unwrap();
  assert_eq!(bumped["count"], json!(5));
  assert_eq!(bumped["id"], first["id"]);

  let replaced = client.upsert("tasks", task(1), &key(Merge::Replace)).await.unwrap();
  assert_eq!(replaced["count"], json!(1));
  assert_eq!(replaced["created_at"], first["created_at"]);
  assert_eq!(store.rows("tasks").len(), 1);

  let undeclared = client
    .upsert("tasks", task(1), &Upsert::on(["label"], Merge::Keep))
    .await
    .unwrap_err();
  assert_eq!(undeclared.kind(), ErrorKind::Unknown);
}

#[tokio::test]
async fn test_fetch_applies_filter_and_order() {
  let store = memory_store();
  let client = store.client(Principal::Elevated);
  for (name, price) in [("beta", 2.0), ("Alpha", 1.0), ("gamma", 3.0)] {
    client.insert("items", row(json!({ "name": name, "price": price }))).await.unwrap();
  }

  let sorted = client
    .fetch("items", &Query::new().order(Order::asc("name")))
    .await
    .unwrap();
  let names: Vec<_> = sorted.iter().map(|r| r["name"].as_str().unwrap()).collect();
  assert_eq!(names, ["Alpha", "beta", "gamma"]);

  let picked = client
    .fetch("items", &Query::new().filter(Filter::all().any_of("name", ["beta", "gamma"])))
    .await
    .unwrap();
  assert_eq!(picked.len(), 2);
}

#[tokio::test]
async fn test_subscription_only_forwards_matching_events() {
  setup_tracing();
  let store = memory_store();
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();
  let mut feed = store
    .client(Principal::User(alice))
    .subscribe("tasks", Filter::all().eq("user_id", alice.to_string()))
    .await
    .unwrap();
  assert_eq!(feed.table(), "tasks");

  store
    .client(Principal::User(bob))
    .insert("tasks", row(json!({ "user_id": bob, "label": "b", "count": 1 })))
    .await
    .unwrap();
  store
    .client(Principal::User(alice))
    .insert("tasks", row(json!({ "user_id": alice, "label": "a", "count": 1 })))
    .await
    .unwrap();

  let change = tokio::time::timeout(Duration::from_secs(1), feed.next())
    .await
    .expect("event in time")
    .expect("feed open");
  assert_eq!(change.op, ChangeOp::Insert);
  assert_eq!(change.row["label"], json!("a"));

  settle().await;
  assert!(feed.try_next().is_none());
}

#[tokio::test]
async fn test_offline_store_fails_every_call() {
  let store = memory_store();
  let client = store.client(Principal::Elevated);
  store.set_offline(true);

  let fetch = client.fetch("items", &Query::new()).await.unwrap_err();
  let insert = client.insert("items", Row::new()).await.unwrap_err();
  let subscribe = client.subscribe("items", Filter::all()).await.unwrap_err();
  for err in [fetch, insert, subscribe] {
    assert_eq!(err.kind(), ErrorKind::Unavailable);
  }

  store.set_offline(false);
  assert!(client.fetch("items", &Query::new()).await.is_ok());
}

#[tokio::test]
async fn test_blob_upload_returns_public_url() {
  let store = memory_store();
  let user = store.client(Principal::User(Uuid::new_v4()));
  let url = user
    .upload_blob("media", "cards/front/1-abc.png", vec![1, 2, 3], "image/png")
    .await
    .unwrap();
  assert_eq!(url, "memory://blobs/media/cards/front/1-abc.png");
  assert_eq!(store.blob("media", "cards/front/1-abc.png"), Some((vec![1, 2, 3], "image/png".to_string())));

  let anon = store
    .client(Principal::Anonymous)
    .upload_blob("media", "x.png", vec![], "image/png")
    .await
    .unwrap_err();
  assert_eq!(anon.kind(), ErrorKind::Unauthorized);

  store.set_blob_outage(true);
  let down = user.upload_blob("media", "y.png", vec![0], "image/png").await.unwrap_err();
  assert_eq!(down.kind(), ErrorKind::Unavailable);
  assert_eq!(store.blob_count(), 1);
}
