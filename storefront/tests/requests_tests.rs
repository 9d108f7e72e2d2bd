// tests/requests_tests.rs
mod common;

use cardshop::models::NewWantToBuy;
use cardshop::{AppError, MediaPrefix, Upload};
use common::*;
use serde_json::json;
use tidemark::{ErrorKind, RemoteStore};
use uuid::Uuid;

fn wanted(card: &str) -> NewWantToBuy {
  NewWantToBuy {
    card_name: card.to_string(),
    condition: "NM".to_string(),
  }
}

async fn register_identity(store: &tidemark::MemoryStore, id: Uuid, email: &str, display_name: Option<&str>) {
  let row = tidemark::to_row(
    "identities",
    &json!({ "id": id, "email": email, "display_name": display_name }),
  )
  .unwrap();
  elevated(store).insert("identities", row).await.expect("identity");
}

#[tokio::test]
async fn test_submit_uploads_the_photo_first() {
  setup_tracing();
  let store = memory_store();
  let shop = storefront(&store);
  let session = shop.sign_in(Uuid::new_v4()).await.unwrap();
  let board = shop.requests().unwrap();
  assert!(!board.is_admin_board());

  let photo = Upload::new("lugia.jpg", "image/jpeg", vec![7; 16]);
  let request = board.submit(&wanted("  Lugia  "), Some(photo)).await.unwrap();
  assert_eq!(request.card_name, "Lugia");
  assert_eq!(request.user_id, session.user_id());
  assert!(!request.done);
  assert!(request.media_url.unwrap().contains(MediaPrefix::WantToBuy.as_str()));
  assert_eq!(board.requests().len(), 1);

  store.set_blob_outage(true);
  let err = board
    .submit(&wanted("Ho-Oh"), Some(Upload::new("hooh.jpg", "image/jpeg", vec![1])))
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::Upload { .. }));
  assert_eq!(store.rows("want_to_buy").len(), 1);

  // Without a photo nothing is uploaded.
  board.submit(&wanted("Ho-Oh"), None).await.unwrap();
  assert_eq!(board.requests().len(), 2);
}

#[tokio::test]
async fn test_submit_rejects_blank_card_names() {
  let store = memory_store();
  let shop = storefront(&store);
  shop.sign_in(Uuid::new_v4()).await.unwrap();
  let err = shop.requests().unwrap().submit(&wanted("   "), None).await.unwrap_err();
  assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_customers_only_see_their_own_requests() {
  setup_tracing();
  let store = memory_store();
  let alice = storefront(&store);
  alice.sign_in(Uuid::new_v4()).await.unwrap();
  alice.requests().unwrap().submit(&wanted("Mew"), None).await.unwrap();

  let bob = storefront(&store);
  bob.sign_in(Uuid::new_v4()).await.unwrap();
  bob.requests().unwrap().submit(&wanted("Celebi"), None).await.unwrap();
  settle().await;

  let names: Vec<_> = bob.requests().unwrap().requests().items().into_iter().map(|r| r.card_name).collect();
  assert_eq!(names, ["Celebi"]);
  let err = bob.requests().unwrap().requester_names().await.unwrap_err();
  assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
}

#[tokio::test]
async fn test_admin_board_follows_every_request() {
  setup_tracing();
  let store = memory_store();
  let alice_id = Uuid::new_v4();
  register_identity(&store, alice_id, "alice@example.com", None).await;
  let alice = storefront(&store);
  alice.sign_in(alice_id).await.unwrap();
  let first = alice.requests().unwrap().submit(&wanted("Mew"), None).await.unwrap();

  let admin_id = admin_user(&store).await;
  let shop = storefront(&store);
  shop.sign_in(admin_id).await.unwrap();
  let console = shop.admin().await.unwrap();
  let board = console.requests();
  assert!(board.is_admin_board());
  assert_eq!(board.requests().len(), 1);

  // A request filed after the board mounted arrives through the feed.
  let bob_id = Uuid::new_v4();
  register_identity(&store, bob_id, "bob@example.com", Some("Bob the Collector")).await;
  let bob = storefront(&store);
  bob.sign_in(bob_id).await.unwrap();
  bob.requests().unwrap().submit(&wanted("Celebi"), None).await.unwrap();
  eventually("bob's request on the admin board", || board.requests().len() == 2).await;

  board.mark_done(first.id, true).await.unwrap();
  let (done, open) = board.partition_done();
  assert_eq!(done.len(), 1);
  assert_eq!(done[0].id, first.id);
  assert_eq!(open[0].card_name, "Celebi");
  assert_eq!(board.search("cele").len(), 1);

  let names = board.requester_names().await.unwrap();
  assert_eq!(names.get(&alice_id).map(String::as_str), Some("alice"));
  assert_eq!(names.get(&bob_id).map(String::as_str), Some("Bob the Collector"));

  // Admins work through requests; they do not file them.
  let err = board.submit(&wanted("Lugia"), None).await.unwrap_err();
  assert!(matches!(err, AppError::Validation(_)));

  // The customer sees the status change on their own board.
  let alice_board = alice.requests().unwrap();
  eventually("done flag reaches the customer", || {
    alice_board.requests().find_by_id(first.id).map_or(false, |r| r.done)
  })
  .await;

  board.delete(first.id).await.unwrap();
  eventually("deletion reaches the customer", || alice_board.requests().is_empty()).await;
}

#[tokio::test]
async fn test_only_staff_mark_requests_done() {
  setup_tracing();
  let store = memory_store();
  let customer = Uuid::new_v4();
  let shop = storefront(&store);
  shop.sign_in(customer).await.unwrap();
  let board = shop.requests().unwrap();
  let request = board.submit(&wanted("Suicune"), None).await.unwrap();

  let err = board.mark_done(request.id, true).await.unwrap_err();
  assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));
  assert!(!board.requests().find_by_id(request.id).unwrap().done);

  // Filing a request that is already done is rejected as well.
  let client = store.client(tidemark::Principal::User(customer));
  let row = tidemark::to_row(
    "want_to_buy",
    &json!({ "user_id": customer, "card_name": "Entei", "condition": "NM", "done": true }),
  )
  .unwrap();
  let err = client.insert("want_to_buy", row).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Unauthorized);

  // Staff can.
  let admin = admin_user(&store).await;
  let staff = storefront(&store);
  staff.sign_in(admin).await.unwrap();
  let console = staff.admin().await.unwrap();
  console.requests().mark_done(request.id, true).await.unwrap();
  eventually("done flag reaches the customer", || {
    board.requests().find_by_id(request.id).map_or(false, |r| r.done)
  })
  .await;
}
