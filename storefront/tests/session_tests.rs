// tests/session_tests.rs
mod common;

use cardshop::models::{CartTarget, Role};
use cardshop::seed::seed_demo;
use cardshop::{AppConfig, AppError, AppState, Backend, Profiles};
use common::*;
use std::sync::Arc;
use tidemark::ErrorKind;
use uuid::Uuid;

#[tokio::test]
async fn test_sign_in_and_out_remount_the_catalog() {
  setup_tracing();
  let store = memory_store();
  seed_product(&store, "Charizard", 300.0, None).await;
  let shop = storefront(&store);
  shop.start().await.unwrap();
  let guest = shop.catalog();
  assert!(guest.products().is_mounted());
  assert!(shop.session().is_none());

  let session = shop.sign_in(Uuid::new_v4()).await.unwrap();
  assert!(!guest.products().is_mounted());
  let signed_in = shop.catalog();
  assert!(!Arc::ptr_eq(&guest, &signed_in));
  assert_eq!(signed_in.products().len(), 1);
  assert_eq!(shop.session().unwrap().user_id(), session.user_id());

  let cart = shop.cart().unwrap();
  shop.sign_out().await.unwrap();
  assert!(shop.session().is_none());
  assert!(!cart.items().is_mounted());
  assert!(!signed_in.products().is_mounted());
  assert!(Arc::ptr_eq(&shop.catalog(), &guest));
  assert!(guest.products().is_mounted());
  assert_eq!(guest.products().len(), 1);
}

#[tokio::test]
async fn test_switching_users_drops_the_previous_identity() {
  setup_tracing();
  let store = memory_store();
  let product = seed_product(&store, "Eevee", 8.0, None).await;
  let shop = storefront(&store);

  shop.sign_in(Uuid::new_v4()).await.unwrap();
  let first_cart = shop.cart().unwrap();
  first_cart.add(CartTarget::Product(product), 1).await.unwrap();

  let second = shop.sign_in(Uuid::new_v4()).await.unwrap();
  assert!(!first_cart.items().is_mounted());
  let second_cart = shop.cart().unwrap();
  assert_eq!(second_cart.user_id(), second.user_id());
  assert!(second_cart.items().is_empty());
}

#[tokio::test]
async fn test_admin_console_requires_the_admin_role() {
  setup_tracing();
  let store = memory_store();
  let shop = storefront(&store);

  let err = shop.admin().await.err().unwrap();
  assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));

  shop.sign_in(Uuid::new_v4()).await.unwrap();
  let err = shop.admin().await.err().unwrap();
  assert_eq!(err.kind(), Some(ErrorKind::Unauthorized));

  let admin = admin_user(&store).await;
  let session = shop.sign_in(admin).await.unwrap();
  assert!(session.is_admin());
  assert_eq!(session.profile().current().unwrap().role, Role::Admin);
  let console = shop.admin().await.unwrap();
  assert!(Arc::ptr_eq(&console, &shop.admin().await.unwrap()));
  console.catalog().create_category("Team Rocket").await.unwrap();
  assert_eq!(shop.catalog().active_categories().len(), 1);
}

#[tokio::test]
async fn test_checkout_link_carries_the_cart_summary() {
  setup_tracing();
  let store = memory_store();
  let charizard = seed_product(&store, "Charizard", 300.0, None).await;
  let pikachu = seed_product(&store, "Pikachu", 12.5, None).await;
  let shop = storefront(&store);
  shop.sign_in(Uuid::new_v4()).await.unwrap();
  let cart = shop.cart().unwrap();

  let err = shop.checkout_link().unwrap_err();
  assert!(matches!(err, AppError::Validation(_)));

  cart.add(CartTarget::Product(charizard), 2).await.unwrap();
  cart.add(CartTarget::Product(pikachu), 1).await.unwrap();
  let link = shop.checkout_link().unwrap();
  assert!(link.starts_with("https://wa.me/5511987654321?text="));
  assert!(link.contains("2x%20Charizard%20%28300.00%20each%29%20%3D%20600.00"));
  assert!(link.contains("1x%20Pikachu"));
  assert!(link.ends_with("Total%3A%20612.50"));
}

#[tokio::test]
async fn test_checkout_link_needs_a_phone_number() {
  let store = memory_store();
  let config = AppConfig::in_memory(PUBLIC_KEY, SERVICE_KEY);
  let shop = cardshop::Storefront::new(Arc::new(config), Arc::new(store.clone())).unwrap();
  shop.sign_in(Uuid::new_v4()).await.unwrap();
  assert!(matches!(shop.checkout_link(), Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_app_state_builds_and_seeds_the_in_memory_store() {
  setup_tracing();
  let state = AppState::build(config()).await.unwrap();
  assert!(matches!(state.backend, Backend::Memory(_)));

  let elevated = state.elevated().unwrap();
  let report = seed_demo(elevated.as_ref(), "admin@cardshop.local").await.unwrap();
  assert_eq!((report.categories, report.products, report.services), (3, 4, 2));
  let admin = report.admin_user_id.unwrap();

  // A populated catalog is left alone.
  let again = seed_demo(elevated.as_ref(), "admin@cardshop.local").await.unwrap();
  assert_eq!(again.products, 0);

  let shop = state.storefront.clone();
  shop.start().await.unwrap();
  assert_eq!(shop.catalog().products().len(), 4);
  assert_eq!(shop.catalog().active_categories().len(), 3);
  assert_eq!(shop.catalog().search_products("char").len(), 1);

  let session = shop.sign_in(admin).await.unwrap();
  assert!(session.is_admin());
  shop.admin().await.unwrap();

  // Demoting through the service key is visible to the signed-in session.
  Profiles::set_role(elevated.as_ref(), admin, Role::Customer).await.unwrap();
  eventually("demotion reaches the session", || !session.is_admin()).await;
}

#[tokio::test]
async fn test_failed_sign_in_keeps_the_current_session_following() {
  setup_tracing();
  let store = memory_store();
  let shop = storefront(&store);
  let alice = shop.sign_in(Uuid::new_v4()).await.unwrap();

  store.set_offline(true);
  let err = shop.sign_in(Uuid::new_v4()).await.err().unwrap();
  assert_eq!(err.kind(), Some(ErrorKind::Unavailable));
  store.set_offline(false);

  assert_eq!(shop.session().unwrap().user_id(), alice.user_id());
  let catalog = shop.catalog();
  assert!(catalog.products().is_mounted());
  assert!(catalog.products().is_following());
  assert!(shop.cart().unwrap().items().is_mounted());

  seed_product(&store, "Ditto", 15.0, None).await;
  eventually("remote insert after a failed sign-in", || shop.catalog().products().len() == 1).await;
}

#[tokio::test]
async fn test_failed_first_sign_in_keeps_the_guest_catalog() {
  setup_tracing();
  let store = memory_store();
  let shop = storefront(&store);
  shop.start().await.unwrap();
  let guest = shop.catalog();

  store.set_offline(true);
  assert!(shop.sign_in(Uuid::new_v4()).await.is_err());
  store.set_offline(false);

  assert!(shop.session().is_none());
  assert!(Arc::ptr_eq(&shop.catalog(), &guest));
  assert!(guest.products().is_following());
  seed_product(&store, "Ditto", 15.0, None).await;
  eventually("guest catalog keeps following", || guest.products().len() == 1).await;
}
