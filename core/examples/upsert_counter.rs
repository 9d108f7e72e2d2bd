// tidemark/examples/upsert_counter.rs

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tidemark::{Container, Entity, ErrorKind, MemoryStore, Merge, Principal, Schema, StoreKeys, TableSchema, Upsert};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Vote {
  id: Uuid,
  user_id: Uuid,
  topic: String,
  count: i64,
}

impl Entity for Vote {
  const TABLE: &'static str = "votes";
  fn id(&self) -> Uuid {
    self.id
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Upsert Counter Example ---");

  // One row per (user_id, topic); concurrent writers merge instead of duplicating.
  let schema = Schema::new().table(TableSchema::owned("votes", "user_id").unique(&["user_id", "topic"]));
  let store = MemoryStore::new(schema, StoreKeys::new("public", "service"));
  let user = Uuid::new_v4();
  let votes = Container::<Vote>::new(Arc::new(store.client(Principal::User(user))), tidemark::Scope::owner(user));
  votes.initialize().await?;

  let key = Upsert::on(["user_id", "topic"], Merge::Increment("count".into()));
  let ballot = |count: i64| {
    tidemark::to_row(
      "votes",
      &serde_json::json!({ "user_id": user, "topic": "rust", "count": count }),
    )
  };

  let (a, b) = tokio::join!(votes.upsert(ballot(1)?, &key), votes.upsert(ballot(2)?, &key));
  a?;
  b?;
  info!(rows = votes.len(), count = votes.items()[0].count, "Both increments landed on one row.");

  // A plain insert on the same key is rejected rather than duplicated.
  match votes.create_row(ballot(1)?).await {
    Err(e) if e.kind() == ErrorKind::Conflict => warn!(error = %e, "Insert refused as expected."),
    other => info!(?other, "Unexpected outcome."),
  }

  info!("--- Example Finished ---");
  Ok(())
}
