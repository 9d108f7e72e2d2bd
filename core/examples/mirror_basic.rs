// tidemark/examples/mirror_basic.rs

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tidemark::{Connector, Container, Entity, MemoryStore, Principal, Schema, StoreKeys, SyncError, TableSchema};
use tracing::info;
use uuid::Uuid;

// 1. Define the row type and tell tidemark which table it lives in.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct Note {
  id: Uuid,
  text: String,
  created_at: chrono::DateTime<chrono::Utc>,
}

impl Entity for Note {
  const TABLE: &'static str = "notes";
  fn id(&self) -> Uuid {
    self.id
  }
}

#[tokio::main]
async fn main() -> Result<(), SyncError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Mirror Example ---");

  // 2. Declare the tables and build an in-process store.
  let schema = Schema::new().table(TableSchema::catalog("notes"));
  let store = MemoryStore::new(schema, StoreKeys::new("public", "service"));

  // 3. Two sessions: one that writes (elevated), one that only follows.
  let writer = Container::<Note>::global(store.connect("service", None)?);
  let reader = Container::<Note>::global(Arc::new(store.client(Principal::Anonymous)));
  writer.initialize().await?;
  reader.initialize().await?;

  // 4. The writer sees its own writes immediately; the reader through the change feed.
  let note = writer.create(&serde_json::json!({ "text": "hello" })).await?;
  info!(count = writer.len(), "Writer state after create.");

  let mut changes = reader.watch();
  if changes.changed().await.is_ok() {
    info!(items = ?reader.items(), "Reader caught up.");
  }

  writer.update(note.id, &serde_json::json!({ "text": "hello, world" })).await?;
  writer.delete(note.id).await?;
  info!(count = writer.len(), "Writer state after delete.");

  reader.unmount();
  info!("--- Example Finished ---");
  Ok(())
}
