// cardshop/src/models/identity.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::Entity;
use uuid::Uuid;

/// Directory entry of a signed-up identity. Only the elevated tier may read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
  pub id: Uuid,
  pub email: String,
  pub display_name: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Entity for Identity {
  const TABLE: &'static str = "identities";
  fn id(&self) -> Uuid {
    self.id
  }
}

impl Identity {
  /// Display name when set, otherwise the part of the email before `@`.
  pub fn label(&self) -> String {
    match self.display_name.as_deref().map(str::trim) {
      Some(name) if !name.is_empty() => name.to_string(),
      _ => self.email.split('@').next().unwrap_or(&self.email).to_string(),
    }
  }
}
