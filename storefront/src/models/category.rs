// cardshop/src/models/category.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::{Entity, Order};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
  pub id: Uuid,
  pub name: String,
  /// Inactive categories stay in the table but are hidden from customer navigation.
  pub active: bool,
  pub created_at: DateTime<Utc>,
}

impl Entity for Category {
  const TABLE: &'static str = "categories";
  const ORDER: Order = Order::asc("name");
  fn id(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCategory {
  pub name: String,
  pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
}
