// cardshop/src/models/cart_item.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::Entity;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
  pub id: Uuid,
  pub user_id: Uuid,
  // Exactly one of product_id / service_id is set.
  pub product_id: Option<Uuid>,
  pub service_id: Option<Uuid>,
  pub amount: i64,
  pub created_at: DateTime<Utc>,
}

impl Entity for CartItem {
  const TABLE: &'static str = "carts";
  fn id(&self) -> Uuid {
    self.id
  }
}

impl CartItem {
  /// `None` for a malformed row carrying both or neither reference.
  pub fn target(&self) -> Option<CartTarget> {
    match (self.product_id, self.service_id) {
      (Some(p), None) => Some(CartTarget::Product(p)),
      (None, Some(s)) => Some(CartTarget::Service(s)),
      _ => None,
    }
  }
}

/// What a cart line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartTarget {
  Product(Uuid),
  Service(Uuid),
}

impl CartTarget {
  pub fn id(&self) -> Uuid {
    match self {
      CartTarget::Product(id) | CartTarget::Service(id) => *id,
    }
  }

  pub fn column(&self) -> &'static str {
    match self {
      CartTarget::Product(_) => "product_id",
      CartTarget::Service(_) => "service_id",
    }
  }

  /// The unique key a cart row for this target is upserted against.
  pub fn conflict_key(&self) -> [&'static str; 2] {
    ["user_id", self.column()]
  }
}
