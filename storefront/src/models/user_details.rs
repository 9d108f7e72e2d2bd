// cardshop/src/models/user_details.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::{Entity, Order};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Customer,
  Admin,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Customer => "customer",
      Role::Admin => "admin",
    }
  }
}

/// Profile row; one per auth identity, lives in the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
  pub id: Uuid,
  pub user_id: Uuid,
  pub role: Role,
  pub created_at: DateTime<Utc>,
}

impl Entity for UserDetails {
  const TABLE: &'static str = "users";
  // Oldest first, so "the first row" is stable if a duplicate ever shows up.
  const ORDER: Order = Order::asc("created_at");
  fn id(&self) -> Uuid {
    self.id
  }
}

impl UserDetails {
  pub fn is_admin(&self) -> bool {
    self.role == Role::Admin
  }
}
