// cardshop/src/models/want_to_buy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::Entity;
use uuid::Uuid;

/// A customer's request for a card the shop does not stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantToBuy {
  pub id: Uuid,
  pub user_id: Uuid,
  pub card_name: String,
  pub condition: String,
  pub media_url: Option<String>, // Optional reference photo
  pub done: bool,
  pub created_at: DateTime<Utc>,
}

impl Entity for WantToBuy {
  const TABLE: &'static str = "want_to_buy";
  fn id(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWantToBuy {
  pub card_name: String,
  pub condition: String,
}
