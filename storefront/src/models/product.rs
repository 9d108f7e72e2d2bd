// cardshop/src/models/product.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::Entity;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub price: f64,
  /// Free text, e.g. "NM", "LP", "Played".
  pub condition: String,
  pub category_id: Option<Uuid>, // Should reference a live category; not enforced
  pub media_url_front: Option<String>,
  pub media_url_back: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Entity for Product {
  const TABLE: &'static str = "products";
  fn id(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
  pub name: String,
  pub price: f64,
  pub condition: String,
  pub category_id: Option<Uuid>,
  pub media_url_front: Option<String>,
  pub media_url_back: Option<String>,
}

/// Partial update; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub condition: Option<String>,
  /// `Some(None)` clears the category.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category_id: Option<Option<Uuid>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub media_url_front: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub media_url_back: Option<String>,
}
