// cardshop/src/models/service.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark::Entity;
use uuid::Uuid;

/// A sellable service (grading, sleeving, ...). Same lifecycle as a product, no category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
  pub id: Uuid,
  pub name: String,
  pub price: f64,
  pub media_url: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Entity for Service {
  const TABLE: &'static str = "services";
  fn id(&self) -> Uuid {
    self.id
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewService {
  pub name: String,
  pub price: f64,
  pub media_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServicePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub media_url: Option<String>,
}
