// cardshop/src/seed.rs

//! Demo data for local runs (`SEED_DEMO=true`). Skipped when the catalog already has products.

use crate::errors::Result;
use crate::models::{NewProduct, NewService, Role};
use crate::profile::Profiles;
use serde_json::json;
use tidemark::{to_row, Merge, Query, RemoteStore, Upsert};
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
  pub categories: usize,
  pub products: usize,
  pub services: usize,
  pub admin_user_id: Option<Uuid>,
}

const CATEGORIES: [&str; 3] = ["Base Set", "Jungle", "Fossil"];

const PRODUCTS: [(&str, f64, &str, usize); 4] = [
  ("Charizard", 350.0, "NM", 0),
  ("Blastoise", 120.0, "LP", 0),
  ("Snorlax", 45.0, "NM", 1),
  ("Gengar", 60.0, "MP", 2),
];

const SERVICES: [(&str, f64); 2] = [("Card grading", 25.0), ("Sleeving", 1.5)];

/// Writes the demo catalog and an admin identity through the elevated store.
#[instrument(name = "seed::seed_demo", skip_all, err(Display))]
pub async fn seed_demo(elevated: &dyn RemoteStore, admin_email: &str) -> Result<SeedReport> {
  let mut report = SeedReport::default();
  if !elevated.fetch("products", &Query::new()).await?.is_empty() {
    info!("Catalog already populated; demo seed skipped.");
    return Ok(report);
  }

  let mut category_ids = Vec::with_capacity(CATEGORIES.len());
  for name in CATEGORIES {
    let row = elevated
      .insert("categories", to_row("categories", &json!({ "name": name, "active": true }))?)
      .await?;
    category_ids.push(row.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()));
    report.categories += 1;
  }

  for (name, price, condition, category) in PRODUCTS {
    let input = NewProduct {
      name: name.to_string(),
      price,
      condition: condition.to_string(),
      category_id: category_ids.get(category).copied().flatten(),
      ..Default::default()
    };
    elevated.insert("products", to_row("products", &input)?).await?;
    report.products += 1;
  }

  for (name, price) in SERVICES {
    let input = NewService {
      name: name.to_string(),
      price,
      media_url: None,
    };
    elevated.insert("services", to_row("services", &input)?).await?;
    report.services += 1;
  }

  let identity = elevated
    .upsert(
      "identities",
      to_row("identities", &json!({ "email": admin_email, "display_name": "Shop Admin" }))?,
      &Upsert::on(["email"], Merge::Keep),
    )
    .await?;
  if let Some(admin) = identity.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
    Profiles::set_role(elevated, admin, Role::Admin).await?;
    report.admin_user_id = Some(admin);
  }

  info!(?report, "Demo data seeded.");
  Ok(report)
}
