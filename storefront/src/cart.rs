// cardshop/src/cart.rs

//! The signed-in customer's cart.
//!
//! Per (user, target) a line is either absent or present with an amount >= 1:
//!  - `add(t, q)` inserts with amount q, or adds q to the existing amount
//!  - `set_quantity(t, n)` deletes when n <= 0, otherwise sets amount to n
//!  - `remove(t)` deletes
//!
//! Absent vs. present is decided by the store, not by the local mirror: every
//! write is an upsert against the (user_id, product_id) / (user_id, service_id)
//! unique keys, so two concurrent adds merge into one row.

use crate::catalog::Catalog;
use crate::errors::{AppError, Result};
use crate::models::{CartItem, CartTarget};
use serde_json::{json, Value};
use std::sync::Arc;
use tidemark::{Container, Merge, RemoteStore, Row, Scope, Upsert};
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// A cart row joined with the catalog entry it points at.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
  pub item: CartItem,
  pub target: CartTarget,
  pub name: String,
  pub unit_price: f64,
  pub quantity: i64,
}

impl CartLine {
  pub fn subtotal(&self) -> f64 {
    self.unit_price * self.quantity as f64
  }
}

pub struct Cart {
  user_id: Uuid,
  items: Container<CartItem>,
}

impl Cart {
  pub fn new(store: Arc<dyn RemoteStore>, user_id: Uuid) -> Self {
    Self {
      user_id,
      items: Container::new(store, Scope::owner(user_id)),
    }
  }

  pub fn user_id(&self) -> Uuid {
    self.user_id
  }

  pub async fn initialize(&self) -> Result<()> {
    Ok(self.items.initialize().await?)
  }

  pub fn unmount(&self) {
    self.items.unmount();
  }

  pub fn items(&self) -> &Container<CartItem> {
    &self.items
  }

  fn target_row(&self, target: CartTarget, amount: i64) -> Row {
    let mut row = Row::new();
    row.insert("user_id".into(), Value::String(self.user_id.to_string()));
    row.insert(target.column().into(), Value::String(target.id().to_string()));
    row.insert("amount".into(), json!(amount));
    row
  }

  /// The current line for `target`, from the local mirror.
  pub fn line(&self, target: CartTarget) -> Option<CartItem> {
    self
      .items
      .view(|items| items.iter().find(|i| i.target() == Some(target)).cloned())
  }

  #[instrument(name = "Cart::add", skip(self), fields(user_id = %self.user_id), err(Display))]
  pub async fn add(&self, target: CartTarget, quantity: i64) -> Result<CartItem> {
    if quantity < 1 {
      return Err(AppError::Validation(format!(
        "Quantity must be at least 1, got {}.",
        quantity
      )));
    }
    let upsert = Upsert::on(target.conflict_key(), Merge::Increment("amount".into()));
    let item = self.items.upsert(self.target_row(target, quantity), &upsert).await?;
    info!(amount = item.amount, "Cart line added.");
    Ok(item)
  }

  /// `quantity <= 0` removes the line; returns the line left in the cart, if any.
  #[instrument(name = "Cart::set_quantity", skip(self), fields(user_id = %self.user_id), err(Display))]
  pub async fn set_quantity(&self, target: CartTarget, quantity: i64) -> Result<Option<CartItem>> {
    if quantity <= 0 {
      self.remove(target).await?;
      return Ok(None);
    }
    let upsert = Upsert::on(target.conflict_key(), Merge::Replace);
    let item = self.items.upsert(self.target_row(target, quantity), &upsert).await?;
    Ok(Some(item))
  }

  /// Deletes the line for `target`. Returns whether there was one.
  pub async fn remove(&self, target: CartTarget) -> Result<bool> {
    match self.line(target) {
      Some(line) => {
        self.items.delete(line.id).await?;
        debug!(?target, "Cart line removed.");
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Empties the cart, one delete per line. Stops at the first failure.
  pub async fn clear(&self) -> Result<()> {
    for line in self.items.items() {
      self.items.delete(line.id).await?;
    }
    Ok(())
  }

  /// Number of units across all lines.
  pub fn count(&self) -> i64 {
    self.items.view(|items| items.iter().map(|i| i.amount).sum())
  }

  /// Lines joined to the catalog. Lines whose product or service is gone are left out.
  pub fn lines(&self, catalog: &Catalog) -> Vec<CartLine> {
    self
      .items
      .items()
      .into_iter()
      .filter_map(|item| {
        let target = item.target()?;
        let (name, unit_price) = match target {
          CartTarget::Product(id) => catalog.product(id).map(|p| (p.name, p.price)),
          CartTarget::Service(id) => catalog.service(id).map(|s| (s.name, s.price)),
        }
        .or_else(|| {
          debug!(?target, "Cart line references a missing catalog entry.");
          None
        })?;
        Some(CartLine {
          quantity: item.amount,
          item,
          target,
          name,
          unit_price,
        })
      })
      .collect()
  }

  pub fn total(&self, catalog: &Catalog) -> f64 {
    self.lines(catalog).iter().map(CartLine::subtotal).sum()
  }
}
