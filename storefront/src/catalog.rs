// cardshop/src/catalog.rs

//! Products, categories and services: readable by everyone, written by admins.

use crate::errors::{AppError, Result};
use crate::media::{self, MediaPrefix, Upload};
use crate::models::{Category, CategoryPatch, NewCategory, NewProduct, NewService, Product, ProductPatch, Service, ServicePatch};
use std::sync::Arc;
use tidemark::{views, Container, Entity, RemoteStore, SyncError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct Catalog {
  store: Arc<dyn RemoteStore>,
  products: Container<Product>,
  categories: Container<Category>,
  services: Container<Service>,
}

fn validate_price(price: f64) -> Result<()> {
  if !price.is_finite() || price < 0.0 {
    return Err(AppError::Validation(format!("Invalid price: {}", price)));
  }
  Ok(())
}

fn validate_listing(name: &str, price: f64) -> Result<()> {
  if name.trim().is_empty() {
    return Err(AppError::Validation("Name must not be empty.".to_string()));
  }
  validate_price(price)
}

fn missing<E: Entity>(id: Uuid) -> AppError {
  AppError::Sync(SyncError::NotFound {
    table: E::TABLE.to_string(),
    detail: format!("no row with id {}", id),
  })
}

impl Catalog {
  pub fn new(store: Arc<dyn RemoteStore>) -> Self {
    Self {
      products: Container::global(store.clone()),
      categories: Container::global(store.clone()),
      services: Container::global(store.clone()),
      store,
    }
  }

  /// Mounts all three mirrors. Every mirror is attempted; the first failure is returned.
  #[instrument(name = "Catalog::initialize", skip_all, err(Display))]
  pub async fn initialize(&self) -> Result<()> {
    let (products, categories, services) = tokio::join!(
      self.products.initialize(),
      self.categories.initialize(),
      self.services.initialize()
    );
    products?;
    categories?;
    services?;
    info!(
      products = self.products.len(),
      categories = self.categories.len(),
      services = self.services.len(),
      "Catalog mounted."
    );
    Ok(())
  }

  pub fn unmount(&self) {
    self.products.unmount();
    self.categories.unmount();
    self.services.unmount();
  }

  pub fn products(&self) -> &Container<Product> {
    &self.products
  }

  pub fn categories(&self) -> &Container<Category> {
    &self.categories
  }

  pub fn services(&self) -> &Container<Service> {
    &self.services
  }

  pub fn is_loading(&self) -> bool {
    self.products.is_loading() || self.categories.is_loading() || self.services.is_loading()
  }

  // --- Products ---

  pub async fn create_product(&self, input: &NewProduct) -> Result<Product> {
    validate_listing(&input.name, input.price)?;
    Ok(self.products.create(input).await?)
  }

  /// Uploads the card images first; if either upload fails nothing is written.
  #[instrument(name = "Catalog::create_product_with_media", skip_all, fields(name = %input.name), err(Display))]
  pub async fn create_product_with_media(
    &self,
    mut input: NewProduct,
    front: Option<Upload>,
    back: Option<Upload>,
  ) -> Result<Product> {
    validate_listing(&input.name, input.price)?;
    if let Some(url) = media::upload_optional(self.store.as_ref(), MediaPrefix::CardFront, front).await? {
      input.media_url_front = Some(url);
    }
    if let Some(url) = media::upload_optional(self.store.as_ref(), MediaPrefix::CardBack, back).await? {
      input.media_url_back = Some(url);
    }
    self.create_product(&input).await
  }

  pub async fn update_product(&self, id: Uuid, patch: &ProductPatch) -> Result<Product> {
    if let Some(price) = patch.price {
      validate_price(price)?;
    }
    Ok(self.products.update(id, patch).await?)
  }

  /// Replaces one or both card images; uploads happen before the row is touched.
  pub async fn replace_product_media(&self, id: Uuid, front: Option<Upload>, back: Option<Upload>) -> Result<Product> {
    let patch = ProductPatch {
      media_url_front: media::upload_optional(self.store.as_ref(), MediaPrefix::CardFront, front).await?,
      media_url_back: media::upload_optional(self.store.as_ref(), MediaPrefix::CardBack, back).await?,
      ..Default::default()
    };
    self.update_product(id, &patch).await
  }

  pub async fn delete_product(&self, id: Uuid) -> Result<()> {
    Ok(self.products.delete(id).await?)
  }

  // --- Categories ---

  pub async fn create_category(&self, name: &str) -> Result<Category> {
    if name.trim().is_empty() {
      return Err(AppError::Validation("Category name must not be empty.".to_string()));
    }
    let input = NewCategory {
      name: name.trim().to_string(),
      active: true,
    };
    Ok(self.categories.create(&input).await?)
  }

  pub async fn update_category(&self, id: Uuid, patch: &CategoryPatch) -> Result<Category> {
    Ok(self.categories.update(id, patch).await?)
  }

  /// Flips `active`. The row stays; inactive categories only drop out of [`Catalog::active_categories`].
  #[instrument(name = "Catalog::toggle_category", skip(self), err(Display))]
  pub async fn toggle_category(&self, id: Uuid) -> Result<Category> {
    let current = self.categories.find_by_id(id).ok_or_else(|| missing::<Category>(id))?;
    let patch = CategoryPatch {
      active: Some(!current.active),
      ..Default::default()
    };
    let updated = self.categories.update(id, &patch).await?;
    info!(category = %updated.name, active = updated.active, "Category toggled.");
    Ok(updated)
  }

  /// Deletes a category. Products keep their (now dangling) `category_id`.
  pub async fn delete_category(&self, id: Uuid) -> Result<()> {
    let orphans = self.products.view(|items| views::filter_by_key(items, Some(id), |p| p.category_id).len());
    if orphans > 0 {
      warn!(category_id = %id, orphans, "Deleting a category that products still reference.");
    }
    Ok(self.categories.delete(id).await?)
  }

  // --- Services ---

  pub async fn create_service(&self, input: &NewService) -> Result<Service> {
    validate_listing(&input.name, input.price)?;
    Ok(self.services.create(input).await?)
  }

  pub async fn create_service_with_media(&self, mut input: NewService, image: Option<Upload>) -> Result<Service> {
    validate_listing(&input.name, input.price)?;
    if let Some(url) = media::upload_optional(self.store.as_ref(), MediaPrefix::Service, image).await? {
      input.media_url = Some(url);
    }
    self.create_service(&input).await
  }

  pub async fn update_service(&self, id: Uuid, patch: &ServicePatch) -> Result<Service> {
    if let Some(price) = patch.price {
      validate_price(price)?;
    }
    Ok(self.services.update(id, patch).await?)
  }

  pub async fn delete_service(&self, id: Uuid) -> Result<()> {
    Ok(self.services.delete(id).await?)
  }

  // --- Views ---

  pub fn product(&self, id: Uuid) -> Option<Product> {
    self.products.find_by_id(id)
  }

  pub fn service(&self, id: Uuid) -> Option<Service> {
    self.services.find_by_id(id)
  }

  pub fn search_products(&self, needle: &str) -> Vec<Product> {
    self
      .products
      .view(|items| views::search(items, needle, |p| p.name.as_str()).into_iter().cloned().collect())
  }

  /// `None` selects products without a category.
  pub fn products_in_category(&self, category_id: Option<Uuid>) -> Vec<Product> {
    self
      .products
      .view(|items| views::filter_by_key(items, category_id, |p| p.category_id).into_iter().cloned().collect())
  }

  pub fn products_in_price_range(&self, min: Option<f64>, max: Option<f64>) -> Vec<Product> {
    self
      .products
      .view(|items| views::filter_by_range(items, min, max, |p| p.price).into_iter().cloned().collect())
  }

  /// What customer navigation shows.
  pub fn active_categories(&self) -> Vec<Category> {
    self.partition_categories().0
  }

  pub fn inactive_categories(&self) -> Vec<Category> {
    self.partition_categories().1
  }

  fn partition_categories(&self) -> (Vec<Category>, Vec<Category>) {
    self.categories.view(|items| {
      let (active, inactive) = views::partition_by_flag(items, |c| c.active);
      (active.into_iter().cloned().collect(), inactive.into_iter().cloned().collect())
    })
  }

  pub fn search_services(&self, needle: &str) -> Vec<Service> {
    self
      .services
      .view(|items| views::search(items, needle, |s| s.name.as_str()).into_iter().cloned().collect())
  }
}
