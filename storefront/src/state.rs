// cardshop/src/state.rs
use crate::config::{AppConfig, StoreUrl};
#[cfg(not(feature = "postgres"))]
use crate::errors::AppError;
use crate::errors::Result;
use crate::schema::storefront_schema;
use crate::session::Storefront;
use std::sync::Arc;
use tidemark::{Connector, MemoryStore, StoreKeys};
use tracing::info;

/// The store backend `STORE_URL` selected.
#[derive(Clone)]
pub enum Backend {
  Memory(MemoryStore),
  #[cfg(feature = "postgres")]
  Postgres(tidemark::PgStore),
}

impl Backend {
  /// Connects (and for PostgreSQL, migrates and installs the change feed).
  pub async fn from_config(config: &AppConfig) -> Result<Self> {
    let keys = StoreKeys::new(&config.public_key, &config.service_key);
    match &config.store_url {
      StoreUrl::Memory => {
        info!("Using the in-process store; data is lost on exit.");
        Ok(Backend::Memory(MemoryStore::with_public_base(
          storefront_schema(),
          keys,
          &config.media_public_url,
        )))
      }
      #[cfg(feature = "postgres")]
      StoreUrl::Postgres(url) => {
        let store = tidemark::PgStore::connect(
          url,
          storefront_schema(),
          keys,
          &config.media_root,
          &config.media_public_url,
        )
        .await?;
        store.run_script(include_str!("../migrations/schema.sql")).await?;
        store.install_change_feed().await?;
        info!("PostgreSQL store ready.");
        Ok(Backend::Postgres(store))
      }
      #[cfg(not(feature = "postgres"))]
      StoreUrl::Postgres(_) => Err(AppError::Config(
        "STORE_URL points at PostgreSQL but cardshop was built without the `postgres` feature".to_string(),
      )),
    }
  }

  pub fn connector(&self) -> Arc<dyn Connector> {
    match self {
      Backend::Memory(store) => Arc::new(store.clone()),
      #[cfg(feature = "postgres")]
      Backend::Postgres(store) => Arc::new(store.clone()),
    }
  }
}

#[derive(Clone)]
pub struct AppState {
  pub config: Arc<AppConfig>, // Share loaded config
  pub backend: Backend,
  pub storefront: Arc<Storefront>,
}

impl AppState {
  pub async fn build(config: AppConfig) -> Result<Self> {
    let config = Arc::new(config);
    let backend = Backend::from_config(&config).await?;
    let storefront = Storefront::new(config.clone(), backend.connector())?;
    Ok(Self {
      config,
      backend,
      storefront: Arc::new(storefront),
    })
  }

  /// Elevated handle for startup tasks such as seeding.
  pub fn elevated(&self) -> Result<Arc<dyn tidemark::RemoteStore>> {
    Ok(self.backend.connector().connect(&self.config.service_key, None)?)
  }
}
