// cardshop/src/config.rs

use crate::errors::{AppError, Result}; // Use AppError specific Result
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

/// Which store backend `STORE_URL` selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
  /// `memory://`: in-process tables, lost on exit.
  Memory,
  Postgres(String),
}

impl StoreUrl {
  pub fn parse(raw: &str) -> Result<Self> {
    let raw = raw.trim();
    if raw == "memory" || raw.starts_with("memory://") {
      Ok(StoreUrl::Memory)
    } else if raw.starts_with("postgres://") || raw.starts_with("postgresql://") {
      Ok(StoreUrl::Postgres(raw.to_string()))
    } else {
      Err(AppError::Config(format!(
        "Unsupported STORE_URL '{}': expected memory:// or postgres://",
        raw
      )))
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      StoreUrl::Memory => "memory",
      StoreUrl::Postgres(_) => "postgres",
    }
  }
}

#[derive(Clone)]
pub struct AppConfig {
  pub store_url: StoreUrl,
  pub public_key: String,
  pub service_key: String,

  // Media uploads: where blobs are written and the base their public URLs start with
  pub media_public_url: String,
  pub media_root: PathBuf,

  /// Phone number the checkout deep link is addressed to.
  pub order_phone_number: Option<String>,

  // Optional: for seeding demo catalog data on startup
  pub seed_demo: bool,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let store_url = StoreUrl::parse(&get_env("STORE_URL").unwrap_or_else(|_| "memory://".to_string()))?;
    let public_key = get_env("STORE_PUBLIC_KEY")?;
    let service_key = get_env("STORE_SERVICE_KEY")?;
    if public_key == service_key {
      return Err(AppError::Config(
        "STORE_PUBLIC_KEY and STORE_SERVICE_KEY must differ".to_string(),
      ));
    }

    let media_public_url = get_env("MEDIA_PUBLIC_URL").unwrap_or_else(|_| match store_url {
      StoreUrl::Memory => "memory://blobs".to_string(),
      StoreUrl::Postgres(_) => "http://127.0.0.1:8080/media".to_string(),
    });
    let media_root = PathBuf::from(get_env("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()));
    let order_phone_number = get_env("ORDER_PHONE_NUMBER").ok().filter(|p| !p.trim().is_empty());

    let seed_demo = get_env("SEED_DEMO")
      .unwrap_or_else(|_| "false".to_string())
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid SEED_DEMO value: {}", e)))?;

    tracing::info!(store = ?store_url.kind(), seed_demo, "Application configuration loaded successfully.");

    Ok(Self {
      store_url,
      public_key,
      service_key,
      media_public_url,
      media_root,
      order_phone_number,
      seed_demo,
    })
  }

  /// Configuration for an in-process store, used by tests and local demos.
  pub fn in_memory(public_key: &str, service_key: &str) -> Self {
    Self {
      store_url: StoreUrl::Memory,
      public_key: public_key.to_string(),
      service_key: service_key.to_string(),
      media_public_url: "memory://blobs".to_string(),
      media_root: PathBuf::from("./media"),
      order_phone_number: None,
      seed_demo: false,
    }
  }
}

// Keys and the database URL never reach the logs.
impl std::fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AppConfig")
      .field("store_url", &self.store_url.kind())
      .field("public_key", &"[REDACTED]")
      .field("service_key", &"[REDACTED]")
      .field("media_public_url", &self.media_public_url)
      .field("media_root", &self.media_root)
      .field("order_phone_number", &self.order_phone_number)
      .field("seed_demo", &self.seed_demo)
      .finish()
  }
}
