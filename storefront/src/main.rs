// cardshop/src/main.rs

use cardshop::seed::seed_demo;
use cardshop::{AppConfig, AppState};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan; // For span events in tracing

const DEMO_ADMIN_EMAIL: &str = "admin@cardshop.local";

#[tokio::main]
async fn main() -> ExitCode {
  // Initialize tracing subscriber for logging
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO) // Default level
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  if std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json")) {
    builder.json().init();
  } else {
    builder.init();
  }

  tracing::info!("Starting cardshop...");

  // Load application configuration
  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return ExitCode::FAILURE;
    }
  };

  let state = match AppState::build(app_config).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to connect to the store.");
      return ExitCode::FAILURE;
    }
  };

  // Seed demo data if configured
  if state.config.seed_demo {
    let seeded = match state.elevated() {
      Ok(elevated) => seed_demo(elevated.as_ref(), DEMO_ADMIN_EMAIL).await,
      Err(e) => Err(e),
    };
    if let Err(e) = seeded {
      tracing::error!(error = %e, "Failed to seed demo data.");
    }
  }

  let storefront = state.storefront.clone();
  if let Err(e) = storefront.start().await {
    // The mirrors stay empty; nothing is retried.
    tracing::error!(error = %e, notice = ?e.user_message(), "Catalog could not be loaded.");
  }

  let catalog = storefront.catalog();
  tracing::info!(
    products = catalog.products().len(),
    active_categories = catalog.active_categories().len(),
    services = catalog.services().len(),
    "Storefront ready. Press Ctrl-C to stop."
  );

  // Follow the catalog until shutdown.
  let mut products = catalog.products().watch();
  let mut categories = catalog.categories().watch();
  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      changed = products.changed() => {
        if changed.is_err() { break; }
        tracing::info!(products = catalog.products().len(), "Products changed.");
      }
      changed = categories.changed() => {
        if changed.is_err() { break; }
        tracing::info!(active = catalog.active_categories().len(), "Categories changed.");
      }
    }
  }

  tracing::info!("Shutting down.");
  ExitCode::SUCCESS
}
