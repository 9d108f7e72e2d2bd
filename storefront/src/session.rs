// cardshop/src/session.rs

//! `Storefront`: the application root every container is reached through.
//!
//! It is built once from the configuration and a store backend and handed to
//! the presentation layer explicitly. Signing in (or out) tears down every
//! mirror bound to the previous identity and mounts fresh ones.

use crate::cart::Cart;
use crate::catalog::Catalog;
use crate::checkout;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::UserDetails;
use crate::profile::Profiles;
use crate::requests::RequestBoard;
use parking_lot::RwLock;
use std::sync::Arc;
use tidemark::{Connector, SyncError};
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Containers bound to one signed-in identity.
pub struct Session {
  user_id: Uuid,
  profile: Profiles,
  catalog: Arc<Catalog>,
  cart: Arc<Cart>,
  requests: Arc<RequestBoard>,
  admin: OnceCell<Arc<AdminConsole>>,
}

impl Session {
  pub fn user_id(&self) -> Uuid {
    self.user_id
  }

  pub fn profile(&self) -> &Profiles {
    &self.profile
  }

  pub fn is_admin(&self) -> bool {
    self.profile.is_admin()
  }

  fn unmount(&self) {
    self.profile.unmount();
    self.catalog.unmount();
    self.cart.unmount();
    self.requests.unmount();
    if let Some(admin) = self.admin.get() {
      admin.requests.unmount();
    }
  }
}

/// The admin variant: the catalog with write access plus the global request feed.
pub struct AdminConsole {
  catalog: Arc<Catalog>,
  requests: RequestBoard,
}

impl AdminConsole {
  pub fn catalog(&self) -> &Catalog {
    &self.catalog
  }

  pub fn requests(&self) -> &RequestBoard {
    &self.requests
  }
}

pub struct Storefront {
  config: Arc<AppConfig>,
  connector: Arc<dyn Connector>,
  // Anonymous catalog shown while nobody is signed in.
  guest_catalog: Arc<Catalog>,
  session: RwLock<Option<Arc<Session>>>,
}

fn sign_in_required() -> AppError {
  AppError::Sync(SyncError::Unauthorized("sign in required".to_string()))
}

impl Storefront {
  pub fn new(config: Arc<AppConfig>, connector: Arc<dyn Connector>) -> Result<Self> {
    let anonymous = connector.connect(&config.public_key, None)?;
    Ok(Self {
      guest_catalog: Arc::new(Catalog::new(anonymous)),
      config,
      connector,
      session: RwLock::new(None),
    })
  }

  pub fn config(&self) -> &AppConfig {
    &self.config
  }

  /// Mounts the guest catalog.
  pub async fn start(&self) -> Result<()> {
    self.guest_catalog.initialize().await
  }

  pub fn session(&self) -> Option<Arc<Session>> {
    self.session.read().clone()
  }

  /// Switches to `user_id`: the profile row is ensured and the catalog, cart
  /// and requests are mounted for the new identity, then the previous
  /// identity's mirrors are torn down. If mounting fails, whatever was mounted
  /// before (session or guest catalog) stays in place and keeps following.
  #[instrument(name = "Storefront::sign_in", skip(self), err(Display))]
  pub async fn sign_in(&self, user_id: Uuid) -> Result<Arc<Session>> {
    let store = self.connector.connect(&self.config.public_key, Some(user_id))?;
    let session = Arc::new(Session {
      user_id,
      profile: Profiles::new(store.clone(), user_id),
      catalog: Arc::new(Catalog::new(store.clone())),
      cart: Arc::new(Cart::new(store.clone(), user_id)),
      requests: Arc::new(RequestBoard::customer(store, user_id)),
      admin: OnceCell::new(),
    });

    let details = match Self::mount(&session).await {
      Ok(details) => details,
      Err(e) => {
        session.unmount();
        warn!(%user_id, error = %e, "Sign-in failed; keeping the current mounts.");
        return Err(e);
      }
    };

    self.teardown();
    self.guest_catalog.unmount();
    *self.session.write() = Some(session.clone());
    info!(role = details.role.as_str(), "Signed in.");
    Ok(session)
  }

  async fn mount(session: &Session) -> Result<UserDetails> {
    let details = session.profile.ensure().await?;
    let (catalog, cart, requests) = tokio::join!(
      session.catalog.initialize(),
      session.cart.initialize(),
      session.requests.initialize()
    );
    catalog.and(cart).and(requests)?;
    Ok(details)
  }

  /// Drops the current identity's mirrors and remounts the guest catalog.
  pub async fn sign_out(&self) -> Result<()> {
    self.teardown();
    self.guest_catalog.initialize().await
  }

  fn teardown(&self) {
    let previous = self.session.write().take();
    if let Some(previous) = previous {
      previous.unmount();
      info!(user_id = %previous.user_id, "Signed out.");
    }
  }

  /// The catalog for the current identity, or the guest catalog.
  pub fn catalog(&self) -> Arc<Catalog> {
    match self.session() {
      Some(session) => session.catalog.clone(),
      None => self.guest_catalog.clone(),
    }
  }

  pub fn cart(&self) -> Result<Arc<Cart>> {
    self.session().map(|s| s.cart.clone()).ok_or_else(sign_in_required)
  }

  pub fn requests(&self) -> Result<Arc<RequestBoard>> {
    self.session().map(|s| s.requests.clone()).ok_or_else(sign_in_required)
  }

  /// The admin console for the signed-in admin, mounted on first use.
  #[instrument(name = "Storefront::admin", skip(self), err(Display))]
  pub async fn admin(&self) -> Result<Arc<AdminConsole>> {
    let session = self.session().ok_or_else(sign_in_required)?;
    if !session.is_admin() {
      return Err(AppError::Sync(SyncError::Unauthorized(format!(
        "user {} is not an admin",
        session.user_id
      ))));
    }
    let console = session
      .admin
      .get_or_try_init(|| async {
        let store = self.connector.connect(&self.config.public_key, Some(session.user_id))?;
        let elevated = self.connector.connect(&self.config.service_key, None)?;
        let requests = RequestBoard::admin(store, elevated);
        requests.initialize().await?;
        Ok::<_, AppError>(Arc::new(AdminConsole {
          catalog: session.catalog.clone(),
          requests,
        }))
      })
      .await?;
    Ok(console.clone())
  }

  /// Deep link handing the current cart to the shop's phone number.
  pub fn checkout_link(&self) -> Result<String> {
    let phone = self
      .config
      .order_phone_number
      .as_deref()
      .ok_or_else(|| AppError::Config("ORDER_PHONE_NUMBER is not set".to_string()))?;
    let cart = self.cart()?;
    let lines = cart.lines(&self.catalog());
    if lines.is_empty() {
      return Err(AppError::Validation("The cart is empty.".to_string()));
    }
    checkout::whatsapp_link(phone, &checkout::order_summary(&lines))
  }
}
