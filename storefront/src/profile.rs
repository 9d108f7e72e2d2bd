// cardshop/src/profile.rs

//! Lazy creation and lookup of the signed-in user's `users` row.

use crate::errors::{AppError, Result};
use crate::models::{Role, UserDetails};
use serde_json::Value;
use std::sync::Arc;
use tidemark::{Container, Entity, Merge, Principal, RemoteStore, Row, Scope, SyncError, Upsert};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct Profiles {
  user_id: Uuid,
  details: Container<UserDetails>,
  // Serializes bootstrap within this session; the store's unique key covers other sessions.
  bootstrap: Mutex<()>,
}

fn profile_row(user_id: Uuid, role: Role) -> Row {
  let mut row = Row::new();
  row.insert("user_id".into(), Value::String(user_id.to_string()));
  row.insert("role".into(), Value::String(role.as_str().to_string()));
  row
}

impl Profiles {
  pub fn new(store: Arc<dyn RemoteStore>, user_id: Uuid) -> Self {
    Self {
      user_id,
      details: Container::new(store, Scope::owner(user_id)),
      bootstrap: Mutex::new(()),
    }
  }

  pub fn details(&self) -> &Container<UserDetails> {
    &self.details
  }

  /// Returns the user's profile row, creating the default customer row on first access.
  ///
  /// Creation is an upsert keyed on `user_id` that keeps an existing row, so
  /// concurrent first accesses from several sessions still produce one row.
  #[instrument(name = "Profiles::ensure", skip(self), fields(user_id = %self.user_id), err(Display))]
  pub async fn ensure(&self) -> Result<UserDetails> {
    let _guard = self.bootstrap.lock().await;
    if !self.details.is_mounted() {
      self.details.initialize().await?;
    }

    let found = self.details.items();
    if found.len() > 1 {
      warn!(
        target: "data_repair",
        user_id = %self.user_id,
        rows = found.len(),
        kept = %found[0].id,
        "Duplicate users rows for one identity; using the oldest."
      );
    }
    if let Some(first) = found.into_iter().next() {
      return Ok(first);
    }

    let upsert = Upsert::on(["user_id"], Merge::Keep);
    let created = self
      .details
      .upsert(profile_row(self.user_id, Role::Customer), &upsert)
      .await?;
    info!(role = created.role.as_str(), "Profile row ensured.");
    Ok(created)
  }

  /// The profile as currently mirrored; `None` before [`Profiles::ensure`] ran.
  pub fn current(&self) -> Option<UserDetails> {
    self.details.view(|items| items.first().cloned())
  }

  pub fn is_admin(&self) -> bool {
    self.current().map_or(false, |d| d.is_admin())
  }

  pub fn unmount(&self) {
    self.details.unmount();
  }

  /// Assigns `role` to `user_id`, creating the row if needed. Needs the elevated store.
  #[instrument(name = "Profiles::set_role", skip(elevated), err(Display))]
  pub async fn set_role(elevated: &dyn RemoteStore, user_id: Uuid, role: Role) -> Result<UserDetails> {
    if elevated.principal() != Principal::Elevated {
      return Err(AppError::Sync(SyncError::Unauthorized(
        "changing roles requires the service key".to_string(),
      )));
    }
    let upsert = Upsert::on(["user_id"], Merge::Replace);
    let row = elevated.upsert(UserDetails::TABLE, profile_row(user_id, role), &upsert).await?;
    let details = UserDetails::from_row(row)?;
    info!(%user_id, role = role.as_str(), "Role assigned.");
    Ok(details)
  }
}
