// cardshop/src/requests.rs

//! Card requests ("want to buy"): customers file them, admins work through them.

use crate::errors::{AppError, Result};
use crate::media::{self, MediaPrefix, Upload};
use crate::models::{Identity, NewWantToBuy, WantToBuy};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tidemark::{views, Container, Entity, Filter, Query, RemoteStore, Scope, SyncError};
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Serialize)]
struct RequestRow<'a> {
  user_id: Uuid,
  card_name: &'a str,
  condition: &'a str,
  media_url: Option<String>,
  done: bool,
}

#[derive(Serialize)]
struct DonePatch {
  done: bool,
}

enum Audience {
  /// The signed-in customer's own requests.
  Customer(Uuid),
  /// Every request; the elevated store resolves requester names.
  Admin { elevated: Arc<dyn RemoteStore> },
}

pub struct RequestBoard {
  audience: Audience,
  requests: Container<WantToBuy>,
}

impl RequestBoard {
  pub fn customer(store: Arc<dyn RemoteStore>, user_id: Uuid) -> Self {
    Self {
      audience: Audience::Customer(user_id),
      requests: Container::new(store, Scope::owner(user_id)),
    }
  }

  /// Global feed over all users' requests. `store` must belong to an admin.
  pub fn admin(store: Arc<dyn RemoteStore>, elevated: Arc<dyn RemoteStore>) -> Self {
    Self {
      audience: Audience::Admin { elevated },
      requests: Container::global(store),
    }
  }

  pub fn is_admin_board(&self) -> bool {
    matches!(self.audience, Audience::Admin { .. })
  }

  pub async fn initialize(&self) -> Result<()> {
    Ok(self.requests.initialize().await?)
  }

  pub fn unmount(&self) {
    self.requests.unmount();
  }

  pub fn requests(&self) -> &Container<WantToBuy> {
    &self.requests
  }

  /// Files a request. The optional reference photo is uploaded first; a failed
  /// upload aborts before the row is written.
  #[instrument(name = "RequestBoard::submit", skip_all, fields(card = %input.card_name), err(Display))]
  pub async fn submit(&self, input: &NewWantToBuy, photo: Option<Upload>) -> Result<WantToBuy> {
    let Audience::Customer(user_id) = self.audience else {
      return Err(AppError::Validation("Requests are filed from a customer session.".to_string()));
    };
    if input.card_name.trim().is_empty() {
      return Err(AppError::Validation("Card name must not be empty.".to_string()));
    }
    let media_url = media::upload_optional(self.requests.store().as_ref(), MediaPrefix::WantToBuy, photo).await?;
    let row = RequestRow {
      user_id,
      card_name: input.card_name.trim(),
      condition: input.condition.trim(),
      media_url,
      done: false,
    };
    let created = self.requests.create(&row).await?;
    info!(request_id = %created.id, "Card request filed.");
    Ok(created)
  }

  /// Staff only: the store rejects customers setting `done`.
  pub async fn mark_done(&self, id: Uuid, done: bool) -> Result<WantToBuy> {
    Ok(self.requests.update(id, &DonePatch { done }).await?)
  }

  pub async fn delete(&self, id: Uuid) -> Result<()> {
    Ok(self.requests.delete(id).await?)
  }

  /// `(done, open)`, each in mirror order.
  pub fn partition_done(&self) -> (Vec<WantToBuy>, Vec<WantToBuy>) {
    self.requests.view(|items| {
      let (done, open) = views::partition_by_flag(items, |r| r.done);
      (done.into_iter().cloned().collect(), open.into_iter().cloned().collect())
    })
  }

  pub fn search(&self, needle: &str) -> Vec<WantToBuy> {
    self
      .requests
      .view(|items| views::search(items, needle, |r| r.card_name.as_str()).into_iter().cloned().collect())
  }

  /// Display names of everyone with a request on the board, read through the elevated store.
  #[instrument(name = "RequestBoard::requester_names", skip(self), err(Display))]
  pub async fn requester_names(&self) -> Result<HashMap<Uuid, String>> {
    let Audience::Admin { elevated } = &self.audience else {
      return Err(AppError::Sync(SyncError::Unauthorized(
        "requester names are only available on the admin board".to_string(),
      )));
    };
    let requesters: BTreeSet<Uuid> = self.requests.view(|items| items.iter().map(|r| r.user_id).collect());
    if requesters.is_empty() {
      return Ok(HashMap::new());
    }

    let filter = Filter::all().any_of("id", requesters.iter().map(|id| id.to_string()));
    let rows = elevated.fetch(Identity::TABLE, &Query::new().filter(filter)).await?;
    let mut names = HashMap::with_capacity(rows.len());
    for row in rows {
      match Identity::from_row(row) {
        Ok(identity) => {
          names.insert(identity.id, identity.label());
        }
        Err(e) => warn!(error = %e, "Skipping undecodable identity row."),
      }
    }
    if names.len() < requesters.len() {
      warn!(
        missing = requesters.len() - names.len(),
        "Some requesters have no identity record."
      );
    }
    Ok(names)
  }
}
