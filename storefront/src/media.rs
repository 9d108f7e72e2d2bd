// cardshop/src/media.rs

//! Image uploads. Every upload happens before the row that references it is
//! written, so a failed upload never leaves a row with a missing media URL.

use crate::errors::{AppError, Result};
use crate::schema::MEDIA_BUCKET;
use tidemark::store::blob::{blob_path, extension_of};
use tidemark::RemoteStore;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPrefix {
  CardFront,
  CardBack,
  Service,
  WantToBuy,
}

impl MediaPrefix {
  pub fn as_str(&self) -> &'static str {
    match self {
      MediaPrefix::CardFront => "cards/front/",
      MediaPrefix::CardBack => "cards/back/",
      MediaPrefix::Service => "services/",
      MediaPrefix::WantToBuy => "want-to-buy/",
    }
  }
}

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct Upload {
  pub file_name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl Upload {
  pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
    Self {
      file_name: file_name.into(),
      content_type: content_type.into(),
      bytes,
    }
  }
}

/// Uploads `file` under `prefix` and returns the public URL to store in the owning row.
#[instrument(name = "media::upload", skip(store, file), fields(prefix = prefix.as_str(), size = file.bytes.len()), err(Display))]
pub async fn upload(store: &dyn RemoteStore, prefix: MediaPrefix, file: Upload) -> Result<String> {
  if file.bytes.is_empty() {
    return Err(AppError::Validation(format!("'{}' is empty", file.file_name)));
  }
  let path = blob_path(prefix.as_str(), extension_of(&file.file_name));
  match store.upload_blob(MEDIA_BUCKET, &path, file.bytes, &file.content_type).await {
    Ok(url) => {
      info!(%path, "Media uploaded.");
      Ok(url)
    }
    Err(source) => {
      error!(%path, error = %source, "Media upload failed; aborting before the row is written.");
      Err(AppError::Upload { path, source })
    }
  }
}

/// Uploads an optional file; `None` passes through.
pub async fn upload_optional(store: &dyn RemoteStore, prefix: MediaPrefix, file: Option<Upload>) -> Result<Option<String>> {
  match file {
    Some(file) => upload(store, prefix, file).await.map(Some),
    None => Ok(None),
  }
}
