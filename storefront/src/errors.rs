// cardshop/src/errors.rs

use thiserror::Error;
use tidemark::{ErrorKind, SyncError};

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Validation Error: {0}")]
  Validation(String),

  /// A media upload failed; the row that would have referenced it was not written.
  #[error("Upload to '{path}' failed: {source}")]
  Upload {
    path: String,
    #[source]
    source: SyncError,
  },

  #[error("Store Error: {0}")]
  Sync(#[from] SyncError),

  #[error("Internal Error: {0}")]
  Internal(String), // For miscellaneous errors
}

/// What the presentation layer should do with a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  /// The session is missing or no longer allowed to do this.
  RedirectToSignIn,
  Alert(String),
}

impl AppError {
  /// The store's classification of the failure, when it came from the store.
  pub fn kind(&self) -> Option<ErrorKind> {
    match self {
      AppError::Sync(e) | AppError::Upload { source: e, .. } => Some(e.kind()),
      _ => None,
    }
  }

  pub fn user_message(&self) -> Notice {
    match self {
      AppError::Sync(e) if e.kind() == ErrorKind::Unauthorized => Notice::RedirectToSignIn,
      AppError::Sync(e) => match e.kind() {
        ErrorKind::NotFound => Notice::Alert("That item no longer exists.".to_string()),
        ErrorKind::Conflict => Notice::Alert("That entry already exists.".to_string()),
        ErrorKind::Unavailable => Notice::Alert("The shop is unreachable right now. Please try again.".to_string()),
        _ => Notice::Alert("Something went wrong. Please try again.".to_string()),
      },
      AppError::Upload { .. } => Notice::Alert("The image could not be uploaded. Nothing was saved.".to_string()),
      AppError::Validation(m) => Notice::Alert(m.clone()),
      AppError::Config(_) | AppError::Internal(_) => Notice::Alert("Something went wrong. Please try again.".to_string()),
    }
  }
}

// Allow anyhow::Error to be converted into AppError::Internal for convenience
impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<SyncError>() {
      Ok(sync) => AppError::Sync(sync),
      Err(err) => AppError::Internal(err.to_string()),
    }
  }
}

// Define a Result type alias for the application
pub type Result<T, E = AppError> = std::result::Result<T, E>;
