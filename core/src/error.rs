// tidemark/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Closed classification of every failure a store call or container operation can produce.
///
/// Callers branch on this instead of matching every `SyncError` variant,
/// e.g. redirect-to-login on `Unauthorized` vs. a generic toast otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  Unauthorized,
  NotFound,
  Conflict,
  Unavailable,
  Unknown,
}

#[derive(Debug, Error)]
pub enum SyncError {
  #[error("Not authorized: {0}")]
  Unauthorized(String),

  #[error("Not found in '{table}': {detail}")]
  NotFound { table: String, detail: String },

  #[error("Unique key ({key}) already taken in '{table}'")]
  Conflict { table: String, key: String },

  #[error("Store unavailable: {0}")]
  Unavailable(String),

  #[error("Row of '{table}' could not be decoded. Source: {source}")]
  Decode {
    table: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Error in backend operation. Source: {source}")]
  Backend {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal tidemark error: {0}")]
  Internal(String),
}

impl SyncError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      SyncError::Unauthorized(_) => ErrorKind::Unauthorized,
      SyncError::NotFound { .. } => ErrorKind::NotFound,
      SyncError::Conflict { .. } => ErrorKind::Conflict,
      SyncError::Unavailable(_) => ErrorKind::Unavailable,
      SyncError::Decode { .. } | SyncError::Backend { .. } | SyncError::Internal(_) => ErrorKind::Unknown,
    }
  }

  pub(crate) fn not_found(table: &str, detail: impl Into<String>) -> Self {
    SyncError::NotFound {
      table: table.to_string(),
      detail: detail.into(),
    }
  }

  pub(crate) fn decode(table: &str, source: serde_json::Error) -> Self {
    SyncError::Decode {
      table: table.to_string(),
      source,
    }
  }
}

impl From<AnyhowError> for SyncError {
  fn from(err: AnyhowError) -> Self {
    SyncError::Backend { source: err }
  }
}

impl From<serde_json::Error> for SyncError {
  fn from(err: serde_json::Error) -> Self {
    SyncError::decode("<unknown>", err)
  }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for SyncError {
  fn from(err: sqlx::Error) -> Self {
    match &err {
      sqlx::Error::RowNotFound => SyncError::NotFound {
        table: "<unknown>".to_string(),
        detail: err.to_string(),
      },
      sqlx::Error::Database(db_err) if db_err.is_unique_violation() => SyncError::Conflict {
        table: db_err.table().unwrap_or("<unknown>").to_string(),
        key: db_err.constraint().unwrap_or("<unknown>").to_string(),
      },
      sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Tls(_) => {
        SyncError::Unavailable(err.to_string())
      }
      _ => SyncError::Backend { source: err.into() },
    }
  }
}

pub type SyncResult<T, E = SyncError> = std::result::Result<T, E>;
