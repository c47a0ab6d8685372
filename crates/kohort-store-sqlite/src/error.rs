//! Error type for `kohort-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] kohort_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored column holds a value outside its domain.
  #[error("corrupt column {column}: {value}")]
  Corrupt { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Domain errors pass through unchanged; everything else is a backend
/// failure.
impl From<Error> for kohort_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => kohort_core::Error::Store(Box::new(other)),
    }
  }
}
