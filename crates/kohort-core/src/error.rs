//! Error types for `kohort-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::validate::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0}")]
  Validation(#[from] ValidationError),

  #[error("experiment not found: {0}")]
  NotFound(Uuid),

  /// The caller's `expected_version` no longer matches the stored one.
  #[error(
    "version conflict on experiment {id}: expected {expected}, found {actual}"
  )]
  VersionConflict { id: Uuid, expected: u64, actual: u64 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A failure inside a concrete storage backend.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
