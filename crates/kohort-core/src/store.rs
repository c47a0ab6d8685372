//! The `ExperimentStore` trait.
//!
//! The trait is implemented by storage backends ([`crate::memory::MemoryStore`]
//! here, `kohort-store-sqlite` elsewhere). Higher layers (`kohort-api`, the
//! [`crate::assignment::AssignmentService`]) depend on this abstraction, not
//! on any concrete backend.

use std::{future::Future, sync::Arc};

use uuid::Uuid;

use crate::{Result, experiment::{Experiment, ExperimentDraft}};

/// Versioned, concurrency-safe holder of experiment definitions.
///
/// Every write validates its draft before touching storage. Reads return a
/// complete snapshot; a half-applied update is never observable. Writes to
/// one experiment never wait on writes to another.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ExperimentStore: Send + Sync {
  /// Validate `draft` and persist it as a new experiment with a fresh id and
  /// `version = 1`.
  ///
  /// Fails with [`crate::Error::Validation`] if the draft is rejected.
  fn create(
    &self,
    draft: ExperimentDraft,
  ) -> impl Future<Output = Result<Arc<Experiment>>> + Send + '_;

  /// Retrieve an experiment by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Arc<Experiment>>>> + Send + '_;

  /// Replace the definition of experiment `id`, provided its current version
  /// is still `expected_version`. On success the version is bumped by one.
  ///
  /// Errors, checked in this order: [`crate::Error::Validation`],
  /// [`crate::Error::NotFound`], [`crate::Error::VersionConflict`].
  fn update(
    &self,
    id: Uuid,
    draft: ExperimentDraft,
    expected_version: u64,
  ) -> impl Future<Output = Result<Arc<Experiment>>> + Send + '_;

  /// All experiments, oldest first.
  fn list(&self) -> impl Future<Output = Result<Vec<Arc<Experiment>>>> + Send + '_;
}
