//! JSON REST API for Kohort.
//!
//! Exposes an axum [`Router`] backed by any
//! [`kohort_core::store::ExperimentStore`]. TLS, auth, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", kohort_api::api_router(store.clone()))
//! ```

pub mod assignments;
pub mod error;
pub mod experiments;

use std::sync::Arc;

use axum::{Router, routing::get};
use kohort_core::{assignment::AssignmentService, store::ExperimentStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:       Arc<S>,
  pub assignments: AssignmentService<S>,
}

impl<S: ExperimentStore> ApiState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { assignments: AssignmentService::new(store.clone()), store }
  }
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), assignments: self.assignments.clone() }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ExperimentStore + 'static,
{
  Router::new()
    .route(
      "/experiments",
      get(experiments::list::<S>).post(experiments::create::<S>),
    )
    .route(
      "/experiments/{id}",
      get(experiments::get_one::<S>).put(experiments::update::<S>),
    )
    .route(
      "/experiments/{id}/assignment",
      get(assignments::by_query::<S>).post(assignments::by_body::<S>),
    )
    .with_state(ApiState::new(store))
}
