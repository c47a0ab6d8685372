//! Handlers for `/experiments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/experiments` | Oldest first |
//! | `POST` | `/experiments` | Body: [`ExperimentDraft`]; returns 201 + stored experiment |
//! | `GET`  | `/experiments/:id` | 404 if not found |
//! | `PUT`  | `/experiments/:id` | Body: [`UpdateBody`]; 409 on a stale `expectedVersion` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use kohort_core::{
  experiment::{Experiment, ExperimentDraft},
  store::ExperimentStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /experiments`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
) -> Result<Json<Vec<Arc<Experiment>>>, ApiError>
where
  S: ExperimentStore,
{
  Ok(Json(state.store.list().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /experiments`: returns 201 and the stored [`Experiment`].
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  body: Result<Json<ExperimentDraft>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ExperimentStore,
{
  let Json(draft) = body?;
  let experiment = state.store.create(draft).await?;
  Ok((StatusCode::CREATED, Json(experiment)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /experiments/:id`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Arc<Experiment>>, ApiError>
where
  S: ExperimentStore,
{
  let Path(id) = path?;
  let experiment = state
    .store
    .get(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("experiment {id} not found")))?;
  Ok(Json(experiment))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `PUT /experiments/:id`: a full definition plus the
/// version the client last saw.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
  pub expected_version: u64,
  #[serde(flatten)]
  pub draft:            ExperimentDraft,
}

/// `PUT /experiments/:id`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<Json<Arc<Experiment>>, ApiError>
where
  S: ExperimentStore,
{
  let Path(id) = path?;
  let Json(body) = body?;
  let experiment = state
    .store
    .update(id, body.draft, body.expected_version)
    .await?;
  Ok(Json(experiment))
}
