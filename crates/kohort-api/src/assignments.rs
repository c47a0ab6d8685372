//! Handlers for `/experiments/:id/assignment`.
//!
//! `GET` takes the user id as `?userId=` and treats every other query
//! parameter as a string attribute. `POST` takes a full [`UserContext`] body,
//! which allows numeric and boolean attributes.
//!
//! An unknown experiment is a 404; every other outcome (including
//! `not_eligible` and `experiment_not_active`) is a 200 with the
//! [`AssignmentResult`] as the body.

use std::collections::HashMap;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
};
use kohort_core::{
  assignment::AssignmentResult,
  context::{AttributeValue, UserContext},
  store::ExperimentStore,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Query parameter carrying the user id.
const USER_ID_PARAM: &str = "userId";

/// `GET /experiments/:id/assignment?userId=<id>[&<attribute>=<value>...]`
pub async fn by_query<S>(
  State(state): State<ApiState<S>>,
  path: Result<Path<Uuid>, PathRejection>,
  query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<AssignmentResult>, ApiError>
where
  S: ExperimentStore,
{
  let Path(id) = path?;
  let Query(mut params) = query?;

  let user_id = params.remove(USER_ID_PARAM).unwrap_or_default();
  let context = UserContext {
    user_id,
    attributes: params
      .into_iter()
      .map(|(k, v)| (k, AttributeValue::String(v)))
      .collect(),
  };

  assign(&state, id, context).await
}

/// `POST /experiments/:id/assignment` with a [`UserContext`] body.
pub async fn by_body<S>(
  State(state): State<ApiState<S>>,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<UserContext>, JsonRejection>,
) -> Result<Json<AssignmentResult>, ApiError>
where
  S: ExperimentStore,
{
  let Path(id) = path?;
  let Json(context) = body?;
  assign(&state, id, context).await
}

async fn assign<S>(
  state: &ApiState<S>,
  id: Uuid,
  context: UserContext,
) -> Result<Json<AssignmentResult>, ApiError>
where
  S: ExperimentStore,
{
  if context.user_id.trim().is_empty() {
    return Err(ApiError::BadRequest("userId: must not be empty".into()));
  }

  match state.assignments.get_assignment(id, &context).await? {
    AssignmentResult::NotFound => {
      Err(ApiError::NotFound(format!("experiment {id} not found")))
    }
    result => Ok(Json(result)),
  }
}
