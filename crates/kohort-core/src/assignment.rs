//! The assignment service: store lookup, targeting, then bucketing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  bucketing::assign_variant,
  context::UserContext,
  experiment::{Experiment, VariantConfig},
  store::ExperimentStore,
  targeting,
};

/// The answer to "which variant, if any, does this user get?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssignmentResult {
  #[serde(rename_all = "camelCase")]
  Assigned {
    experiment_id:  Uuid,
    /// The experiment version the assignment was computed against.
    version:        u64,
    variant_name:   String,
    variant_config: VariantConfig,
  },
  /// Targeting rules excluded this user.
  NotEligible,
  NotFound,
  /// The experiment is paused.
  ExperimentNotActive,
}

impl AssignmentResult {
  pub fn variant_name(&self) -> Option<&str> {
    match self {
      Self::Assigned { variant_name, .. } => Some(variant_name),
      _ => None,
    }
  }
}

/// Assign `context` within a single experiment snapshot. Pure.
pub fn evaluate(experiment: &Experiment, context: &UserContext) -> AssignmentResult {
  if !experiment.active {
    return AssignmentResult::ExperimentNotActive;
  }
  if !targeting::matches(experiment, context) {
    return AssignmentResult::NotEligible;
  }

  match assign_variant(experiment, &context.user_id) {
    Some(variant) => AssignmentResult::Assigned {
      experiment_id:  experiment.id,
      version:        experiment.version,
      variant_name:   variant.name.clone(),
      variant_config: variant.config.clone(),
    },
    None => {
      // Only reachable if the stored weights were tampered with.
      tracing::error!(
        id = %experiment.id,
        version = experiment.version,
        "variant weights do not cover the bucket range"
      );
      AssignmentResult::NotEligible
    }
  }
}

/// Answers assignment requests against the current contents of a store.
pub struct AssignmentService<S> {
  store: Arc<S>,
}

impl<S> Clone for AssignmentService<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: ExperimentStore> AssignmentService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Look up `experiment_id` and assign `context` within it.
  ///
  /// Only store failures are errors; an unknown experiment is
  /// [`AssignmentResult::NotFound`].
  pub async fn get_assignment(
    &self,
    experiment_id: Uuid,
    context: &UserContext,
  ) -> Result<AssignmentResult> {
    let Some(experiment) = self.store.get(experiment_id).await? else {
      tracing::debug!(%experiment_id, "assignment for unknown experiment");
      return Ok(AssignmentResult::NotFound);
    };

    let result = evaluate(&experiment, context);
    tracing::debug!(
      %experiment_id,
      version = experiment.version,
      user_id = %context.user_id,
      variant = result.variant_name().unwrap_or("-"),
      "assignment evaluated"
    );
    Ok(result)
  }
}
