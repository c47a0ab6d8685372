//! Targeting rule evaluation.
//!
//! Rules are AND-ed in declaration order and evaluation stops at the first
//! miss. A rule that cannot be applied to the context (missing attribute,
//! wrong attribute type, empty user id for a percentage gate) evaluates to
//! `false` instead of failing the request.

use regex::Regex;
use uuid::Uuid;

use crate::{
  bucketing::{TARGETING_SALT, bucket},
  context::UserContext,
  experiment::{Experiment, TargetingRule},
};

/// Whether `context` passes every targeting rule of `experiment`.
/// An experiment without rules matches everyone.
pub fn matches(experiment: &Experiment, context: &UserContext) -> bool {
  experiment
    .targeting_rules
    .iter()
    .all(|rule| rule.matches(experiment.id, context))
}

impl TargetingRule {
  /// Evaluate this rule. Returns `false` if the rule cannot be applied.
  pub fn matches(&self, experiment_id: Uuid, context: &UserContext) -> bool {
    self.try_matches(experiment_id, context).unwrap_or(false)
  }

  /// Evaluate this rule, returning `None` if it cannot be applied.
  fn try_matches(&self, experiment_id: Uuid, context: &UserContext) -> Option<bool> {
    match self {
      Self::Percentage(percent) => {
        if context.user_id.is_empty() {
          return None;
        }
        let h = bucket(TARGETING_SALT, experiment_id, &context.user_id);
        Some(h < u32::from(*percent))
      }

      Self::AttributeEquals(rule) => {
        let attribute = context.attributes.get(&rule.attribute)?;
        Some(attribute.same_value(&rule.equals))
      }

      Self::AttributeInSet(rule) => {
        let member = context.attributes.get(&rule.attribute)?.to_member_string()?;
        Some(rule.values.iter().any(|v| *v == member))
      }

      Self::AttributeMatches(rule) => {
        let s = context.attributes.get(&rule.attribute)?.as_str()?;
        let regex = Regex::new(&rule.pattern).ok()?;
        Some(regex.is_match(s))
      }
    }
  }
}
