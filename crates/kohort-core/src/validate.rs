//! Structural and semantic checks on an [`ExperimentDraft`].
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. `name` is non-empty after trimming.
//! 2. `variants` is non-empty; each name is non-empty and unique; each weight
//!    is positive (and at most [`TOTAL_WEIGHT`]); each config is an object.
//! 3. Weights sum to exactly [`TOTAL_WEIGHT`]. Nothing is normalised.
//! 4. Each targeting rule has a known `type` and a well-formed `value`.
//!
//! Validation is pure: no I/O, no side effects.

use std::collections::HashSet;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::experiment::{
  AttributeEquals, AttributeInSet, AttributeMatches, ExperimentDraft, RuleDraft,
  TargetingRule, Variant, VariantConfig, VariantDraft,
};

/// Variant weights must add up to exactly this.
pub const TOTAL_WEIGHT: u32 = 100;

/// A rejected definition: which field, and what is wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
  /// Path to the offending field, e.g. `variants[1].weight`.
  pub field:   String,
  pub message: String,
}

impl ValidationError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self { field: field.into(), message: message.into() }
  }
}

/// A draft that passed every check, with rules converted to their typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDefinition {
  pub name:            String,
  pub description:     Option<String>,
  pub variants:        Vec<Variant>,
  pub targeting_rules: Vec<TargetingRule>,
  pub active:          bool,
}

/// Validate `draft`, returning the typed definition or the first error.
pub fn validate(
  draft: &ExperimentDraft,
) -> Result<ValidatedDefinition, ValidationError> {
  if draft.name.trim().is_empty() {
    return Err(ValidationError::new("name", "must not be empty"));
  }

  let variants = validate_variants(&draft.variants)?;

  let total: u32 = variants.iter().map(|v| v.weight).sum();
  if total != TOTAL_WEIGHT {
    return Err(ValidationError::new(
      "variants",
      format!("weights must sum to {TOTAL_WEIGHT}, got {total}"),
    ));
  }

  let targeting_rules = draft
    .targeting_rules
    .iter()
    .enumerate()
    .map(|(i, rule)| validate_rule(i, rule))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(ValidatedDefinition {
    name: draft.name.clone(),
    description: draft.description.clone(),
    variants,
    targeting_rules,
    active: draft.active.unwrap_or(true),
  })
}

// ─── Variants ────────────────────────────────────────────────────────────────

fn validate_variants(
  drafts: &[VariantDraft],
) -> Result<Vec<Variant>, ValidationError> {
  if drafts.is_empty() {
    return Err(ValidationError::new(
      "variants",
      "at least one variant is required",
    ));
  }

  let mut seen = HashSet::new();
  let mut variants = Vec::with_capacity(drafts.len());

  for (i, draft) in drafts.iter().enumerate() {
    let name = draft.name.trim();
    if name.is_empty() {
      return Err(ValidationError::new(
        format!("variants[{i}].name"),
        "must not be empty",
      ));
    }
    if !seen.insert(name) {
      return Err(ValidationError::new(
        format!("variants[{i}].name"),
        format!("duplicate variant name {name:?}"),
      ));
    }

    if draft.weight <= 0 {
      return Err(ValidationError::new(
        format!("variants[{i}].weight"),
        "must be positive",
      ));
    }
    let weight = u32::try_from(draft.weight)
      .ok()
      .filter(|w| *w <= TOTAL_WEIGHT)
      .ok_or_else(|| {
        ValidationError::new(
          format!("variants[{i}].weight"),
          format!("must be at most {TOTAL_WEIGHT}"),
        )
      })?;

    let config = match &draft.config {
      serde_json::Value::Null => VariantConfig::new(),
      serde_json::Value::Object(map) => map.clone(),
      _ => {
        return Err(ValidationError::new(
          format!("variants[{i}].config"),
          "must be an object",
        ));
      }
    };

    variants.push(Variant { name: draft.name.clone(), weight, config });
  }

  Ok(variants)
}

// ─── Targeting rules ─────────────────────────────────────────────────────────

fn validate_rule(
  index: usize,
  draft: &RuleDraft,
) -> Result<TargetingRule, ValidationError> {
  let field = format!("targetingRules[{index}].value");

  match draft.kind.as_str() {
    "percentage" => draft
      .value
      .as_u64()
      .and_then(|p| u8::try_from(p).ok())
      .filter(|p| u32::from(*p) <= TOTAL_WEIGHT)
      .map(TargetingRule::Percentage)
      .ok_or_else(|| {
        ValidationError::new(field, "must be an integer between 0 and 100")
      }),

    "attribute-equals" => {
      let rule: AttributeEquals = payload(&field, &draft.value)?;
      require_attribute(&field, &rule.attribute)?;
      Ok(TargetingRule::AttributeEquals(rule))
    }

    "attribute-in-set" => {
      let rule: AttributeInSet = payload(&field, &draft.value)?;
      require_attribute(&field, &rule.attribute)?;
      Ok(TargetingRule::AttributeInSet(rule))
    }

    "attribute-matches" => {
      let rule: AttributeMatches = payload(&field, &draft.value)?;
      require_attribute(&field, &rule.attribute)?;
      Regex::new(&rule.pattern).map_err(|e| {
        ValidationError::new(
          format!("{field}.pattern"),
          format!("invalid regular expression: {e}"),
        )
      })?;
      Ok(TargetingRule::AttributeMatches(rule))
    }

    "" => Err(ValidationError::new(
      format!("targetingRules[{index}].type"),
      "must not be empty",
    )),

    other => Err(ValidationError::new(
      format!("targetingRules[{index}].type"),
      format!("unknown rule type {other:?}"),
    )),
  }
}

fn payload<T: DeserializeOwned>(
  field: &str,
  value: &serde_json::Value,
) -> Result<T, ValidationError> {
  serde_json::from_value(value.clone())
    .map_err(|e| ValidationError::new(field, e.to_string()))
}

fn require_attribute(field: &str, attribute: &str) -> Result<(), ValidationError> {
  if attribute.trim().is_empty() {
    return Err(ValidationError::new(
      format!("{field}.attribute"),
      "must not be empty",
    ));
  }
  Ok(())
}
