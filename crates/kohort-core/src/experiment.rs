//! Experiment types: the stored form and the client-supplied draft.
//!
//! An [`Experiment`] is only ever produced from a [`ValidatedDefinition`], so
//! every stored experiment satisfies the weight invariants checked in
//! [`crate::validate`]. Variants and targeting rules have no identity of
//! their own; they live and die with their experiment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{context::AttributeValue, validate::ValidatedDefinition};

/// Opaque per-variant payload, handed back to callers verbatim.
pub type VariantConfig = serde_json::Map<String, serde_json::Value>;

// ─── Variants ────────────────────────────────────────────────────────────────

/// One arm of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
  /// Unique within the owning experiment.
  pub name:   String,
  /// Share of traffic in percentage points; all weights sum to 100.
  pub weight: u32,
  pub config: VariantConfig,
}

// ─── Targeting rules ─────────────────────────────────────────────────────────

/// Payload of an `attribute-equals` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEquals {
  pub attribute: String,
  pub equals:    AttributeValue,
}

/// Payload of an `attribute-in-set` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInSet {
  pub attribute: String,
  pub values:    Vec<String>,
}

/// Payload of an `attribute-matches` rule. The pattern is a regular
/// expression that has already been compiled once during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMatches {
  pub attribute: String,
  pub pattern:   String,
}

/// A predicate over a [`crate::context::UserContext`]. Serialised as
/// `{"type": "<kind>", "value": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum TargetingRule {
  /// Admit this percentage (0–100) of users into the experiment.
  Percentage(u8),
  AttributeEquals(AttributeEquals),
  AttributeInSet(AttributeInSet),
  AttributeMatches(AttributeMatches),
}

impl TargetingRule {
  /// The `type` discriminant as it appears on the wire.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Percentage(_) => "percentage",
      Self::AttributeEquals(_) => "attribute-equals",
      Self::AttributeInSet(_) => "attribute-in-set",
      Self::AttributeMatches(_) => "attribute-matches",
    }
  }
}

// ─── Experiment ──────────────────────────────────────────────────────────────

/// A stored experiment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
  /// Assigned by the store on creation; never changes.
  pub id:              Uuid,
  pub name:            String,
  pub description:     Option<String>,
  pub variants:        Vec<Variant>,
  /// AND-ed in order. Empty means everyone is eligible.
  pub targeting_rules: Vec<TargetingRule>,
  /// Paused experiments hand out no assignments.
  pub active:          bool,
  /// Starts at 1 and increases by one on every update.
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Experiment {
  /// Build the first version of a new experiment.
  pub fn create(
    id: Uuid,
    definition: ValidatedDefinition,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id,
      name: definition.name,
      description: definition.description,
      variants: definition.variants,
      targeting_rules: definition.targeting_rules,
      active: definition.active,
      version: 1,
      created_at: now,
      updated_at: now,
    }
  }

  /// Build the next version of this experiment from a new definition.
  /// `id` and `created_at` carry over.
  pub fn revise(&self, definition: ValidatedDefinition, now: DateTime<Utc>) -> Self {
    Self {
      id:              self.id,
      name:            definition.name,
      description:     definition.description,
      variants:        definition.variants,
      targeting_rules: definition.targeting_rules,
      active:          definition.active,
      version:         self.version + 1,
      created_at:      self.created_at,
      updated_at:      now,
    }
  }
}

// ─── Drafts ──────────────────────────────────────────────────────────────────

/// An experiment definition as submitted by a client, before validation.
///
/// Every field has a default so that incomplete input reaches the validator
/// and is rejected with a field-level message rather than a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentDraft {
  pub name:            String,
  pub description:     Option<String>,
  pub variants:        Vec<VariantDraft>,
  pub targeting_rules: Vec<RuleDraft>,
  /// Defaults to active when absent.
  pub active:          Option<bool>,
}

impl ExperimentDraft {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn with_variant(
    mut self,
    name: impl Into<String>,
    weight: i64,
    config: serde_json::Value,
  ) -> Self {
    self.variants.push(VariantDraft { name: name.into(), weight, config });
    self
  }

  pub fn with_rule(
    mut self,
    kind: impl Into<String>,
    value: serde_json::Value,
  ) -> Self {
    self.targeting_rules.push(RuleDraft { kind: kind.into(), value });
    self
  }

  pub fn with_active(mut self, active: bool) -> Self {
    self.active = Some(active);
    self
  }
}

/// A variant as submitted. `weight` is signed so that non-positive weights
/// surface as validation errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantDraft {
  pub name:   String,
  pub weight: i64,
  /// Must be a JSON object, or absent/null for an empty config.
  pub config: serde_json::Value,
}

/// A targeting rule as submitted: an unchecked `type` tag plus raw payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDraft {
  #[serde(rename = "type")]
  pub kind:  String,
  pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn percentage_rule_wire_shape() {
    let rule = TargetingRule::Percentage(100);
    assert_eq!(
      serde_json::to_value(&rule).unwrap(),
      json!({ "type": "percentage", "value": 100 })
    );
  }

  #[test]
  fn attribute_rule_wire_shape() {
    let rule = TargetingRule::AttributeInSet(AttributeInSet {
      attribute: "country".into(),
      values:    vec!["NZ".into(), "AU".into()],
    });
    let wire = serde_json::to_value(&rule).unwrap();
    assert_eq!(
      wire,
      json!({
        "type": "attribute-in-set",
        "value": { "attribute": "country", "values": ["NZ", "AU"] }
      })
    );
    let back: TargetingRule = serde_json::from_value(wire).unwrap();
    assert_eq!(back, rule);
  }

  #[test]
  fn draft_tolerates_missing_fields() {
    let draft: ExperimentDraft =
      serde_json::from_value(json!({ "name": "" })).unwrap();
    assert_eq!(draft.name, "");
    assert!(draft.variants.is_empty());
    assert!(draft.targeting_rules.is_empty());
    assert_eq!(draft.active, None);
  }

  #[test]
  fn draft_reads_camel_case() {
    let draft: ExperimentDraft = serde_json::from_value(json!({
      "name": "t",
      "variants": [{ "name": "a", "weight": 100, "config": { "k": 1 } }],
      "targetingRules": [{ "type": "percentage", "value": 10 }]
    }))
    .unwrap();
    assert_eq!(draft.variants[0].weight, 100);
    assert_eq!(draft.targeting_rules[0].kind, "percentage");
    assert_eq!(draft.targeting_rules[0].value, json!(10));
  }

  #[test]
  fn experiment_serializes_camel_case() {
    let now = Utc::now();
    let exp = Experiment {
      id:              Uuid::nil(),
      name:            "x".into(),
      description:     None,
      variants:        vec![],
      targeting_rules: vec![],
      active:          true,
      version:         1,
      created_at:      now,
      updated_at:      now,
    };
    let wire = serde_json::to_value(&exp).unwrap();
    assert!(wire.get("targetingRules").is_some());
    assert!(wire.get("createdAt").is_some());
    assert!(wire.get("updatedAt").is_some());
  }
}
