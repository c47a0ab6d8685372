//! The user context that targeting rules are evaluated against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Attributes describing a user, keyed by attribute name.
pub type Attributes = HashMap<String, AttributeValue>;

/// A scalar attribute value. Untagged on the wire, so `"US"`, `42`, `true`
/// and `null` all deserialize directly. Numbers keep their JSON form, so `2`
/// is written back as `2` and large integers stay exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
  String(String),
  Number(Number),
  Boolean(bool),
  Null,
}

impl AttributeValue {
  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::String(s) => Some(s),
      _ => None,
    }
  }

  /// Value equality where numbers compare numerically (`2` equals `2.0`)
  /// but values of different JSON types never match.
  pub fn same_value(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Number(a), Self::Number(b)) => numbers_equal(a, b),
      _ => self == other,
    }
  }

  /// The textual form used for set-membership checks. `Null` has none.
  pub fn to_member_string(&self) -> Option<String> {
    match self {
      Self::String(s) => Some(s.clone()),
      Self::Number(n) => Some(match (n.as_i64(), n.as_u64(), n.as_f64()) {
        (Some(i), ..) => i.to_string(),
        (_, Some(u), _) => u.to_string(),
        (.., Some(f)) => f.to_string(),
        _ => n.to_string(),
      }),
      Self::Boolean(b) => Some(b.to_string()),
      Self::Null => None,
    }
  }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
  if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
    return x == y;
  }
  if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
    return x == y;
  }
  match (a.as_f64(), b.as_f64()) {
    (Some(x), Some(y)) => x == y,
    _ => false,
  }
}

impl From<&str> for AttributeValue {
  fn from(value: &str) -> Self { Self::String(value.to_owned()) }
}

impl From<String> for AttributeValue {
  fn from(value: String) -> Self { Self::String(value) }
}

impl From<i64> for AttributeValue {
  fn from(value: i64) -> Self { Self::Number(value.into()) }
}

/// Non-finite floats have no JSON form and become `Null`.
impl From<f64> for AttributeValue {
  fn from(value: f64) -> Self { Number::from_f64(value).map_or(Self::Null, Self::Number) }
}

impl From<bool> for AttributeValue {
  fn from(value: bool) -> Self { Self::Boolean(value) }
}

/// Who is asking for an assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
  pub user_id:    String,
  #[serde(default)]
  pub attributes: Attributes,
}

impl UserContext {
  /// A context with no attributes.
  pub fn new(user_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), attributes: Attributes::new() }
  }

  pub fn with_attribute(
    mut self,
    name: impl Into<String>,
    value: impl Into<AttributeValue>,
  ) -> Self {
    self.attributes.insert(name.into(), value.into());
    self
  }
}
