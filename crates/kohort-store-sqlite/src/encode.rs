//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that they sort lexically. Variants and targeting
//! rules are stored as compact JSON. UUIDs are stored as hyphenated lowercase
//! strings.

use chrono::{DateTime, SecondsFormat, Utc};
use kohort_core::experiment::{Experiment, TargetingRule, Variant};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Version ──────────────────────────────────────────────────────────────────

pub fn encode_version(v: u64) -> Result<i64> {
  i64::try_from(v).map_err(|_| Error::Corrupt {
    column: "version",
    value:  v.to_string(),
  })
}

pub fn decode_version(v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::Corrupt {
    column: "version",
    value:  v.to_string(),
  })
}

// ─── JSON columns ─────────────────────────────────────────────────────────────

pub fn encode_variants(variants: &[Variant]) -> Result<String> {
  Ok(serde_json::to_string(variants)?)
}

pub fn encode_rules(rules: &[TargetingRule]) -> Result<String> {
  Ok(serde_json::to_string(rules)?)
}

// ─── Row types ────────────────────────────────────────────────────────────────

/// Column list matching [`RawExperiment::from_row`].
pub const EXPERIMENT_COLUMNS: &str = "experiment_id, name, description, variants, \
                                      rules, active, version, created_at, updated_at";

/// An `experiments` row as read from SQLite, before decoding.
pub struct RawExperiment {
  pub experiment_id: String,
  pub name:          String,
  pub description:   Option<String>,
  pub variants:      String,
  pub rules:         String,
  pub active:        bool,
  pub version:       i64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawExperiment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      experiment_id: row.get(0)?,
      name:          row.get(1)?,
      description:   row.get(2)?,
      variants:      row.get(3)?,
      rules:         row.get(4)?,
      active:        row.get(5)?,
      version:       row.get(6)?,
      created_at:    row.get(7)?,
      updated_at:    row.get(8)?,
    })
  }

  pub fn into_experiment(self) -> Result<Experiment> {
    Ok(Experiment {
      id:              decode_uuid(&self.experiment_id)?,
      name:            self.name,
      description:     self.description,
      variants:        serde_json::from_str(&self.variants)?,
      targeting_rules: serde_json::from_str(&self.rules)?,
      active:          self.active,
      version:         decode_version(self.version)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_sort_lexically() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let b = a + chrono::Duration::nanoseconds(1_500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn negative_version_is_corrupt() {
    assert!(matches!(
      decode_version(-1),
      Err(Error::Corrupt { column: "version", .. })
    ));
  }
}
