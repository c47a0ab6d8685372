//! [`SqliteStore`]: the SQLite implementation of [`ExperimentStore`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use kohort_core::{
  experiment::{Experiment, ExperimentDraft},
  store::ExperimentStore,
  validate::{ValidatedDefinition, validate},
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    EXPERIMENT_COLUMNS, RawExperiment, decode_dt, decode_version, encode_dt,
    encode_rules, encode_uuid, encode_variants, encode_version,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Kohort experiment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All
/// statements run on one background thread, and each update is a single
/// conditional `UPDATE`, so at most one writer holding a given version wins.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Result of a version-guarded update, decided inside the connection thread.
enum Swap {
  /// Applied; carries the untouched `created_at` column.
  Applied(String),
  Conflict(i64),
  Missing,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a fully-built [`Experiment`] into the `experiments` table.
  async fn insert(&self, experiment: &Experiment) -> Result<()> {
    let id_str         = encode_uuid(experiment.id);
    let name           = experiment.name.clone();
    let description    = experiment.description.clone();
    let variants_str   = encode_variants(&experiment.variants)?;
    let rules_str      = encode_rules(&experiment.targeting_rules)?;
    let active         = experiment.active;
    let version        = encode_version(experiment.version)?;
    let created_at_str = encode_dt(experiment.created_at);
    let updated_at_str = encode_dt(experiment.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO experiments (
             experiment_id, name, description, variants, rules,
             active, version, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            id_str,
            name,
            description,
            variants_str,
            rules_str,
            active,
            version,
            created_at_str,
            updated_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn fetch(&self, id: Uuid) -> Result<Option<Experiment>> {
    let id_str = encode_uuid(id);
    let sql =
      format!("SELECT {EXPERIMENT_COLUMNS} FROM experiments WHERE experiment_id = ?1");

    let raw: Option<RawExperiment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawExperiment::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawExperiment::into_experiment).transpose()
  }

  async fn fetch_all(&self) -> Result<Vec<Experiment>> {
    let sql = format!(
      "SELECT {EXPERIMENT_COLUMNS} FROM experiments ORDER BY created_at, experiment_id"
    );

    let raws: Vec<RawExperiment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawExperiment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawExperiment::into_experiment).collect()
  }

  /// Overwrite experiment `id` with `definition` if its stored version is
  /// still `expected_version`.
  async fn compare_and_swap(
    &self,
    id: Uuid,
    expected_version: u64,
    definition: ValidatedDefinition,
  ) -> Result<Experiment> {
    let updated_at = Utc::now();

    let id_str         = encode_uuid(id);
    // Beyond i64 no stored version can match, so skip straight to the lookup.
    let expected       = i64::try_from(expected_version).ok();
    let name           = definition.name.clone();
    let description    = definition.description.clone();
    let variants_str   = encode_variants(&definition.variants)?;
    let rules_str      = encode_rules(&definition.targeting_rules)?;
    let active         = definition.active;
    let updated_at_str = encode_dt(updated_at);

    let swap = self
      .conn
      .call(move |conn| {
        if let Some(expected) = expected {
          let created_at: Option<String> = conn
            .query_row(
              "UPDATE experiments
                  SET name = ?3, description = ?4, variants = ?5, rules = ?6,
                      active = ?7, version = version + 1, updated_at = ?8
                WHERE experiment_id = ?1 AND version = ?2
               RETURNING created_at",
              rusqlite::params![
                id_str,
                expected,
                name,
                description,
                variants_str,
                rules_str,
                active,
                updated_at_str,
              ],
              |row| row.get(0),
            )
            .optional()?;

          if let Some(created_at) = created_at {
            return Ok(Swap::Applied(created_at));
          }
        }

        let current: Option<i64> = conn
          .query_row(
            "SELECT version FROM experiments WHERE experiment_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?;

        Ok(match current {
          Some(version) => Swap::Conflict(version),
          None => Swap::Missing,
        })
      })
      .await?;

    match swap {
      Swap::Applied(created_at) => Ok(Experiment {
        id,
        name: definition.name,
        description: definition.description,
        variants: definition.variants,
        targeting_rules: definition.targeting_rules,
        active: definition.active,
        version: expected_version + 1,
        created_at: decode_dt(&created_at)?,
        updated_at,
      }),
      Swap::Conflict(actual) => Err(Error::Core(kohort_core::Error::VersionConflict {
        id,
        expected: expected_version,
        actual: decode_version(actual)?,
      })),
      Swap::Missing => Err(Error::Core(kohort_core::Error::NotFound(id))),
    }
  }
}

// ─── ExperimentStore impl ────────────────────────────────────────────────────

impl ExperimentStore for SqliteStore {
  async fn create(&self, draft: ExperimentDraft) -> kohort_core::Result<Arc<Experiment>> {
    let definition = validate(&draft)?;
    let experiment = Experiment::create(Uuid::new_v4(), definition, Utc::now());
    self.insert(&experiment).await?;

    tracing::info!(id = %experiment.id, name = %experiment.name, "experiment created");
    Ok(Arc::new(experiment))
  }

  async fn get(&self, id: Uuid) -> kohort_core::Result<Option<Arc<Experiment>>> {
    Ok(self.fetch(id).await?.map(Arc::new))
  }

  async fn update(
    &self,
    id: Uuid,
    draft: ExperimentDraft,
    expected_version: u64,
  ) -> kohort_core::Result<Arc<Experiment>> {
    let definition = validate(&draft)?;

    match self.compare_and_swap(id, expected_version, definition).await {
      Ok(experiment) => {
        tracing::info!(%id, version = experiment.version, "experiment updated");
        Ok(Arc::new(experiment))
      }
      Err(Error::Core(conflict @ kohort_core::Error::VersionConflict { .. })) => {
        tracing::warn!(%id, expected = expected_version, "rejected stale experiment update");
        Err(conflict)
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn list(&self) -> kohort_core::Result<Vec<Arc<Experiment>>> {
    Ok(self.fetch_all().await?.into_iter().map(Arc::new).collect())
  }
}
