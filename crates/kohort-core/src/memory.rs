//! [`MemoryStore`]: an in-process [`ExperimentStore`].

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
  Error, Result,
  experiment::{Experiment, ExperimentDraft},
  store::ExperimentStore,
  validate::validate,
};

/// One experiment's slot. Holds the current immutable snapshot.
type Entry = Arc<RwLock<Arc<Experiment>>>;

/// Keeps every experiment in memory for the lifetime of the process.
///
/// The outer map lock is only held long enough to find or insert a slot;
/// reads and updates then lock that slot alone, so traffic on one experiment
/// never blocks another.
#[derive(Default)]
pub struct MemoryStore {
  entries: RwLock<HashMap<Uuid, Entry>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  async fn entry(&self, id: Uuid) -> Option<Entry> {
    self.entries.read().await.get(&id).cloned()
  }
}

impl ExperimentStore for MemoryStore {
  async fn create(&self, draft: ExperimentDraft) -> Result<Arc<Experiment>> {
    let definition = validate(&draft)?;
    let experiment =
      Arc::new(Experiment::create(Uuid::new_v4(), definition, Utc::now()));

    self
      .entries
      .write()
      .await
      .insert(experiment.id, Arc::new(RwLock::new(experiment.clone())));

    tracing::info!(id = %experiment.id, name = %experiment.name, "experiment created");
    Ok(experiment)
  }

  async fn get(&self, id: Uuid) -> Result<Option<Arc<Experiment>>> {
    let Some(entry) = self.entry(id).await else {
      return Ok(None);
    };
    let snapshot = entry.read().await.clone();
    Ok(Some(snapshot))
  }

  async fn update(
    &self,
    id: Uuid,
    draft: ExperimentDraft,
    expected_version: u64,
  ) -> Result<Arc<Experiment>> {
    let definition = validate(&draft)?;
    let entry = self.entry(id).await.ok_or(Error::NotFound(id))?;

    let mut current = entry.write().await;
    if current.version != expected_version {
      tracing::warn!(
        %id,
        expected = expected_version,
        actual = current.version,
        "rejected stale experiment update"
      );
      return Err(Error::VersionConflict {
        id,
        expected: expected_version,
        actual: current.version,
      });
    }

    let next = Arc::new(current.revise(definition, Utc::now()));
    *current = next.clone();

    tracing::info!(%id, version = next.version, "experiment updated");
    Ok(next)
  }

  async fn list(&self) -> Result<Vec<Arc<Experiment>>> {
    let entries: Vec<Entry> = self.entries.read().await.values().cloned().collect();

    let mut experiments = Vec::with_capacity(entries.len());
    for entry in entries {
      experiments.push(entry.read().await.clone());
    }
    experiments.sort_by_key(|e| e.created_at);
    Ok(experiments)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn draft(name: &str) -> ExperimentDraft {
    ExperimentDraft::new(name)
      .with_variant("control", 50, json!({ "buttonColor": "#007bff" }))
      .with_variant("red_button", 50, json!({ "buttonColor": "#dc3545" }))
      .with_rule("percentage", json!(100))
  }

  #[tokio::test]
  async fn create_assigns_id_and_first_version() {
    let store = MemoryStore::new();
    let exp = store.create(draft("Button Color Test")).await.unwrap();

    assert_eq!(exp.version, 1);
    assert_eq!(exp.name, "Button Color Test");
    assert_eq!(exp.created_at, exp.updated_at);

    let fetched = store.get(exp.id).await.unwrap().expect("stored");
    assert_eq!(*fetched, *exp);
  }

  #[tokio::test]
  async fn create_rejects_invalid_draft() {
    let store = MemoryStore::new();
    let bad = ExperimentDraft::new("t")
      .with_variant("a", 50, json!({}))
      .with_variant("b", 40, json!({}));

    let err = store.create(bad).await.unwrap_err();
    assert!(matches!(err, Error::Validation(ref v) if v.field == "variants"));
    assert!(store.list().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn get_missing_returns_none() {
    let store = MemoryStore::new();
    assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn update_bumps_version_and_keeps_identity() {
    let store = MemoryStore::new();
    let v1 = store.create(draft("before")).await.unwrap();

    let v2 = store.update(v1.id, draft("after"), 1).await.unwrap();
    assert_eq!(v2.id, v1.id);
    assert_eq!(v2.version, 2);
    assert_eq!(v2.name, "after");
    assert_eq!(v2.created_at, v1.created_at);
    assert!(v2.updated_at >= v1.updated_at);

    // Old snapshots are untouched.
    assert_eq!(v1.name, "before");
    assert_eq!(store.get(v1.id).await.unwrap().unwrap().version, 2);
  }

  #[tokio::test]
  async fn update_with_stale_version_conflicts() {
    let store = MemoryStore::new();
    let exp = store.create(draft("t")).await.unwrap();
    store.update(exp.id, draft("t2"), 1).await.unwrap();

    let err = store.update(exp.id, draft("t3"), 1).await.unwrap_err();
    assert!(matches!(
      err,
      Error::VersionConflict { expected: 1, actual: 2, .. }
    ));
    assert_eq!(store.get(exp.id).await.unwrap().unwrap().name, "t2");
  }

  #[tokio::test]
  async fn update_missing_is_not_found() {
    let store = MemoryStore::new();
    let id = Uuid::new_v4();
    let err = store.update(id, draft("t"), 1).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(missing) if missing == id));
  }

  #[tokio::test]
  async fn update_validates_before_lookup() {
    let store = MemoryStore::new();
    let err = store
      .update(Uuid::new_v4(), ExperimentDraft::new(""), 1)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_updates_with_same_version_have_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let id = store.create(draft("race")).await.unwrap().id;

    let handles: Vec<_> = (0..8)
      .map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
          store.update(id, draft(&format!("writer-{i}")), 1).await
        })
      })
      .collect();

    let mut won = 0;
    let mut conflicted = 0;
    for handle in handles {
      match handle.await.unwrap() {
        Ok(updated) => {
          assert_eq!(updated.version, 2);
          won += 1;
        }
        Err(Error::VersionConflict { .. }) => conflicted += 1,
        Err(other) => panic!("unexpected error: {other}"),
      }
    }
    assert_eq!(won, 1);
    assert_eq!(conflicted, 7);
    assert_eq!(store.get(id).await.unwrap().unwrap().version, 2);
  }

  #[tokio::test]
  async fn list_is_oldest_first() {
    let store = MemoryStore::new();
    let a = store.create(draft("a")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let b = store.create(draft("b")).await.unwrap();
    store.update(a.id, draft("a2"), 1).await.unwrap();

    let all = store.list().await.unwrap();
    let ids: Vec<_> = all.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert_eq!(all[0].name, "a2");
  }
}
