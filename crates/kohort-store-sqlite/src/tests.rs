//! Integration tests for `SqliteStore` against an in-memory database.

use kohort_core::{
  Error as CoreError,
  assignment::{AssignmentResult, AssignmentService},
  context::UserContext,
  experiment::{ExperimentDraft, TargetingRule},
  store::ExperimentStore,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn button_test(name: &str) -> ExperimentDraft {
  ExperimentDraft::new(name)
    .with_description("Testing different button colors for conversion")
    .with_variant("control", 50, json!({ "buttonColor": "#007bff" }))
    .with_variant("red_button", 50, json!({ "buttonColor": "#dc3545" }))
    .with_rule("percentage", json!(100))
}

// ─── Create / get ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_round_trips() {
  let s = store().await;

  let created = s.create(button_test("Button Color Test")).await.unwrap();
  assert_eq!(created.version, 1);
  assert_eq!(created.targeting_rules, vec![TargetingRule::Percentage(100)]);

  let fetched = s.get(created.id).await.unwrap().expect("stored");
  assert_eq!(*fetched, *created);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn create_rejects_invalid_draft() {
  let s = store().await;
  let err = s.create(ExperimentDraft::new("")).await.unwrap_err();
  assert!(matches!(err, CoreError::Validation(ref v) if v.field == "name"));
  assert!(s.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn attribute_rules_survive_storage() {
  let s = store().await;
  let draft = button_test("t")
    .with_rule("attribute-equals", json!({ "attribute": "beta", "equals": true }))
    .with_rule(
      "attribute-matches",
      json!({ "attribute": "email", "pattern": "@example\\.com$" }),
    );
  let created = s.create(draft).await.unwrap();
  let fetched = s.get(created.id).await.unwrap().unwrap();
  assert_eq!(fetched.targeting_rules.len(), 3);
  assert_eq!(fetched.targeting_rules, created.targeting_rules);
}

#[tokio::test]
async fn numeric_rule_values_keep_their_json_form() {
  let s = store().await;
  let rules = [
    json!({ "attribute": "tier", "equals": 2 }),
    json!({ "attribute": "account", "equals": 9007199254740993_u64 }),
    json!({ "attribute": "score", "equals": 2.5 }),
  ];
  let draft = rules
    .iter()
    .fold(button_test("t"), |d, r| d.with_rule("attribute-equals", r.clone()));
  let created = s.create(draft).await.unwrap();

  let fetched = s.get(created.id).await.unwrap().unwrap();
  for (rule, sent) in fetched.targeting_rules[1..].iter().zip(&rules) {
    let wire = serde_json::to_value(rule).unwrap();
    assert_eq!(wire, json!({ "type": "attribute-equals", "value": sent }));
  }
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_bumps_version() {
  let s = store().await;
  let v1 = s.create(button_test("before")).await.unwrap();

  let v2 = s
    .update(v1.id, button_test("after").with_active(false), 1)
    .await
    .unwrap();
  assert_eq!(v2.version, 2);
  assert_eq!(v2.created_at, v1.created_at);
  assert!(!v2.active);

  let fetched = s.get(v1.id).await.unwrap().unwrap();
  assert_eq!(*fetched, *v2);
}

#[tokio::test]
async fn stale_update_conflicts() {
  let s = store().await;
  let exp = s.create(button_test("t")).await.unwrap();
  s.update(exp.id, button_test("t2"), 1).await.unwrap();

  let err = s.update(exp.id, button_test("t3"), 1).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::VersionConflict { expected: 1, actual: 2, .. }
  ));
  assert_eq!(s.get(exp.id).await.unwrap().unwrap().name, "t2");
}

#[tokio::test]
async fn update_missing_is_not_found() {
  let s = store().await;
  let err = s.update(Uuid::new_v4(), button_test("t"), 1).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn update_with_out_of_range_version_conflicts() {
  let s = store().await;
  let exp = s.create(button_test("t")).await.unwrap();

  let err = s.update(exp.id, button_test("t2"), u64::MAX).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::VersionConflict { expected: u64::MAX, actual: 1, .. }
  ));
  assert_eq!(s.get(exp.id).await.unwrap().unwrap().version, 1);

  let err = s.update(Uuid::new_v4(), button_test("t"), u64::MAX).await.unwrap_err();
  assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_updates_have_one_winner() {
  let s = store().await;
  let id = s.create(button_test("race")).await.unwrap().id;

  let (a, b) = tokio::join!(
    s.update(id, button_test("left"), 1),
    s.update(id, button_test("right"), 1),
  );

  let outcomes = [a, b];
  let won = outcomes.iter().filter(|r| r.is_ok()).count();
  let conflicted = outcomes
    .iter()
    .filter(|r| matches!(r, Err(CoreError::VersionConflict { .. })))
    .count();
  assert_eq!((won, conflicted), (1, 1));
}

// ─── List ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_is_oldest_first() {
  let s = store().await;
  let a = s.create(button_test("a")).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(2)).await;
  let b = s.create(button_test("b")).await.unwrap();

  let ids: Vec<_> = s.list().await.unwrap().iter().map(|e| e.id).collect();
  assert_eq!(ids, vec![a.id, b.id]);
}

// ─── Assignment over SQLite ──────────────────────────────────────────────────

#[tokio::test]
async fn assignments_are_stable_across_store_handles() {
  let s = store().await;
  let exp = s.create(button_test("t")).await.unwrap();

  let first = AssignmentService::new(Arc::new(s.clone()));
  let second = AssignmentService::new(Arc::new(s));
  for i in 0..100 {
    let ctx = UserContext::new(format!("user-{i}"));
    let a = first.get_assignment(exp.id, &ctx).await.unwrap();
    let b = second.get_assignment(exp.id, &ctx).await.unwrap();
    assert!(matches!(a, AssignmentResult::Assigned { .. }));
    assert_eq!(a, b);
  }
}
