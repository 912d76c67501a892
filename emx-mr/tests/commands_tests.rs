//! Integration tests for the emx-mr subcommands against a temporary database

use emx_common::cleanup::CleanupOptions;
use emx_common::db::{init_database, SqliteResponseStore};
use emx_common::{LegacyKeyResolver, ModuleResponse, ParticipantResponseDocument, ResponseStore, ResponseValue};
use emx_mr::commands::{run_aggregate, run_audit, run_cleanup, run_migrate, summarize};
use serde_json::Value;
use tempfile::TempDir;

async fn seeded_store() -> (TempDir, SqliteResponseStore) {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("responses.db")).await.unwrap();
    let store = SqliteResponseStore::new(pool);

    let fixtures: [(&str, &str, &str, &[(&str, i64)]); 3] = [
        ("d1", "research-1", "p1", &[("welcome", 1), ("SmartVOC", 2), ("s1_smartvoc_nps", 9)]),
        ("d2", "research-1", "p2", &[("s1_smartvoc_nps", 7), ("s1_smartvoc_nps", 8)]),
        ("d3", "research-2", "p3", &[("cognitive", 3), ("demographic", 4)]),
    ];
    for (id, research, participant, answers) in fixtures {
        let mut doc = ParticipantResponseDocument::new(research, participant);
        doc.id = id.to_string();
        for (key, value) in answers {
            doc.responses.push(ModuleResponse::new(*key, "", ResponseValue::from(*value)));
        }
        store.insert(&doc).await.unwrap();
    }

    (dir, store)
}

fn keys_of(doc: &ParticipantResponseDocument) -> Vec<&str> {
    doc.responses.iter().map(|r| r.question_key.as_str()).collect()
}

#[tokio::test]
async fn test_cleanup_defaults_to_purge_aliases() {
    let (_dir, store) = seeded_store().await;
    let resolver = LegacyKeyResolver::builtin();

    let report = run_cleanup(&store, &resolver, &[], CleanupOptions::default())
        .await
        .unwrap();

    assert_eq!(report.documents_updated, 2);
    assert_eq!(report.responses_affected, 2);

    let p1 = store.get("research-1", "p1").await.unwrap().unwrap();
    assert_eq!(keys_of(&p1), vec!["welcome", "s1_smartvoc_nps"]);
    let p3 = store.get("research-2", "p3").await.unwrap().unwrap();
    assert_eq!(keys_of(&p3), vec!["demographic"]);
}

#[tokio::test]
async fn test_cleanup_with_explicit_keys() {
    let (_dir, store) = seeded_store().await;
    let resolver = LegacyKeyResolver::builtin();

    let report = run_cleanup(&store, &resolver, &["demographic".to_string()], CleanupOptions::default())
        .await
        .unwrap();

    assert_eq!(report.documents_updated, 1);
    assert_eq!(
        summarize("cleanup", &report),
        "cleanup: scanned 3 documents, updated 1, 1 responses affected, 0 failures"
    );
}

#[tokio::test]
async fn test_migrate_dry_run_reports_renames() {
    let (_dir, store) = seeded_store().await;
    let resolver = LegacyKeyResolver::builtin();
    let options = CleanupOptions {
        dry_run: true,
        ..CleanupOptions::default()
    };

    let report = run_migrate(&store, &resolver, options).await.unwrap();

    assert_eq!(report.documents_updated, 2);
    assert_eq!(report.responses_affected, 2);
    assert!(summarize("migrate", &report).starts_with("migrate (dry run):"));

    let p1 = store.get("research-1", "p1").await.unwrap().unwrap();
    assert_eq!(keys_of(&p1)[0], "welcome");
}

#[tokio::test]
async fn test_aggregate_writes_question_json() {
    let (_dir, store) = seeded_store().await;
    let resolver = LegacyKeyResolver::builtin();
    let mut out: Vec<u8> = Vec::new();

    let count = run_aggregate(&store, &resolver, "research-1", &mut out).await.unwrap();
    assert_eq!(count, 3);

    let json: Value = serde_json::from_slice(&out).unwrap();
    let questions = json.as_array().unwrap();
    let keys: Vec<&str> = questions
        .iter()
        .map(|q| q["questionKey"].as_str().unwrap())
        .collect();
    assert!(keys.contains(&"welcome_screen"));
    assert!(keys.contains(&"smartvoc"));

    let nps = questions
        .iter()
        .find(|q| q["questionKey"] == "s1_smartvoc_nps")
        .unwrap();
    assert_eq!(nps["responses"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_aggregate_unknown_research_is_empty() {
    let (_dir, store) = seeded_store().await;
    let mut out: Vec<u8> = Vec::new();

    let count = run_aggregate(&store, &LegacyKeyResolver::builtin(), "nope", &mut out)
        .await
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(String::from_utf8(out).unwrap().trim(), "[]");
}

#[tokio::test]
async fn test_audit_finds_duplicates_across_store() {
    let (_dir, store) = seeded_store().await;
    let resolver = LegacyKeyResolver::builtin();

    let report = run_audit(&store, &resolver, None).await.unwrap();

    assert_eq!(report.documents_scanned, 3);
    assert_eq!(report.legacy_responses, 4);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].document_id, "d2");
    assert_eq!(report.duplicates[0].question_keys, vec!["s1_smartvoc_nps"]);
}

#[tokio::test]
async fn test_audit_single_research() {
    let (_dir, store) = seeded_store().await;

    let report = run_audit(&store, &LegacyKeyResolver::builtin(), Some("research-2"))
        .await
        .unwrap();

    assert_eq!(report.documents_scanned, 1);
    assert_eq!(report.legacy_responses, 2);
    assert!(report.duplicates.is_empty());
}
