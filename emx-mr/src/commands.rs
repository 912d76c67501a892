//! Subcommand implementations
//!
//! Each command takes the store and resolver explicitly so tests can drive it
//! against a temporary database.

use anyhow::{Context, Result};
use emx_common::cleanup::{CleanupOptions, LegacyCleanupService};
use emx_common::service::ModuleResponseService;
use emx_common::store::DEFAULT_PAGE_SIZE;
use emx_common::{CleanupReport, LegacyKeyResolver, ParticipantResponseDocument, ResponseStore};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use tracing::{info, warn};

/// Remove legacy keys; an empty `keys` list selects every purge-policy alias
pub async fn run_cleanup(
    store: &dyn ResponseStore,
    resolver: &LegacyKeyResolver,
    keys: &[String],
    options: CleanupOptions,
) -> Result<CleanupReport> {
    let legacy_keys: HashSet<String> = if keys.is_empty() {
        resolver.purge_keys()
    } else {
        keys.iter().cloned().collect()
    };

    if legacy_keys.is_empty() {
        warn!("No legacy keys selected, nothing to clean up");
    } else {
        let mut sorted: Vec<&String> = legacy_keys.iter().collect();
        sorted.sort();
        info!("Cleaning up legacy keys: {:?}", sorted);
    }

    let report = LegacyCleanupService::new(store, options)
        .cleanup(&legacy_keys)
        .await
        .context("Legacy key cleanup failed")?;
    Ok(report)
}

pub async fn run_migrate(
    store: &dyn ResponseStore,
    resolver: &LegacyKeyResolver,
    options: CleanupOptions,
) -> Result<CleanupReport> {
    info!("Migrating rename aliases (alias table v{})", resolver.version());
    let report = LegacyCleanupService::new(store, options)
        .migrate(resolver)
        .await
        .context("Alias rename migration failed")?;
    Ok(report)
}

/// Write the question-major view of `research_id` to `out` as pretty JSON
pub async fn run_aggregate(
    store: &dyn ResponseStore,
    resolver: &LegacyKeyResolver,
    research_id: &str,
    out: &mut dyn Write,
) -> Result<usize> {
    let view = ModuleResponseService::new(store)
        .question_view(research_id, resolver)
        .await
        .with_context(|| format!("Failed to load responses for research {}", research_id))?;

    let questions: Vec<_> = view.into_values().collect();
    serde_json::to_writer_pretty(&mut *out, &questions)?;
    writeln!(out)?;
    Ok(questions.len())
}

/// One document holding a question key more than once
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateKeyFinding {
    pub document_id: String,
    pub research_id: String,
    pub participant_id: String,
    pub question_keys: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub documents_scanned: usize,
    /// Responses still stored under any alias of the active table
    pub legacy_responses: usize,
    pub duplicates: Vec<DuplicateKeyFinding>,
}

impl AuditReport {
    fn record(&mut self, document: &ParticipantResponseDocument, resolver: &LegacyKeyResolver) {
        self.documents_scanned += 1;
        self.legacy_responses += document
            .responses
            .iter()
            .filter(|r| resolver.is_legacy(&r.question_key))
            .count();

        let question_keys = document.duplicate_question_keys();
        if !question_keys.is_empty() {
            warn!(
                document_id = %document.id,
                participant_id = %document.participant_id,
                "Duplicate question keys: {:?}",
                question_keys
            );
            self.duplicates.push(DuplicateKeyFinding {
                document_id: document.id.clone(),
                research_id: document.research_id.clone(),
                participant_id: document.participant_id.clone(),
                question_keys,
            });
        }
    }
}

/// Audit one research, or the whole store page by page
pub async fn run_audit(
    store: &dyn ResponseStore,
    resolver: &LegacyKeyResolver,
    research_id: Option<&str>,
) -> Result<AuditReport> {
    let mut report = AuditReport::default();

    match research_id {
        Some(research_id) => {
            let documents = store
                .list_by_research(research_id)
                .await
                .with_context(|| format!("Failed to load research {}", research_id))?;
            for document in &documents {
                report.record(document, resolver);
            }
        }
        None => {
            let mut cursor: Option<String> = None;
            loop {
                let page = store
                    .scan_page(cursor.as_deref(), DEFAULT_PAGE_SIZE)
                    .await
                    .context("Failed to scan response documents")?;
                for document in &page.documents {
                    report.record(document, resolver);
                }
                match page.next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
    }

    info!(
        documents_scanned = report.documents_scanned,
        duplicates = report.duplicates.len(),
        legacy_responses = report.legacy_responses,
        "Audit complete"
    );
    Ok(report)
}

/// One-line human summary of a maintenance pass
pub fn summarize(pass: &str, report: &CleanupReport) -> String {
    let mut summary = format!(
        "{}{}: scanned {} documents, updated {}, {} responses affected, {} failures",
        pass,
        if report.dry_run { " (dry run)" } else { "" },
        report.documents_scanned,
        report.documents_updated,
        report.responses_affected,
        report.failures.len()
    );
    if !report.conflicts.is_empty() {
        summary.push_str(&format!(", {} key conflicts", report.conflicts.len()));
    }
    summary
}
