//! Legacy key maintenance passes
//!
//! Two passes walk every persisted participant document through a paged scan:
//! - `cleanup` deletes responses stored under an explicit set of legacy keys
//! - `migrate` rewrites rename-policy aliases to their canonical key
//!
//! Both are destructive and irreversible. Documents the pass does not touch
//! are never written. A failed write is recorded in the report and the scan
//! moves on; only scan (read) failures abort the pass.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{error, info, warn};

use crate::legacy::{AliasPolicy, LegacyKeyResolver};
use crate::models::{ModuleResponse, ParticipantResponseDocument};
use crate::store::{ResponseStore, ResponsesUpdate, DEFAULT_PAGE_SIZE};
use crate::{time, Error, Result};

/// Tuning for a maintenance pass
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Documents fetched per scan page
    pub page_size: usize,
    /// Documents rewritten concurrently within one page
    pub write_concurrency: usize,
    /// Compute and log changes without writing
    pub dry_run: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            write_concurrency: 4,
            dry_run: false,
        }
    }
}

/// Outcome of a maintenance pass
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub documents_scanned: usize,
    /// Documents successfully rewritten (or that would be, in a dry run)
    pub documents_updated: usize,
    /// Responses removed or re-keyed in those documents
    pub responses_affected: usize,
    /// One `DocumentWriteFailure` per document the store refused to write
    pub failures: Vec<Error>,
    /// Aliases `migrate` left in place because their canonical key was taken
    pub conflicts: Vec<KeyConflict>,
    pub dry_run: bool,
}

/// Alias that could not be renamed without repeating a question key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    pub document_id: String,
    pub alias: String,
    pub canonical: String,
}

/// Split responses into (kept, removed) by membership of their key in `legacy_keys`
///
/// Relative order is preserved in both halves.
pub fn partition_legacy(
    responses: Vec<ModuleResponse>,
    legacy_keys: &HashSet<String>,
) -> (Vec<ModuleResponse>, Vec<ModuleResponse>) {
    responses
        .into_iter()
        .partition(|r| !legacy_keys.contains(&r.question_key))
}

/// Outcome of re-keying one document's responses
#[derive(Debug, Default)]
pub struct Canonicalized {
    pub responses: Vec<ModuleResponse>,
    /// `(alias, canonical)` pairs that were rewritten
    pub renamed: Vec<(String, String)>,
    /// `(alias, canonical)` pairs left alone because the canonical key was taken
    pub conflicts: Vec<(String, String)>,
}

/// Rewrite rename-policy aliases to their canonical key
///
/// An alias is only renamed when no other response in the document already
/// holds (or has just been given) the canonical key, so a document never ends
/// up with the same question key twice. Purge-policy aliases and unknown keys
/// are left alone.
pub fn canonicalize_keys(responses: Vec<ModuleResponse>, resolver: &LegacyKeyResolver) -> Canonicalized {
    let mut taken: HashSet<String> = responses.iter().map(|r| r.question_key.clone()).collect();
    let mut renamed = Vec::new();
    let mut conflicts = Vec::new();

    let responses: Vec<ModuleResponse> = responses
        .into_iter()
        .map(|mut response| {
            if resolver.policy_of(&response.question_key) != Some(AliasPolicy::Rename) {
                return response;
            }
            let canonical = resolver.resolve(&response.question_key).to_string();
            if taken.contains(&canonical) {
                conflicts.push((response.question_key.clone(), canonical));
            } else {
                taken.insert(canonical.clone());
                renamed.push((std::mem::replace(&mut response.question_key, canonical.clone()), canonical));
            }
            response
        })
        .collect();

    Canonicalized {
        responses,
        renamed,
        conflicts,
    }
}

/// Replacement response list for one document plus the keys it touched
struct Rewrite {
    document_id: String,
    responses: Vec<ModuleResponse>,
    affected_keys: Vec<String>,
}

/// Runs legacy cleanup and rename migration against a [`ResponseStore`]
pub struct LegacyCleanupService<'a> {
    store: &'a dyn ResponseStore,
    options: CleanupOptions,
}

impl<'a> LegacyCleanupService<'a> {
    pub fn new(store: &'a dyn ResponseStore, options: CleanupOptions) -> Self {
        Self { store, options }
    }

    /// Remove every response whose key is in `legacy_keys` from all documents
    pub async fn cleanup(&self, legacy_keys: &HashSet<String>) -> Result<CleanupReport> {
        info!(keys = legacy_keys.len(), dry_run = self.options.dry_run, "Starting legacy key cleanup");

        let report = self
            .run_pass("cleanup", |doc, _conflicts| {
                if !doc.responses.iter().any(|r| legacy_keys.contains(&r.question_key)) {
                    return None;
                }
                let (kept, removed) = partition_legacy(doc.responses.clone(), legacy_keys);
                Some(Rewrite {
                    document_id: doc.id.clone(),
                    responses: kept,
                    affected_keys: removed.into_iter().map(|r| r.question_key).collect(),
                })
            })
            .await?;

        info!(
            scanned = report.documents_scanned,
            updated = report.documents_updated,
            removed = report.responses_affected,
            failed = report.failures.len(),
            "Legacy key cleanup finished"
        );
        Ok(report)
    }

    /// Re-key rename-policy aliases to their canonical key in all documents
    pub async fn migrate(&self, resolver: &LegacyKeyResolver) -> Result<CleanupReport> {
        info!(
            table_version = resolver.version(),
            dry_run = self.options.dry_run,
            "Starting legacy key migration"
        );

        let report = self
            .run_pass("migrate", |doc, conflicts| {
                if !doc
                    .responses
                    .iter()
                    .any(|r| resolver.policy_of(&r.question_key) == Some(AliasPolicy::Rename))
                {
                    return None;
                }
                let migrated = canonicalize_keys(doc.responses.clone(), resolver);
                for (alias, canonical) in migrated.conflicts {
                    warn!(
                        document_id = %doc.id,
                        alias = %alias,
                        canonical = %canonical,
                        "Canonical key already present; alias left in place"
                    );
                    conflicts.push(KeyConflict {
                        document_id: doc.id.clone(),
                        alias,
                        canonical,
                    });
                }
                if migrated.renamed.is_empty() {
                    return None;
                }
                Some(Rewrite {
                    document_id: doc.id.clone(),
                    responses: migrated.responses,
                    affected_keys: migrated
                        .renamed
                        .into_iter()
                        .map(|(old, new)| format!("{} -> {}", old, new))
                        .collect(),
                })
            })
            .await?;

        info!(
            scanned = report.documents_scanned,
            updated = report.documents_updated,
            renamed = report.responses_affected,
            conflicts = report.conflicts.len(),
            failed = report.failures.len(),
            "Legacy key migration finished"
        );
        Ok(report)
    }

    async fn run_pass<F>(&self, pass: &'static str, plan: F) -> Result<CleanupReport>
    where
        F: Fn(&ParticipantResponseDocument, &mut Vec<KeyConflict>) -> Option<Rewrite>,
    {
        let mut report = CleanupReport {
            dry_run: self.options.dry_run,
            ..CleanupReport::default()
        };
        let mut cursor: Option<String> = None;

        loop {
            let page = self.store.scan_page(cursor.as_deref(), self.options.page_size).await?;
            report.documents_scanned += page.documents.len();

            let mut rewrites = Vec::new();
            for document in &page.documents {
                if let Some(rewrite) = plan(document, &mut report.conflicts) {
                    rewrites.push(rewrite);
                }
            }

            if self.options.dry_run {
                for rewrite in rewrites {
                    info!(pass, document_id = %rewrite.document_id, keys = ?rewrite.affected_keys, "Dry run: would rewrite document");
                    report.documents_updated += 1;
                    report.responses_affected += rewrite.affected_keys.len();
                }
            } else {
                let store = self.store;
                let outcomes: Vec<(Rewrite, Result<()>)> = stream::iter(rewrites)
                    .map(|mut rewrite| async move {
                        let update = ResponsesUpdate {
                            responses: std::mem::take(&mut rewrite.responses),
                            updated_at: time::now(),
                        };
                        let outcome = store.update(&rewrite.document_id, update).await;
                        (rewrite, outcome)
                    })
                    .buffer_unordered(self.options.write_concurrency.max(1))
                    .collect()
                    .await;

                for (rewrite, outcome) in outcomes {
                    match outcome {
                        Ok(()) => {
                            info!(pass, document_id = %rewrite.document_id, keys = ?rewrite.affected_keys, "Rewrote document");
                            report.documents_updated += 1;
                            report.responses_affected += rewrite.affected_keys.len();
                        }
                        Err(e) => {
                            error!(pass, document_id = %rewrite.document_id, "Failed to rewrite document: {}", e);
                            report.failures.push(Error::DocumentWriteFailure {
                                document_id: rewrite.document_id,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseValue;

    fn response(key: &str) -> ModuleResponse {
        ModuleResponse::new(key, "", ResponseValue::Null)
    }

    fn keys(responses: &[ModuleResponse]) -> Vec<&str> {
        responses.iter().map(|r| r.question_key.as_str()).collect()
    }

    #[test]
    fn test_partition_keeps_order_in_both_halves() {
        let legacy: HashSet<String> = ["demographic", "demographics-form"].iter().map(|s| s.to_string()).collect();
        let responses = vec![
            response("demographic"),
            response("q1_smartvoc_nps"),
            response("demographics-form"),
            response("q2_smartvoc_csat"),
        ];

        let (kept, removed) = partition_legacy(responses, &legacy);
        assert_eq!(keys(&kept), vec!["q1_smartvoc_nps", "q2_smartvoc_csat"]);
        assert_eq!(keys(&removed), vec!["demographic", "demographics-form"]);
    }

    #[test]
    fn test_partition_with_empty_set_keeps_everything() {
        let (kept, removed) = partition_legacy(vec![response("a_b"), response("welcome")], &HashSet::new());
        assert_eq!(kept.len(), 2);
        assert!(removed.is_empty());
    }

    #[test]
    fn test_canonicalize_only_touches_rename_aliases() {
        let resolver = LegacyKeyResolver::builtin();
        let responses = vec![
            response("welcome"),
            response("SmartVOC"),
            response("q1_smartvoc_nps"),
            response("demographics-form"),
        ];
        let ids: Vec<String> = responses.iter().map(|r| r.id.clone()).collect();

        let result = canonicalize_keys(responses, &resolver);
        let migrated = result.responses;
        assert_eq!(keys(&migrated), vec!["welcome_screen", "SmartVOC", "q1_smartvoc_nps", "demographics"]);
        assert!(result.conflicts.is_empty());
        assert_eq!(
            result.renamed,
            vec![
                ("welcome".to_string(), "welcome_screen".to_string()),
                ("demographics-form".to_string(), "demographics".to_string()),
            ]
        );
        // Identity and order are preserved
        let migrated_ids: Vec<String> = migrated.iter().map(|r| r.id.clone()).collect();
        assert_eq!(migrated_ids, ids);
    }

    #[test]
    fn test_canonicalize_never_repeats_a_key() {
        let resolver = LegacyKeyResolver::builtin();

        // Alias next to its canonical key
        let result = canonicalize_keys(vec![response("demographic"), response("demographics")], &resolver);
        assert_eq!(keys(&result.responses), vec!["demographic", "demographics"]);
        assert!(result.renamed.is_empty());
        assert_eq!(result.conflicts, vec![("demographic".to_string(), "demographics".to_string())]);

        // Two aliases of one family: the first wins
        let result = canonicalize_keys(vec![response("welcome"), response("welcome-screen")], &resolver);
        assert_eq!(keys(&result.responses), vec!["welcome_screen", "welcome-screen"]);
        assert_eq!(result.renamed.len(), 1);
        assert_eq!(result.conflicts, vec![("welcome-screen".to_string(), "welcome_screen".to_string())]);
    }
}
