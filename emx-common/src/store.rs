//! Response store abstraction
//!
//! The maintenance passes and the aggregator only see persisted participant
//! documents through this trait. Each `update` is expected to be atomic per
//! document; nothing here holds a lock across calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ModuleResponse, ParticipantResponseDocument};
use crate::Result;

/// Default number of documents fetched per scan page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One page of a resumable full scan
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Documents ordered by id
    pub documents: Vec<ParticipantResponseDocument>,
    /// Cursor for the next page, `None` once the scan is exhausted
    pub next: Option<String>,
}

/// Replacement of a document's response list
#[derive(Debug, Clone)]
pub struct ResponsesUpdate {
    pub responses: Vec<ModuleResponse>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence collaborator for participant response documents
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Fetch up to `limit` documents whose id sorts after `after`
    ///
    /// Pass the previous page's `next` to resume. Ids are never rewritten by
    /// `update`, so a scan stays stable while documents are being modified.
    async fn scan_page(&self, after: Option<&str>, limit: usize) -> Result<ScanPage>;

    /// Look up the document of one participant in one research
    async fn get(
        &self,
        research_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantResponseDocument>>;

    /// Replace the responses of a document and bump its `updated_at`
    ///
    /// # Errors
    /// `NotFound` when no document has `document_id`.
    async fn update(&self, document_id: &str, update: ResponsesUpdate) -> Result<()>;

    /// Persist a new document
    ///
    /// # Errors
    /// `Conflict` when the id or the (research, participant) pair already exists.
    async fn insert(&self, document: &ParticipantResponseDocument) -> Result<()>;

    /// All documents of a research, ordered by id
    async fn list_by_research(&self, research_id: &str) -> Result<Vec<ParticipantResponseDocument>>;
}
