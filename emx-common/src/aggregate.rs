//! Per-question aggregation
//!
//! Pivots participant-major documents into question-major views for the
//! results dashboards. Every response lands in exactly one bucket, keyed by
//! its resolved question key; nothing is dropped or sorted. Bucket order and
//! entry order both follow document-then-response iteration order.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::legacy::LegacyKeyResolver;
use crate::models::{Metadata, ParticipantResponseDocument, ResponseValue};

/// One participant's answer inside a question bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub participant_id: String,
    pub value: ResponseValue,
    /// `updatedAt` of the response when edited, else `createdAt`
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

/// Every participant's answer to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionWithResponses {
    pub question_key: String,
    pub responses: Vec<QuestionResponse>,
}

/// Incremental question-major pivot
///
/// Feed documents one at a time (e.g. page by page from a store scan) and call
/// [`finish`](Self::finish) for the grouped view.
pub struct QuestionAggregator<'r> {
    resolver: &'r LegacyKeyResolver,
    questions: IndexMap<String, QuestionWithResponses>,
    documents_seen: usize,
    responses_seen: usize,
}

impl<'r> QuestionAggregator<'r> {
    pub fn new(resolver: &'r LegacyKeyResolver) -> Self {
        Self {
            resolver,
            questions: IndexMap::new(),
            documents_seen: 0,
            responses_seen: 0,
        }
    }

    /// Append every response of `document` to its question bucket
    pub fn add_document(&mut self, document: &ParticipantResponseDocument) {
        let duplicates = document.duplicate_question_keys();
        if !duplicates.is_empty() {
            warn!(
                document_id = %document.id,
                participant_id = %document.participant_id,
                keys = ?duplicates,
                "Document repeats question keys; keeping every response"
            );
        }

        for response in &document.responses {
            let key = self.resolver.resolve(&response.question_key);
            let bucket = self
                .questions
                .entry(key.to_string())
                .or_insert_with(|| QuestionWithResponses {
                    question_key: key.to_string(),
                    responses: Vec::new(),
                });
            bucket.responses.push(QuestionResponse {
                participant_id: document.participant_id.clone(),
                value: response.value.clone(),
                timestamp: response.answered_at(),
                metadata: Metadata::new(),
            });
        }

        self.documents_seen += 1;
        self.responses_seen += document.responses.len();
    }

    /// Number of responses fed in so far
    pub fn response_count(&self) -> usize {
        self.responses_seen
    }

    pub fn finish(self) -> IndexMap<String, QuestionWithResponses> {
        debug!(
            documents = self.documents_seen,
            responses = self.responses_seen,
            questions = self.questions.len(),
            "Aggregated responses by question"
        );
        self.questions
    }
}

/// Group all responses of `documents` by resolved question key
pub fn aggregate(
    documents: &[ParticipantResponseDocument],
    resolver: &LegacyKeyResolver,
) -> IndexMap<String, QuestionWithResponses> {
    let mut aggregator = QuestionAggregator::new(resolver);
    for document in documents {
        aggregator.add_document(document);
    }
    aggregator.finish()
}
