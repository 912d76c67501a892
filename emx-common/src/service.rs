//! Module response submission and lookup
//!
//! Write path used by the participant runner: the first answer creates the
//! participant's document, later answers either replace the response stored
//! under the same question key or are appended in submission order.
//!
//! Writes are read-modify-write on the whole document. A participant session
//! submits sequentially, so there is no concurrent writer for one document.

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::aggregate::{aggregate, QuestionWithResponses};
use crate::keys::build_key;
use crate::legacy::LegacyKeyResolver;
use crate::models::{Metadata, ModuleResponse, ParticipantResponseDocument, ResponseValue};
use crate::store::{ResponseStore, ResponsesUpdate};
use crate::{time, Error, Result};

/// New answer submitted by a participant
#[derive(Debug, Clone)]
pub struct CreateModuleResponse {
    pub research_id: String,
    pub participant_id: String,
    pub question_key: String,
    pub step_title: String,
    pub value: ResponseValue,
    pub metadata: Metadata,
}

impl CreateModuleResponse {
    /// Build a submission whose question key is derived from the step
    ///
    /// # Errors
    /// `InvalidKeyComponent` when the step id or type cannot form a key.
    pub fn for_step(
        research_id: impl Into<String>,
        participant_id: impl Into<String>,
        step_id: &str,
        step_type: &str,
        question_index: Option<u32>,
        step_title: impl Into<String>,
        value: ResponseValue,
    ) -> Result<Self> {
        Ok(Self {
            research_id: research_id.into(),
            participant_id: participant_id.into(),
            question_key: build_key(step_id, step_type, question_index)?,
            step_title: step_title.into(),
            value,
            metadata: Metadata::new(),
        })
    }
}

/// In-place edit of an existing answer
#[derive(Debug, Clone)]
pub struct UpdateModuleResponse {
    pub value: ResponseValue,
    pub metadata: Metadata,
}

pub struct ModuleResponseService<'a> {
    store: &'a dyn ResponseStore,
}

impl<'a> ModuleResponseService<'a> {
    pub fn new(store: &'a dyn ResponseStore) -> Self {
        Self { store }
    }

    /// Store an answer, creating the participant document on first submission
    ///
    /// Returns the stored response.
    pub async fn save_response(&self, create: CreateModuleResponse) -> Result<ModuleResponse> {
        if create.question_key.is_empty() {
            return Err(Error::InvalidInput("question key must not be empty".to_string()));
        }

        let existing = self.store.get(&create.research_id, &create.participant_id).await?;

        let Some(mut document) = existing else {
            let mut document = ParticipantResponseDocument::new(&create.research_id, &create.participant_id);
            let mut response = ModuleResponse::new(create.question_key, create.step_title, create.value);
            response.metadata = create.metadata;
            response.created_at = document.created_at;
            document.responses.push(response.clone());

            self.store.insert(&document).await?;
            info!(
                document_id = %document.id,
                research_id = %document.research_id,
                participant_id = %document.participant_id,
                "Created participant response document"
            );
            return Ok(response);
        };

        let now = time::now();
        let stored = match document
            .responses
            .iter_mut()
            .find(|r| r.question_key == create.question_key)
        {
            Some(response) => {
                response.value = create.value;
                response.metadata = create.metadata;
                response.updated_at = Some(now);
                debug!(document_id = %document.id, question_key = %response.question_key, "Replaced response");
                response.clone()
            }
            None => {
                let mut response = ModuleResponse::new(create.question_key, create.step_title, create.value);
                response.metadata = create.metadata;
                response.created_at = now;
                document.responses.push(response.clone());
                debug!(document_id = %document.id, question_key = %response.question_key, "Appended response");
                response
            }
        };

        self.store
            .update(
                &document.id,
                ResponsesUpdate {
                    responses: document.responses,
                    updated_at: now,
                },
            )
            .await?;

        Ok(stored)
    }

    /// Edit a response by id
    ///
    /// # Errors
    /// `NotFound` when the participant has no document or the document has no
    /// response with `response_id`.
    pub async fn update_response(
        &self,
        research_id: &str,
        participant_id: &str,
        response_id: &str,
        update: UpdateModuleResponse,
    ) -> Result<ModuleResponse> {
        let mut document = self.store.get(research_id, participant_id).await?.ok_or_else(|| {
            Error::NotFound(format!(
                "no response document for research {} / participant {}",
                research_id, participant_id
            ))
        })?;

        let now = time::now();
        let response = document
            .responses
            .iter_mut()
            .find(|r| r.id == response_id)
            .ok_or_else(|| Error::NotFound(format!("response {} in document {}", response_id, document.id)))?;

        response.value = update.value;
        response.metadata = update.metadata;
        response.updated_at = Some(now);
        let updated = response.clone();

        self.store
            .update(
                &document.id,
                ResponsesUpdate {
                    responses: document.responses,
                    updated_at: now,
                },
            )
            .await?;

        Ok(updated)
    }

    pub async fn responses_for_participant(
        &self,
        research_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantResponseDocument>> {
        self.store.get(research_id, participant_id).await
    }

    pub async fn responses_by_research(&self, research_id: &str) -> Result<Vec<ParticipantResponseDocument>> {
        self.store.list_by_research(research_id).await
    }

    /// Question-major view of every response in a research
    pub async fn question_view(
        &self,
        research_id: &str,
        resolver: &LegacyKeyResolver,
    ) -> Result<IndexMap<String, QuestionWithResponses>> {
        let documents = self.store.list_by_research(research_id).await?;
        Ok(aggregate(&documents, resolver))
    }
}
