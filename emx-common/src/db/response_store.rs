//! SQLite-backed [`ResponseStore`]

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::models::{ModuleResponse, ParticipantResponseDocument};
use crate::store::{ResponseStore, ResponsesUpdate, ScanPage};
use crate::{time, Error, Result};

type DocumentRow = (String, String, String, String, i64, String, String);

const SELECT_COLUMNS: &str =
    "SELECT id, research_id, participant_id, responses, is_completed, created_at, updated_at FROM participant_responses";

/// Response store over the `participant_responses` table
#[derive(Clone)]
pub struct SqliteResponseStore {
    pool: SqlitePool,
}

impl SqliteResponseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_row(row: DocumentRow) -> Result<ParticipantResponseDocument> {
    let (id, research_id, participant_id, responses, is_completed, created_at, updated_at) = row;
    let responses: Vec<ModuleResponse> = serde_json::from_str(&responses)?;
    Ok(ParticipantResponseDocument {
        id,
        research_id,
        participant_id,
        responses,
        is_completed: is_completed != 0,
        created_at: time::parse_iso8601(&created_at)?,
        updated_at: time::parse_iso8601(&updated_at)?,
    })
}

#[async_trait]
impl ResponseStore for SqliteResponseStore {
    async fn scan_page(&self, after: Option<&str>, limit: usize) -> Result<ScanPage> {
        let limit = limit.max(1);
        // No cursor means the first page, including a document whose id is empty
        let sql = format!("{} WHERE (? IS NULL OR id > ?) ORDER BY id ASC LIMIT ?", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(after)
            .bind(after)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let documents = rows.into_iter().map(decode_row).collect::<Result<Vec<_>>>()?;

        // A full page may have more behind it; an empty follow-up page ends the scan
        let next = if documents.len() == limit {
            documents.last().map(|d| d.id.clone())
        } else {
            None
        };

        debug!(count = documents.len(), has_more = next.is_some(), "Scanned response documents");
        Ok(ScanPage { documents, next })
    }

    async fn get(
        &self,
        research_id: &str,
        participant_id: &str,
    ) -> Result<Option<ParticipantResponseDocument>> {
        let sql = format!("{} WHERE research_id = ? AND participant_id = ? LIMIT 1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(research_id)
            .bind(participant_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(decode_row).transpose()
    }

    async fn update(&self, document_id: &str, update: ResponsesUpdate) -> Result<()> {
        let responses = serde_json::to_string(&update.responses)?;
        let result = sqlx::query("UPDATE participant_responses SET responses = ?, updated_at = ? WHERE id = ?")
            .bind(responses)
            .bind(time::to_iso8601(&update.updated_at))
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("response document {}", document_id)));
        }
        Ok(())
    }

    async fn insert(&self, document: &ParticipantResponseDocument) -> Result<()> {
        let responses = serde_json::to_string(&document.responses)?;
        let result = sqlx::query(
            r#"
            INSERT INTO participant_responses
                (id, research_id, participant_id, responses, is_completed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&document.id)
        .bind(&document.research_id)
        .bind(&document.participant_id)
        .bind(responses)
        .bind(document.is_completed as i64)
        .bind(time::to_iso8601(&document.created_at))
        .bind(time::to_iso8601(&document.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(Error::Conflict(format!(
                "document for research {} / participant {} already exists",
                document.research_id, document.participant_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_by_research(&self, research_id: &str) -> Result<Vec<ParticipantResponseDocument>> {
        let sql = format!("{} WHERE research_id = ? ORDER BY id ASC", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(research_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(decode_row).collect()
    }
}
