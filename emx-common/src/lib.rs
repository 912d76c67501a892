//! # EmotioX Common Library
//!
//! Shared code for the EmotioX module-response tooling including:
//! - Participant response document models
//! - Question key construction and validation
//! - Legacy key alias resolution
//! - Response store abstraction and SQLite implementation
//! - Legacy key cleanup and rename migration passes
//! - Per-question aggregation for results views
//! - Configuration loading

pub mod aggregate;
pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod keys;
pub mod legacy;
pub mod models;
pub mod service;
pub mod store;
pub mod time;
pub mod uuid_utils;

pub use aggregate::{aggregate, QuestionAggregator, QuestionResponse, QuestionWithResponses};
pub use cleanup::{CleanupReport, KeyConflict, LegacyCleanupService};
pub use error::{Error, Result};
pub use keys::{build_key, parse_key, validate_key, KeyParts, KEY_SEPARATOR};
pub use legacy::{AliasPolicy, LegacyAliasTable, LegacyKeyResolver};
pub use models::{ModuleResponse, ParticipantResponseDocument, ResponseValue, ScalarValue};
pub use store::{ResponseStore, ResponsesUpdate, ScanPage};
