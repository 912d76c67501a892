//! SQLite persistence for participant response documents

pub mod init;
pub mod response_store;

pub use init::*;
pub use response_store::SqliteResponseStore;
