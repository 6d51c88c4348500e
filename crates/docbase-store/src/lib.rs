//! docbase-store: SQLite relational store for documents, chunks, chat
//! history, OCR tasks, and the supporting config/audit tables.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::Store;
pub use types::*;
