//! Storage backends.
//!
//! A [`Backend`] stores [`Record`]s in the tables described by [`TableSchema`]s.
//! Records are keyed by field name; backends map names to physical columns.
//!
//! - [`MemoryBackend`]: process-local tables, evaluates queries in memory
//! - [`SqliteBackend`]: SQLite through sqlx, queries rendered with sea-query

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

use crate::query::SelectQuery;
use crate::schema::TableSchema;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

/// One row, field name -> value
pub type Record = IndexMap<String, Value>;

/// Errors raised by storage backends
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	/// Database error
	#[cfg(feature = "sqlite")]
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	/// The table was never created
	#[error("Table '{0}' does not exist")]
	NoSuchTable(String),

	/// A unique or primary key constraint was violated
	#[error("Duplicate value for '{column}' in table '{table}'")]
	Duplicate { table: String, column: String },

	/// Query building error
	#[error("Query building error: {0}")]
	QueryBuild(String),

	/// Stored value could not be decoded
	#[error("Failed to decode column '{column}': {message}")]
	Decode { column: String, message: String },
}

/// Async storage interface used by managers and instances
#[async_trait]
pub trait Backend: Send + Sync {
	/// Create the table and its indexes if they do not exist
	async fn create_table(&self, table: &TableSchema) -> Result<(), BackendError>;

	/// Insert a row and return its primary key
	async fn insert(&self, table: &TableSchema, record: &Record) -> Result<Value, BackendError>;

	/// Overwrite the row with primary key `pk`, returning the number of rows touched
	async fn update(
		&self,
		table: &TableSchema,
		pk: &Value,
		record: &Record,
	) -> Result<u64, BackendError>;

	/// Delete matching rows
	async fn delete(&self, table: &TableSchema, query: &SelectQuery) -> Result<u64, BackendError>;

	/// Fetch matching rows
	async fn fetch(
		&self,
		table: &TableSchema,
		query: &SelectQuery,
	) -> Result<Vec<Record>, BackendError>;

	/// Count matching rows
	async fn count(&self, table: &TableSchema, query: &SelectQuery) -> Result<u64, BackendError> {
		Ok(self.fetch(table, query).await?.len() as u64)
	}

	/// Names of the tables that exist
	async fn table_names(&self) -> Result<Vec<String>, BackendError>;
}
