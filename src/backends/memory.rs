//! In-process backend.

use super::{Backend, BackendError, Record};
use crate::fields::FieldKind;
use crate::query::SelectQuery;
use crate::schema::TableSchema;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

#[derive(Debug, Default)]
struct MemoryTable {
	rows: Vec<Record>,
	last_id: i64,
}

/// Tables held in memory behind a lock
///
/// Queries are evaluated with [`SelectQuery::apply`], which follows SQL NULL
/// semantics so results match the SQL backends.
///
/// # Examples
///
/// ```
/// use reinhardt_sti::backends::{Backend, MemoryBackend};
/// use reinhardt_sti::fields::FieldDeclaration;
/// use reinhardt_sti::schema::TableSchema;
///
/// # async fn example() {
/// let backend = MemoryBackend::new();
/// let table = TableSchema::new("notes", [FieldDeclaration::text("body")]);
/// backend.create_table(&table).await.unwrap();
/// assert_eq!(backend.table_names().await.unwrap(), vec!["notes".to_string()]);
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
	tables: RwLock<IndexMap<String, MemoryTable>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of rows currently stored in `table`
	pub fn row_count(&self, table: &str) -> usize {
		self.tables
			.read()
			.get(table)
			.map(|t| t.rows.len())
			.unwrap_or_default()
	}
}

/// Keep only the columns of `table`, in table order
fn normalize(table: &TableSchema, record: &Record) -> Record {
	table
		.fields()
		.map(|field| {
			let value = record.get(&field.name).cloned().unwrap_or(Value::Null);
			(field.name.clone(), value)
		})
		.collect()
}

fn check_unique(
	table: &TableSchema,
	rows: &[Record],
	record: &Record,
	skip_pk: Option<&Value>,
) -> Result<(), BackendError> {
	let pk_name = table.primary_key();
	for field in table.fields().filter(|f| f.primary_key || f.unique) {
		let value = &record[&field.name];
		if value.is_null() {
			continue;
		}
		let clash = rows.iter().any(|row| {
			skip_pk.is_none_or(|pk| row.get(pk_name) != Some(pk)) && row.get(&field.name) == Some(value)
		});
		if clash {
			return Err(BackendError::Duplicate {
				table: table.name().to_string(),
				column: field.column().to_string(),
			});
		}
	}
	Ok(())
}

#[async_trait]
impl Backend for MemoryBackend {
	async fn create_table(&self, table: &TableSchema) -> Result<(), BackendError> {
		let mut tables = self.tables.write();
		if !tables.contains_key(table.name()) {
			tracing::debug!(table = table.name(), "created in-memory table");
			tables.insert(table.name().to_string(), MemoryTable::default());
		}
		Ok(())
	}

	async fn insert(&self, table: &TableSchema, record: &Record) -> Result<Value, BackendError> {
		let mut tables = self.tables.write();
		let stored = tables
			.get_mut(table.name())
			.ok_or_else(|| BackendError::NoSuchTable(table.name().to_string()))?;

		let mut row = normalize(table, record);
		let pk_name = table.primary_key().to_string();
		let auto_pk = table
			.field(&pk_name)
			.is_some_and(|f| f.kind == FieldKind::Auto);

		if row[&pk_name].is_null() && auto_pk {
			row.insert(pk_name.clone(), Value::from(stored.last_id + 1));
		}
		check_unique(table, &stored.rows, &row, None)?;

		if let Some(id) = row[&pk_name].as_i64() {
			stored.last_id = stored.last_id.max(id);
		}
		let pk = row[&pk_name].clone();
		stored.rows.push(row);
		Ok(pk)
	}

	async fn update(
		&self,
		table: &TableSchema,
		pk: &Value,
		record: &Record,
	) -> Result<u64, BackendError> {
		let mut tables = self.tables.write();
		let stored = tables
			.get_mut(table.name())
			.ok_or_else(|| BackendError::NoSuchTable(table.name().to_string()))?;

		let pk_name = table.primary_key();
		let mut row = normalize(table, record);
		row.insert(pk_name.to_string(), pk.clone());
		check_unique(table, &stored.rows, &row, Some(pk))?;

		match stored
			.rows
			.iter_mut()
			.find(|existing| existing.get(pk_name) == Some(pk))
		{
			Some(existing) => {
				*existing = row;
				Ok(1)
			}
			None => Ok(0),
		}
	}

	async fn delete(&self, table: &TableSchema, query: &SelectQuery) -> Result<u64, BackendError> {
		let mut tables = self.tables.write();
		let stored = tables
			.get_mut(table.name())
			.ok_or_else(|| BackendError::NoSuchTable(table.name().to_string()))?;

		let before = stored.rows.len();
		stored.rows.retain(|row| !query.matches(row));
		Ok((before - stored.rows.len()) as u64)
	}

	async fn fetch(
		&self,
		table: &TableSchema,
		query: &SelectQuery,
	) -> Result<Vec<Record>, BackendError> {
		let tables = self.tables.read();
		let stored = tables
			.get(table.name())
			.ok_or_else(|| BackendError::NoSuchTable(table.name().to_string()))?;
		Ok(query.apply(&stored.rows))
	}

	async fn table_names(&self) -> Result<Vec<String>, BackendError> {
		Ok(self.tables.read().keys().cloned().collect())
	}
}
