//! SQLite backend
//!
//! Statements are built with sea-query and executed through a sqlx pool.

use super::{Backend, BackendError, Record};
use crate::fields::{FieldDeclaration, FieldKind};
use crate::query::SelectQuery;
use crate::schema::TableSchema;
use async_trait::async_trait;
use sea_query::{Alias, Expr, ExprTrait, Order, Query, SqliteQueryBuilder};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use std::sync::Arc;

/// Backend storing hierarchy tables in SQLite
///
/// ## Example
///
/// ```rust,no_run
/// use reinhardt_sti::backends::{Backend, SqliteBackend};
///
/// # async fn example() {
/// let backend = SqliteBackend::new("sqlite::memory:").await.unwrap();
/// assert!(backend.table_names().await.unwrap().is_empty());
/// # }
/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
/// ```
#[derive(Clone)]
pub struct SqliteBackend {
	pool: Arc<SqlitePool>,
}

impl SqliteBackend {
	/// Connect to a SQLite database URL.
	///
	/// In-memory databases are held on a single pooled connection that is never
	/// recycled, since every new connection would see an empty database.
	pub async fn new(database_url: &str) -> Result<Self, BackendError> {
		let options = if database_url.contains(":memory:") {
			SqlitePoolOptions::new()
				.min_connections(1)
				.max_connections(1)
				.idle_timeout(None)
				.max_lifetime(None)
		} else {
			SqlitePoolOptions::new().max_connections(5)
		};
		let pool = options.connect(database_url).await?;
		tracing::info!(url = database_url, "connected to SQLite");

		Ok(Self {
			pool: Arc::new(pool),
		})
	}

	/// Create a new backend from an existing pool
	pub fn from_pool(pool: Arc<SqlitePool>) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

/// Bindable expression for a record value of `field`
fn value_expr(field: &FieldDeclaration, value: &Value) -> Expr {
	match value {
		Value::Null => match &field.kind {
			kind if kind.is_integer() => Expr::val(Option::<i64>::None),
			FieldKind::Float => Expr::val(Option::<f64>::None),
			FieldKind::Boolean => Expr::val(Option::<bool>::None),
			_ => Expr::val(Option::<String>::None),
		},
		_ if field.kind == FieldKind::Json => Expr::val(value.to_string()),
		Value::Bool(b) => Expr::val(*b),
		Value::Number(n) => match n.as_i64() {
			Some(i) => Expr::val(i),
			None => Expr::val(n.as_f64().unwrap_or_default()),
		},
		Value::String(s) => Expr::val(s.clone()),
		other => Expr::val(other.to_string()),
	}
}

fn decode(row: &SqliteRow, field: &FieldDeclaration) -> Result<Value, BackendError> {
	let column = field.column();
	let decode_error = |e: sqlx::Error| BackendError::Decode {
		column: column.to_string(),
		message: e.to_string(),
	};

	let value = match &field.kind {
		kind if kind.is_integer() => row
			.try_get::<Option<i64>, _>(column)
			.map_err(decode_error)?
			.map(Value::from),
		FieldKind::Float => row
			.try_get::<Option<f64>, _>(column)
			.map_err(decode_error)?
			.map(Value::from),
		FieldKind::Boolean => row
			.try_get::<Option<bool>, _>(column)
			.map_err(decode_error)?
			.map(Value::Bool),
		FieldKind::Json => match row
			.try_get::<Option<String>, _>(column)
			.map_err(decode_error)?
		{
			Some(text) => Some(serde_json::from_str(&text).map_err(|e| BackendError::Decode {
				column: column.to_string(),
				message: e.to_string(),
			})?),
			None => None,
		},
		_ => row
			.try_get::<Option<String>, _>(column)
			.map_err(decode_error)?
			.map(Value::String),
	};
	Ok(value.unwrap_or(Value::Null))
}

/// Map unique constraint failures onto [`BackendError::Duplicate`]
fn map_write_error(table: &TableSchema, error: sqlx::Error) -> BackendError {
	if let sqlx::Error::Database(ref db) = error
		&& db.is_unique_violation()
	{
		// "UNIQUE constraint failed: table.column"
		let column = db
			.message()
			.rsplit('.')
			.next()
			.unwrap_or_default()
			.to_string();
		return BackendError::Duplicate {
			table: table.name().to_string(),
			column,
		};
	}
	BackendError::Database(error)
}

#[async_trait]
impl Backend for SqliteBackend {
	async fn create_table(&self, table: &TableSchema) -> Result<(), BackendError> {
		for sql in table.to_create_sql() {
			sqlx::query(&sql).execute(&*self.pool).await?;
		}
		tracing::info!(table = table.name(), "created table");
		Ok(())
	}

	async fn insert(&self, table: &TableSchema, record: &Record) -> Result<Value, BackendError> {
		let pk_name = table.primary_key();
		let explicit_pk = record.get(pk_name).filter(|v| !v.is_null()).cloned();

		let fields: Vec<&FieldDeclaration> = table
			.fields()
			.filter(|f| f.name != pk_name || explicit_pk.is_some())
			.collect();

		let mut stmt = Query::insert();
		stmt.into_table(Alias::new(table.name()));
		if fields.is_empty() {
			stmt.or_default_values();
		} else {
			stmt.columns(fields.iter().map(|f| Alias::new(f.column())));
			stmt.values(
				fields
					.iter()
					.map(|f| value_expr(f, record.get(&f.name).unwrap_or(&Value::Null)))
					.collect::<Vec<Expr>>(),
			)
			.map_err(|e| BackendError::QueryBuild(e.to_string()))?;
		}
		let sql = stmt.to_string(SqliteQueryBuilder);

		let result = sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| map_write_error(table, e))?;

		Ok(explicit_pk.unwrap_or_else(|| Value::from(result.last_insert_rowid())))
	}

	async fn update(
		&self,
		table: &TableSchema,
		pk: &Value,
		record: &Record,
	) -> Result<u64, BackendError> {
		let pk_name = table.primary_key();
		let Some(pk_field) = table.field(pk_name) else {
			return Err(BackendError::QueryBuild(format!(
				"table '{}' has no primary key column",
				table.name()
			)));
		};

		let values: Vec<(Alias, Expr)> = table
			.fields()
			.map(|f| {
				let value = if f.name == pk_name {
					pk
				} else {
					record.get(&f.name).unwrap_or(&Value::Null)
				};
				(Alias::new(f.column()), value_expr(f, value))
			})
			.collect();

		let sql = Query::update()
			.table(Alias::new(table.name()))
			.values(values)
			.and_where(Expr::col(Alias::new(pk_field.column())).eq(value_expr(pk_field, pk)))
			.to_owned()
			.to_string(SqliteQueryBuilder);

		let result = sqlx::query(&sql)
			.execute(&*self.pool)
			.await
			.map_err(|e| map_write_error(table, e))?;
		Ok(result.rows_affected())
	}

	async fn delete(&self, table: &TableSchema, query: &SelectQuery) -> Result<u64, BackendError> {
		let sql = query
			.to_delete_statement(table)
			.to_string(SqliteQueryBuilder);
		let result = sqlx::query(&sql).execute(&*self.pool).await?;
		Ok(result.rows_affected())
	}

	async fn fetch(
		&self,
		table: &TableSchema,
		query: &SelectQuery,
	) -> Result<Vec<Record>, BackendError> {
		let sql = query
			.to_select_statement(table)
			.to_string(SqliteQueryBuilder);
		tracing::debug!(table = table.name(), %sql, "fetching rows");

		let rows = sqlx::query(&sql).fetch_all(&*self.pool).await?;
		rows.iter()
			.map(|row| {
				table
					.fields()
					.map(|field| Ok((field.name.clone(), decode(row, field)?)))
					.collect()
			})
			.collect()
	}

	async fn count(&self, table: &TableSchema, query: &SelectQuery) -> Result<u64, BackendError> {
		let sql = query.to_count_statement(table).to_string(SqliteQueryBuilder);
		let row = sqlx::query(&sql).fetch_one(&*self.pool).await?;
		let count: i64 = row.try_get(0)?;
		Ok(count as u64)
	}

	async fn table_names(&self) -> Result<Vec<String>, BackendError> {
		let sql = Query::select()
			.column(Alias::new("name"))
			.from(Alias::new("sqlite_master"))
			.and_where(Expr::col(Alias::new("type")).eq("table"))
			.and_where(Expr::col(Alias::new("name")).not_like("sqlite_%"))
			.order_by(Alias::new("rowid"), Order::Asc)
			.to_owned()
			.to_string(SqliteQueryBuilder);

		let rows = sqlx::query(&sql).fetch_all(&*self.pool).await?;
		rows.iter()
			.map(|row| row.try_get::<String, _>("name").map_err(BackendError::from))
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::query::{Filter, FilterOperator};
	use serde_json::json;

	fn notes() -> TableSchema {
		TableSchema::new(
			"notes",
			[
				FieldDeclaration::char("slug", 20).unique(true),
				FieldDeclaration::text("body").null(true),
				FieldDeclaration::boolean("pinned").default(false),
				FieldDeclaration::json("meta").null(true),
			],
		)
	}

	fn record(slug: &str) -> Record {
		let mut record = Record::new();
		record.insert("slug".to_string(), json!(slug));
		record.insert("pinned".to_string(), json!(true));
		record.insert("meta".to_string(), json!({"tags": ["a"]}));
		record
	}

	async fn backend() -> SqliteBackend {
		let backend = SqliteBackend::new("sqlite::memory:").await.unwrap();
		backend.create_table(&notes()).await.unwrap();
		backend
	}

	#[tokio::test]
	async fn test_insert_and_fetch_round_trip() {
		let backend = backend().await;
		let table = notes();

		let pk = backend.insert(&table, &record("first")).await.unwrap();
		assert_eq!(pk, json!(1));

		let rows = backend.fetch(&table, &SelectQuery::new()).await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["id"], json!(1));
		assert_eq!(rows[0]["slug"], json!("first"));
		assert_eq!(rows[0]["body"], Value::Null);
		assert_eq!(rows[0]["pinned"], json!(true));
		assert_eq!(rows[0]["meta"], json!({"tags": ["a"]}));
	}

	#[tokio::test]
	async fn test_unique_violation_is_duplicate() {
		let backend = backend().await;
		let table = notes();
		backend.insert(&table, &record("a")).await.unwrap();

		let err = backend.insert(&table, &record("a")).await.unwrap_err();
		assert!(matches!(err, BackendError::Duplicate { ref column, .. } if column == "slug"));
	}

	#[tokio::test]
	async fn test_update_count_delete() {
		let backend = backend().await;
		let table = notes();
		let pk = backend.insert(&table, &record("a")).await.unwrap();
		backend.insert(&table, &record("b")).await.unwrap();

		let mut changed = record("a");
		changed.insert("body".to_string(), json!("edited"));
		assert_eq!(backend.update(&table, &pk, &changed).await.unwrap(), 1);

		let edited = SelectQuery {
			filters: vec![Filter::eq("body", "edited")],
			..Default::default()
		};
		assert_eq!(backend.count(&table, &edited).await.unwrap(), 1);
		assert_eq!(backend.count(&table, &SelectQuery::new()).await.unwrap(), 2);
		assert_eq!(backend.delete(&table, &edited).await.unwrap(), 1);
		assert_eq!(backend.count(&table, &SelectQuery::new()).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_contains_treats_wildcards_literally() {
		let backend = backend().await;
		let table = notes();
		backend.insert(&table, &record("100%")).await.unwrap();
		backend.insert(&table, &record("1000")).await.unwrap();
		backend.insert(&table, &record("a_b")).await.unwrap();
		backend.insert(&table, &record("axb")).await.unwrap();

		let percent = SelectQuery {
			filters: vec![Filter::new("slug", FilterOperator::Contains, "0%")],
			..Default::default()
		};
		let rows = backend.fetch(&table, &percent).await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0]["slug"], json!("100%"));

		let underscore = SelectQuery {
			filters: vec![Filter::new("slug", FilterOperator::EndsWith, "_b")],
			..Default::default()
		};
		assert_eq!(backend.count(&table, &underscore).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_table_names() {
		let backend = backend().await;
		assert_eq!(backend.table_names().await.unwrap(), vec!["notes".to_string()]);
	}
}
