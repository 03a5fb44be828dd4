//! Physical table layout.
//!
//! A [`TableSchema`] is the materialized field set of a table: for a hierarchy
//! owner it is the union of the owner's fields, every field relocated from a
//! derived model, and the discriminator column.

use crate::discriminator::DiscriminatorStorage;
use crate::fields::{FieldDeclaration, FieldKind};
use indexmap::IndexMap;
use sea_query::{
	Alias, ColumnDef, Index, IndexCreateStatement, SqliteQueryBuilder, Table, TableCreateStatement,
};
use serde::Serialize;

/// Name of the primary key added when none is declared
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Columns and relations of one physical table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
	name: String,
	primary_key: String,
	fields: IndexMap<String, FieldDeclaration>,
	relations: IndexMap<String, FieldDeclaration>,
}

impl TableSchema {
	/// Build a table from declared fields, adding an `id` primary key if needed
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::fields::FieldDeclaration;
	/// use reinhardt_sti::schema::TableSchema;
	///
	/// let table = TableSchema::new("crm_business", [FieldDeclaration::char("name", 100)]);
	/// assert_eq!(table.primary_key(), "id");
	/// assert_eq!(table.column_names(), vec!["id", "name"]);
	/// ```
	pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = FieldDeclaration>) -> Self {
		let mut columns = IndexMap::new();
		let mut relations = IndexMap::new();
		for field in fields {
			if field.is_many_to_many() {
				relations.insert(field.name.clone(), field);
			} else {
				columns.insert(field.name.clone(), field);
			}
		}

		let primary_key = match columns.values().find(|f| f.primary_key) {
			Some(pk) => pk.name.clone(),
			None => {
				columns.shift_insert(
					0,
					DEFAULT_PRIMARY_KEY.to_string(),
					FieldDeclaration::auto(DEFAULT_PRIMARY_KEY),
				);
				DEFAULT_PRIMARY_KEY.to_string()
			}
		};

		Self {
			name: name.into(),
			primary_key,
			fields: columns,
			relations,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn primary_key(&self) -> &str {
		&self.primary_key
	}

	/// Column field by name
	pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
		self.fields.get(name)
	}

	/// Column fields in table order
	pub fn fields(&self) -> impl Iterator<Item = &FieldDeclaration> {
		self.fields.values()
	}

	/// Many-to-many relations attached to the table
	pub fn relations(&self) -> impl Iterator<Item = &FieldDeclaration> {
		self.relations.values()
	}

	/// Whether `name` is a column or a relation
	pub fn has_field(&self, name: &str) -> bool {
		self.fields.contains_key(name) || self.relations.contains_key(name)
	}

	/// Field names of the columns
	pub fn column_names(&self) -> Vec<&str> {
		self.fields.keys().map(String::as_str).collect()
	}

	/// Physical column of a field, falling back to the name itself
	pub fn column_of<'a>(&'a self, field: &'a str) -> &'a str {
		self.fields.get(field).map(FieldDeclaration::column).unwrap_or(field)
	}

	/// `CREATE TABLE` statement
	pub fn create_table_statement(&self) -> TableCreateStatement {
		let mut stmt = Table::create();
		stmt.table(Alias::new(&self.name)).if_not_exists();
		for field in self.fields.values() {
			stmt.col(column_def(field));
		}
		stmt.to_owned()
	}

	/// `CREATE INDEX` statements for indexed columns
	pub fn index_statements(&self) -> Vec<IndexCreateStatement> {
		self.fields
			.values()
			.filter(|f| f.db_index && !f.primary_key && !f.unique)
			.map(|f| {
				Index::create()
					.if_not_exists()
					.name(format!("idx_{}_{}", self.name, f.column()))
					.table(Alias::new(&self.name))
					.col(Alias::new(f.column()))
					.to_owned()
			})
			.collect()
	}

	/// DDL for SQLite, table first then indexes
	pub fn to_create_sql(&self) -> Vec<String> {
		let mut statements = vec![self.create_table_statement().to_string(SqliteQueryBuilder)];
		statements.extend(
			self.index_statements()
				.iter()
				.map(|idx| idx.to_string(SqliteQueryBuilder)),
		);
		statements
	}
}

fn column_def(field: &FieldDeclaration) -> ColumnDef {
	let mut def = ColumnDef::new(Alias::new(field.column()));
	match &field.kind {
		FieldKind::Auto => {
			def.integer().not_null().auto_increment().primary_key();
			return def;
		}
		FieldKind::Char { max_length } => {
			def.string_len(*max_length);
		}
		FieldKind::Text | FieldKind::Json => {
			def.text();
		}
		FieldKind::Integer => {
			def.integer();
		}
		FieldKind::BigInteger | FieldKind::ForeignKey { .. } => {
			def.big_integer();
		}
		FieldKind::Float => {
			def.double();
		}
		FieldKind::Boolean => {
			def.boolean();
		}
		FieldKind::Discriminator {
			storage: DiscriminatorStorage::TypeName,
			max_length,
		} => {
			def.string_len(*max_length);
		}
		FieldKind::Discriminator {
			storage: DiscriminatorStorage::ContentType,
			..
		} => {
			def.big_integer();
		}
		// Filtered out when the schema is built
		FieldKind::ManyToMany { .. } => {
			def.text();
		}
	}
	if field.null {
		def.null();
	} else {
		def.not_null();
	}
	if field.primary_key {
		def.primary_key();
	}
	if field.unique {
		def.unique_key();
	}
	def
}
