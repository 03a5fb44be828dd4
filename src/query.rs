//! Filter AST and type-scoped querysets.
//!
//! A [`SelectQuery`] is evaluated either in memory (against [`Record`]s) or
//! rendered to SQL through sea-query. A [`QuerySet`] binds a query to a model
//! and carries the type filter of that model.

use crate::backends::Record;
use crate::error::Result;
use crate::instance::ModelInstance;
use crate::model::Model;
use crate::schema::TableSchema;
use sea_query::{
	Alias, DeleteStatement, Expr, ExprTrait, LikeExpr, Order, Query, SelectStatement,
	SqliteQueryBuilder,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	In,
	NotIn,
	Contains,
	StartsWith,
	EndsWith,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
	String(String),
	Integer(i64),
	Float(f64),
	Boolean(bool),
	Null,
	List(Vec<FilterValue>),
}

impl FilterValue {
	/// JSON form, as stored in records
	pub fn to_json(&self) -> Value {
		match self {
			FilterValue::String(s) => Value::String(s.clone()),
			FilterValue::Integer(i) => Value::from(*i),
			FilterValue::Float(f) => Value::from(*f),
			FilterValue::Boolean(b) => Value::Bool(*b),
			FilterValue::Null => Value::Null,
			FilterValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
		}
	}

	fn to_expr(&self) -> Expr {
		match self {
			FilterValue::String(s) => Expr::val(s.clone()),
			FilterValue::Integer(i) => Expr::val(*i),
			FilterValue::Float(f) => Expr::val(*f),
			FilterValue::Boolean(b) => Expr::val(*b),
			FilterValue::Null => Expr::val(Option::<i64>::None),
			FilterValue::List(items) => Expr::tuple(items.iter().map(Self::to_expr)),
		}
	}

	fn as_text(&self) -> String {
		match self {
			FilterValue::String(s) => s.clone(),
			other => other.to_json().to_string(),
		}
	}
}

impl From<&str> for FilterValue {
	fn from(value: &str) -> Self {
		FilterValue::String(value.to_string())
	}
}

impl From<String> for FilterValue {
	fn from(value: String) -> Self {
		FilterValue::String(value)
	}
}

impl From<i64> for FilterValue {
	fn from(value: i64) -> Self {
		FilterValue::Integer(value)
	}
}

impl From<i32> for FilterValue {
	fn from(value: i32) -> Self {
		FilterValue::Integer(value as i64)
	}
}

impl From<f64> for FilterValue {
	fn from(value: f64) -> Self {
		FilterValue::Float(value)
	}
}

impl From<bool> for FilterValue {
	fn from(value: bool) -> Self {
		FilterValue::Boolean(value)
	}
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
	fn from(values: Vec<T>) -> Self {
		FilterValue::List(values.into_iter().map(Into::into).collect())
	}
}

impl From<Value> for FilterValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => FilterValue::Null,
			Value::Bool(b) => FilterValue::Boolean(b),
			Value::Number(n) => match n.as_i64() {
				Some(i) => FilterValue::Integer(i),
				None => FilterValue::Float(n.as_f64().unwrap_or_default()),
			},
			Value::String(s) => FilterValue::String(s),
			Value::Array(items) => FilterValue::List(items.into_iter().map(Into::into).collect()),
			other => FilterValue::String(other.to_string()),
		}
	}
}

/// One condition on a field; conditions of a query are combined with AND
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: FilterValue,
	pub negated: bool,
}

impl Filter {
	pub fn new(
		field: impl Into<String>,
		operator: FilterOperator,
		value: impl Into<FilterValue>,
	) -> Self {
		Self {
			field: field.into(),
			operator,
			value: value.into(),
			negated: false,
		}
	}

	/// Shorthand for an equality filter
	pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
		Self::new(field, FilterOperator::Eq, value)
	}

	#[must_use]
	pub fn negate(mut self) -> Self {
		self.negated = !self.negated;
		self
	}

	/// Evaluate against a record with SQL three-valued logic.
	///
	/// Returns `None` when the comparison is unknown (a NULL operand), so a
	/// negated filter excludes NULL rows just like `NOT (col = x)` does.
	pub fn evaluate(&self, record: &Record) -> Option<bool> {
		let current = record.get(&self.field).unwrap_or(&Value::Null);
		let result = match (&self.operator, &self.value) {
			(FilterOperator::Eq, FilterValue::Null) => Some(current.is_null()),
			(FilterOperator::Ne, FilterValue::Null) => Some(!current.is_null()),
			_ if current.is_null() => None,
			(FilterOperator::Eq, value) => Some(values_equal(current, value)),
			(FilterOperator::Ne, value) => Some(!values_equal(current, value)),
			(FilterOperator::Gt, value) => compare(current, value).map(Ordering::is_gt),
			(FilterOperator::Gte, value) => compare(current, value).map(Ordering::is_ge),
			(FilterOperator::Lt, value) => compare(current, value).map(Ordering::is_lt),
			(FilterOperator::Lte, value) => compare(current, value).map(Ordering::is_le),
			(FilterOperator::In, value) => Some(list_contains(current, value)),
			(FilterOperator::NotIn, value) => Some(!list_contains(current, value)),
			(FilterOperator::Contains, value) => {
				text_of(current).map(|s| s.contains(&value.as_text().to_lowercase()))
			}
			(FilterOperator::StartsWith, value) => {
				text_of(current).map(|s| s.starts_with(&value.as_text().to_lowercase()))
			}
			(FilterOperator::EndsWith, value) => {
				text_of(current).map(|s| s.ends_with(&value.as_text().to_lowercase()))
			}
		};
		result.map(|matched| matched != self.negated)
	}

	/// Condition expression over the columns of `table`
	pub fn to_condition(&self, table: &TableSchema) -> Expr {
		let col = Expr::col(Alias::new(table.column_of(&self.field)));
		let expr = match (&self.operator, &self.value) {
			(FilterOperator::Eq, FilterValue::Null) => col.is_null(),
			(FilterOperator::Ne, FilterValue::Null) => col.is_not_null(),
			(FilterOperator::Eq, value) => col.eq(value.to_expr()),
			(FilterOperator::Ne, value) => col.ne(value.to_expr()),
			(FilterOperator::Gt, value) => col.gt(value.to_expr()),
			(FilterOperator::Gte, value) => col.gte(value.to_expr()),
			(FilterOperator::Lt, value) => col.lt(value.to_expr()),
			(FilterOperator::Lte, value) => col.lte(value.to_expr()),
			(FilterOperator::In, value) => col.is_in(list_exprs(value)),
			(FilterOperator::NotIn, value) => col.is_not_in(list_exprs(value)),
			(FilterOperator::Contains, value) => col.like(like_pattern("%", &value.as_text(), "%")),
			(FilterOperator::StartsWith, value) => col.like(like_pattern("", &value.as_text(), "%")),
			(FilterOperator::EndsWith, value) => col.like(like_pattern("%", &value.as_text(), "")),
		};
		if self.negated { expr.not() } else { expr }
	}
}

/// LIKE pattern matching `text` literally between the given wildcards
fn like_pattern(prefix: &str, text: &str, suffix: &str) -> LikeExpr {
	let escaped = text
		.replace('\\', "\\\\")
		.replace('%', "\\%")
		.replace('_', "\\_");
	LikeExpr::new(format!("{prefix}{escaped}{suffix}")).escape('\\')
}

fn list_exprs(value: &FilterValue) -> Vec<Expr> {
	match value {
		FilterValue::List(items) => items.iter().map(FilterValue::to_expr).collect(),
		other => vec![other.to_expr()],
	}
}

fn list_contains(current: &Value, value: &FilterValue) -> bool {
	match value {
		FilterValue::List(items) => items.iter().any(|item| values_equal(current, item)),
		other => values_equal(current, other),
	}
}

fn text_of(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.to_lowercase()),
		Value::Null => None,
		other => Some(other.to_string().to_lowercase()),
	}
}

fn values_equal(current: &Value, value: &FilterValue) -> bool {
	compare(current, value) == Some(Ordering::Equal)
}

fn compare(current: &Value, value: &FilterValue) -> Option<Ordering> {
	compare_json(current, &value.to_json())
}

fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
	match (a, b) {
		(Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
		(Value::String(x), Value::String(y)) => Some(x.cmp(y)),
		(Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
		(Value::Bool(x), Value::Number(y)) | (Value::Number(y), Value::Bool(x)) => {
			let flag = *x as i64 as f64;
			let ordering = flag.partial_cmp(&y.as_f64()?)?;
			Some(if matches!(a, Value::Bool(_)) { ordering } else { ordering.reverse() })
		}
		_ => None,
	}
}

/// Sort key of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
	pub field: String,
	pub descending: bool,
}

impl OrderBy {
	/// Parse `"name"` or `"-name"`
	pub fn parse(spec: &str) -> Self {
		match spec.strip_prefix('-') {
			Some(field) => Self {
				field: field.to_string(),
				descending: true,
			},
			None => Self {
				field: spec.to_string(),
				descending: false,
			},
		}
	}
}

/// Backend-independent description of a query over one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
	pub filters: Vec<Filter>,
	pub order_by: Vec<OrderBy>,
	pub limit: Option<u64>,
}

impl SelectQuery {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether every filter holds for `record`
	pub fn matches(&self, record: &Record) -> bool {
		self.filters
			.iter()
			.all(|filter| filter.evaluate(record) == Some(true))
	}

	/// Filter, sort and truncate records in memory
	pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
		let mut selected: Vec<Record> = records
			.into_iter()
			.filter(|record| self.matches(record))
			.cloned()
			.collect();

		if !self.order_by.is_empty() {
			selected.sort_by(|a, b| {
				for key in &self.order_by {
					let left = a.get(&key.field).unwrap_or(&Value::Null);
					let right = b.get(&key.field).unwrap_or(&Value::Null);
					// NULL sorts first, as in SQLite
					let ordering = match (left.is_null(), right.is_null()) {
						(true, true) => Ordering::Equal,
						(true, false) => Ordering::Less,
						(false, true) => Ordering::Greater,
						(false, false) => compare_json(left, right).unwrap_or(Ordering::Equal),
					};
					let ordering = if key.descending {
						ordering.reverse()
					} else {
						ordering
					};
					if ordering != Ordering::Equal {
						return ordering;
					}
				}
				Ordering::Equal
			});
		}

		if let Some(limit) = self.limit {
			selected.truncate(limit as usize);
		}
		selected
	}

	/// `SELECT` over every column of `table`
	pub fn to_select_statement(&self, table: &TableSchema) -> SelectStatement {
		let mut stmt = Query::select();
		stmt.columns(table.fields().map(|f| Alias::new(f.column())))
			.from(Alias::new(table.name()));
		for filter in &self.filters {
			stmt.and_where(filter.to_condition(table));
		}
		for key in &self.order_by {
			let order = if key.descending {
				Order::Desc
			} else {
				Order::Asc
			};
			stmt.order_by(Alias::new(table.column_of(&key.field)), order);
		}
		if let Some(limit) = self.limit {
			stmt.limit(limit);
		}
		stmt.to_owned()
	}

	/// `SELECT COUNT(*)` with the same filters
	pub fn to_count_statement(&self, table: &TableSchema) -> SelectStatement {
		let mut stmt = Query::select();
		stmt.expr(Expr::cust("COUNT(*)"))
			.from(Alias::new(table.name()));
		for filter in &self.filters {
			stmt.and_where(filter.to_condition(table));
		}
		stmt.to_owned()
	}

	/// `DELETE` with the same filters
	pub fn to_delete_statement(&self, table: &TableSchema) -> DeleteStatement {
		let mut stmt = Query::delete();
		stmt.from_table(Alias::new(table.name()));
		for filter in &self.filters {
			stmt.and_where(filter.to_condition(table));
		}
		stmt.to_owned()
	}
}

/// Lazily evaluated query bound to one model
///
/// Every queryset obtained from a [`Manager`](crate::manager::Manager) already
/// carries the type filter of its model. Filters on the discriminator column
/// accept marker strings and are encoded to the stored representation.
#[derive(Clone)]
pub struct QuerySet {
	model: Model,
	query: SelectQuery,
}

impl std::fmt::Debug for QuerySet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("QuerySet")
			.field("model", &self.model.name())
			.field("query", &self.query)
			.finish()
	}
}

impl QuerySet {
	pub(crate) fn new(model: Model) -> Self {
		Self {
			model,
			query: SelectQuery::new(),
		}
	}

	/// Add a filter as given, without discriminator encoding
	pub(crate) fn with_raw_filter(mut self, filter: Filter) -> Self {
		self.query.filters.push(filter);
		self
	}

	pub fn model(&self) -> &Model {
		&self.model
	}

	pub fn query(&self) -> &SelectQuery {
		&self.query
	}

	#[must_use]
	pub fn filter(mut self, filter: Filter) -> Self {
		let filter = self.encode_discriminator(filter);
		self.query.filters.push(filter);
		self
	}

	/// Keep rows for which `filter` does not hold
	#[must_use]
	pub fn exclude(self, filter: Filter) -> Self {
		self.filter(filter.negate())
	}

	/// Sort by a field, `"-field"` for descending
	#[must_use]
	pub fn order_by(mut self, field: &str) -> Self {
		self.query.order_by.push(OrderBy::parse(field));
		self
	}

	#[must_use]
	pub fn limit(mut self, limit: u64) -> Self {
		self.query.limit = Some(limit);
		self
	}

	/// Execute the query
	pub async fn fetch(&self) -> Result<Vec<ModelInstance>> {
		let records = self
			.model
			.backend()
			.fetch(self.model.table(), &self.query)
			.await?;
		Ok(records
			.into_iter()
			.map(|record| ModelInstance::from_record(self.model.clone(), record))
			.collect())
	}

	pub async fn first(&self) -> Result<Option<ModelInstance>> {
		let mut rows = self.clone().limit(1).fetch().await?;
		Ok(if rows.is_empty() {
			None
		} else {
			Some(rows.remove(0))
		})
	}

	pub async fn count(&self) -> Result<u64> {
		let mut query = self.query.clone();
		query.limit = None;
		query.order_by.clear();
		Ok(self.model.backend().count(self.model.table(), &query).await?)
	}

	/// Delete every row the queryset selects
	pub async fn delete(&self) -> Result<u64> {
		let deleted = self
			.model
			.backend()
			.delete(self.model.table(), &self.query)
			.await?;
		tracing::debug!(model = self.model.name(), deleted, "deleted rows");
		Ok(deleted)
	}

	/// SQLite rendering of the query
	pub fn to_sql(&self) -> String {
		self.query
			.to_select_statement(self.model.table())
			.to_string(SqliteQueryBuilder)
	}

	fn encode_discriminator(&self, mut filter: Filter) -> Filter {
		let Some(hierarchy) = self.model.hierarchy() else {
			return filter;
		};
		if filter.field != hierarchy.discriminator().field_name() {
			return filter;
		}
		filter.value = match filter.value {
			FilterValue::List(items) => FilterValue::List(
				items
					.into_iter()
					.map(|item| hierarchy.encode_filter_value(item))
					.collect(),
			),
			value => hierarchy.encode_filter_value(value),
		};
		filter
	}
}
