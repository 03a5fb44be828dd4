// Field declarations and deconstruction API
// Corresponds to Django's field system, reduced to what a shared table needs

use crate::discriminator::DiscriminatorStorage;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Field deconstruction result
/// Returns (name, path, args, kwargs) similar to Django's deconstruct()
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeconstruction {
	pub name: Option<String>,
	pub path: String,
	pub args: Vec<FieldArg>,
	pub kwargs: HashMap<String, FieldKwarg>,
}

impl FieldDeconstruction {
	/// Compare everything except the field name
	pub fn same_definition(&self, other: &Self) -> bool {
		self.path == other.path && self.args == other.args && self.kwargs == other.kwargs
	}
}

/// Positional argument for field construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldArg {
	String(String),
	Int(i64),
	Bool(bool),
}

/// Keyword argument for field construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldKwarg {
	String(String),
	Uint(u64),
	Bool(bool),
	Choices(Vec<(String, String)>),
	Value(Value),
}

/// Column type of a declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
	/// Auto-incrementing integer primary key
	Auto,
	/// Bounded string
	Char { max_length: u32 },
	/// Unbounded string
	Text,
	/// 32-bit integer
	Integer,
	/// 64-bit integer
	BigInteger,
	/// Floating point number
	Float,
	/// Boolean flag
	Boolean,
	/// JSON document stored as text
	Json,
	/// Reference to another model's primary key
	ForeignKey { to: String },
	/// Many-valued relation; not a column of the table
	ManyToMany { to: String },
	/// Type marker of a shared table
	Discriminator {
		storage: DiscriminatorStorage,
		max_length: u32,
	},
}

impl FieldKind {
	/// Import path used in deconstruction
	pub fn path(&self) -> &'static str {
		match self {
			FieldKind::Auto => "reinhardt_sti::fields::AutoField",
			FieldKind::Char { .. } => "reinhardt_sti::fields::CharField",
			FieldKind::Text => "reinhardt_sti::fields::TextField",
			FieldKind::Integer => "reinhardt_sti::fields::IntegerField",
			FieldKind::BigInteger => "reinhardt_sti::fields::BigIntegerField",
			FieldKind::Float => "reinhardt_sti::fields::FloatField",
			FieldKind::Boolean => "reinhardt_sti::fields::BooleanField",
			FieldKind::Json => "reinhardt_sti::fields::JSONField",
			FieldKind::ForeignKey { .. } => "reinhardt_sti::fields::ForeignKey",
			FieldKind::ManyToMany { .. } => "reinhardt_sti::fields::ManyToManyField",
			FieldKind::Discriminator { .. } => "reinhardt_sti::discriminator::DiscriminatorField",
		}
	}

	fn args(&self) -> Vec<FieldArg> {
		match self {
			FieldKind::ForeignKey { to } | FieldKind::ManyToMany { to } => {
				vec![FieldArg::String(to.clone())]
			}
			_ => Vec::new(),
		}
	}

	/// Whether the kind stores integers
	pub fn is_integer(&self) -> bool {
		matches!(
			self,
			FieldKind::Auto
				| FieldKind::Integer
				| FieldKind::BigInteger
				| FieldKind::ForeignKey { .. }
				| FieldKind::Discriminator {
					storage: DiscriminatorStorage::ContentType,
					..
				}
		)
	}

	/// Maximum string length, for bounded kinds
	pub fn max_length(&self) -> Option<u32> {
		match self {
			FieldKind::Char { max_length } => Some(*max_length),
			FieldKind::Discriminator {
				storage: DiscriminatorStorage::TypeName,
				max_length,
			} => Some(*max_length),
			_ => None,
		}
	}
}

/// A named, typed attribute declared on a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
	pub name: String,
	pub kind: FieldKind,
	pub null: bool,
	pub blank: bool,
	pub default: Option<Value>,
	pub db_column: Option<String>,
	pub primary_key: bool,
	pub unique: bool,
	pub editable: bool,
	pub db_index: bool,
	pub choices: Option<Vec<(String, String)>>,
}

impl FieldDeclaration {
	/// Creates a field with Django's default options
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::fields::{FieldDeclaration, FieldKind};
	///
	/// let field = FieldDeclaration::new("age", FieldKind::Integer);
	/// assert!(!field.null);
	/// assert!(!field.has_default());
	/// assert!(field.editable);
	/// ```
	pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
		Self {
			name: name.into(),
			kind,
			null: false,
			blank: false,
			default: None,
			db_column: None,
			primary_key: false,
			unique: false,
			editable: true,
			db_index: false,
			choices: None,
		}
	}

	pub fn char(name: impl Into<String>, max_length: u32) -> Self {
		Self::new(name, FieldKind::Char { max_length })
	}

	pub fn text(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Text)
	}

	pub fn integer(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Integer)
	}

	pub fn big_integer(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::BigInteger)
	}

	pub fn float(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Float)
	}

	pub fn boolean(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Boolean)
	}

	pub fn json(name: impl Into<String>) -> Self {
		Self::new(name, FieldKind::Json)
	}

	pub fn foreign_key(name: impl Into<String>, to: impl Into<String>) -> Self {
		Self::new(name, FieldKind::ForeignKey { to: to.into() })
	}

	pub fn many_to_many(name: impl Into<String>, to: impl Into<String>) -> Self {
		Self::new(name, FieldKind::ManyToMany { to: to.into() })
	}

	/// Auto-incrementing primary key
	pub fn auto(name: impl Into<String>) -> Self {
		let mut field = Self::new(name, FieldKind::Auto);
		field.primary_key = true;
		field.editable = false;
		field
	}

	#[must_use]
	pub fn null(mut self, null: bool) -> Self {
		self.null = null;
		self
	}

	#[must_use]
	pub fn blank(mut self, blank: bool) -> Self {
		self.blank = blank;
		self
	}

	#[must_use]
	pub fn default(mut self, value: impl Into<Value>) -> Self {
		self.default = Some(value.into());
		self
	}

	#[must_use]
	pub fn db_column(mut self, column: impl Into<String>) -> Self {
		self.db_column = Some(column.into());
		self
	}

	#[must_use]
	pub fn primary_key(mut self, primary_key: bool) -> Self {
		self.primary_key = primary_key;
		self
	}

	#[must_use]
	pub fn unique(mut self, unique: bool) -> Self {
		self.unique = unique;
		self
	}

	#[must_use]
	pub fn editable(mut self, editable: bool) -> Self {
		self.editable = editable;
		self
	}

	#[must_use]
	pub fn db_index(mut self, db_index: bool) -> Self {
		self.db_index = db_index;
		self
	}

	#[must_use]
	pub fn choices<I, K, V>(mut self, choices: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.choices = Some(
			choices
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		);
		self
	}

	pub fn has_default(&self) -> bool {
		self.default.is_some()
	}

	pub fn is_many_to_many(&self) -> bool {
		matches!(self.kind, FieldKind::ManyToMany { .. })
	}

	pub fn is_discriminator(&self) -> bool {
		matches!(self.kind, FieldKind::Discriminator { .. })
	}

	/// Whether the field maps to a column of the table
	pub fn is_concrete(&self) -> bool {
		!self.is_many_to_many()
	}

	/// Whether rows that never set this field still have a valid value
	pub fn is_safely_absent(&self) -> bool {
		self.null || self.has_default() || self.is_many_to_many()
	}

	/// Column name in the table
	pub fn column(&self) -> &str {
		self.db_column.as_deref().unwrap_or(&self.name)
	}

	/// Value a fresh instance starts with
	pub fn initial_value(&self) -> Value {
		self.default.clone().unwrap_or(Value::Null)
	}

	/// Deconstruct the field into a serializable representation.
	///
	/// Only non-default options are emitted, so two declarations with the same
	/// definition deconstruct identically.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::fields::{FieldDeclaration, FieldKwarg};
	///
	/// let field = FieldDeclaration::char("title", 200).null(true);
	/// let dec = field.deconstruct();
	/// assert_eq!(dec.name.as_deref(), Some("title"));
	/// assert_eq!(dec.path, "reinhardt_sti::fields::CharField");
	/// assert_eq!(dec.kwargs.get("max_length"), Some(&FieldKwarg::Uint(200)));
	/// assert_eq!(dec.kwargs.get("null"), Some(&FieldKwarg::Bool(true)));
	/// ```
	pub fn deconstruct(&self) -> FieldDeconstruction {
		let mut kwargs = HashMap::new();

		if let Some(max_length) = self.kind.max_length() {
			kwargs.insert("max_length".to_string(), FieldKwarg::Uint(max_length as u64));
		}
		if let FieldKind::Discriminator { storage, .. } = &self.kind {
			kwargs.insert(
				"storage".to_string(),
				FieldKwarg::String(storage.as_str().to_string()),
			);
		}
		if self.null {
			kwargs.insert("null".to_string(), FieldKwarg::Bool(true));
		}
		if self.blank {
			kwargs.insert("blank".to_string(), FieldKwarg::Bool(true));
		}
		if let Some(ref default) = self.default {
			kwargs.insert("default".to_string(), FieldKwarg::Value(default.clone()));
		}
		if let Some(ref db_column) = self.db_column {
			kwargs.insert(
				"db_column".to_string(),
				FieldKwarg::String(db_column.clone()),
			);
		}
		if self.primary_key {
			kwargs.insert("primary_key".to_string(), FieldKwarg::Bool(true));
		}
		if self.unique {
			kwargs.insert("unique".to_string(), FieldKwarg::Bool(true));
		}
		if !self.editable {
			kwargs.insert("editable".to_string(), FieldKwarg::Bool(false));
		}
		if self.db_index {
			kwargs.insert("db_index".to_string(), FieldKwarg::Bool(true));
		}
		if let Some(ref choices) = self.choices {
			kwargs.insert("choices".to_string(), FieldKwarg::Choices(choices.clone()));
		}

		FieldDeconstruction {
			name: Some(self.name.clone()),
			path: self.kind.path().to_string(),
			args: self.kind.args(),
			kwargs,
		}
	}

	/// Compare two declarations ignoring the name they are bound to
	pub fn same_definition(&self, other: &Self) -> bool {
		self.deconstruct().same_definition(&other.deconstruct())
	}

	/// Check a value against nullability, length and choices
	pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
		if value.is_null() {
			if self.null || self.kind == FieldKind::Auto {
				return Ok(());
			}
			return Err(ValidationError::Required {
				field: self.name.clone(),
			});
		}

		if let (Some(max_length), Some(s)) = (self.kind.max_length(), value.as_str()) {
			let length = s.chars().count();
			if length > max_length as usize {
				return Err(ValidationError::MaxLength {
					field: self.name.clone(),
					max_length,
					length,
				});
			}
		}

		if let Some(ref choices) = self.choices {
			let rendered = match value {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			};
			if !choices.iter().any(|(key, _)| *key == rendered) {
				return Err(ValidationError::InvalidChoice {
					field: self.name.clone(),
					value: rendered,
					choices: choices.iter().map(|(key, _)| key.clone()).collect(),
				});
			}
		}

		Ok(())
	}
}
