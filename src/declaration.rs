//! Model declarations.
//!
//! A [`ModelDeclaration`] is the data form of a model class definition: a name,
//! its bases, the fields declared directly on it, and its `Meta` options. Nothing
//! is decided here; roles are assigned when the declaration is handed to the
//! [`HierarchyBuilder`](crate::hierarchy::HierarchyBuilder).

use crate::discriminator::DiscriminatorField;
use crate::fields::FieldDeclaration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Inheritance strategy requested by a declaration
/// Corresponds to SQLAlchemy's polymorphic configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritanceType {
	/// Single Table Inheritance (all types in one table)
	#[default]
	SingleTable,

	/// Joined Table Inheritance (each type has its own table linked to its parent)
	JoinedTable,

	/// Concrete Table Inheritance (each type is completely independent)
	ConcreteTable,
}

/// `Meta` options of a declaration
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOptions {
	/// Abstract models carry fields for their descendants and have no table
	pub abstract_model: bool,
	/// Explicitly requested inheritance strategy, `None` when not stated
	pub inheritance: Option<InheritanceType>,
	/// Table name override
	pub db_table: Option<String>,
	/// App label override
	pub app_label: Option<String>,
}

impl ModelOptions {
	/// Whether the declaration explicitly asks for a table of its own
	pub fn opts_out_of_single_table(&self) -> bool {
		matches!(
			self.inheritance,
			Some(InheritanceType::JoinedTable | InheritanceType::ConcreteTable)
		)
	}
}

/// Definition of one model
///
/// # Examples
///
/// ```
/// use reinhardt_sti::declaration::ModelDeclaration;
/// use reinhardt_sti::fields::FieldDeclaration;
///
/// let decl = ModelDeclaration::new("BusinessExtension")
///     .base("Business")
///     .field(FieldDeclaration::text("description").null(true));
///
/// assert_eq!(decl.name(), "BusinessExtension");
/// assert_eq!(decl.bases().to_vec(), vec!["Business".to_string()]);
/// assert!(decl.fields().contains_key("description"));
/// ```
#[derive(Debug, Clone)]
pub struct ModelDeclaration {
	name: String,
	bases: Vec<String>,
	fields: IndexMap<String, FieldDeclaration>,
	discriminator: Option<DiscriminatorField>,
	options: ModelOptions,
}

impl ModelDeclaration {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			bases: Vec::new(),
			fields: IndexMap::new(),
			discriminator: None,
			options: ModelOptions::default(),
		}
	}

	/// Append a base, in declaration order
	#[must_use]
	pub fn base(mut self, base: impl Into<String>) -> Self {
		self.bases.push(base.into());
		self
	}

	/// Declare a field; redeclaring a name replaces the earlier declaration
	#[must_use]
	pub fn field(mut self, field: FieldDeclaration) -> Self {
		self.fields.insert(field.name.clone(), field);
		self
	}

	/// Opt into an explicitly configured discriminator column
	#[must_use]
	pub fn discriminator(mut self, field: DiscriminatorField) -> Self {
		self.discriminator = Some(field);
		self
	}

	#[must_use]
	pub fn abstract_model(mut self) -> Self {
		self.options.abstract_model = true;
		self
	}

	#[must_use]
	pub fn inheritance(mut self, inheritance: InheritanceType) -> Self {
		self.options.inheritance = Some(inheritance);
		self
	}

	#[must_use]
	pub fn db_table(mut self, table: impl Into<String>) -> Self {
		self.options.db_table = Some(table.into());
		self
	}

	#[must_use]
	pub fn app_label(mut self, app_label: impl Into<String>) -> Self {
		self.options.app_label = Some(app_label.into());
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn bases(&self) -> &[String] {
		&self.bases
	}

	pub fn fields(&self) -> &IndexMap<String, FieldDeclaration> {
		&self.fields
	}

	pub fn discriminator_field(&self) -> Option<&DiscriminatorField> {
		self.discriminator.as_ref()
	}

	pub fn options(&self) -> &ModelOptions {
		&self.options
	}

	pub fn is_abstract(&self) -> bool {
		self.options.abstract_model
	}
}
