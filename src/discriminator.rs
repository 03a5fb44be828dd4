//! # Discriminator
//!
//! The type marker stored on every row of a shared table.
//!
//! Two storage strategies are interchangeable:
//!
//! - [`DiscriminatorStorage::TypeName`]: the marker string itself in a `VARCHAR` column
//! - [`DiscriminatorStorage::ContentType`]: the id of the model's [`ContentType`] in an
//!   integer column
//!
//! [`ContentType`]: crate::contenttypes::ContentType

use crate::error::ValidationError;
use crate::fields::{FieldDeclaration, FieldKind};
use crate::registry::TypeRegistry;
use crate::settings::DEFAULT_TYPE_FIELD_MAX_LENGTH;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the marker is represented in the discriminator column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscriminatorStorage {
	/// Marker string in a bounded string column
	#[default]
	TypeName,
	/// Content type id in an integer column
	ContentType,
}

impl DiscriminatorStorage {
	pub fn as_str(&self) -> &'static str {
		match self {
			DiscriminatorStorage::TypeName => "type_name",
			DiscriminatorStorage::ContentType => "content_type",
		}
	}

	/// Column name used when nothing else is configured
	pub fn default_field_name(&self) -> &'static str {
		match self {
			DiscriminatorStorage::TypeName => "model_type",
			DiscriminatorStorage::ContentType => "polymorphic_ctype",
		}
	}
}

/// Descriptor for an explicitly declared discriminator column.
///
/// Declaring one on an owner (or on an abstract base of an owner) chooses the
/// column name; the remaining options default to a non-editable indexed column.
///
/// # Examples
///
/// ```
/// use reinhardt_sti::discriminator::DiscriminatorField;
///
/// let field = DiscriminatorField::named("animal_type");
/// assert_eq!(field.name(), Some("animal_type"));
/// assert_eq!(field.max_length, 100);
/// assert!(!field.editable);
/// assert!(field.db_index);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscriminatorField {
	name: Option<String>,
	pub max_length: u32,
	pub editable: bool,
	pub db_index: bool,
}

impl Default for DiscriminatorField {
	fn default() -> Self {
		Self::new()
	}
}

impl DiscriminatorField {
	/// Discriminator that takes the configured default name
	pub fn new() -> Self {
		Self {
			name: None,
			max_length: DEFAULT_TYPE_FIELD_MAX_LENGTH,
			editable: false,
			db_index: true,
		}
	}

	/// Discriminator with an explicit column name
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
			..Self::new()
		}
	}

	#[must_use]
	pub fn max_length(mut self, max_length: u32) -> Self {
		self.max_length = max_length;
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

	pub fn name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	/// Convert a raw input (marker string, other scalar, or null) into a marker
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::discriminator::DiscriminatorField;
	/// use serde_json::json;
	///
	/// let field = DiscriminatorField::new();
	/// assert_eq!(field.to_python(&json!("Dog")), Some("Dog".to_string()));
	/// assert_eq!(field.to_python(&json!(null)), None);
	/// ```
	pub fn to_python(&self, value: &Value) -> Option<String> {
		match value {
			Value::Null => None,
			Value::String(s) => Some(s.clone()),
			other => Some(other.to_string()),
		}
	}

	/// Value handed to the database for a marker input
	pub fn get_prep_value(&self, value: &Value) -> Option<String> {
		self.to_python(value)
	}

	/// Check that a value names a registered type
	pub fn validate(
		&self,
		field_name: &str,
		value: &Value,
		registry: &TypeRegistry,
	) -> Result<(), ValidationError> {
		let Some(marker) = self.to_python(value) else {
			return Ok(());
		};
		if registry.contains(&marker) {
			return Ok(());
		}
		Err(ValidationError::InvalidChoice {
			field: field_name.to_string(),
			value: marker,
			choices: registry.markers().map(str::to_string).collect(),
		})
	}

	/// Materialize the column declaration
	pub(crate) fn to_declaration(
		&self,
		default_name: &str,
		storage: DiscriminatorStorage,
	) -> FieldDeclaration {
		let name = self.name.clone().unwrap_or_else(|| default_name.to_string());
		let mut field = FieldDeclaration::new(
			name,
			FieldKind::Discriminator {
				storage,
				max_length: self.max_length,
			},
		);
		field.null = true;
		field.blank = true;
		field.editable = self.editable;
		field.db_index = self.db_index;
		field
	}
}

/// Runtime view of a hierarchy's discriminator column
#[derive(Debug, Clone, PartialEq)]
pub struct Discriminator {
	field: FieldDeclaration,
	storage: DiscriminatorStorage,
}

impl Discriminator {
	pub(crate) fn new(field: FieldDeclaration, storage: DiscriminatorStorage) -> Self {
		Self { field, storage }
	}

	/// Name of the discriminator field
	pub fn field_name(&self) -> &str {
		&self.field.name
	}

	pub fn field(&self) -> &FieldDeclaration {
		&self.field
	}

	pub fn storage(&self) -> DiscriminatorStorage {
		self.storage
	}

	/// Stored representation of a marker, `None` when the marker is unknown
	pub fn encode(&self, marker: &str, registry: &TypeRegistry) -> Option<Value> {
		let entry = registry.get(marker)?;
		match self.storage {
			DiscriminatorStorage::TypeName => Some(Value::String(entry.marker().to_string())),
			DiscriminatorStorage::ContentType => {
				entry.content_type().map(|ct| Value::from(ct.id))
			}
		}
	}

	/// Marker of a stored value, `None` when no registered type matches
	pub fn decode(&self, value: &Value, registry: &TypeRegistry) -> Option<String> {
		let entry = match (self.storage, value) {
			(_, Value::Null) => None,
			(DiscriminatorStorage::TypeName, Value::String(s)) => registry.get(s),
			(DiscriminatorStorage::ContentType, Value::Number(n)) => {
				n.as_i64().and_then(|id| registry.find_by_content_type(id))
			}
			// Markers passed by callers are accepted for either storage
			(DiscriminatorStorage::ContentType, Value::String(s)) => registry.get(s),
			_ => None,
		};
		entry.map(|e| e.marker().to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contenttypes::ContentType;
	use crate::registry::TypeEntry;
	use serde_json::json;

	fn registry() -> TypeRegistry {
		let mut registry = TypeRegistry::new("Animal");
		registry.register(
			TypeEntry::new("Animal", None).with_content_type(ContentType::new(1, "zoo", "animal")),
		);
		registry.register(
			TypeEntry::new("Dog", Some("Animal".to_string()))
				.with_content_type(ContentType::new(2, "zoo", "dog")),
		);
		registry
	}

	#[test]
	fn test_discriminator_field_defaults() {
		let field = DiscriminatorField::new();
		assert_eq!(field.name(), None);
		assert_eq!(field.max_length, 100);
		assert!(!field.editable);
		assert!(field.db_index);
	}

	#[test]
	fn test_discriminator_field_custom_configuration() {
		let field = DiscriminatorField::named("kind")
			.max_length(50)
			.editable(true)
			.db_index(false);
		assert_eq!(field.name(), Some("kind"));
		assert_eq!(field.max_length, 50);
		assert!(field.editable);
		assert!(!field.db_index);
	}

	#[test]
	fn test_get_prep_value() {
		let field = DiscriminatorField::new();
		assert_eq!(field.get_prep_value(&json!("Dog")), Some("Dog".to_string()));
		assert_eq!(field.get_prep_value(&Value::Null), None);
	}

	#[test]
	fn test_validate_against_registry() {
		let field = DiscriminatorField::new();
		let registry = registry();
		assert!(field.validate("model_type", &json!("Dog"), &registry).is_ok());
		assert!(field.validate("model_type", &Value::Null, &registry).is_ok());

		let err = field
			.validate("model_type", &json!("InvalidType"), &registry)
			.unwrap_err();
		assert_eq!(
			err,
			ValidationError::InvalidChoice {
				field: "model_type".to_string(),
				value: "InvalidType".to_string(),
				choices: vec!["Animal".to_string(), "Dog".to_string()],
			}
		);
	}

	#[test]
	fn test_to_declaration() {
		let field = DiscriminatorField::new().to_declaration("model_type", DiscriminatorStorage::TypeName);
		assert_eq!(field.name, "model_type");
		assert!(field.null);
		assert!(!field.editable);
		assert!(field.db_index);
		assert!(field.is_discriminator());
	}

	#[test]
	fn test_type_name_encoding() {
		let registry = registry();
		let field = DiscriminatorField::new().to_declaration("model_type", DiscriminatorStorage::TypeName);
		let disc = Discriminator::new(field, DiscriminatorStorage::TypeName);

		assert_eq!(disc.encode("Dog", &registry), Some(json!("Dog")));
		assert_eq!(disc.encode("Fish", &registry), None);
		assert_eq!(disc.decode(&json!("Dog"), &registry), Some("Dog".to_string()));
		assert_eq!(disc.decode(&json!("Fish"), &registry), None);
		assert_eq!(disc.decode(&Value::Null, &registry), None);
	}

	#[test]
	fn test_content_type_encoding() {
		let registry = registry();
		let field =
			DiscriminatorField::new().to_declaration("polymorphic_ctype", DiscriminatorStorage::ContentType);
		let disc = Discriminator::new(field, DiscriminatorStorage::ContentType);

		assert_eq!(disc.encode("Dog", &registry), Some(json!(2)));
		assert_eq!(disc.decode(&json!(2), &registry), Some("Dog".to_string()));
		assert_eq!(disc.decode(&json!("Animal"), &registry), Some("Animal".to_string()));
		assert_eq!(disc.decode(&json!(99), &registry), None);
	}
}
