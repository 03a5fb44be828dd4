//! Error types for single table inheritance.
//!
//! Declaration errors are raised while a model is fed into the
//! [`HierarchyBuilder`](crate::hierarchy::HierarchyBuilder) and abort that declaration.
//! Runtime errors come from validation and from the storage backend.

use crate::backends::BackendError;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, StiError>;

/// Errors raised while declaring or operating on STI models
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StiError {
	/// A field declared on a derived model is neither nullable nor defaulted
	#[error(
		"All fields defined on STI subclasses must be nullable or have a default value. \
		 For {model}.{field}, either:\n  \
		 - call .null(true) (allows NULL in the shared table)\n  \
		 - call .default(...) (provides a default value)\n\
		 Rows of sibling types have no value for this column, so it must be safely absent."
	)]
	NonNullableField { model: String, field: String },

	/// A derived model redeclares an owner field with a different definition
	#[error("Field '{field}' from '{model}' conflicts with existing field on '{owner}'")]
	FieldConflict {
		field: String,
		model: String,
		owner: String,
	},

	/// A model shares its name with one of its own ancestors
	#[error(
		"Circular inheritance: '{model}' has the same name as one of its ancestors. \
		 Rename the model so it does not alias an existing ancestor"
	)]
	CircularInheritance { model: String },

	/// A base named in a declaration was never declared
	#[error("Model '{model}' inherits from '{base}', which has not been declared")]
	UnknownBase { model: String, base: String },

	/// Two unrelated declarations use the same name
	#[error("Model '{model}' is already declared")]
	DuplicateModel { model: String },

	/// Lookup by name in the registry failed
	#[error("Model '{model}' is not registered")]
	UnknownModel { model: String },

	/// A type name is not registered in the hierarchy
	#[error("Unknown type '{type_name}' for hierarchy '{owner}'")]
	UnknownType { owner: String, type_name: String },

	/// Abstract models have no storage
	#[error("Model '{model}' is abstract and has no table")]
	AbstractModel { model: String },

	/// Attribute access on a field the model does not carry
	#[error("{model} has no field named '{field}'")]
	FieldDoesNotExist { model: String, field: String },

	/// Attempt to change the type marker of a persisted row
	#[error(
		"Cannot change discriminator '{field}' of a saved {model} from '{from}' to '{to}'"
	)]
	ImmutableDiscriminator {
		model: String,
		field: String,
		from: String,
		to: String,
	},

	/// Instance-level validation failure
	#[error(transparent)]
	Validation(#[from] ValidationError),

	/// Storage failure
	#[error(transparent)]
	Backend(#[from] BackendError),
}

/// Record validation failures.
///
/// These are recoverable: the caller can fix the values and validate again.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	/// A value outside the allowed set
	#[error("Value '{value}' is not a valid choice for '{field}'. Valid choices: {}", .choices.join(", "))]
	InvalidChoice {
		field: String,
		value: String,
		choices: Vec<String>,
	},

	/// A non-nullable field without a value
	#[error("Field '{field}' cannot be null")]
	Required { field: String },

	/// A string longer than the column allows
	#[error("Field '{field}' has at most {max_length} characters ({length} given)")]
	MaxLength {
		field: String,
		max_length: u32,
		length: usize,
	},
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_non_nullable_message_names_field_and_remediations() {
		let err = StiError::NonNullableField {
			model: "Dog".to_string(),
			field: "breed".to_string(),
		};
		let msg = err.to_string();
		assert!(msg.contains("Dog.breed"));
		assert!(msg.contains(".null(true)"));
		assert!(msg.contains(".default("));
	}

	#[test]
	fn test_conflict_message() {
		let err = StiError::FieldConflict {
			field: "size".to_string(),
			model: "Cat".to_string(),
			owner: "Animal".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"Field 'size' from 'Cat' conflicts with existing field on 'Animal'"
		);
	}

	#[test]
	fn test_invalid_choice_lists_choices() {
		let err = ValidationError::InvalidChoice {
			field: "animal_type".to_string(),
			value: "Fish".to_string(),
			choices: vec!["Dog".to_string(), "Cat".to_string()],
		};
		assert!(err.to_string().ends_with("Valid choices: Dog, Cat"));
	}
}
