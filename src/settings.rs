//! Configuration for single table inheritance.
//!
//! Supports TOML configuration files with builder-style overrides.
//!
//! ```toml
//! type_field_name = "kind"
//! storage = "content_type"
//! filter_policy = "include_descendants"
//! immutable_discriminator = true
//! app_label = "crm"
//! ```

use crate::discriminator::DiscriminatorStorage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default maximum length of a type-name discriminator column
pub const DEFAULT_TYPE_FIELD_MAX_LENGTH: u32 = 100;

/// How querying through a derived model restricts rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
	/// Only rows whose marker is exactly the queried model
	#[default]
	Exact,
	/// Rows of the queried model and of every model derived from it
	IncludeDescendants,
}

/// Settings applied to every hierarchy declared through one builder
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StiSettings {
	/// Discriminator column name used when no `DiscriminatorField` is declared.
	/// Falls back to the storage default when unset.
	pub type_field_name: Option<String>,

	/// How markers are stored in the discriminator column
	pub storage: DiscriminatorStorage,

	/// Column length for type-name discriminators
	pub type_field_max_length: u32,

	/// Row restriction for derived models
	pub filter_policy: FilterPolicy,

	/// Reject saves that change the marker of a persisted row
	pub immutable_discriminator: bool,

	/// App label used for table names and content types
	pub app_label: String,
}

impl Default for StiSettings {
	fn default() -> Self {
		Self {
			type_field_name: None,
			storage: DiscriminatorStorage::default(),
			type_field_max_length: DEFAULT_TYPE_FIELD_MAX_LENGTH,
			filter_policy: FilterPolicy::default(),
			immutable_discriminator: false,
			app_label: "app".to_string(),
		}
	}
}

impl StiSettings {
	/// Creates settings with default values
	pub fn new() -> Self {
		Self::default()
	}

	/// Load settings from a TOML file.
	///
	/// # Errors
	///
	/// Returns error if file cannot be read or parsed.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError {
			path: path.as_ref().to_path_buf(),
			source: e,
		})?;

		Self::from_toml(&content)
	}

	/// Parse settings from a TOML string.
	pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
		let settings: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
			message: e.to_string(),
		})?;
		settings.validate()?;
		Ok(settings)
	}

	/// Set the default discriminator column name
	#[must_use]
	pub fn with_type_field_name(mut self, name: impl Into<String>) -> Self {
		self.type_field_name = Some(name.into());
		self
	}

	/// Set the discriminator storage strategy
	#[must_use]
	pub fn with_storage(mut self, storage: DiscriminatorStorage) -> Self {
		self.storage = storage;
		self
	}

	/// Set the filter policy for derived models
	#[must_use]
	pub fn with_filter_policy(mut self, policy: FilterPolicy) -> Self {
		self.filter_policy = policy;
		self
	}

	/// Enable or disable discriminator immutability
	#[must_use]
	pub fn with_immutable_discriminator(mut self, immutable: bool) -> Self {
		self.immutable_discriminator = immutable;
		self
	}

	/// Set the app label
	#[must_use]
	pub fn with_app_label(mut self, app_label: impl Into<String>) -> Self {
		self.app_label = app_label.into();
		self
	}

	/// Discriminator column name when a model does not declare one
	pub fn default_type_field_name(&self) -> &str {
		self.type_field_name
			.as_deref()
			.unwrap_or_else(|| self.storage.default_field_name())
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.app_label.trim().is_empty() {
			return Err(ConfigError::InvalidValue {
				key: "app_label".to_string(),
				message: "must not be empty".to_string(),
			});
		}
		if self.type_field_max_length == 0 {
			return Err(ConfigError::InvalidValue {
				key: "type_field_max_length".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}
		if let Some(name) = &self.type_field_name
			&& name.trim().is_empty()
		{
			return Err(ConfigError::InvalidValue {
				key: "type_field_name".to_string(),
				message: "must not be empty".to_string(),
			});
		}
		Ok(())
	}
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("IO error reading {path}: {source}")]
	IoError {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse configuration: {message}")]
	ParseError { message: String },

	#[error("Invalid value for '{key}': {message}")]
	InvalidValue { key: String, message: String },
}
