//! Content types backing the `content_type` discriminator strategy.
//!
//! Each concrete or derived model gets one [`ContentType`] with a stable id. The
//! registry is built once by the [`HierarchyBuilder`](crate::hierarchy::HierarchyBuilder)
//! and shared read-only by every hierarchy of the resulting registry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifies one model type, Django's `django_content_type` row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentType {
	pub id: i64,
	/// The application label (e.g., "blog", "auth")
	pub app_label: String,
	/// Lowercased model name (e.g., "article", "user")
	pub model: String,
}

impl ContentType {
	/// Creates a content type, lowercasing the model name
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::contenttypes::ContentType;
	///
	/// let ct = ContentType::new(3, "crm", "BusinessExtension");
	/// assert_eq!(ct.model, "businessextension");
	/// assert_eq!(ct.natural_key(), "crm.businessextension");
	/// ```
	pub fn new(id: i64, app_label: impl Into<String>, model: impl AsRef<str>) -> Self {
		Self {
			id,
			app_label: app_label.into(),
			model: model.as_ref().to_lowercase(),
		}
	}

	/// Qualified name (app_label.model)
	pub fn natural_key(&self) -> String {
		format!("{}.{}", self.app_label, self.model)
	}
}

/// Registry of content types keyed by natural key
#[derive(Debug, Default, Clone)]
pub struct ContentTypeRegistry {
	by_key: IndexMap<String, ContentType>,
}

impl ContentTypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Return the content type for a model, creating it on first use
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::contenttypes::ContentTypeRegistry;
	///
	/// let mut registry = ContentTypeRegistry::new();
	/// let dog = registry.get_or_create("zoo", "Dog");
	/// let cat = registry.get_or_create("zoo", "Cat");
	/// assert_eq!(dog.id, 1);
	/// assert_eq!(cat.id, 2);
	/// assert_eq!(registry.get_or_create("zoo", "dog").id, 1);
	/// ```
	pub fn get_or_create(&mut self, app_label: &str, model: &str) -> ContentType {
		let key = format!("{}.{}", app_label, model.to_lowercase());
		if let Some(ct) = self.by_key.get(&key) {
			return ct.clone();
		}
		let ct = ContentType::new(self.by_key.len() as i64 + 1, app_label, model);
		self.by_key.insert(key, ct.clone());
		ct
	}

	/// Look up by model, case-insensitively
	pub fn get_for_model(&self, app_label: &str, model: &str) -> Option<&ContentType> {
		self.by_key
			.get(&format!("{}.{}", app_label, model.to_lowercase()))
	}

	/// Look up by id
	pub fn get(&self, id: i64) -> Option<&ContentType> {
		self.by_key.values().find(|ct| ct.id == id)
	}

	pub fn all(&self) -> impl Iterator<Item = &ContentType> {
		self.by_key.values()
	}

	pub fn len(&self) -> usize {
		self.by_key.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_key.is_empty()
	}
}
