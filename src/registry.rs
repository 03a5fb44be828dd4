//! Per-hierarchy type registry.
//!
//! Maps discriminator markers to the models sharing one table. A registry belongs
//! to exactly one [`Hierarchy`](crate::hierarchy::Hierarchy); nothing here is global,
//! so separate hierarchies (and separate test runs) never see each other's types.

use crate::contenttypes::ContentType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One registered type of a hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEntry {
	marker: String,
	parent: Option<String>,
	content_type: Option<ContentType>,
}

impl TypeEntry {
	/// Entry for `marker`, derived from `parent` (`None` for the owner)
	pub fn new(marker: impl Into<String>, parent: Option<String>) -> Self {
		Self {
			marker: marker.into(),
			parent,
			content_type: None,
		}
	}

	#[must_use]
	pub fn with_content_type(mut self, content_type: ContentType) -> Self {
		self.content_type = Some(content_type);
		self
	}

	/// Marker stored in the discriminator column; also the model name
	pub fn marker(&self) -> &str {
		&self.marker
	}

	/// Nearest registered ancestor
	pub fn parent(&self) -> Option<&str> {
		self.parent.as_deref()
	}

	pub fn content_type(&self) -> Option<&ContentType> {
		self.content_type.as_ref()
	}
}

/// Marker -> type mapping of a single hierarchy
///
/// # Examples
///
/// ```
/// use reinhardt_sti::registry::{TypeEntry, TypeRegistry};
///
/// let mut registry = TypeRegistry::new("Animal");
/// registry.register(TypeEntry::new("Animal", None));
/// registry.register(TypeEntry::new("Dog", Some("Animal".to_string())));
///
/// assert_eq!(registry.len(), 2);
/// assert!(registry.get("Dog").is_some());
/// assert!(registry.get("Fish").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRegistry {
	owner: String,
	entries: IndexMap<String, TypeEntry>,
}

impl TypeRegistry {
	pub fn new(owner: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			entries: IndexMap::new(),
		}
	}

	/// Name of the owner model
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Insert an entry; re-registering a marker replaces it
	pub fn register(&mut self, entry: TypeEntry) {
		self.entries.insert(entry.marker.clone(), entry);
	}

	/// Exact lookup
	pub fn get(&self, marker: &str) -> Option<&TypeEntry> {
		self.entries.get(marker)
	}

	/// Exact lookup, then a case-insensitive one
	pub fn resolve(&self, name: &str) -> Option<&TypeEntry> {
		self.get(name).or_else(|| {
			self.entries
				.values()
				.find(|entry| entry.marker.eq_ignore_ascii_case(name))
		})
	}

	pub fn find_by_content_type(&self, id: i64) -> Option<&TypeEntry> {
		self.entries
			.values()
			.find(|entry| entry.content_type.as_ref().is_some_and(|ct| ct.id == id))
	}

	pub fn contains(&self, marker: &str) -> bool {
		self.entries.contains_key(marker)
	}

	/// Registered markers in declaration order
	pub fn markers(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}

	pub fn entries(&self) -> impl Iterator<Item = &TypeEntry> {
		self.entries.values()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Registered ancestors of `marker`, nearest first, excluding the owner
	pub fn intermediate_ancestors(&self, marker: &str) -> Vec<&str> {
		let mut chain = Vec::new();
		let mut current = self.get(marker).and_then(TypeEntry::parent);
		while let Some(parent) = current {
			if parent == self.owner {
				break;
			}
			chain.push(parent);
			current = self.get(parent).and_then(TypeEntry::parent);
		}
		chain
	}

	/// `marker` followed by every registered type derived from it
	pub fn descendants_of(&self, marker: &str) -> Vec<&str> {
		let Some(root) = self.get(marker) else {
			return Vec::new();
		};
		let mut result = vec![root.marker()];
		let mut index = 0;
		while index < result.len() {
			let current = result[index];
			result.extend(
				self.entries
					.values()
					.filter(|entry| entry.parent() == Some(current))
					.map(TypeEntry::marker),
			);
			index += 1;
		}
		result
	}
}
