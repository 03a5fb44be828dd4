//! Runtime model handles.
//!
//! A [`Model`] is cheap to clone: it shares its table, its hierarchy and its
//! backend through `Arc`s. Derived models share the table of their owner but
//! keep their own name, marker and manager.

use crate::backends::Backend;
use crate::classifier::ModelRole;
use crate::contenttypes::ContentType;
use crate::fields::FieldDeclaration;
use crate::hierarchy::Hierarchy;
use crate::instance::ModelInstance;
use crate::manager::Manager;
use crate::query::Filter;
use crate::schema::TableSchema;
use std::sync::Arc;

/// Per-model data produced by the builder
#[derive(Debug)]
pub(crate) struct ModelInfo {
	pub(crate) name: String,
	pub(crate) role: ModelRole,
	pub(crate) app_label: String,
	pub(crate) content_type: Option<ContentType>,
	/// Fields this model brought to its owner's table
	pub(crate) contributed: Vec<String>,
}

/// Handle on a concrete or derived model
#[derive(Clone)]
pub struct Model {
	info: Arc<ModelInfo>,
	table: Arc<TableSchema>,
	hierarchy: Option<Arc<Hierarchy>>,
	backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Model {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Model")
			.field("name", &self.info.name)
			.field("role", &self.info.role)
			.field("table", &self.table.name())
			.finish()
	}
}

impl PartialEq for Model {
	fn eq(&self, other: &Self) -> bool {
		self.info.name == other.info.name && self.table.name() == other.table.name()
	}
}

impl Model {
	pub(crate) fn new(
		info: Arc<ModelInfo>,
		table: Arc<TableSchema>,
		hierarchy: Option<Arc<Hierarchy>>,
		backend: Arc<dyn Backend>,
	) -> Self {
		Self {
			info,
			table,
			hierarchy,
			backend,
		}
	}

	pub fn name(&self) -> &str {
		&self.info.name
	}

	/// Value identifying this model in the discriminator column
	pub fn marker(&self) -> &str {
		&self.info.name
	}

	pub fn role(&self) -> &ModelRole {
		&self.info.role
	}

	/// Whether this model owns the table it is stored in.
	///
	/// Opted-out models become owners once another model derives from them.
	pub fn is_owner(&self) -> bool {
		match &self.hierarchy {
			Some(hierarchy) => hierarchy.owner() == self.info.name,
			None => self.info.role.is_owner(),
		}
	}

	pub fn is_derived(&self) -> bool {
		self.info.role.is_derived()
	}

	pub fn app_label(&self) -> &str {
		&self.info.app_label
	}

	pub fn content_type(&self) -> Option<&ContentType> {
		self.info.content_type.as_ref()
	}

	/// Physical table, shared with the whole hierarchy
	pub fn table(&self) -> &TableSchema {
		&self.table
	}

	/// `None` for models that opted out of single table inheritance
	pub fn hierarchy(&self) -> Option<&Arc<Hierarchy>> {
		self.hierarchy.as_ref()
	}

	pub fn backend(&self) -> &Arc<dyn Backend> {
		&self.backend
	}

	/// Type-scoped manager
	pub fn objects(&self) -> Manager {
		Manager::new(self.clone())
	}

	/// Unsaved instance with field defaults applied
	pub fn instance(&self) -> ModelInstance {
		ModelInstance::new(self.clone())
	}

	/// Owner of this model's table
	pub fn owner(&self) -> Option<Model> {
		let hierarchy = self.hierarchy.as_ref()?;
		hierarchy.model(hierarchy.owner())
	}

	/// Row restriction applied by this model's manager
	pub fn type_filter(&self) -> Option<Filter> {
		self.hierarchy.as_ref()?.type_filter(self.marker())
	}

	/// Every marker of the hierarchy, in declaration order
	pub fn get_all_types(&self) -> Vec<String> {
		match &self.hierarchy {
			Some(hierarchy) => hierarchy.registry().markers().map(str::to_string).collect(),
			None => vec![self.info.name.clone()],
		}
	}

	/// Resolve a type name, exactly first and then case-insensitively
	///
	/// Names outside the hierarchy resolve to `None`.
	pub fn get_type_class(&self, name: &str) -> Option<Model> {
		let hierarchy = self.hierarchy.as_ref()?;
		let entry = hierarchy.registry().resolve(name)?;
		hierarchy.model(entry.marker())
	}

	/// Name of the discriminator column
	pub fn get_type_field_name(&self) -> Option<&str> {
		self.hierarchy
			.as_ref()
			.map(|h| h.discriminator().field_name())
	}

	/// Fields in this model's own namespace.
	///
	/// Empty for derived models: their fields were relocated onto the owner.
	pub fn local_fields(&self) -> Vec<&FieldDeclaration> {
		if self.is_derived() {
			return Vec::new();
		}
		self.fields()
	}

	/// Every field reachable through this model: the columns and relations of its table
	pub fn fields(&self) -> Vec<&FieldDeclaration> {
		self.table.fields().chain(self.table.relations()).collect()
	}

	/// Names of the fields this model contributed to its owner's table
	pub fn contributed_fields(&self) -> &[String] {
		&self.info.contributed
	}

	pub fn has_field(&self, name: &str) -> bool {
		self.table.has_field(name)
	}
}
