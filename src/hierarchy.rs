//! Two-phase hierarchy construction.
//!
//! [`HierarchyBuilder::declare`] classifies each declaration against the ones
//! before it and, for derived models, migrates their fields onto the owner.
//! [`HierarchyBuilder::build`] then materializes every owner's table exactly once
//! and freezes the result into a [`ModelRegistry`].
//!
//! ```
//! use reinhardt_sti::declaration::ModelDeclaration;
//! use reinhardt_sti::fields::FieldDeclaration;
//! use reinhardt_sti::hierarchy::HierarchyBuilder;
//!
//! let mut builder = HierarchyBuilder::new();
//! builder
//!     .declare(ModelDeclaration::new("Business").field(FieldDeclaration::char("name", 100)))
//!     .unwrap();
//! builder
//!     .declare(
//!         ModelDeclaration::new("BusinessExtension")
//!             .base("Business")
//!             .field(FieldDeclaration::text("description").null(true)),
//!     )
//!     .unwrap();
//!
//! let registry = builder.build();
//! assert_eq!(registry.tables().len(), 1);
//! let table = registry.model("Business").unwrap().table().clone();
//! assert_eq!(table.column_names(), vec!["id", "name", "description", "model_type"]);
//! ```

use crate::backends::{Backend, MemoryBackend};
use crate::classifier::{ClassifiedModel, ModelRole, classify};
use crate::contenttypes::ContentTypeRegistry;
use crate::declaration::ModelDeclaration;
use crate::discriminator::{Discriminator, DiscriminatorField, DiscriminatorStorage};
use crate::error::{Result, StiError, ValidationError};
use crate::fields::FieldDeclaration;
use crate::migrator::plan_migration;
use crate::model::{Model, ModelInfo};
use crate::query::{Filter, FilterOperator, FilterValue};
use crate::registry::{TypeEntry, TypeRegistry};
use crate::schema::{DEFAULT_PRIMARY_KEY, TableSchema};
use crate::settings::{FilterPolicy, StiSettings};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Owner state accumulated while declaring
#[derive(Debug, Clone)]
struct PendingHierarchy {
	fields: IndexMap<String, FieldDeclaration>,
	discriminator_field: DiscriminatorField,
	discriminator: FieldDeclaration,
	/// marker -> (parent, contributed field names)
	members: IndexMap<String, (Option<String>, Vec<String>)>,
	fields_from_subclasses: IndexMap<String, String>,
}

/// Collects model declarations and turns them into a [`ModelRegistry`]
pub struct HierarchyBuilder {
	settings: StiSettings,
	backend: Arc<dyn Backend>,
	declared: IndexMap<String, ClassifiedModel>,
	pending: IndexMap<String, PendingHierarchy>,
	detached: IndexMap<String, IndexMap<String, FieldDeclaration>>,
}

impl Default for HierarchyBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl HierarchyBuilder {
	/// Builder with default settings and an in-memory backend
	pub fn new() -> Self {
		Self {
			settings: StiSettings::default(),
			backend: Arc::new(MemoryBackend::new()),
			declared: IndexMap::new(),
			pending: IndexMap::new(),
			detached: IndexMap::new(),
		}
	}

	#[must_use]
	pub fn with_settings(mut self, settings: StiSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Storage used by the managers of the built registry
	#[must_use]
	pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
		self.backend = backend;
		self
	}

	pub fn settings(&self) -> &StiSettings {
		&self.settings
	}

	/// Declare a model.
	///
	/// Returns the role the model was given. On error the declaration is
	/// discarded and nothing declared so far is modified.
	pub fn declare(&mut self, decl: ModelDeclaration) -> Result<ModelRole> {
		let role = classify(&decl, &self.declared)?;
		let name = decl.name().to_string();
		if self.declared.contains_key(&name) {
			return Err(StiError::DuplicateModel { model: name });
		}

		let (inherited, inherited_discriminator) = self.abstract_inheritance(&decl);

		match &role {
			ModelRole::Abstract => {}
			ModelRole::Owner => {
				let pending = self.open_hierarchy(&decl, inherited, inherited_discriminator)?;
				tracing::info!(
					owner = %name,
					discriminator = %pending.discriminator.name,
					"opened single table hierarchy"
				);
				self.pending.insert(name.clone(), pending);
			}
			ModelRole::Derived { owner, parent } => {
				self.join_hierarchy(&decl, owner, parent, inherited)?;
			}
			ModelRole::Detached {
				parent,
				inheritance,
			} => {
				tracing::info!(model = %name, %parent, ?inheritance, "model keeps its own table");
				let mut fields = inherited;
				fields.extend(decl.fields().clone());
				self.detached.insert(name.clone(), fields);
			}
		}

		self.declared.insert(
			name,
			ClassifiedModel {
				declaration: decl,
				role: role.clone(),
			},
		);
		Ok(role)
	}

	/// Fields and discriminator inherited through abstract bases, nearest first
	fn abstract_inheritance(
		&self,
		decl: &ModelDeclaration,
	) -> (IndexMap<String, FieldDeclaration>, Option<DiscriminatorField>) {
		let mut fields = IndexMap::new();
		let mut discriminator = None;
		for base in decl.bases() {
			self.collect_abstract(base, &mut fields, &mut discriminator);
		}
		(fields, discriminator)
	}

	fn collect_abstract(
		&self,
		name: &str,
		fields: &mut IndexMap<String, FieldDeclaration>,
		discriminator: &mut Option<DiscriminatorField>,
	) {
		let Some(model) = self.declared.get(name) else {
			return;
		};
		if model.role != ModelRole::Abstract {
			return;
		}
		let decl = &model.declaration;
		if discriminator.is_none() {
			*discriminator = decl.discriminator_field().cloned();
		}
		for base in decl.bases() {
			self.collect_abstract(base, fields, discriminator);
		}
		for (field_name, field) in decl.fields() {
			fields
				.entry(field_name.clone())
				.or_insert_with(|| field.clone());
		}
	}

	fn open_hierarchy(
		&self,
		decl: &ModelDeclaration,
		inherited: IndexMap<String, FieldDeclaration>,
		inherited_discriminator: Option<DiscriminatorField>,
	) -> Result<PendingHierarchy> {
		let mut fields = inherited;
		fields.extend(decl.fields().clone());
		if !fields.values().any(|f| f.primary_key) {
			// The implicit key column cannot double as an ordinary field
			if fields.contains_key(DEFAULT_PRIMARY_KEY) {
				return Err(StiError::FieldConflict {
					field: DEFAULT_PRIMARY_KEY.to_string(),
					model: decl.name().to_string(),
					owner: decl.name().to_string(),
				});
			}
			fields.shift_insert(
				0,
				DEFAULT_PRIMARY_KEY.to_string(),
				FieldDeclaration::auto(DEFAULT_PRIMARY_KEY),
			);
		}

		let discriminator_field = decl
			.discriminator_field()
			.cloned()
			.or(inherited_discriminator)
			.unwrap_or_else(|| {
				DiscriminatorField::new().max_length(self.settings.type_field_max_length)
			});
		let discriminator = discriminator_field.to_declaration(
			self.settings.default_type_field_name(),
			self.settings.storage,
		);

		if fields.contains_key(&discriminator.name) {
			return Err(StiError::FieldConflict {
				field: discriminator.name.clone(),
				model: decl.name().to_string(),
				owner: decl.name().to_string(),
			});
		}

		let mut members = IndexMap::new();
		members.insert(decl.name().to_string(), (None, Vec::new()));

		Ok(PendingHierarchy {
			fields,
			discriminator_field,
			discriminator,
			members,
			fields_from_subclasses: IndexMap::new(),
		})
	}

	fn join_hierarchy(
		&mut self,
		decl: &ModelDeclaration,
		owner: &str,
		parent: &str,
		inherited: IndexMap<String, FieldDeclaration>,
	) -> Result<()> {
		let name = decl.name();
		let mut pending = match self.pending.get(owner) {
			Some(pending) => pending.clone(),
			None => self.promote_detached(owner)?,
		};

		let mut candidates: IndexMap<String, FieldDeclaration> = inherited
			.into_iter()
			.filter(|(field_name, _)| !pending.fields.contains_key(field_name))
			.collect();
		candidates.extend(decl.fields().clone());

		let discriminator_name = pending.discriminator.name.as_str();
		let renames_discriminator = decl
			.discriminator_field()
			.and_then(DiscriminatorField::name)
			.is_some_and(|n| n != discriminator_name);
		if candidates.contains_key(discriminator_name) || renames_discriminator {
			return Err(StiError::FieldConflict {
				field: discriminator_name.to_string(),
				model: name.to_string(),
				owner: owner.to_string(),
			});
		}

		let plan = plan_migration(name, owner, candidates.values(), &pending.fields)?;
		let contributed = plan
			.relocated
			.iter()
			.map(|f| f.name.clone())
			.chain(plan.shared.iter().cloned())
			.collect();
		plan.apply(
			name,
			&mut pending.fields,
			&mut pending.fields_from_subclasses,
		);
		pending
			.members
			.insert(name.to_string(), (Some(parent.to_string()), contributed));
		self.pending.insert(owner.to_string(), pending);

		tracing::debug!(model = name, owner, parent, "registered derived type");
		Ok(())
	}

	/// Open a hierarchy for an opted-out model that gained its first subclass
	fn promote_detached(&self, name: &str) -> Result<PendingHierarchy> {
		let decl = self
			.declared
			.get(name)
			.map(|model| &model.declaration)
			.ok_or_else(|| StiError::UnknownModel {
				model: name.to_string(),
			})?;
		let (inherited, inherited_discriminator) = self.abstract_inheritance(decl);
		let pending = self.open_hierarchy(decl, inherited, inherited_discriminator)?;
		tracing::info!(
			owner = name,
			discriminator = %pending.discriminator.name,
			"opted-out model opened its own hierarchy"
		);
		Ok(pending)
	}

	fn app_label_of(&self, decl: &ModelDeclaration) -> String {
		decl.options()
			.app_label
			.clone()
			.unwrap_or_else(|| self.settings.app_label.clone())
	}

	fn table_name_of(&self, decl: &ModelDeclaration) -> String {
		decl.options().db_table.clone().unwrap_or_else(|| {
			format!("{}_{}", self.app_label_of(decl), decl.name().to_lowercase())
		})
	}

	/// Materialize every table and freeze the declarations
	pub fn build(self) -> ModelRegistry {
		let mut content_types = ContentTypeRegistry::new();
		for model in self.declared.values() {
			if model.role != ModelRole::Abstract {
				content_types.get_or_create(
					&self.app_label_of(&model.declaration),
					model.declaration.name(),
				);
			}
		}

		let mut models = IndexMap::new();
		let mut hierarchies = Vec::new();
		let mut abstract_models = Vec::new();

		for (name, model) in &self.declared {
			let decl = &model.declaration;
			match &model.role {
				ModelRole::Abstract => abstract_models.push(name.clone()),
				ModelRole::Detached { .. } if !self.pending.contains_key(name) => {
					let fields = self.detached.get(name).cloned().unwrap_or_default();
					let app_label = self.app_label_of(decl);
					let info = ModelInfo {
						name: name.clone(),
						role: model.role.clone(),
						content_type: content_types.get_for_model(&app_label, name).cloned(),
						app_label,
						contributed: Vec::new(),
					};
					let table = TableSchema::new(self.table_name_of(decl), fields.into_values());
					models.insert(
						name.clone(),
						Model::new(
							Arc::new(info),
							Arc::new(table),
							None,
							self.backend.clone(),
						),
					);
				}
				ModelRole::Owner | ModelRole::Detached { .. } => {
					let Some(pending) = self.pending.get(name) else {
						continue;
					};
					let hierarchy = self.materialize(name, pending, &content_types);
					tracing::info!(
						owner = %name,
						table = hierarchy.table().name(),
						members = hierarchy.registry().len(),
						"materialized hierarchy"
					);
					for marker in hierarchy.registry().markers() {
						if let Some(model) = hierarchy.model(marker) {
							models.insert(marker.to_string(), model);
						}
					}
					hierarchies.push(hierarchy);
				}
				// Registered together with their owner
				ModelRole::Derived { .. } => {}
			}
		}

		// Keep declaration order
		let mut ordered = IndexMap::new();
		for name in self.declared.keys() {
			if let Some(model) = models.shift_remove(name) {
				ordered.insert(name.clone(), model);
			}
		}

		ModelRegistry {
			models: ordered,
			abstract_models,
			hierarchies,
			content_types,
			backend: self.backend,
		}
	}

	fn materialize(
		&self,
		owner: &str,
		pending: &PendingHierarchy,
		content_types: &ContentTypeRegistry,
	) -> Arc<Hierarchy> {
		let mut registry = TypeRegistry::new(owner);
		let mut members = IndexMap::new();

		for (marker, (parent, contributed)) in &pending.members {
			let Some(model) = self.declared.get(marker) else {
				continue;
			};
			let app_label = self.app_label_of(&model.declaration);
			let content_type = content_types.get_for_model(&app_label, marker).cloned();

			let mut entry = TypeEntry::new(marker.clone(), parent.clone());
			if let Some(ct) = &content_type {
				entry = entry.with_content_type(ct.clone());
			}
			registry.register(entry);

			members.insert(
				marker.clone(),
				Arc::new(ModelInfo {
					name: marker.clone(),
					role: model.role.clone(),
					app_label,
					content_type,
					contributed: contributed.clone(),
				}),
			);
		}

		let table = TableSchema::new(
			self.declared
				.get(owner)
				.map(|m| self.table_name_of(&m.declaration))
				.unwrap_or_else(|| owner.to_lowercase()),
			pending
				.fields
				.values()
				.cloned()
				.chain(std::iter::once(pending.discriminator.clone())),
		);

		Arc::new(Hierarchy {
			owner: owner.to_string(),
			table: Arc::new(table),
			discriminator: Discriminator::new(pending.discriminator.clone(), self.settings.storage),
			discriminator_field: pending.discriminator_field.clone(),
			registry,
			members,
			fields_from_subclasses: pending.fields_from_subclasses.clone(),
			filter_policy: self.settings.filter_policy,
			immutable_discriminator: self.settings.immutable_discriminator,
			backend: self.backend.clone(),
		})
	}
}

/// A frozen single table hierarchy: one owner, one table, one type registry
pub struct Hierarchy {
	owner: String,
	table: Arc<TableSchema>,
	discriminator: Discriminator,
	discriminator_field: DiscriminatorField,
	registry: TypeRegistry,
	members: IndexMap<String, Arc<ModelInfo>>,
	fields_from_subclasses: IndexMap<String, String>,
	filter_policy: FilterPolicy,
	immutable_discriminator: bool,
	backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Hierarchy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Hierarchy")
			.field("owner", &self.owner)
			.field("table", &self.table.name())
			.field("discriminator", &self.discriminator.field_name())
			.field("members", &self.members.keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Hierarchy {
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// The shared physical table
	pub fn table(&self) -> &TableSchema {
		&self.table
	}

	pub fn discriminator(&self) -> &Discriminator {
		&self.discriminator
	}

	pub fn registry(&self) -> &TypeRegistry {
		&self.registry
	}

	/// Relocated field -> derived model that contributed it
	pub fn fields_from_subclasses(&self) -> &IndexMap<String, String> {
		&self.fields_from_subclasses
	}

	pub fn filter_policy(&self) -> FilterPolicy {
		self.filter_policy
	}

	pub fn immutable_discriminator(&self) -> bool {
		self.immutable_discriminator
	}

	/// Model handle for a registered marker
	pub fn model(self: &Arc<Self>, marker: &str) -> Option<Model> {
		let info = self.members.get(marker)?;
		Some(Model::new(
			info.clone(),
			self.table.clone(),
			Some(self.clone()),
			self.backend.clone(),
		))
	}

	/// Stored value for a marker
	pub fn encode_marker(&self, marker: &str) -> Option<Value> {
		self.discriminator.encode(marker, &self.registry)
	}

	/// Marker of a stored value
	pub fn decode_marker(&self, value: &Value) -> Option<String> {
		self.discriminator.decode(value, &self.registry)
	}

	/// Row restriction for querying through `marker`; `None` for the owner
	pub fn type_filter(&self, marker: &str) -> Option<Filter> {
		if marker == self.owner {
			return None;
		}
		let field = self.discriminator.field_name();
		let filter = match self.filter_policy {
			FilterPolicy::Exact => Filter::eq(field, self.encode_filter_value(marker.into())),
			FilterPolicy::IncludeDescendants => Filter::new(
				field,
				FilterOperator::In,
				FilterValue::List(
					self.registry
						.descendants_of(marker)
						.into_iter()
						.map(|m| self.encode_filter_value(m.into()))
						.collect(),
				),
			),
		};
		Some(filter)
	}

	/// Translate a marker given in a filter to the stored representation
	pub(crate) fn encode_filter_value(&self, value: FilterValue) -> FilterValue {
		match &value {
			FilterValue::String(name) => self
				.registry
				.resolve(name)
				.and_then(|entry| self.encode_marker(entry.marker()))
				.map(FilterValue::from)
				.unwrap_or(value),
			_ => value,
		}
	}

	/// Check that a stored discriminator value names a registered type
	pub fn validate_discriminator(&self, value: &Value) -> std::result::Result<(), ValidationError> {
		let field_name = self.discriminator.field_name();
		match self.discriminator.storage() {
			DiscriminatorStorage::TypeName => {
				self.discriminator_field
					.validate(field_name, value, &self.registry)
			}
			DiscriminatorStorage::ContentType => {
				if value.is_null() || self.decode_marker(value).is_some() {
					return Ok(());
				}
				Err(ValidationError::InvalidChoice {
					field: field_name.to_string(),
					value: self
						.discriminator_field
						.to_python(value)
						.unwrap_or_default(),
					choices: self.registry.markers().map(str::to_string).collect(),
				})
			}
		}
	}
}

/// Models of every hierarchy declared through one builder
pub struct ModelRegistry {
	models: IndexMap<String, Model>,
	abstract_models: Vec<String>,
	hierarchies: Vec<Arc<Hierarchy>>,
	content_types: ContentTypeRegistry,
	backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for ModelRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModelRegistry")
			.field("models", &self.models.keys().collect::<Vec<_>>())
			.field("abstract_models", &self.abstract_models)
			.field("hierarchies", &self.hierarchies)
			.finish()
	}
}

impl ModelRegistry {
	/// Model by name
	///
	/// # Errors
	///
	/// `AbstractModel` for abstract declarations, `UnknownModel` otherwise.
	pub fn model(&self, name: &str) -> Result<Model> {
		if let Some(model) = self.models.get(name) {
			return Ok(model.clone());
		}
		if self.abstract_models.iter().any(|m| m == name) {
			return Err(StiError::AbstractModel {
				model: name.to_string(),
			});
		}
		Err(StiError::UnknownModel {
			model: name.to_string(),
		})
	}

	pub fn get(&self, name: &str) -> Option<Model> {
		self.models.get(name).cloned()
	}

	/// Every concrete model, in declaration order
	pub fn models(&self) -> impl Iterator<Item = &Model> {
		self.models.values()
	}

	pub fn hierarchies(&self) -> &[Arc<Hierarchy>] {
		&self.hierarchies
	}

	/// Hierarchy owned by `owner`
	pub fn hierarchy(&self, owner: &str) -> Option<&Arc<Hierarchy>> {
		self.hierarchies.iter().find(|h| h.owner() == owner)
	}

	/// Physical tables: one per hierarchy plus one per detached model
	pub fn tables(&self) -> Vec<&TableSchema> {
		let mut tables: Vec<&TableSchema> = Vec::new();
		for model in self.models.values() {
			if !tables.iter().any(|t| t.name() == model.table().name()) {
				tables.push(model.table());
			}
		}
		tables
	}

	pub fn content_types(&self) -> &ContentTypeRegistry {
		&self.content_types
	}

	pub fn backend(&self) -> &Arc<dyn Backend> {
		&self.backend
	}

	/// Create every table on the backend
	pub async fn create_tables(&self) -> Result<()> {
		for table in self.tables() {
			self.backend.create_table(table).await?;
		}
		tracing::info!(tables = self.tables().len(), "created tables");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::declaration::InheritanceType;
	use rstest::*;

	#[fixture]
	fn builder() -> HierarchyBuilder {
		let mut builder = HierarchyBuilder::new();
		builder
			.declare(
				ModelDeclaration::new("Animal")
					.field(FieldDeclaration::char("name", 50))
					.field(FieldDeclaration::char("color", 30).null(true)),
			)
			.unwrap();
		builder
			.declare(
				ModelDeclaration::new("Dog")
					.base("Animal")
					.field(FieldDeclaration::char("breed", 50).null(true)),
			)
			.unwrap();
		builder
	}

	#[rstest]
	fn test_one_table_per_hierarchy(mut builder: HierarchyBuilder) {
		builder
			.declare(
				ModelDeclaration::new("Cat")
					.base("Animal")
					.field(FieldDeclaration::boolean("indoor").default(true)),
			)
			.unwrap();
		builder
			.declare(ModelDeclaration::new("Puppy").base("Dog"))
			.unwrap();
		let registry = builder.build();

		assert_eq!(registry.tables().len(), 1);
		assert_eq!(registry.hierarchies().len(), 1);
		assert_eq!(
			registry.tables()[0].column_names(),
			vec!["id", "name", "color", "breed", "indoor", "model_type"]
		);
		assert_eq!(registry.models().count(), 4);
	}

	#[rstest]
	fn test_failed_declaration_leaves_owner_untouched(mut builder: HierarchyBuilder) {
		let err = builder
			.declare(
				ModelDeclaration::new("Cat")
					.base("Animal")
					.field(FieldDeclaration::char("nickname", 20).null(true))
					.field(FieldDeclaration::char("whiskers", 20)),
			)
			.unwrap_err();
		assert!(matches!(err, StiError::NonNullableField { ref field, .. } if field == "whiskers"));

		let registry = builder.build();
		assert!(registry.get("Cat").is_none());
		let table = registry.model("Animal").unwrap().table().clone();
		assert!(table.field("nickname").is_none());
		assert!(table.field("whiskers").is_none());
	}

	#[rstest]
	fn test_duplicate_model(mut builder: HierarchyBuilder) {
		let err = builder
			.declare(ModelDeclaration::new("Dog").base("Animal"))
			.unwrap_err();
		assert!(matches!(err, StiError::DuplicateModel { ref model } if model == "Dog"));
	}

	#[rstest]
	fn test_redeclared_discriminator_conflicts(mut builder: HierarchyBuilder) {
		let err = builder
			.declare(
				ModelDeclaration::new("Cat")
					.base("Animal")
					.field(FieldDeclaration::char("model_type", 10).null(true)),
			)
			.unwrap_err();
		assert!(matches!(err, StiError::FieldConflict { ref field, .. } if field == "model_type"));
	}

	#[rstest]
	fn test_ledger_records_contributor(builder: HierarchyBuilder) {
		let registry = builder.build();
		let hierarchy = registry.hierarchy("Animal").unwrap();
		assert_eq!(
			hierarchy.fields_from_subclasses().get("breed").map(String::as_str),
			Some("Dog")
		);
	}

	#[test]
	fn test_abstract_discriminator_is_inherited() {
		let mut builder = HierarchyBuilder::new();
		builder
			.declare(
				ModelDeclaration::new("TypedAnimal")
					.abstract_model()
					.field(FieldDeclaration::char("name", 50))
					.discriminator(DiscriminatorField::named("animal_type")),
			)
			.unwrap();
		builder
			.declare(ModelDeclaration::new("Animal").base("TypedAnimal"))
			.unwrap();
		let registry = builder.build();
		let animal = registry.model("Animal").unwrap();

		assert_eq!(animal.get_type_field_name(), Some("animal_type"));
		assert_eq!(
			animal.table().column_names(),
			vec!["id", "name", "animal_type"]
		);
		assert!(matches!(
			registry.model("TypedAnimal"),
			Err(StiError::AbstractModel { .. })
		));
	}

	#[test]
	fn test_detached_model_has_own_table() {
		let mut builder = HierarchyBuilder::new();
		builder
			.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("name", 50)))
			.unwrap();
		builder
			.declare(
				ModelDeclaration::new("Robot")
					.base("Animal")
					.inheritance(InheritanceType::ConcreteTable)
					.field(FieldDeclaration::char("serial", 20)),
			)
			.unwrap();
		let registry = builder.build();

		assert_eq!(registry.tables().len(), 2);
		let robot = registry.model("Robot").unwrap();
		assert!(robot.hierarchy().is_none());
		assert_eq!(robot.table().name(), "app_robot");
		assert_eq!(robot.table().column_names(), vec!["id", "serial"]);
		assert_eq!(registry.hierarchy("Animal").unwrap().registry().len(), 1);
	}

	#[test]
	fn test_child_of_detached_shares_its_table() {
		let mut builder = HierarchyBuilder::new();
		builder
			.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("name", 50)))
			.unwrap();
		builder
			.declare(
				ModelDeclaration::new("Robot")
					.base("Animal")
					.inheritance(InheritanceType::ConcreteTable)
					.field(FieldDeclaration::char("serial", 20)),
			)
			.unwrap();
		let role = builder
			.declare(
				ModelDeclaration::new("RobotDog")
					.base("Robot")
					.field(FieldDeclaration::char("model_no", 20).null(true)),
			)
			.unwrap();
		assert_eq!(
			role,
			ModelRole::Derived {
				owner: "Robot".to_string(),
				parent: "Robot".to_string()
			}
		);
		let registry = builder.build();

		assert_eq!(registry.tables().len(), 2);
		assert_eq!(registry.hierarchies().len(), 2);
		let robot = registry.model("Robot").unwrap();
		let robot_dog = registry.model("RobotDog").unwrap();
		assert!(robot.is_owner());
		assert!(robot_dog.is_derived());
		assert_eq!(robot_dog.table().name(), "app_robot");
		assert_eq!(
			robot.table().column_names(),
			vec!["id", "serial", "model_no", "model_type"]
		);
		assert!(robot_dog.has_field("serial"));
		assert_eq!(robot.get_all_types(), vec!["Robot", "RobotDog"]);
		assert!(!registry.model("Animal").unwrap().has_field("serial"));
	}

	#[rstest]
	fn test_derived_id_conflicts_with_implicit_key(mut builder: HierarchyBuilder) {
		let err = builder
			.declare(
				ModelDeclaration::new("Cat")
					.base("Animal")
					.field(FieldDeclaration::char("id", 20).null(true)),
			)
			.unwrap_err();
		assert!(matches!(
			err,
			StiError::FieldConflict { ref field, ref owner, .. } if field == "id" && owner == "Animal"
		));
		assert!(builder.build().get("Cat").is_none());
	}

	#[test]
	fn test_plain_id_field_on_owner_conflicts() {
		let err = HierarchyBuilder::new()
			.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("id", 20)))
			.unwrap_err();
		assert!(matches!(err, StiError::FieldConflict { ref field, .. } if field == "id"));
	}

	#[rstest]
	fn test_type_filter_policies(builder: HierarchyBuilder) {
		let registry = builder
			.with_settings(StiSettings::default().with_filter_policy(FilterPolicy::IncludeDescendants))
			.build();
		let hierarchy = registry.hierarchy("Animal").unwrap();

		assert!(hierarchy.type_filter("Animal").is_none());
		let filter = hierarchy.type_filter("Dog").unwrap();
		assert_eq!(filter.operator, FilterOperator::In);
		assert_eq!(filter.value, FilterValue::List(vec!["Dog".into()]));
	}

	#[test]
	fn test_content_types_follow_declaration_order() {
		let mut builder =
			HierarchyBuilder::new().with_settings(StiSettings::default().with_app_label("zoo"));
		builder
			.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("name", 50)))
			.unwrap();
		builder
			.declare(ModelDeclaration::new("Dog").base("Animal"))
			.unwrap();
		let registry = builder.build();

		let dog = registry.model("Dog").unwrap();
		assert_eq!(dog.content_type().map(|ct| ct.id), Some(2));
		assert_eq!(registry.content_types().len(), 2);
		assert_eq!(dog.table().name(), "zoo_animal");
	}
}
