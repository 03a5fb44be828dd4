//! Hierarchy inspection utilities
//!
//! Produces serializable reports describing where each model's rows and fields
//! live, useful for debugging and management commands.
//!
//! # Example
//!
//! ```rust
//! use reinhardt_sti::declaration::ModelDeclaration;
//! use reinhardt_sti::fields::FieldDeclaration;
//! use reinhardt_sti::hierarchy::HierarchyBuilder;
//! use reinhardt_sti::inspect::{HierarchyInspector, InspectOptions};
//!
//! let mut builder = HierarchyBuilder::new();
//! builder.declare(ModelDeclaration::new("Business").field(FieldDeclaration::char("name", 100))).unwrap();
//! builder
//!     .declare(
//!         ModelDeclaration::new("BusinessExtension")
//!             .base("Business")
//!             .field(FieldDeclaration::text("description").null(true)),
//!     )
//!     .unwrap();
//! let registry = builder.build();
//!
//! let inspector = HierarchyInspector::new(InspectOptions::new().include_sql(true));
//! let reports = inspector.inspect_all(&registry);
//! assert_eq!(reports.len(), 1);
//! assert_eq!(reports[0].members.len(), 2);
//! assert_eq!(
//!     reports[0].column("description").and_then(|c| c.contributed_by.as_deref()),
//!     Some("BusinessExtension")
//! );
//! ```

use crate::hierarchy::{Hierarchy, ModelRegistry};
use serde::Serialize;

/// Options for inspection operations
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
	/// Whether to render the DDL of the table
	pub include_sql: bool,
}

impl InspectOptions {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn include_sql(mut self, include_sql: bool) -> Self {
		self.include_sql = include_sql;
		self
	}
}

/// One column of the shared table
#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
	pub name: String,
	pub column: String,
	/// Deconstruction path of the field type
	pub kind: String,
	pub null: bool,
	/// Derived model the field was relocated from, `None` for owner fields
	pub contributed_by: Option<String>,
	pub discriminator: bool,
}

/// One registered type of the hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct MemberReport {
	pub marker: String,
	pub parent: Option<String>,
	pub content_type_id: Option<i64>,
	/// Fields declared by this member, relocated or shared
	pub contributed_fields: Vec<String>,
}

/// Description of one hierarchy
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyReport {
	pub owner: String,
	pub table: String,
	pub discriminator: String,
	pub storage: String,
	pub columns: Vec<ColumnReport>,
	pub members: Vec<MemberReport>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub create_sql: Vec<String>,
}

impl HierarchyReport {
	pub fn column(&self, name: &str) -> Option<&ColumnReport> {
		self.columns.iter().find(|c| c.name == name)
	}

	pub fn member(&self, marker: &str) -> Option<&MemberReport> {
		self.members.iter().find(|m| m.marker == marker)
	}

	/// Pretty-printed JSON
	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string_pretty(self)
	}
}

/// Builds [`HierarchyReport`]s
#[derive(Debug, Clone, Default)]
pub struct HierarchyInspector {
	options: InspectOptions,
}

impl HierarchyInspector {
	pub fn new(options: InspectOptions) -> Self {
		Self { options }
	}

	pub fn inspect(&self, hierarchy: &std::sync::Arc<Hierarchy>) -> HierarchyReport {
		let table = hierarchy.table();
		let discriminator = hierarchy.discriminator();
		let ledger = hierarchy.fields_from_subclasses();

		let columns = table
			.fields()
			.chain(table.relations())
			.map(|field| ColumnReport {
				name: field.name.clone(),
				column: field.column().to_string(),
				kind: field.kind.path().to_string(),
				null: field.null,
				contributed_by: ledger.get(&field.name).cloned(),
				discriminator: field.name == discriminator.field_name(),
			})
			.collect();

		let members = hierarchy
			.registry()
			.entries()
			.map(|entry| MemberReport {
				marker: entry.marker().to_string(),
				parent: entry.parent().map(str::to_string),
				content_type_id: entry.content_type().map(|ct| ct.id),
				contributed_fields: hierarchy
					.model(entry.marker())
					.map(|m| m.contributed_fields().to_vec())
					.unwrap_or_default(),
			})
			.collect();

		HierarchyReport {
			owner: hierarchy.owner().to_string(),
			table: table.name().to_string(),
			discriminator: discriminator.field_name().to_string(),
			storage: discriminator.storage().as_str().to_string(),
			columns,
			members,
			create_sql: if self.options.include_sql {
				table.to_create_sql()
			} else {
				Vec::new()
			},
		}
	}

	/// Reports for every hierarchy of the registry, in declaration order
	pub fn inspect_all(&self, registry: &ModelRegistry) -> Vec<HierarchyReport> {
		registry
			.hierarchies()
			.iter()
			.map(|h| self.inspect(h))
			.collect()
	}
}
