//! # Reinhardt STI
//!
//! Single Table Inheritance for Reinhardt models.
//!
//! A hierarchy of model types shares one physical table. Every row carries a
//! discriminator identifying the type it represents, and each type gets a
//! manager that only sees its own rows, so subtypes still behave like separate
//! entities with their own fields.
//!
//! ## Declaring a hierarchy
//!
//! Models are described as data and fed, in order, to a [`HierarchyBuilder`]:
//!
//! - the first concrete model without a concrete ancestor becomes the **owner**
//!   of a new table and receives the discriminator column
//! - concrete models inheriting from an owner (directly or through other derived
//!   models) become **derived** types; their fields move onto the owner's table
//!   and must be nullable or carry a default
//! - **abstract** models carry fields (and optionally a [`DiscriminatorField`])
//!   for their descendants and have no table
//! - a model inheriting from a hierarchy member that explicitly requests
//!   [`InheritanceType::JoinedTable`] or [`InheritanceType::ConcreteTable`] is
//!   left alone and keeps a table of its own
//!
//! ```
//! use reinhardt_sti::prelude::*;
//! use serde_json::json;
//!
//! # async fn example() -> reinhardt_sti::Result<()> {
//! let mut builder = HierarchyBuilder::new();
//! builder.declare(ModelDeclaration::new("Business").field(FieldDeclaration::char("name", 100)))?;
//! builder.declare(
//!     ModelDeclaration::new("BusinessExtension")
//!         .base("Business")
//!         .field(FieldDeclaration::text("description").null(true)),
//! )?;
//! let registry = builder.build();
//! registry.create_tables().await?;
//!
//! let extension = registry.model("BusinessExtension")?;
//! extension
//!     .objects()
//!     .create([("name", json!("Acme")), ("description", json!("Widgets"))])
//!     .await?;
//!
//! let business = registry.model("Business")?;
//! let row = business.objects().all().first().await?.unwrap();
//! assert_eq!(row.get_real_instance_class().unwrap().name(), "BusinessExtension");
//! assert_eq!(extension.objects().count().await?, 1);
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(example()).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `sqlite` (default) - [`SqliteBackend`](backends::SqliteBackend) through sqlx

pub mod backends;
pub mod classifier;
pub mod contenttypes;
pub mod declaration;
pub mod discriminator;
pub mod error;
pub mod fields;
pub mod hierarchy;
pub mod inspect;
pub mod instance;
pub mod manager;
pub mod migrator;
pub mod model;
pub mod query;
pub mod registry;
pub mod schema;
pub mod settings;
pub mod shortcuts;

pub use backends::{Backend, BackendError, MemoryBackend, Record};
pub use classifier::ModelRole;
pub use declaration::{InheritanceType, ModelDeclaration, ModelOptions};
pub use discriminator::{DiscriminatorField, DiscriminatorStorage};
pub use error::{Result, StiError, ValidationError};
pub use fields::{FieldDeclaration, FieldKind};
pub use hierarchy::{Hierarchy, HierarchyBuilder, ModelRegistry};
pub use instance::ModelInstance;
pub use manager::Manager;
pub use model::Model;
pub use query::{Filter, FilterOperator, FilterValue, QuerySet};
pub use settings::{ConfigError, FilterPolicy, StiSettings};

#[cfg(feature = "sqlite")]
pub use backends::SqliteBackend;

/// Re-exports for declaring and querying hierarchies
pub mod prelude {
	pub use crate::backends::{Backend, MemoryBackend};
	pub use crate::declaration::{InheritanceType, ModelDeclaration};
	pub use crate::discriminator::{DiscriminatorField, DiscriminatorStorage};
	pub use crate::error::{StiError, ValidationError};
	pub use crate::fields::FieldDeclaration;
	pub use crate::hierarchy::HierarchyBuilder;
	pub use crate::model::Model;
	pub use crate::query::{Filter, FilterOperator};
	pub use crate::settings::{FilterPolicy, StiSettings};
}
