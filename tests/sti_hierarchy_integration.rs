//! Single Table Inheritance Declaration Integration Tests
//!
//! These tests verify how declarations are classified and how the fields of
//! derived models end up on their owner's table.
//!
//! **Test Coverage:**
//! - Owner/derived classification and one table per hierarchy
//! - Required-field rejection naming the offending field
//! - Shared identical redeclarations vs conflicting sibling fields
//! - Abstract bases carrying fields and a custom discriminator
//! - Explicit opt-out into a separate table
//! - Subclasses of an opted-out model sharing its table
//! - Redeclaring the implicit primary key
//! - Settings loaded from a TOML file

use reinhardt_sti::prelude::*;
use reinhardt_sti::{FieldKind, ModelRole};
use rstest::*;
use serde_json::json;
use std::io::Write;

#[fixture]
fn business_builder() -> HierarchyBuilder {
	let mut builder = HierarchyBuilder::new();
	builder
		.declare(
			ModelDeclaration::new("Business")
				.field(FieldDeclaration::char("name", 100))
				.field(FieldDeclaration::char("city", 50).null(true)),
		)
		.unwrap();
	builder
}

#[rstest]
fn test_business_extension_shares_owner_table(mut business_builder: HierarchyBuilder) {
	let role = business_builder
		.declare(
			ModelDeclaration::new("BusinessExtension")
				.base("Business")
				.field(FieldDeclaration::text("description").null(true)),
		)
		.unwrap();
	assert_eq!(
		role,
		ModelRole::Derived {
			owner: "Business".to_string(),
			parent: "Business".to_string(),
		}
	);

	let registry = business_builder.build();
	let business = registry.model("Business").unwrap();
	let extension = registry.model("BusinessExtension").unwrap();

	assert!(business.is_owner());
	assert!(extension.is_derived());
	assert_eq!(business.table().name(), extension.table().name());
	assert_eq!(registry.tables().len(), 1);
	assert_eq!(
		business.table().column_names(),
		vec!["id", "name", "city", "description", "model_type"]
	);
	assert!(extension.local_fields().is_empty());
	assert!(extension.has_field("name"));
	assert_eq!(extension.contributed_fields(), ["description".to_string()]);
	assert_eq!(business.get_type_field_name(), Some("model_type"));
	assert_eq!(
		business.get_all_types(),
		vec!["Business".to_string(), "BusinessExtension".to_string()]
	);
}

#[rstest]
fn test_required_field_error_names_field(mut business_builder: HierarchyBuilder) {
	let err = business_builder
		.declare(
			ModelDeclaration::new("Franchise")
				.base("Business")
				.field(FieldDeclaration::char("franchise_code", 20)),
		)
		.unwrap_err();

	assert!(matches!(err, StiError::NonNullableField { ref field, .. } if field == "franchise_code"));
	let message = err.to_string();
	assert!(message.contains("Franchise.franchise_code"));
	assert!(message.contains("nullable or have a default"));
}

#[rstest]
fn test_defaulted_and_many_to_many_fields_are_accepted(mut business_builder: HierarchyBuilder) {
	business_builder
		.declare(
			ModelDeclaration::new("Franchise")
				.base("Business")
				.field(FieldDeclaration::integer("outlets").default(1))
				.field(FieldDeclaration::many_to_many("partners", "Business")),
		)
		.unwrap();
	let registry = business_builder.build();
	let table = registry.model("Business").unwrap().table().clone();

	assert!(table.field("outlets").is_some());
	assert!(table.field("partners").is_none());
	assert_eq!(table.relations().count(), 1);
}

#[rstest]
fn test_sibling_fields_share_or_conflict(mut business_builder: HierarchyBuilder) {
	business_builder
		.declare(
			ModelDeclaration::new("Shop")
				.base("Business")
				.field(FieldDeclaration::char("phone", 20).null(true)),
		)
		.unwrap();

	// Identical definition: reuses the existing column
	business_builder
		.declare(
			ModelDeclaration::new("Restaurant")
				.base("Business")
				.field(FieldDeclaration::char("phone", 20).null(true)),
		)
		.unwrap();

	let err = business_builder
		.declare(
			ModelDeclaration::new("Office")
				.base("Business")
				.field(FieldDeclaration::integer("phone").null(true)),
		)
		.unwrap_err();
	assert!(matches!(
		err,
		StiError::FieldConflict { ref field, ref model, ref owner }
			if field == "phone" && model == "Office" && owner == "Business"
	));

	let registry = business_builder.build();
	let hierarchy = registry.hierarchy("Business").unwrap();
	assert_eq!(
		hierarchy.fields_from_subclasses().get("phone").map(String::as_str),
		Some("Shop")
	);
	assert_eq!(
		registry.model("Restaurant").unwrap().contributed_fields(),
		["phone".to_string()]
	);
	assert!(registry.get("Office").is_none());
}

#[rstest]
fn test_grandchild_joins_owner_table(mut business_builder: HierarchyBuilder) {
	business_builder
		.declare(
			ModelDeclaration::new("Shop")
				.base("Business")
				.field(FieldDeclaration::boolean("online").default(false)),
		)
		.unwrap();
	let role = business_builder
		.declare(
			ModelDeclaration::new("Bakery")
				.base("Shop")
				.field(FieldDeclaration::json("menu").null(true)),
		)
		.unwrap();
	assert_eq!(
		role,
		ModelRole::Derived {
			owner: "Business".to_string(),
			parent: "Shop".to_string(),
		}
	);

	let registry = business_builder.build();
	assert_eq!(registry.tables().len(), 1);
	let bakery = registry.model("Bakery").unwrap();
	assert_eq!(bakery.owner().unwrap().name(), "Business");
	assert!(bakery.has_field("online"));
	assert!(bakery.has_field("menu"));
}

#[rstest]
fn test_independent_hierarchies_get_own_tables(mut business_builder: HierarchyBuilder) {
	business_builder
		.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("name", 50)))
		.unwrap();
	business_builder
		.declare(ModelDeclaration::new("Dog").base("Animal"))
		.unwrap();
	let registry = business_builder.build();

	let names: Vec<_> = registry.tables().iter().map(|t| t.name().to_string()).collect();
	assert_eq!(names, vec!["app_business", "app_animal"]);
	assert_eq!(registry.hierarchies().len(), 2);
	assert!(registry.model("Dog").unwrap().get_type_class("Business").is_none());
}

#[test]
fn test_abstract_base_provides_fields_and_discriminator() {
	let mut builder = HierarchyBuilder::new();
	let role = builder
		.declare(
			ModelDeclaration::new("Timestamped")
				.abstract_model()
				.field(FieldDeclaration::big_integer("created").null(true))
				.discriminator(DiscriminatorField::named("kind").max_length(30)),
		)
		.unwrap();
	assert_eq!(role, ModelRole::Abstract);

	builder
		.declare(
			ModelDeclaration::new("Document")
				.base("Timestamped")
				.field(FieldDeclaration::char("title", 200)),
		)
		.unwrap();
	builder
		.declare(ModelDeclaration::new("Invoice").base("Document"))
		.unwrap();
	let registry = builder.build();

	assert!(matches!(
		registry.model("Timestamped"),
		Err(StiError::AbstractModel { .. })
	));
	let document = registry.model("Document").unwrap();
	assert_eq!(document.get_type_field_name(), Some("kind"));
	assert_eq!(
		document.table().column_names(),
		vec!["id", "created", "title", "kind"]
	);
	assert_eq!(
		document.table().field("kind").map(|f| f.kind.max_length()),
		Some(Some(30))
	);
}

#[test]
fn test_explicit_opt_out_keeps_separate_table() {
	let mut builder = HierarchyBuilder::new();
	builder
		.declare(ModelDeclaration::new("Place").field(FieldDeclaration::char("name", 50)))
		.unwrap();
	let role = builder
		.declare(
			ModelDeclaration::new("Restaurant")
				.base("Place")
				.inheritance(InheritanceType::JoinedTable)
				.field(FieldDeclaration::boolean("serves_pizza")),
		)
		.unwrap();
	assert!(matches!(role, ModelRole::Detached { .. }));

	let registry = builder.build();
	let place = registry.model("Place").unwrap();
	let restaurant = registry.model("Restaurant").unwrap();

	assert_eq!(registry.tables().len(), 2);
	assert_eq!(restaurant.table().name(), "app_restaurant");
	assert!(restaurant.hierarchy().is_none());
	assert!(place.table().field("serves_pizza").is_none());
	assert_eq!(place.get_all_types(), vec!["Place".to_string()]);
}

#[tokio::test]
async fn test_subclass_of_opted_out_model_shares_its_table() {
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
			parent: "Robot".to_string(),
		}
	);

	let registry = builder.build();
	let robot = registry.model("Robot").unwrap();
	let robot_dog = registry.model("RobotDog").unwrap();

	assert_eq!(registry.tables().len(), 2);
	assert_eq!(robot_dog.table().name(), robot.table().name());
	assert_eq!(
		robot.table().column_names(),
		vec!["id", "serial", "model_no", "model_type"]
	);
	assert!(robot_dog.has_field("serial"));
	assert!(!registry.model("Animal").unwrap().has_field("serial"));
	assert_eq!(
		robot_dog.owner().map(|m| m.name().to_string()),
		Some("Robot".to_string())
	);

	registry.create_tables().await.unwrap();
	robot_dog
		.objects()
		.create([("serial", json!("RX-1")), ("model_no", json!("K9"))])
		.await
		.unwrap();
	robot
		.objects()
		.create([("serial", json!("RX-2"))])
		.await
		.unwrap();
	assert_eq!(robot.objects().count().await.unwrap(), 2);
	assert_eq!(robot_dog.objects().count().await.unwrap(), 1);
}

#[rstest]
fn test_redeclared_primary_key_name_conflicts(mut business_builder: HierarchyBuilder) {
	let err = business_builder
		.declare(
			ModelDeclaration::new("BusinessExtension")
				.base("Business")
				.field(FieldDeclaration::char("id", 20).null(true)),
		)
		.unwrap_err();
	assert!(matches!(
		err,
		StiError::FieldConflict { ref field, ref model, ref owner }
			if field == "id" && model == "BusinessExtension" && owner == "Business"
	));

	let registry = business_builder.build();
	assert!(registry.get("BusinessExtension").is_none());
	assert_eq!(
		registry.model("Business").unwrap().table().column_names(),
		vec!["id", "name", "city", "model_type"]
	);
}

#[test]
fn test_unknown_base_and_circular_inheritance() {
	let mut builder = HierarchyBuilder::new();
	let err = builder
		.declare(ModelDeclaration::new("Dog").base("Animal"))
		.unwrap_err();
	assert!(matches!(err, StiError::UnknownBase { ref base, .. } if base == "Animal"));

	builder
		.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("name", 50)))
		.unwrap();
	let err = builder
		.declare(ModelDeclaration::new("Animal").base("Animal"))
		.unwrap_err();
	assert!(matches!(err, StiError::CircularInheritance { .. }));
}

#[test]
fn test_settings_from_file_drive_the_builder() {
	let mut file = tempfile::NamedTempFile::new().unwrap();
	writeln!(
		file,
		r#"
type_field_name = "kind"
storage = "content_type"
app_label = "crm"
"#
	)
	.unwrap();

	let settings = StiSettings::from_file(file.path()).unwrap();
	let mut builder = HierarchyBuilder::new().with_settings(settings);
	builder
		.declare(ModelDeclaration::new("Contact").field(FieldDeclaration::char("email", 100)))
		.unwrap();
	builder
		.declare(ModelDeclaration::new("Lead").base("Contact"))
		.unwrap();
	let registry = builder.build();

	let contact = registry.model("Contact").unwrap();
	assert_eq!(contact.table().name(), "crm_contact");
	assert_eq!(contact.get_type_field_name(), Some("kind"));
	assert_eq!(
		contact.table().field("kind").map(|f| f.kind.clone()),
		Some(FieldKind::Discriminator {
			storage: DiscriminatorStorage::ContentType,
			max_length: 100,
		})
	);
	let lead_ct = registry.model("Lead").unwrap().content_type().cloned().unwrap();
	assert_eq!(lead_ct.app_label, "crm");
	assert_eq!(lead_ct.model, "Lead");
}
