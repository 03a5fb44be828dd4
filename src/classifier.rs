//! Hierarchy classification.
//!
//! Decides the role of a new declaration from the models declared before it:
//! abstract mixin, owner of a new shared table, derived type living in an
//! existing owner's table, or a model that explicitly opted out of single table
//! inheritance.

use crate::declaration::{InheritanceType, ModelDeclaration};
use crate::error::{Result, StiError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Role of a declared model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ModelRole {
	/// Field carrier without storage
	Abstract,
	/// Owns the physical table of its hierarchy
	Owner,
	/// Non-materializing view over its owner's table
	Derived {
		/// Owner of the shared table
		owner: String,
		/// Nearest concrete ancestor (the owner or another derived model)
		parent: String,
	},
	/// Inherits from a hierarchy member but keeps a table of its own.
	///
	/// Models deriving from it share that table, with it as their owner.
	Detached {
		parent: String,
		inheritance: InheritanceType,
	},
}

impl ModelRole {
	pub fn is_derived(&self) -> bool {
		matches!(self, ModelRole::Derived { .. })
	}

	pub fn is_owner(&self) -> bool {
		matches!(self, ModelRole::Owner)
	}

	/// Name of the table owner, for owners and derived models
	pub fn owner<'a>(&'a self, own_name: &'a str) -> Option<&'a str> {
		match self {
			ModelRole::Owner => Some(own_name),
			ModelRole::Derived { owner, .. } => Some(owner),
			_ => None,
		}
	}
}

/// A declaration together with the role it was given
#[derive(Debug, Clone)]
pub struct ClassifiedModel {
	pub declaration: ModelDeclaration,
	pub role: ModelRole,
}

/// Determine the role of `decl` among the already `declared` models.
///
/// Bases are searched last-declared first. Abstract bases are expanded into
/// their own bases; the first concrete base decides the outcome.
pub fn classify(
	decl: &ModelDeclaration,
	declared: &IndexMap<String, ClassifiedModel>,
) -> Result<ModelRole> {
	check_bases(decl, declared)?;

	if decl.is_abstract() {
		tracing::debug!(model = decl.name(), "classified as abstract");
		return Ok(ModelRole::Abstract);
	}

	let mut stack: Vec<&str> = decl.bases().iter().map(String::as_str).collect();
	let mut visited = HashSet::new();
	let mut found: Option<(&str, &ModelRole)> = None;

	while let Some(base) = stack.pop() {
		if !visited.insert(base) {
			continue;
		}
		let Some(model) = declared.get(base) else {
			continue;
		};
		match &model.role {
			ModelRole::Abstract => {
				stack.extend(model.declaration.bases().iter().map(String::as_str));
			}
			role => {
				found = Some((base, role));
				break;
			}
		}
	}

	let role = match found {
		None => ModelRole::Owner,
		Some((parent, _)) if decl.options().opts_out_of_single_table() => ModelRole::Detached {
			parent: parent.to_string(),
			inheritance: decl
				.options()
				.inheritance
				.unwrap_or(InheritanceType::JoinedTable),
		},
		Some((parent, ModelRole::Derived { owner, .. })) => ModelRole::Derived {
			owner: owner.clone(),
			parent: parent.to_string(),
		},
		Some((parent, _)) => ModelRole::Derived {
			owner: parent.to_string(),
			parent: parent.to_string(),
		},
	};

	tracing::debug!(model = decl.name(), ?role, "classified model");
	Ok(role)
}

/// Reject unknown bases and names that alias an ancestor
fn check_bases(
	decl: &ModelDeclaration,
	declared: &IndexMap<String, ClassifiedModel>,
) -> Result<()> {
	let name = decl.name();
	let mut stack: Vec<&str> = Vec::new();

	for base in decl.bases() {
		if base == name {
			return Err(StiError::CircularInheritance {
				model: name.to_string(),
			});
		}
		if !declared.contains_key(base) {
			return Err(StiError::UnknownBase {
				model: name.to_string(),
				base: base.clone(),
			});
		}
		stack.push(base);
	}

	let mut visited = HashSet::new();
	while let Some(ancestor) = stack.pop() {
		if !visited.insert(ancestor) {
			continue;
		}
		if ancestor == name {
			return Err(StiError::CircularInheritance {
				model: name.to_string(),
			});
		}
		if let Some(model) = declared.get(ancestor) {
			stack.extend(model.declaration.bases().iter().map(String::as_str));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::*;

	fn declare(
		declared: &mut IndexMap<String, ClassifiedModel>,
		decl: ModelDeclaration,
	) -> ModelRole {
		let role = classify(&decl, declared).unwrap();
		declared.insert(
			decl.name().to_string(),
			ClassifiedModel {
				declaration: decl,
				role: role.clone(),
			},
		);
		role
	}

	#[fixture]
	fn animals() -> IndexMap<String, ClassifiedModel> {
		let mut declared = IndexMap::new();
		declare(&mut declared, ModelDeclaration::new("Named").abstract_model());
		declare(&mut declared, ModelDeclaration::new("Animal").base("Named"));
		declare(&mut declared, ModelDeclaration::new("Dog").base("Animal"));
		declared
	}

	#[rstest]
	fn test_root_concrete_model_is_owner(animals: IndexMap<String, ClassifiedModel>) {
		assert_eq!(animals["Animal"].role, ModelRole::Owner);
	}

	#[rstest]
	fn test_abstract_model_is_abstract(animals: IndexMap<String, ClassifiedModel>) {
		assert_eq!(animals["Named"].role, ModelRole::Abstract);
	}

	#[rstest]
	fn test_subclass_is_derived(animals: IndexMap<String, ClassifiedModel>) {
		assert_eq!(
			animals["Dog"].role,
			ModelRole::Derived {
				owner: "Animal".to_string(),
				parent: "Animal".to_string()
			}
		);
	}

	#[rstest]
	fn test_grandchild_shares_owner(mut animals: IndexMap<String, ClassifiedModel>) {
		let role = declare(&mut animals, ModelDeclaration::new("Puppy").base("Dog"));
		assert_eq!(
			role,
			ModelRole::Derived {
				owner: "Animal".to_string(),
				parent: "Dog".to_string()
			}
		);
	}

	#[rstest]
	fn test_abstract_mixin_is_looked_through(mut animals: IndexMap<String, ClassifiedModel>) {
		declare(&mut animals, ModelDeclaration::new("Swimmer").abstract_model());
		let role = declare(
			&mut animals,
			ModelDeclaration::new("Otter").base("Animal").base("Swimmer"),
		);
		assert_eq!(
			role,
			ModelRole::Derived {
				owner: "Animal".to_string(),
				parent: "Animal".to_string()
			}
		);
	}

	#[rstest]
	fn test_last_declared_base_is_searched_first(mut animals: IndexMap<String, ClassifiedModel>) {
		declare(&mut animals, ModelDeclaration::new("Vehicle"));
		let role = declare(
			&mut animals,
			ModelDeclaration::new("Amphibian").base("Animal").base("Vehicle"),
		);
		assert_eq!(
			role,
			ModelRole::Derived {
				owner: "Vehicle".to_string(),
				parent: "Vehicle".to_string()
			}
		);
	}

	#[rstest]
	fn test_explicit_opt_out_is_detached(mut animals: IndexMap<String, ClassifiedModel>) {
		let role = declare(
			&mut animals,
			ModelDeclaration::new("Cat")
				.base("Animal")
				.inheritance(InheritanceType::JoinedTable),
		);
		assert_eq!(
			role,
			ModelRole::Detached {
				parent: "Animal".to_string(),
				inheritance: InheritanceType::JoinedTable
			}
		);
	}

	#[rstest]
	fn test_explicit_single_table_is_derived(mut animals: IndexMap<String, ClassifiedModel>) {
		let role = declare(
			&mut animals,
			ModelDeclaration::new("Cat")
				.base("Animal")
				.inheritance(InheritanceType::SingleTable),
		);
		assert!(role.is_derived());
	}

	#[rstest]
	fn test_child_of_detached_derives_from_it(mut animals: IndexMap<String, ClassifiedModel>) {
		declare(
			&mut animals,
			ModelDeclaration::new("Cat")
				.base("Animal")
				.inheritance(InheritanceType::ConcreteTable),
		);
		let role = declare(&mut animals, ModelDeclaration::new("Kitten").base("Cat"));
		assert_eq!(
			role,
			ModelRole::Derived {
				owner: "Cat".to_string(),
				parent: "Cat".to_string()
			}
		);

		let role = declare(&mut animals, ModelDeclaration::new("Lion").base("Kitten"));
		assert_eq!(
			role,
			ModelRole::Derived {
				owner: "Cat".to_string(),
				parent: "Kitten".to_string()
			}
		);
	}

	#[rstest]
	fn test_child_of_detached_can_opt_out_again(mut animals: IndexMap<String, ClassifiedModel>) {
		declare(
			&mut animals,
			ModelDeclaration::new("Cat")
				.base("Animal")
				.inheritance(InheritanceType::ConcreteTable),
		);
		let role = declare(
			&mut animals,
			ModelDeclaration::new("Kitten")
				.base("Cat")
				.inheritance(InheritanceType::JoinedTable),
		);
		assert_eq!(
			role,
			ModelRole::Detached {
				parent: "Cat".to_string(),
				inheritance: InheritanceType::JoinedTable
			}
		);
	}

	#[rstest]
	fn test_abstract_subclass_of_owner_is_abstract(
		mut animals: IndexMap<String, ClassifiedModel>,
	) {
		let role = declare(
			&mut animals,
			ModelDeclaration::new("Pet").base("Animal").abstract_model(),
		);
		assert_eq!(role, ModelRole::Abstract);
	}

	#[rstest]
	fn test_name_of_ancestor_is_circular(animals: IndexMap<String, ClassifiedModel>) {
		let err = classify(&ModelDeclaration::new("Dog").base("Dog"), &animals).unwrap_err();
		assert!(matches!(err, StiError::CircularInheritance { ref model } if model == "Dog"));

		let err = classify(&ModelDeclaration::new("Animal").base("Dog"), &animals).unwrap_err();
		assert!(matches!(err, StiError::CircularInheritance { .. }));
	}

	#[rstest]
	fn test_unknown_base(animals: IndexMap<String, ClassifiedModel>) {
		let err = classify(&ModelDeclaration::new("Fish").base("Water"), &animals).unwrap_err();
		assert!(matches!(err, StiError::UnknownBase { ref base, .. } if base == "Water"));
	}
}
