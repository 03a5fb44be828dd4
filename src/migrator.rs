//! Field migration from derived models onto their owner.
//!
//! Every field a derived model brings must be safely absent for rows of its
//! siblings, so it has to be nullable or defaulted. Fields that pass are either
//! already present on the owner with an identical definition, or relocated onto it.
//! The whole plan is computed before anything is applied, so a rejected
//! declaration leaves the owner untouched.

use crate::error::{Result, StiError};
use crate::fields::FieldDeclaration;
use indexmap::IndexMap;

/// What happens to the fields of one derived declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
	/// Fields to attach to the owner
	pub relocated: Vec<FieldDeclaration>,
	/// Names already present on the owner with the same definition
	pub shared: Vec<String>,
}

impl MigrationPlan {
	pub fn is_empty(&self) -> bool {
		self.relocated.is_empty() && self.shared.is_empty()
	}

	/// Attach relocated fields to the owner's field set, recording each in the ledger
	pub fn apply(
		self,
		model: &str,
		owner_fields: &mut IndexMap<String, FieldDeclaration>,
		ledger: &mut IndexMap<String, String>,
	) {
		for field in self.relocated {
			tracing::debug!(model, field = %field.name, "relocated field onto owner");
			ledger.insert(field.name.clone(), model.to_string());
			owner_fields.insert(field.name.clone(), field);
		}
	}
}

/// Validate `fields` of derived `model` against `owner_fields` and plan their relocation
///
/// # Examples
///
/// ```
/// use reinhardt_sti::fields::FieldDeclaration;
/// use reinhardt_sti::migrator::plan_migration;
/// use indexmap::IndexMap;
///
/// let mut owner = IndexMap::new();
/// owner.insert("name".to_string(), FieldDeclaration::char("name", 100));
///
/// let fields = [FieldDeclaration::text("description").null(true)];
/// let plan = plan_migration("BusinessExtension", "Business", fields.iter(), &owner).unwrap();
/// assert_eq!(plan.relocated.len(), 1);
/// ```
pub fn plan_migration<'a>(
	model: &str,
	owner: &str,
	fields: impl IntoIterator<Item = &'a FieldDeclaration>,
	owner_fields: &IndexMap<String, FieldDeclaration>,
) -> Result<MigrationPlan> {
	let mut plan = MigrationPlan::default();

	for field in fields {
		if !field.is_safely_absent() {
			return Err(StiError::NonNullableField {
				model: model.to_string(),
				field: field.name.clone(),
			});
		}

		match owner_fields.get(&field.name) {
			Some(existing) if existing.same_definition(field) => {
				plan.shared.push(field.name.clone());
			}
			Some(_) => {
				return Err(StiError::FieldConflict {
					field: field.name.clone(),
					model: model.to_string(),
					owner: owner.to_string(),
				});
			}
			None => plan.relocated.push(field.clone()),
		}
	}

	Ok(plan)
}
