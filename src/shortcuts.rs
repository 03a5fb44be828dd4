//! Helpers for working with typed hierarchies.

use crate::error::{Result, StiError};
use crate::instance::ModelInstance;
use crate::model::Model;
use crate::query::{Filter, FilterOperator, FilterValue, QuerySet};
use indexmap::IndexMap;
use serde_json::Value;

/// Queryset over the whole table of `model`'s hierarchy, optionally restricted
/// to the given type names.
///
/// An empty list of types matches nothing.
pub fn get_typed_queryset(model: &Model, types: Option<&[&str]>) -> QuerySet {
	let base = model.owner().unwrap_or_else(|| model.clone());
	let queryset = base.objects().all();
	match (types, model.get_type_field_name()) {
		(Some(types), Some(field)) => queryset.filter(Filter::new(
			field,
			FilterOperator::In,
			FilterValue::List(types.iter().map(|t| FilterValue::from(*t)).collect()),
		)),
		_ => queryset,
	}
}

/// Create an instance of the type named `type_name` in `model`'s hierarchy
///
/// # Errors
///
/// `UnknownType` when the name resolves to no registered type.
pub async fn create_typed_instance<K, I>(
	model: &Model,
	type_name: &str,
	values: I,
) -> Result<ModelInstance>
where
	K: AsRef<str>,
	I: IntoIterator<Item = (K, Value)>,
{
	let type_class = model
		.get_type_class(type_name)
		.ok_or_else(|| StiError::UnknownType {
			owner: model
				.owner()
				.map(|o| o.name().to_string())
				.unwrap_or_else(|| model.name().to_string()),
			type_name: type_name.to_string(),
		})?;
	type_class.objects().create(values).await
}

/// Marker -> intermediate derived ancestors (nearest first, owner excluded)
pub fn get_type_hierarchy(model: &Model) -> IndexMap<String, Vec<String>> {
	let Some(hierarchy) = model.hierarchy() else {
		return IndexMap::new();
	};
	let registry = hierarchy.registry();
	registry
		.markers()
		.map(|marker| {
			let ancestors = registry
				.intermediate_ancestors(marker)
				.into_iter()
				.map(str::to_string)
				.collect();
			(marker.to_string(), ancestors)
		})
		.collect()
}

/// Problems with the type registration of `model`; empty when consistent
pub fn validate_type_registration(model: &Model) -> Vec<String> {
	let Some(hierarchy) = model.hierarchy() else {
		return vec!["No types registered for this model".to_string()];
	};

	let mut problems = Vec::new();
	let registry = hierarchy.registry();
	if registry.is_empty() {
		problems.push("No types registered for this model".to_string());
	}
	if hierarchy
		.table()
		.field(hierarchy.discriminator().field_name())
		.is_none()
	{
		problems.push(format!(
			"Discriminator '{}' is missing from table '{}'",
			hierarchy.discriminator().field_name(),
			hierarchy.table().name()
		));
	}
	for marker in registry.markers() {
		if hierarchy.model(marker).is_none() {
			problems.push(format!("Type '{}' has no model", marker));
		}
		if hierarchy.encode_marker(marker).is_none() {
			problems.push(format!("Type '{}' has no stored representation", marker));
		}
	}
	problems
}

/// Marker stored on `instance`, `None` while unset
pub fn get_type_field_value(instance: &ModelInstance) -> Option<String> {
	instance.type_marker()
}

/// Whether `instance` belongs to a single table hierarchy
pub fn is_typed_instance(instance: &ModelInstance) -> bool {
	instance.model().hierarchy().is_some()
}
