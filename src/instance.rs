//! Model instances.

use crate::backends::Record;
use crate::error::{Result, StiError, ValidationError};
use crate::fields::FieldKind;
use crate::model::Model;
use crate::query::{Filter, SelectQuery};
use serde_json::Value;

/// One row of a model, saved or not
#[derive(Debug, Clone)]
pub struct ModelInstance {
	model: Model,
	values: Record,
	/// Marker the row had when it was last loaded or saved
	saved_marker: Option<String>,
	persisted: bool,
}

impl ModelInstance {
	pub(crate) fn new(model: Model) -> Self {
		let values = model
			.table()
			.fields()
			.map(|f| (f.name.clone(), f.initial_value()))
			.collect();
		Self {
			model,
			values,
			saved_marker: None,
			persisted: false,
		}
	}

	pub(crate) fn from_record(model: Model, record: Record) -> Self {
		let saved_marker = model.hierarchy().and_then(|h| {
			record
				.get(h.discriminator().field_name())
				.and_then(|v| h.decode_marker(v))
		});
		let mut instance = Self::new(model);
		instance.values.extend(record);
		instance.saved_marker = saved_marker;
		instance.persisted = true;
		instance
	}

	/// Model the instance was built or loaded through
	pub fn model(&self) -> &Model {
		&self.model
	}

	pub fn values(&self) -> &Record {
		&self.values
	}

	pub fn is_persisted(&self) -> bool {
		self.persisted
	}

	/// Primary key, `None` until the instance is saved
	pub fn pk(&self) -> Option<&Value> {
		self.values
			.get(self.model.table().primary_key())
			.filter(|v| !v.is_null())
	}

	/// Value of a column
	pub fn get(&self, field: &str) -> Result<&Value> {
		self.values
			.get(field)
			.ok_or_else(|| StiError::FieldDoesNotExist {
				model: self.model.name().to_string(),
				field: field.to_string(),
			})
	}

	/// Set a column.
	///
	/// Markers assigned to the discriminator are stored in the representation
	/// of the hierarchy's storage strategy.
	pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
		if self.model.table().field(field).is_none() {
			return Err(StiError::FieldDoesNotExist {
				model: self.model.name().to_string(),
				field: field.to_string(),
			});
		}
		let mut value = value.into();
		if let Some(hierarchy) = self.model.hierarchy()
			&& field == hierarchy.discriminator().field_name()
			&& let Value::String(marker) = &value
			&& let Some(encoded) = hierarchy.encode_marker(marker)
		{
			value = encoded;
		}
		self.values.insert(field.to_string(), value);
		Ok(())
	}

	/// Marker currently stored in the discriminator, if it names a registered type
	pub fn type_marker(&self) -> Option<String> {
		let hierarchy = self.model.hierarchy()?;
		let value = self.values.get(hierarchy.discriminator().field_name())?;
		hierarchy.decode_marker(value)
	}

	/// Set the discriminator to this instance's model if it is unset
	pub(crate) fn fill_discriminator(&mut self) {
		let Some(hierarchy) = self.model.hierarchy() else {
			return;
		};
		let field = hierarchy.discriminator().field_name();
		if self.values.get(field).is_some_and(|v| !v.is_null()) {
			return;
		}
		match hierarchy.encode_marker(self.model.marker()) {
			Some(encoded) => {
				self.values.insert(field.to_string(), encoded);
			}
			None => {
				tracing::warn!(
					model = self.model.name(),
					field,
					"model has no discriminator value, leaving it unset"
				);
			}
		}
	}

	/// Validate every column
	pub fn full_clean(&self) -> std::result::Result<(), ValidationError> {
		let discriminator = self.model.hierarchy().map(|h| (h, h.discriminator().field_name()));
		for field in self.model.table().fields() {
			if field.kind == FieldKind::Auto {
				continue;
			}
			let value = self.values.get(&field.name).unwrap_or(&Value::Null);
			match discriminator {
				Some((hierarchy, name)) if name == field.name => {
					hierarchy.validate_discriminator(value)?;
				}
				_ => field.validate_value(value)?,
			}
		}
		Ok(())
	}

	/// Insert or update the row.
	///
	/// Fills the discriminator when unset, validates, and rejects marker changes
	/// of persisted rows when the hierarchy's discriminator is immutable.
	pub async fn save(&mut self) -> Result<()> {
		self.fill_discriminator();
		self.full_clean()?;

		let current_marker = self.type_marker();
		if let Some(hierarchy) = self.model.hierarchy()
			&& hierarchy.immutable_discriminator()
			&& self.persisted
			&& let Some(from) = &self.saved_marker
			&& current_marker.as_ref() != Some(from)
		{
			let field = hierarchy.discriminator().field_name();
			return Err(StiError::ImmutableDiscriminator {
				model: self.model.name().to_string(),
				field: field.to_string(),
				from: from.clone(),
				to: current_marker.unwrap_or_else(|| {
					self.values
						.get(field)
						.map(Value::to_string)
						.unwrap_or_default()
				}),
			});
		}

		let backend = self.model.backend().clone();
		let table = self.model.table();
		let updated = match self.pk() {
			Some(pk) if self.persisted => backend.update(table, pk, &self.values).await?,
			_ => 0,
		};
		if updated == 0 {
			let pk = backend.insert(table, &self.values).await?;
			self.values.insert(table.primary_key().to_string(), pk);
		}

		tracing::debug!(
			model = self.model.name(),
			pk = ?self.pk(),
			inserted = updated == 0,
			"saved instance"
		);
		self.persisted = true;
		self.saved_marker = current_marker;
		Ok(())
	}

	/// Delete the row; the instance keeps its values but loses its primary key
	pub async fn delete(&mut self) -> Result<u64> {
		let Some(pk) = self.pk().cloned() else {
			tracing::warn!(model = self.model.name(), "delete called on an unsaved instance");
			return Ok(0);
		};
		let table = self.model.table();
		let query = SelectQuery {
			filters: vec![Filter::eq(table.primary_key(), pk)],
			..Default::default()
		};
		let deleted = self.model.backend().delete(table, &query).await?;
		self.values
			.insert(table.primary_key().to_string(), Value::Null);
		self.persisted = false;
		Ok(deleted)
	}

	/// Concrete model recorded in the discriminator
	///
	/// `None` when the discriminator is unset or names no registered type.
	/// Models outside a hierarchy are their own real class.
	pub fn get_real_instance_class(&self) -> Option<Model> {
		let Some(hierarchy) = self.model.hierarchy() else {
			return Some(self.model.clone());
		};
		hierarchy.model(&self.type_marker()?)
	}

	/// The same row viewed through its concrete model
	pub fn get_real_instance(&self) -> Option<ModelInstance> {
		let model = self.get_real_instance_class()?;
		Some(Self {
			model,
			values: self.values.clone(),
			saved_marker: self.saved_marker.clone(),
			persisted: self.persisted,
		})
	}
}
