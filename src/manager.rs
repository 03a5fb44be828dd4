//! Type-scoped managers.

use crate::error::Result;
use crate::instance::ModelInstance;
use crate::model::Model;
use crate::query::{Filter, FilterValue, QuerySet};
use serde_json::Value;

/// Entry point for querying and creating rows of one model
///
/// Querying through the owner sees every row of the table; querying through a
/// derived model sees only rows carrying its marker (or those of its
/// descendants, depending on the configured filter policy).
#[derive(Debug, Clone)]
pub struct Manager {
	model: Model,
}

impl Manager {
	pub(crate) fn new(model: Model) -> Self {
		Self { model }
	}

	pub fn model(&self) -> &Model {
		&self.model
	}

	/// Queryset carrying the type filter. Recomputed on every call.
	pub fn get_queryset(&self) -> QuerySet {
		let queryset = QuerySet::new(self.model.clone());
		match self.model.type_filter() {
			Some(filter) => queryset.with_raw_filter(filter),
			None => queryset,
		}
	}

	pub fn all(&self) -> QuerySet {
		self.get_queryset()
	}

	pub fn filter(&self, filter: Filter) -> QuerySet {
		self.get_queryset().filter(filter)
	}

	pub fn exclude(&self, filter: Filter) -> QuerySet {
		self.get_queryset().exclude(filter)
	}

	/// Row with primary key `pk`, if visible through this model
	pub async fn get(&self, pk: impl Into<FilterValue>) -> Result<Option<ModelInstance>> {
		let pk_field = self.model.table().primary_key().to_string();
		self.filter(Filter::eq(pk_field, pk)).first().await
	}

	pub async fn count(&self) -> Result<u64> {
		self.get_queryset().count().await
	}

	/// Create and save an instance.
	///
	/// The discriminator is filled with this model's marker when not given.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_sti::declaration::ModelDeclaration;
	/// use reinhardt_sti::fields::FieldDeclaration;
	/// use reinhardt_sti::hierarchy::HierarchyBuilder;
	/// use serde_json::json;
	///
	/// # async fn example() {
	/// let mut builder = HierarchyBuilder::new();
	/// builder.declare(ModelDeclaration::new("Animal").field(FieldDeclaration::char("name", 50))).unwrap();
	/// builder.declare(ModelDeclaration::new("Dog").base("Animal")).unwrap();
	/// let registry = builder.build();
	/// registry.create_tables().await.unwrap();
	///
	/// let dog = registry.model("Dog").unwrap();
	/// let rex = dog.objects().create([("name", json!("Rex"))]).await.unwrap();
	/// assert_eq!(rex.get("model_type").unwrap(), &json!("Dog"));
	/// # }
	/// # tokio::runtime::Runtime::new().unwrap().block_on(example());
	/// ```
	pub async fn create<K, I>(&self, values: I) -> Result<ModelInstance>
	where
		K: AsRef<str>,
		I: IntoIterator<Item = (K, Value)>,
	{
		let mut instance = self.model.instance();
		for (field, value) in values {
			instance.set(field.as_ref(), value)?;
		}
		instance.fill_discriminator();
		instance.save().await?;
		tracing::debug!(model = self.model.name(), pk = ?instance.pk(), "created instance");
		Ok(instance)
	}
}
