//! Schema provider boundary.
//!
//! The loader never talks to a concrete persistence layer. Everything it
//! needs to know about models (how a name resolves to a type and what kind
//! of relation a field is) and every side effect (persisting a prepared
//! field map) goes through the [`SchemaProvider`] trait, implemented once
//! per backing store.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::SeedResult;
use crate::reference::LookupCriteria;

/// Identifies a model type within a namespace.
///
/// Handles are cheap value objects; the provider maps them to whatever
/// concrete table or type it manages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelHandle {
	/// Namespace owning the model (app label).
	pub app_label: String,
	/// Model type name (e.g., "User").
	pub model_name: String,
}

impl ModelHandle {
	/// Creates a model handle from a namespace and type name.
	pub fn new(app_label: impl Into<String>, model_name: impl Into<String>) -> Self {
		Self {
			app_label: app_label.into(),
			model_name: model_name.into(),
		}
	}

	/// Parses an `"app.Model"` path into a handle.
	pub fn parse(path: &str) -> Option<Self> {
		let (app_label, model_name) = path.split_once('.')?;
		if app_label.is_empty() || model_name.is_empty() || model_name.contains('.') {
			return None;
		}
		Some(Self::new(app_label, model_name))
	}

	/// Returns the `"app.Model"` label for this handle.
	pub fn label(&self) -> String {
		format!("{}.{}", self.app_label, self.model_name)
	}
}

impl std::fmt::Display for ModelHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.app_label, self.model_name)
	}
}

/// A persisted record, as returned by [`SchemaProvider::persist`].
///
/// Carries the model and the primary key; the pk value is what gets
/// substituted into relation slots of records that reference this one.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceHandle {
	/// Model the record belongs to.
	pub model: ModelHandle,
	/// Primary key of the persisted record.
	pub pk: Value,
}

impl InstanceHandle {
	/// Creates an instance handle.
	pub fn new(model: ModelHandle, pk: Value) -> Self {
		Self { model, pk }
	}
}

/// Classification of a named field on a model.
///
/// Consumed exhaustively by the descriptor builder and the creation engine;
/// providers report reverse accessors (related-name style) through the same
/// call as forward fields.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationKind {
	/// Plain attribute, or an unknown name. Values are stored as-is.
	Attribute,
	/// Owning side of a to-one relation; the record stores the target's key.
	ForwardToOne {
		/// Model the relation points at.
		target: ModelHandle,
	},
	/// Reverse accessor of a to-one relation owned by `target`.
	ReverseToOne {
		/// Model on the owning side.
		target: ModelHandle,
		/// Field on `target` that points back at this model.
		remote_field: String,
	},
	/// Reverse accessor of a to-many relation owned by `target`.
	ReverseToMany {
		/// Model on the owning side.
		target: ModelHandle,
		/// Field on `target` that points back at this model.
		remote_field: String,
	},
	/// Many-to-many association field.
	Association {
		/// Model on the far side of the association.
		target: ModelHandle,
		/// Custom association record (junction) type, when the association
		/// carries its own attributes. `None` for plain associations.
		through: Option<ModelHandle>,
	},
}

impl RelationKind {
	/// Returns true for the owning side of a to-one relation.
	pub fn is_forward_to_one(&self) -> bool {
		matches!(self, Self::ForwardToOne { .. })
	}
}

/// Capability interface a persistence layer implements for the loader.
///
/// `persist` and `lookup` are the only operations with side effects or I/O;
/// the introspection calls must be pure and cheap.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
	/// Resolves a namespace and type name to a model handle.
	///
	/// # Errors
	///
	/// Returns [`SeedError::ModelNotFound`](crate::SeedError::ModelNotFound)
	/// when no such model exists.
	fn resolve_model(&self, app_label: &str, model_name: &str) -> SeedResult<ModelHandle>;

	/// Classifies a field (or reverse accessor) name on a model.
	///
	/// Unknown names report [`RelationKind::Attribute`]; the builder treats
	/// them as plain values rather than failing.
	fn relation_kind(&self, model: &ModelHandle, field: &str) -> RelationKind;

	/// Lists the to-one relation fields of a model with their targets.
	///
	/// Used to discover the two sides of a custom association record.
	fn relation_fields(&self, model: &ModelHandle) -> Vec<(String, ModelHandle)>;

	/// Persists a prepared field map as a new record.
	///
	/// Relation slots in `fields` hold the primary key values of already
	/// persisted records.
	async fn persist(&self, model: &ModelHandle, fields: &Map<String, Value>)
	-> SeedResult<InstanceHandle>;

	/// Finds exactly one pre-existing record matching the criteria.
	///
	/// # Errors
	///
	/// Returns [`SeedError::LookupNotFound`](crate::SeedError::LookupNotFound)
	/// on zero matches and
	/// [`SeedError::LookupAmbiguous`](crate::SeedError::LookupAmbiguous) on
	/// more than one, both echoing the criteria.
	async fn lookup(
		&self,
		model: &ModelHandle,
		criteria: &LookupCriteria,
	) -> SeedResult<InstanceHandle>;

	/// Replaces the membership of a to-many association field.
	async fn set_association(
		&self,
		instance: &InstanceHandle,
		field: &str,
		targets: &[InstanceHandle],
	) -> SeedResult<()>;
}
