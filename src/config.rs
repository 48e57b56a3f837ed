//! Configuration for the seed loader.
//!
//! Configuration is optional: with the default [`SeedConfig`], collection
//! names resolve directly as model type names and nested relations are
//! auto-detected through the schema provider. Explicit entries exist for
//! the rare cases where a document key and the schema disagree.

use serde::{Deserialize, Serialize};

/// Multiplicity of an explicitly configured nested relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedKind {
	/// Owned one-to-one child; a single field map in the document.
	OneToOne,
	/// Owned to-many children; a map or list of field maps.
	ToMany,
}

/// Explicit nested-relation override for one document key.
///
/// Consulted only when schema auto-detection classifies the key as a plain
/// attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedOverride {
	/// Document key that holds the nested data.
	pub nested_key: String,
	/// Target model path, `"app.Model"`.
	pub target_model: String,
	/// Relation multiplicity.
	pub kind: NestedKind,
	/// Field on the child model that points back at the parent.
	pub remote_field: String,
}

/// Maps a document collection name to a concrete model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMapping {
	/// Namespace (app label) in the document.
	pub app_label: String,
	/// Collection name in the document.
	pub collection_name: String,
	/// Model path, `"app.Model"`.
	pub model_path: String,
	/// Nested-relation overrides for this model.
	#[serde(default)]
	pub nested_relations: Vec<NestedOverride>,
}

impl CollectionMapping {
	/// Returns the model class name portion of `model_path`.
	fn model_name(&self) -> &str {
		self.model_path
			.rsplit('.')
			.next()
			.unwrap_or(&self.model_path)
	}
}

/// Loader configuration: alias marker, collection mappings, and nested
/// overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
	/// Field-map key that declares an explicit alias (default `"$ref"`).
	pub reference_key: String,

	/// Explicit collection-to-model mappings.
	#[serde(default)]
	pub mappings: Vec<CollectionMapping>,
}

impl Default for SeedConfig {
	fn default() -> Self {
		Self {
			reference_key: "$ref".to_string(),
			mappings: Vec::new(),
		}
	}
}

impl SeedConfig {
	/// Creates a configuration with default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the alias-marker key used inside field maps.
	pub fn with_reference_key(mut self, key: impl Into<String>) -> Self {
		self.reference_key = key.into();
		self
	}

	/// Adds a collection mapping (and its nested overrides).
	pub fn add_mapping(&mut self, mapping: CollectionMapping) {
		self.mappings.push(mapping);
	}

	/// Builder-style variant of [`add_mapping`](Self::add_mapping).
	pub fn with_mapping(mut self, mapping: CollectionMapping) -> Self {
		self.add_mapping(mapping);
		self
	}

	/// Maps a collection name to a model path, without nested overrides.
	pub fn map_collection(
		self,
		app_label: impl Into<String>,
		collection_name: impl Into<String>,
		model_path: impl Into<String>,
	) -> Self {
		self.with_mapping(CollectionMapping {
			app_label: app_label.into(),
			collection_name: collection_name.into(),
			model_path: model_path.into(),
			nested_relations: vec![],
		})
	}

	/// Returns the explicit model path for a collection, if any.
	pub fn model_path(&self, app_label: &str, collection_name: &str) -> Option<&str> {
		self.mappings
			.iter()
			.find(|m| m.app_label == app_label && m.collection_name == collection_name)
			.map(|m| m.model_path.as_str())
	}

	/// Returns the nested override for a model and document key, if any.
	///
	/// Overrides are keyed by the concrete model name, not the collection
	/// name, so they apply wherever the model appears in a document.
	pub fn nested_override(
		&self,
		app_label: &str,
		model_name: &str,
		nested_key: &str,
	) -> Option<&NestedOverride> {
		self.mappings
			.iter()
			.filter(|m| m.app_label == app_label && m.model_name() == model_name)
			.flat_map(|m| m.nested_relations.iter())
			.find(|n| n.nested_key == nested_key)
	}
}
