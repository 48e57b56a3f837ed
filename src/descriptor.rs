//! Entity descriptors and the identity-keyed arena.
//!
//! A [`Descriptor`] is the build-time plan for one record. Descriptors form
//! a forest: owned children hang off their parent through identity strings,
//! and the whole forest lives in a [`DescriptorArena`] addressed by
//! identity, so parent/child back-references never create ownership cycles.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::error::{SeedError, SeedResult};
use crate::schema::ModelHandle;

/// Link metadata for an association-record (junction) descriptor.
///
/// Stored on the descriptor itself rather than smuggled through its field
/// map; the creation engine resolves `source` against the registry and the
/// target from the record's own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationLink {
	/// Identity of the record on the near side of the association.
	pub source: String,
	/// Field on the association record pointing at the near side.
	pub source_field: String,
	/// Field pointing at the far side, when the schema could determine it.
	pub target_field: Option<String>,
}

/// Build-time plan for a single record.
#[derive(Debug, Clone)]
pub struct Descriptor {
	/// Globally unique identity within one load.
	pub identity: String,
	/// Namespace (app label).
	pub app_label: String,
	/// Model type name.
	pub model_name: String,
	/// Key within the collection (explicit alias or auto-generated).
	pub object_key: String,
	/// Resolved model handle.
	pub model: ModelHandle,
	/// Plain field values; relation slots may hold unresolved reference
	/// tokens until creation.
	pub fields: Map<String, Value>,
	/// Association field name -> reference tokens (resolved in Phase 2).
	pub associations: BTreeMap<String, Vec<String>>,
	/// Association field name -> identities of inline-defined members or
	/// association-record instances.
	pub inline_association_children: BTreeMap<String, Vec<String>>,
	/// Identities of owned child descriptors, in document order. Forward
	/// children (no `owner_field`) are created before this record, reverse
	/// children after.
	pub nested_children: Vec<String>,
	/// Identity of the owning descriptor, for nested children.
	pub owner: Option<String>,
	/// Field on this record that must point back at the owner. `None`
	/// marks a forward relation child.
	pub owner_field: Option<String>,
	/// Whether `object_key` came from a user-declared alias.
	pub has_explicit_alias: bool,
	/// Present on association-record (junction) descriptors; defers their
	/// creation to Phase 2.
	pub association_link: Option<AssociationLink>,
}

impl Descriptor {
	/// Creates a descriptor with empty field and child collections.
	pub fn new(
		identity: impl Into<String>,
		model: ModelHandle,
		object_key: impl Into<String>,
	) -> Self {
		Self {
			identity: identity.into(),
			app_label: model.app_label.clone(),
			model_name: model.model_name.clone(),
			object_key: object_key.into(),
			model,
			fields: Map::new(),
			associations: BTreeMap::new(),
			inline_association_children: BTreeMap::new(),
			nested_children: Vec::new(),
			owner: None,
			owner_field: None,
			has_explicit_alias: false,
			association_link: None,
		}
	}

	/// Returns the alias this descriptor registers, if any.
	pub fn alias(&self) -> Option<&str> {
		self.has_explicit_alias.then_some(self.object_key.as_str())
	}

	/// Returns true for association-record (junction) descriptors.
	pub fn is_association_record(&self) -> bool {
		self.association_link.is_some()
	}
}

/// Identity-keyed store for all descriptors of one load.
#[derive(Debug, Default)]
pub struct DescriptorArena {
	descriptors: HashMap<String, Descriptor>,
	roots: Vec<String>,
}

impl DescriptorArena {
	/// Creates an empty arena.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a descriptor, enforcing identity uniqueness.
	///
	/// # Errors
	///
	/// Returns [`SeedError::DuplicateIdentity`] if a descriptor with the
	/// same identity is already present.
	pub fn insert(&mut self, descriptor: Descriptor) -> SeedResult<()> {
		if self.descriptors.contains_key(&descriptor.identity) {
			return Err(SeedError::DuplicateIdentity(descriptor.identity));
		}
		self.descriptors
			.insert(descriptor.identity.clone(), descriptor);
		Ok(())
	}

	/// Inserts a top-level descriptor and records it as a root.
	pub fn insert_root(&mut self, descriptor: Descriptor) -> SeedResult<()> {
		let identity = descriptor.identity.clone();
		self.insert(descriptor)?;
		self.roots.push(identity);
		Ok(())
	}

	/// Returns a descriptor by identity.
	pub fn get(&self, identity: &str) -> Option<&Descriptor> {
		self.descriptors.get(identity)
	}

	/// Returns a descriptor by identity, failing with an unresolved
	/// reference error.
	pub fn expect(&self, identity: &str) -> SeedResult<&Descriptor> {
		self.descriptors
			.get(identity)
			.ok_or_else(|| SeedError::UnresolvedReference(identity.to_string()))
	}

	/// Returns true if the identity is present.
	pub fn contains(&self, identity: &str) -> bool {
		self.descriptors.contains_key(identity)
	}

	/// Top-level descriptor identities in document order.
	pub fn roots(&self) -> &[String] {
		&self.roots
	}

	/// Total number of descriptors, nested included.
	pub fn len(&self) -> usize {
		self.descriptors.len()
	}

	/// Returns true if the arena holds no descriptors.
	pub fn is_empty(&self) -> bool {
		self.descriptors.is_empty()
	}

	/// Flattens the forest depth-first: each descriptor, then its nested
	/// children, then its inline association children. This is the Phase-2
	/// traversal order.
	pub fn flatten(&self) -> Vec<String> {
		let mut result = Vec::with_capacity(self.descriptors.len());
		for root in &self.roots {
			self.flatten_into(root, &mut result);
		}
		result
	}

	fn flatten_into(&self, identity: &str, result: &mut Vec<String>) {
		result.push(identity.to_string());
		let Some(descriptor) = self.descriptors.get(identity) else {
			return;
		};
		for child in &descriptor.nested_children {
			self.flatten_into(child, result);
		}
		for children in descriptor.inline_association_children.values() {
			for child in children {
				self.flatten_into(child, result);
			}
		}
	}
}
