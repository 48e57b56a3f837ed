//! Builds descriptor forests from parsed seed documents.
//!
//! The builder walks the normalized `namespace -> type -> objects`
//! structure and classifies every field value: plain attribute, unresolved
//! reference token, owned nested child (forward or reverse), to-many
//! association, or association-record entry. It assigns identities as it
//! goes and links parents to children through the arena.
//!
//! The builder is tolerant by design: a nested shape the schema provider
//! does not recognize degrades to a plain field instead of failing.

use serde_json::{Map, Value};

use crate::config::{NestedKind, SeedConfig};
use crate::descriptor::{AssociationLink, Descriptor, DescriptorArena};
use crate::error::{SeedError, SeedResult};
use crate::parser::SeedDocument;
use crate::reference::Reference;
use crate::schema::{ModelHandle, RelationKind, SchemaProvider};

/// Classification of one document field, after schema and config are
/// consulted.
enum FieldClass {
	Plain,
	Forward(ModelHandle),
	ReverseOne(ModelHandle, String),
	ReverseMany(ModelHandle, String),
	PlainAssociation(ModelHandle),
	RecordAssociation(ModelHandle, ModelHandle),
}

/// Builds [`Descriptor`] forests from a [`SeedDocument`].
pub struct DescriptorBuilder<'a> {
	provider: &'a dyn SchemaProvider,
	config: &'a SeedConfig,
}

impl<'a> DescriptorBuilder<'a> {
	/// Creates a builder over a schema provider and configuration.
	pub fn new(provider: &'a dyn SchemaProvider, config: &'a SeedConfig) -> Self {
		Self { provider, config }
	}

	/// Builds the descriptor arena for a document.
	///
	/// Top-level descriptors become arena roots in document order; nested
	/// and inline children are reachable through them.
	pub fn build(&self, document: &SeedDocument) -> SeedResult<DescriptorArena> {
		let mut arena = DescriptorArena::new();

		for (app_label, model_name, objects) in document.collections() {
			let model = self.resolve_model(app_label, model_name)?;
			let mut auto_key_counter = 0usize;

			for entry in objects {
				let data = expect_object(entry)?;
				let alias = self.split_alias(data)?;
				let (object_key, explicit) = match alias {
					Some(alias) => (alias, true),
					None => {
						let key = format!(
							"{}_{}",
							model.model_name.to_lowercase(),
							auto_key_counter
						);
						auto_key_counter += 1;
						(key, false)
					}
				};

				let identity = format!("{}.{}", model.label(), object_key);
				let mut descriptor = Descriptor::new(identity, model.clone(), object_key);
				descriptor.has_explicit_alias = explicit;

				self.process_fields(&mut descriptor, data, &mut arena)?;
				arena.insert_root(descriptor)?;
			}
		}

		tracing::debug!(
			descriptors = arena.len(),
			roots = arena.roots().len(),
			"built descriptor forest"
		);
		Ok(arena)
	}

	/// Resolves a collection name, consulting the explicit mapping table
	/// before direct type-name resolution.
	fn resolve_model(&self, app_label: &str, name: &str) -> SeedResult<ModelHandle> {
		if let Some(path) = self.config.model_path(app_label, name) {
			let mapped = ModelHandle::parse(path).ok_or_else(|| {
				SeedError::Structure(format!(
					"invalid model path in config: '{}' (expected 'app.Model')",
					path
				))
			})?;
			return self
				.provider
				.resolve_model(&mapped.app_label, &mapped.model_name);
		}
		self.provider.resolve_model(app_label, name)
	}

	/// Extracts the explicit alias from a field map, if declared.
	///
	/// The marker value may carry the `$` prefix used by reference tokens;
	/// the stored alias never does.
	fn split_alias(&self, data: &Map<String, Value>) -> SeedResult<Option<String>> {
		match data.get(&self.config.reference_key) {
			None => Ok(None),
			Some(Value::String(alias)) => {
				let alias = alias.strip_prefix('$').unwrap_or(alias);
				if !Reference::is_valid_alias(alias) {
					return Err(SeedError::Structure(format!(
						"alias '{}' in marker '{}' must match [a-z_][a-z0-9_]*",
						alias, self.config.reference_key
					)));
				}
				Ok(Some(alias.to_string()))
			}
			Some(other) => Err(SeedError::Structure(format!(
				"alias marker '{}' must be a string, got {}",
				self.config.reference_key,
				serde_json::to_string(other).unwrap_or_default()
			))),
		}
	}

	/// Classifies a field through the schema provider, falling back to the
	/// configured nested overrides when the schema is silent.
	fn classify(&self, model: &ModelHandle, field: &str) -> SeedResult<FieldClass> {
		match self.provider.relation_kind(model, field) {
			RelationKind::ForwardToOne { target } => Ok(FieldClass::Forward(target)),
			RelationKind::ReverseToOne {
				target,
				remote_field,
			} => Ok(FieldClass::ReverseOne(target, remote_field)),
			RelationKind::ReverseToMany {
				target,
				remote_field,
			} => Ok(FieldClass::ReverseMany(target, remote_field)),
			RelationKind::Association { target, through } => Ok(match through {
				Some(through) => FieldClass::RecordAssociation(target, through),
				None => FieldClass::PlainAssociation(target),
			}),
			RelationKind::Attribute => {
				let Some(nested) =
					self.config
						.nested_override(&model.app_label, &model.model_name, field)
				else {
					return Ok(FieldClass::Plain);
				};
				let mapped = ModelHandle::parse(&nested.target_model).ok_or_else(|| {
					SeedError::Structure(format!(
						"invalid target model in nested override: '{}'",
						nested.target_model
					))
				})?;
				let target = self
					.provider
					.resolve_model(&mapped.app_label, &mapped.model_name)?;
				Ok(match nested.kind {
					NestedKind::OneToOne => {
						FieldClass::ReverseOne(target, nested.remote_field.clone())
					}
					NestedKind::ToMany => {
						FieldClass::ReverseMany(target, nested.remote_field.clone())
					}
				})
			}
		}
	}

	/// Classifies and routes every field of one object.
	fn process_fields(
		&self,
		descriptor: &mut Descriptor,
		data: &Map<String, Value>,
		arena: &mut DescriptorArena,
	) -> SeedResult<()> {
		for (field_name, value) in data {
			if field_name == &self.config.reference_key {
				continue;
			}

			match value {
				Value::Object(nested) => {
					self.process_map_field(descriptor, field_name, nested, arena)?;
				}
				Value::Array(items) => {
					self.process_list_field(descriptor, field_name, items, arena)?;
				}
				other => {
					descriptor
						.fields
						.insert(field_name.clone(), other.clone());
				}
			}
		}
		Ok(())
	}

	/// Routes a map-valued field: owned one-to-one child, inline forward
	/// relation, reverse to-many in map form, or plain value.
	fn process_map_field(
		&self,
		descriptor: &mut Descriptor,
		field_name: &str,
		nested: &Map<String, Value>,
		arena: &mut DescriptorArena,
	) -> SeedResult<()> {
		match self.classify(&descriptor.model, field_name)? {
			FieldClass::ReverseOne(target, remote_field) => {
				// Owned one-to-one child: identity hangs off the parent, the
				// child is not independently referenceable.
				let identity = format!("{}.{}", descriptor.identity, field_name);
				let alias = self.split_alias(nested)?;
				let mut child = Descriptor::new(
					identity.clone(),
					target,
					alias.clone().unwrap_or_else(|| field_name.to_string()),
				);
				child.has_explicit_alias = alias.is_some();
				child.owner = Some(descriptor.identity.clone());
				child.owner_field = Some(remote_field);

				self.process_fields(&mut child, nested, arena)?;
				arena.insert(child)?;
				descriptor.nested_children.push(identity);
			}
			FieldClass::ReverseMany(target, remote_field) => {
				// Map form: each key is the object key of one owned child.
				for (object_key, child_value) in nested {
					let child_data = expect_object(child_value)?;
					let identity = format!("{}.{}", target.label(), object_key);
					let mut child =
						Descriptor::new(identity.clone(), target.clone(), object_key.clone());
					child.owner = Some(descriptor.identity.clone());
					child.owner_field = Some(remote_field.clone());

					self.process_fields(&mut child, child_data, arena)?;
					arena.insert(child)?;
					descriptor.nested_children.push(identity);
				}
			}
			FieldClass::Forward(target) => {
				// Inline forward relation: the child must exist before this
				// record, so it is prepended to the children and its identity
				// replaces the map in the field slot.
				let identity =
					self.build_inline_forward(descriptor, field_name, &target, nested, arena)?;
				descriptor
					.fields
					.insert(field_name.to_string(), Value::String(identity.clone()));
				descriptor.nested_children.insert(0, identity);
			}
			_ => {
				// Unknown shape (JSON field, schema-silent key): plain value.
				descriptor
					.fields
					.insert(field_name.to_string(), Value::Object(nested.clone()));
			}
		}
		Ok(())
	}

	/// Routes a list-valued field: reverse to-many in list form, to-many
	/// association (plain or record-mediated), or plain value.
	fn process_list_field(
		&self,
		descriptor: &mut Descriptor,
		field_name: &str,
		items: &[Value],
		arena: &mut DescriptorArena,
	) -> SeedResult<()> {
		match self.classify(&descriptor.model, field_name)? {
			FieldClass::ReverseMany(target, remote_field) => {
				let mut auto_key_counter = 0usize;
				for item in items {
					let child_data = expect_object(item)?;
					let alias = self.split_alias(child_data)?;
					let (object_key, explicit) = match alias {
						Some(alias) => (alias, true),
						None => {
							let key = format!(
								"{}_{}_{}",
								descriptor.object_key, field_name, auto_key_counter
							);
							auto_key_counter += 1;
							(key, false)
						}
					};

					let identity = format!("{}.{}", target.label(), object_key);
					let mut child =
						Descriptor::new(identity.clone(), target.clone(), object_key);
					child.has_explicit_alias = explicit;
					child.owner = Some(descriptor.identity.clone());
					child.owner_field = Some(remote_field.clone());

					self.process_fields(&mut child, child_data, arena)?;
					arena.insert(child)?;
					descriptor.nested_children.push(identity);
				}
			}
			FieldClass::RecordAssociation(target, through) => {
				self.process_association_records(
					descriptor, field_name, items, &target, &through, arena,
				)?;
			}
			FieldClass::PlainAssociation(target) => {
				let has_members = items
					.iter()
					.any(|item| Reference::is_reference(item) || item.is_object());
				if has_members {
					self.process_association(descriptor, field_name, items, &target, arena)?;
				} else {
					// A bare scalar list on an association field is left for
					// the store to interpret.
					descriptor
						.fields
						.insert(field_name.to_string(), Value::Array(items.to_vec()));
				}
			}
			_ => {
				descriptor
					.fields
					.insert(field_name.to_string(), Value::Array(items.to_vec()));
			}
		}
		Ok(())
	}

	/// Builds an inline forward-relation child and returns its identity.
	fn build_inline_forward(
		&self,
		owner: &Descriptor,
		field_name: &str,
		target: &ModelHandle,
		data: &Map<String, Value>,
		arena: &mut DescriptorArena,
	) -> SeedResult<String> {
		let alias = self.split_alias(data)?;
		let (object_key, explicit) = match alias {
			Some(alias) => (alias, true),
			None => (format!("{}_{}", owner.object_key, field_name), false),
		};

		let identity = format!("{}.{}", target.label(), object_key);
		let mut child = Descriptor::new(identity.clone(), target.clone(), object_key);
		child.has_explicit_alias = explicit;
		child.owner = Some(owner.identity.clone());

		self.process_fields(&mut child, data, arena)?;
		arena.insert(child)?;
		Ok(identity)
	}

	/// Processes a plain to-many association: reference tokens collect into
	/// the association list, inline maps become child descriptors whose
	/// identities join the same list so Phase 2 treats both uniformly.
	fn process_association(
		&self,
		descriptor: &mut Descriptor,
		field_name: &str,
		items: &[Value],
		target: &ModelHandle,
		arena: &mut DescriptorArena,
	) -> SeedResult<()> {
		let mut tokens = Vec::new();
		let mut inline_children = Vec::new();

		for item in items {
			match item {
				Value::String(raw) if Reference::parse(raw).is_some() => {
					tokens.push(raw.clone());
				}
				Value::Object(data) => {
					let alias = self.split_alias(data)?;
					let (object_key, explicit) = match alias {
						Some(alias) => (alias, true),
						None => (
							format!(
								"{}_{}_{}",
								descriptor.object_key,
								field_name,
								inline_children.len()
							),
							false,
						),
					};

					let identity = format!("{}.{}", target.label(), object_key);
					let mut child =
						Descriptor::new(identity.clone(), target.clone(), object_key);
					child.has_explicit_alias = explicit;
					child.owner = Some(descriptor.identity.clone());

					self.process_fields(&mut child, data, arena)?;
					arena.insert(child)?;
					inline_children.push(identity.clone());
					tokens.push(identity);
				}
				other => {
					return Err(SeedError::Structure(format!(
						"entry in association field '{}' of {} must be a reference or a mapping, got {}",
						field_name,
						descriptor.identity,
						serde_json::to_string(other).unwrap_or_default()
					)));
				}
			}
		}

		if !tokens.is_empty() {
			descriptor
				.associations
				.insert(field_name.to_string(), tokens);
		}
		if !inline_children.is_empty() {
			descriptor
				.inline_association_children
				.insert(field_name.to_string(), inline_children);
		}
		Ok(())
	}

	/// Processes an association mediated by a custom association record.
	///
	/// Every entry describes one record of the junction type; the record
	/// descriptors carry an [`AssociationLink`] and are deferred to Phase 2
	/// (their target side may not exist until then). Inline to-one values
	/// inside an entry build forward children of the record, handled by the
	/// regular field classification.
	fn process_association_records(
		&self,
		descriptor: &mut Descriptor,
		field_name: &str,
		items: &[Value],
		target: &ModelHandle,
		through: &ModelHandle,
		arena: &mut DescriptorArena,
	) -> SeedResult<()> {
		let relation_fields = self.provider.relation_fields(through);
		let source_field = relation_fields
			.iter()
			.find(|(_, t)| t == &descriptor.model)
			.map(|(name, _)| name.clone())
			.ok_or_else(|| {
				SeedError::Structure(format!(
					"association record {} has no relation back to {}",
					through, descriptor.model
				))
			})?;
		let target_field = relation_fields
			.iter()
			.find(|(_, t)| t == target)
			.map(|(name, _)| name.clone());

		let mut children = Vec::new();
		for (idx, item) in items.iter().enumerate() {
			let Value::Object(data) = item else {
				return Err(SeedError::Structure(format!(
					"entry {} in association field '{}' of {} must be a mapping describing a {} record",
					idx, field_name, descriptor.identity, through
				)));
			};

			let alias = self.split_alias(data)?;
			let (object_key, explicit) = match alias {
				Some(alias) => (alias, true),
				None => (
					format!("{}_{}_{}", descriptor.object_key, field_name, idx),
					false,
				),
			};

			let identity = format!("{}.{}", through.label(), object_key);
			let mut record = Descriptor::new(identity.clone(), through.clone(), object_key);
			record.has_explicit_alias = explicit;
			record.owner = Some(descriptor.identity.clone());
			record.association_link = Some(AssociationLink {
				source: descriptor.identity.clone(),
				source_field: source_field.clone(),
				target_field: target_field.clone(),
			});

			self.process_fields(&mut record, data, arena)?;
			arena.insert(record)?;
			children.push(identity);
		}

		descriptor
			.inline_association_children
			.entry(field_name.to_string())
			.or_default()
			.extend(children);
		Ok(())
	}
}

fn expect_object(value: &Value) -> SeedResult<&Map<String, Value>> {
	value.as_object().ok_or_else(|| {
		SeedError::Structure(format!(
			"expected a mapping of fields, got {}",
			serde_json::to_string(value).unwrap_or_default()
		))
	})
}
