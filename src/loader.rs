//! Two-phase creation engine.
//!
//! Phase 1 creates every record and its direct (to-one) relations in
//! dependency order: forward children strictly before their referrer,
//! reverse children after, each with the owner's handle in its reciprocal
//! field. Phase 2 creates deferred association records and resolves every
//! to-many association, once all entities exist.
//!
//! The engine is single-pass per load and fails fast: the first error
//! unwinds the whole load, so a caller-supplied transaction around
//! [`SeedLoader::load_paths`] (or the other entry points) leaves the store
//! unchanged on failure. No state survives a load call.

use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::builder::DescriptorBuilder;
use crate::config::SeedConfig;
use crate::descriptor::{Descriptor, DescriptorArena};
use crate::error::{SeedError, SeedResult};
use crate::ordering::topological_sort;
use crate::parser::{DocumentFormat, DocumentParser, SeedDocument};
use crate::reference::Reference;
use crate::registry::ObjectRegistry;
use crate::schema::{InstanceHandle, RelationKind, SchemaProvider};

/// Summary of one completed load.
#[derive(Debug, Clone)]
pub struct LoadReport {
	/// Number of records persisted (entities plus association records).
	pub records_created: usize,
	/// Number of association fields set in Phase 2.
	pub associations_set: usize,
	/// Number of association-record (junction) instances created.
	pub association_records: usize,
	/// Identities of created records, in creation order.
	pub identities: Vec<String>,
}

/// Orchestrates a full load: parse, build, order, create.
///
/// A loader is cheap to construct and may be reused; every `load_*` call
/// runs with a fresh registry and descriptor forest.
pub struct SeedLoader {
	provider: Arc<dyn SchemaProvider>,
	config: SeedConfig,
}

impl SeedLoader {
	/// Creates a loader with default configuration.
	pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
		Self::with_config(provider, SeedConfig::default())
	}

	/// Creates a loader with explicit configuration.
	pub fn with_config(provider: Arc<dyn SchemaProvider>, config: SeedConfig) -> Self {
		Self { provider, config }
	}

	/// Loads seed data from one or more files, deep-merged in order.
	///
	/// Run this inside the store's transaction when atomicity is required;
	/// the engine itself performs no rollback.
	pub async fn load_paths(&self, paths: &[&Path]) -> SeedResult<LoadReport> {
		let document = DocumentParser::new().parse_files(paths)?;
		self.load_document(&document).await
	}

	/// Loads seed data from string content in the given format.
	pub async fn load_str(
		&self,
		content: &str,
		format: DocumentFormat,
	) -> SeedResult<LoadReport> {
		let document = DocumentParser::new().parse_str(content, format)?;
		self.load_document(&document).await
	}

	/// Loads an already parsed document.
	pub async fn load_document(&self, document: &SeedDocument) -> SeedResult<LoadReport> {
		let builder = DescriptorBuilder::new(self.provider.as_ref(), &self.config);
		let arena = builder.build(document)?;
		let sorted_roots = topological_sort(&arena)?;

		let mut registry = ObjectRegistry::new();

		tracing::info!(
			roots = sorted_roots.len(),
			descriptors = arena.len(),
			"phase 1: creating records"
		);
		for identity in &sorted_roots {
			self.create_tree(&arena, &mut registry, identity, None)
				.await?;
		}

		tracing::info!("phase 2: resolving associations");
		let mut associations_set = 0;
		let mut association_records = 0;
		for identity in arena.flatten() {
			let descriptor = arena.expect(&identity)?;

			// Deferred association records first: their source side is
			// registered, and by now so is any in-load target.
			for children in descriptor.inline_association_children.values() {
				for child_identity in children {
					let child = arena.expect(child_identity)?;
					if child.is_association_record() {
						self.create_association_record(&arena, &mut registry, child)
							.await?;
						association_records += 1;
					}
				}
			}

			if descriptor.associations.is_empty() {
				continue;
			}

			let instance = registry.resolve(&descriptor.identity)?.clone();
			for (field, tokens) in &descriptor.associations {
				let mut targets = Vec::with_capacity(tokens.len());
				for token in tokens {
					let target = self
						.resolve_association_member(descriptor, field, token, &mut registry)
						.await?;
					targets.push(target);
				}
				self.provider
					.set_association(&instance, field, &targets)
					.await?;
				tracing::debug!(
					identity = %descriptor.identity,
					field,
					members = targets.len(),
					"set association"
				);
				associations_set += 1;
			}
		}

		let report = LoadReport {
			records_created: registry.count(),
			associations_set,
			association_records,
			identities: registry.identities().to_vec(),
		};
		tracing::info!(
			records = report.records_created,
			associations = report.associations_set,
			"load complete"
		);
		Ok(report)
	}

	/// Creates one descriptor and its owned subtree.
	///
	/// Forward children are created before the record itself, reverse
	/// children after it with `owner_field` set to the fresh handle, and
	/// plain inline association members last. Association records are
	/// skipped here; Phase 2 creates them.
	fn create_tree<'a>(
		&'a self,
		arena: &'a DescriptorArena,
		registry: &'a mut ObjectRegistry,
		identity: &'a str,
		owner: Option<(&'a str, InstanceHandle)>,
	) -> BoxFuture<'a, SeedResult<InstanceHandle>> {
		Box::pin(async move {
			let descriptor = arena.expect(identity)?;

			let mut forward = Vec::new();
			let mut reverse = Vec::new();
			for child_identity in &descriptor.nested_children {
				let child = arena.expect(child_identity)?;
				match child.owner_field.as_deref() {
					None => forward.push(child_identity.as_str()),
					Some(owner_field) => {
						reverse.push((child_identity.as_str(), owner_field));
					}
				}
			}

			for child_identity in &forward {
				self.create_tree(arena, registry, child_identity, None)
					.await?;
			}

			let mut prepared = self.prepare_fields(descriptor, registry).await?;
			if let Some((field, handle)) = &owner {
				prepared.insert((*field).to_string(), handle.pk.clone());
			}

			let instance = self.provider.persist(&descriptor.model, &prepared).await?;
			registry.register(identity, instance.clone(), descriptor.alias())?;
			tracing::debug!(identity, model = %descriptor.model, "created record");

			for (child_identity, owner_field) in reverse {
				self.create_tree(
					arena,
					registry,
					child_identity,
					Some((owner_field, instance.clone())),
				)
				.await?;
			}

			for children in descriptor.inline_association_children.values() {
				for child_identity in children {
					let child = arena.expect(child_identity)?;
					if !child.is_association_record() {
						self.create_tree(arena, registry, child_identity, None)
							.await?;
					}
				}
			}

			Ok(instance)
		})
	}

	/// Resolves every reference token in a descriptor's plain fields.
	async fn prepare_fields(
		&self,
		descriptor: &Descriptor,
		registry: &mut ObjectRegistry,
	) -> SeedResult<Map<String, Value>> {
		let mut prepared = Map::new();
		for (name, value) in &descriptor.fields {
			let resolved = match value {
				Value::String(raw) => match Reference::parse(raw) {
					Some(reference) => {
						self.resolve_relation_slot(descriptor, name, raw, reference, registry)
							.await?
					}
					None => value.clone(),
				},
				other => other.clone(),
			};
			prepared.insert(name.clone(), resolved);
		}
		Ok(prepared)
	}

	/// Resolves one token in a field slot.
	///
	/// Tokens only resolve when the slot is a forward to-one relation;
	/// anywhere else the text passes through verbatim, so string fields can
	/// legitimately hold `$`- or `@`-looking content.
	async fn resolve_relation_slot(
		&self,
		descriptor: &Descriptor,
		field: &str,
		raw: &str,
		reference: Reference,
		registry: &mut ObjectRegistry,
	) -> SeedResult<Value> {
		let RelationKind::ForwardToOne { target } =
			self.provider.relation_kind(&descriptor.model, field)
		else {
			return Ok(Value::String(raw.to_string()));
		};

		match reference {
			Reference::Lookup(criteria) => {
				let handle = registry
					.lookup(self.provider.as_ref(), &target, &criteria)
					.await?;
				Ok(handle.pk)
			}
			Reference::Alias(_) | Reference::Identity(_) => {
				Ok(registry.resolve(raw)?.pk.clone())
			}
		}
	}

	/// Resolves one member token of a plain association field.
	async fn resolve_association_member(
		&self,
		descriptor: &Descriptor,
		field: &str,
		token: &str,
		registry: &mut ObjectRegistry,
	) -> SeedResult<InstanceHandle> {
		match Reference::parse(token) {
			Some(Reference::Lookup(criteria)) => {
				let RelationKind::Association { target, .. } =
					self.provider.relation_kind(&descriptor.model, field)
				else {
					return Err(SeedError::UnresolvedReference(token.to_string()));
				};
				registry
					.lookup(self.provider.as_ref(), &target, &criteria)
					.await
			}
			_ => Ok(registry.resolve(token)?.clone()),
		}
	}

	/// Creates a deferred association-record (junction) instance.
	///
	/// The source side comes from the registry (always registered by Phase
	/// 1); the target side comes from the record's own target field or,
	/// when the schema could not name one, from the first reference-valued
	/// field. A record with no resolvable target is an error: silently
	/// dropping it would hide a data-modeling mistake.
	async fn create_association_record(
		&self,
		arena: &DescriptorArena,
		registry: &mut ObjectRegistry,
		record: &Descriptor,
	) -> SeedResult<()> {
		let Some(link) = record.association_link.clone() else {
			return Ok(());
		};

		// Inline-defined targets and other forward children of the record.
		for child_identity in &record.nested_children {
			self.create_tree(arena, registry, child_identity, None)
				.await?;
		}

		let source = registry.resolve(&link.source)?.clone();

		let mut fields = record.fields.clone();
		let located = link
			.target_field
			.as_deref()
			.and_then(|target_field| {
				fields
					.get(target_field)
					.and_then(Value::as_str)
					.filter(|raw| Reference::parse(raw).is_some())
					.map(|raw| (target_field.to_string(), raw.to_string()))
			})
			.or_else(|| {
				fields.iter().find_map(|(name, value)| {
					value
						.as_str()
						.filter(|raw| Reference::parse(raw).is_some())
						.map(|raw| (name.clone(), raw.to_string()))
				})
			});
		let Some((target_slot, token)) = located else {
			return Err(SeedError::UnresolvedReference(format!(
				"target of association record {}",
				record.identity
			)));
		};
		fields.shift_remove(&target_slot);

		let target = match Reference::parse(&token) {
			Some(Reference::Lookup(criteria)) => {
				let RelationKind::ForwardToOne { target } =
					self.provider.relation_kind(&record.model, &target_slot)
				else {
					return Err(SeedError::UnresolvedReference(token));
				};
				registry
					.lookup(self.provider.as_ref(), &target, &criteria)
					.await?
			}
			_ => registry.resolve(&token)?.clone(),
		};

		// Remaining entry fields are the record's own attributes.
		let mut prepared = Map::new();
		for (name, value) in &fields {
			let resolved = match value {
				Value::String(raw) => match Reference::parse(raw) {
					Some(reference) => {
						self.resolve_relation_slot(record, name, raw, reference, registry)
							.await?
					}
					None => value.clone(),
				},
				other => other.clone(),
			};
			prepared.insert(name.clone(), resolved);
		}
		prepared.insert(link.source_field.clone(), source.pk.clone());
		let target_assign = link.target_field.unwrap_or(target_slot);
		prepared.insert(target_assign, target.pk.clone());

		let instance = self.provider.persist(&record.model, &prepared).await?;
		registry.register(&record.identity, instance, record.alias())?;
		tracing::debug!(
			identity = %record.identity,
			model = %record.model,
			"created association record"
		);
		Ok(())
	}
}
