//! Registry of persisted records for one load.
//!
//! Maps identities to persisted handles, keeps the alias index, and caches
//! store lookups. A registry is exclusively owned by one load invocation
//! and discarded afterwards, never reused across loads.

use std::collections::HashMap;

use crate::error::{SeedError, SeedResult};
use crate::reference::LookupCriteria;
use crate::schema::{InstanceHandle, ModelHandle, SchemaProvider};

/// Tracks created records by identity within one load.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
	instances: HashMap<String, InstanceHandle>,
	alias_index: HashMap<String, String>,
	creation_order: Vec<String>,
	lookup_cache: HashMap<String, InstanceHandle>,
}

impl ObjectRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a created record under its identity, and optionally under
	/// an alias.
	///
	/// # Errors
	///
	/// Returns [`SeedError::DuplicateIdentity`] if the identity is already
	/// registered, or [`SeedError::DuplicateAlias`] if the alias is already
	/// claimed by another identity.
	pub fn register(
		&mut self,
		identity: &str,
		handle: InstanceHandle,
		alias: Option<&str>,
	) -> SeedResult<()> {
		if self.instances.contains_key(identity) {
			return Err(SeedError::DuplicateIdentity(identity.to_string()));
		}

		if let Some(alias) = alias {
			if let Some(existing) = self.alias_index.get(alias) {
				return Err(SeedError::DuplicateAlias {
					alias: alias.to_string(),
					identity: existing.clone(),
				});
			}
			self.alias_index
				.insert(alias.to_string(), identity.to_string());
		}

		self.instances.insert(identity.to_string(), handle);
		self.creation_order.push(identity.to_string());
		Ok(())
	}

	/// Resolves an identity or `$alias` token to a registered handle.
	///
	/// # Errors
	///
	/// Returns [`SeedError::UnresolvedReference`] when the token misses.
	pub fn resolve(&self, token: &str) -> SeedResult<&InstanceHandle> {
		if let Some(handle) = self.instances.get(token) {
			return Ok(handle);
		}

		if let Some(alias) = token.strip_prefix('$') {
			if let Some(identity) = self.alias_index.get(alias) {
				return Ok(&self.instances[identity]);
			}
		}

		Err(SeedError::UnresolvedReference(token.to_string()))
	}

	/// Returns true if the identity is registered.
	pub fn has(&self, identity: &str) -> bool {
		self.instances.contains_key(identity)
	}

	/// Registered identities in creation order.
	pub fn identities(&self) -> &[String] {
		&self.creation_order
	}

	/// Number of registered aliases.
	pub fn alias_count(&self) -> usize {
		self.alias_index.len()
	}

	/// Number of registered records.
	pub fn count(&self) -> usize {
		self.instances.len()
	}

	/// Discards all registrations and cached lookups.
	pub fn clear(&mut self) {
		self.instances.clear();
		self.alias_index.clear();
		self.creation_order.clear();
		self.lookup_cache.clear();
	}

	/// Fetches a pre-existing record from the store, caching the result by
	/// (model, criteria) for the duration of the load.
	pub async fn lookup(
		&mut self,
		provider: &dyn SchemaProvider,
		model: &ModelHandle,
		criteria: &LookupCriteria,
	) -> SeedResult<InstanceHandle> {
		let cache_key = format!("{}:{}", model, criteria.cache_key());
		if let Some(cached) = self.lookup_cache.get(&cache_key) {
			return Ok(cached.clone());
		}

		let handle = provider.lookup(model, criteria).await?;
		self.lookup_cache.insert(cache_key, handle.clone());
		Ok(handle)
	}
}
