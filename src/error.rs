//! Error types for nested seed loading.
//!
//! Every error is terminal for the current load: nothing is retried
//! internally, and propagation unwinds the whole load so an external
//! transaction boundary can roll back.

use thiserror::Error;

/// Errors that can occur while loading seed data.
#[derive(Debug, Error)]
pub enum SeedError {
	/// Input document shape deviates from namespace -> type -> list-of-maps.
	#[error("Invalid document structure: {0}")]
	Structure(String),

	/// A namespace/type pair could not be resolved to a model.
	#[error("Model not found: {0}")]
	ModelNotFound(String),

	/// An alias or identity reference token did not resolve.
	#[error("Unresolved reference '{0}'. Make sure it is defined before being referenced.")]
	UnresolvedReference(String),

	/// A store lookup matched no rows.
	#[error("Lookup failed: no {model} record matches {criteria}")]
	LookupNotFound {
		/// Model the lookup queried.
		model: String,
		/// Criteria used, echoed verbatim.
		criteria: String,
	},

	/// A store lookup matched more than one row.
	#[error("Lookup failed: multiple {model} records match {criteria}. Use more specific criteria.")]
	LookupAmbiguous {
		/// Model the lookup queried.
		model: String,
		/// Criteria used, echoed verbatim.
		criteria: String,
	},

	/// A cycle exists among forward references between top-level records.
	#[error("Circular dependency detected: {0}")]
	CircularDependency(String),

	/// Two records in one load share the same identity.
	#[error("Identity '{0}' already registered")]
	DuplicateIdentity(String),

	/// Two records in one load declared the same alias.
	#[error("Alias '{alias}' already used by '{identity}'. Aliases must be unique across one load.")]
	DuplicateAlias {
		/// The colliding alias.
		alias: String,
		/// Identity that registered the alias first.
		identity: String,
	},

	/// Backing store operation failed.
	#[error("Store error: {0}")]
	Store(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// Seed data file not found.
	#[error("Seed file not found: {0}")]
	FileNotFound(String),

	/// Unsupported seed file extension.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// YAML serialization/deserialization error (when the `yaml` feature is enabled).
	#[cfg(feature = "yaml")]
	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for seed loading operations.
pub type SeedResult<T> = Result<T, SeedError>;
