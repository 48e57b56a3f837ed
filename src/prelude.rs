//! Convenience re-exports for common usage.
//!
//! This module provides a single import for the most commonly used items
//! from the nested-seed crate.
//!
//! # Example
//!
//! ```ignore
//! use nested_seed::prelude::*;
//!
//! // Now you have access to:
//! // - Loader and report types
//! // - Schema provider traits and handles
//! // - Configuration types
//! // - Error types
//! ```

// Error types
pub use crate::error::{SeedError, SeedResult};

// Parsing types
pub use crate::parser::{DocumentFormat, DocumentParser, SeedDocument};

// Descriptor graph types
pub use crate::builder::DescriptorBuilder;
pub use crate::descriptor::{AssociationLink, Descriptor, DescriptorArena};
pub use crate::ordering::topological_sort;
pub use crate::reference::{LookupCriteria, Reference};
pub use crate::registry::ObjectRegistry;

// Loader types
pub use crate::loader::{LoadReport, SeedLoader};

// Schema abstraction
pub use crate::schema::{InstanceHandle, ModelHandle, RelationKind, SchemaProvider};

// Configuration
pub use crate::config::{CollectionMapping, NestedKind, NestedOverride, SeedConfig};
