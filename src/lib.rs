//! Declarative nested seed data for relational stores.
//!
//! This crate loads deeply nested JSON/YAML seed documents and creates the
//! records they describe, in dependency order, with all relations wired up:
//!
//! - **Nested records**: one-to-one and to-many children defined inline
//!   under their owner
//! - **References**: `$alias` tokens, dotted identities, and `@field:value`
//!   store lookups between records
//! - **Associations**: many-to-many memberships, including junction records
//!   with extra attributes
//!
//! # Features
//!
//! - `json` - JSON seed document support (enabled by default)
//! - `yaml` - YAML seed document support (enabled by default)
//! - `full` - All features enabled
//!
//! # Quick Start
//!
//! Create a seed file (`seeds/accounts.yaml`):
//!
//! ```yaml
//! accounts:
//!   users:
//!     - $ref: $admin
//!       username: admin
//!       profile:
//!         display_name: Administrator
//! ```
//!
//! Load it against your schema provider:
//!
//! ```ignore
//! use nested_seed::prelude::*;
//!
//! let loader = SeedLoader::new(provider);
//! let report = loader.load_paths(&[Path::new("seeds/accounts.yaml")]).await?;
//! println!("created {} records", report.records_created);
//! ```
//!
//! # Architecture
//!
//! A load runs as a fixed pipeline:
//!
//! - [`DocumentParser`](parser::DocumentParser) - parse and deep-merge seed
//!   files into one [`SeedDocument`](parser::SeedDocument)
//! - [`DescriptorBuilder`](builder::DescriptorBuilder) - walk the document
//!   into a [`DescriptorArena`](descriptor::DescriptorArena), assigning an
//!   identity to every record
//! - [`topological_sort`](ordering::topological_sort) - order root records
//!   by their cross-references, rejecting cycles
//! - [`SeedLoader`](loader::SeedLoader) - create everything in two phases:
//!   entities and direct relations first, associations second
//!
//! The store behind it all is abstracted by the
//! [`SchemaProvider`](schema::SchemaProvider) trait, so the engine is
//! independent of any particular database layer.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod ordering;
pub mod parser;
pub mod prelude;
pub mod reference;
pub mod registry;
pub mod schema;

// Re-export commonly used types at crate root
pub use config::{CollectionMapping, NestedKind, NestedOverride, SeedConfig};
pub use error::{SeedError, SeedResult};
pub use loader::{LoadReport, SeedLoader};
pub use parser::{DocumentFormat, DocumentParser, SeedDocument};
pub use schema::{InstanceHandle, ModelHandle, RelationKind, SchemaProvider};
