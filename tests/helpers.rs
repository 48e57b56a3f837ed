//! Test helpers for nested-seed tests.
//!
//! This module provides the in-memory schema provider shared by the
//! integration tests.

#[path = "helpers/memory_schema.rs"]
pub mod memory_schema;
