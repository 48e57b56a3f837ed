//! Dependency ordering for top-level descriptors.
//!
//! Only plain-field reference tokens gate ordering: associations are
//! resolved in Phase 2 after every record exists, so they never create
//! edges. Tokens pointing outside the root set (store lookups, aliases of
//! nested children, already-persisted identities) are ignored; they
//! resolve later against data that does not depend on this sort.

use std::collections::HashMap;

use serde_json::Value;

use crate::descriptor::DescriptorArena;
use crate::error::{SeedError, SeedResult};
use crate::reference::Reference;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
	InProgress,
	Done,
}

/// Sorts root descriptors so that every forward reference points at an
/// earlier entry. Independent subtrees keep their document order.
///
/// # Errors
///
/// Returns [`SeedError::CircularDependency`] carrying the full cycle path
/// when the forward references among roots form a cycle.
pub fn topological_sort(arena: &DescriptorArena) -> SeedResult<Vec<String>> {
	let roots = arena.roots();

	// Alias table over roots, so `$alias` forward references order
	// correctly alongside dotted identities.
	let mut alias_to_identity: HashMap<&str, &str> = HashMap::new();
	for identity in roots {
		if let Some(descriptor) = arena.get(identity) {
			if let Some(alias) = descriptor.alias() {
				alias_to_identity.insert(alias, identity);
			}
		}
	}

	let root_set: HashMap<&str, ()> = roots.iter().map(|r| (r.as_str(), ())).collect();

	// Edge list per root: identities of in-set dependencies.
	let mut dependencies: HashMap<&str, Vec<&str>> = HashMap::new();
	for identity in roots {
		let mut deps = Vec::new();
		if let Some(descriptor) = arena.get(identity) {
			for value in descriptor.fields.values() {
				let Value::String(token) = value else {
					continue;
				};
				let dep = match Reference::parse(token) {
					Some(Reference::Identity(id)) => {
						root_set.get_key_value(id.as_str()).map(|(k, _)| *k)
					}
					Some(Reference::Alias(alias)) => {
						alias_to_identity.get(alias.as_str()).copied()
					}
					_ => None,
				};
				if let Some(dep) = dep {
					deps.push(dep);
				}
			}
		}
		dependencies.insert(identity, deps);
	}

	let mut marks: HashMap<&str, Mark> = HashMap::new();
	let mut result = Vec::with_capacity(roots.len());

	for identity in roots {
		visit(identity, &dependencies, &mut marks, &mut result, &mut Vec::new())?;
	}

	Ok(result)
}

fn visit<'a>(
	identity: &'a str,
	dependencies: &HashMap<&'a str, Vec<&'a str>>,
	marks: &mut HashMap<&'a str, Mark>,
	result: &mut Vec<String>,
	path: &mut Vec<&'a str>,
) -> SeedResult<()> {
	match marks.get(identity) {
		Some(Mark::Done) => return Ok(()),
		Some(Mark::InProgress) => {
			let mut cycle: Vec<&str> = path.clone();
			cycle.push(identity);
			return Err(SeedError::CircularDependency(cycle.join(" -> ")));
		}
		None => {}
	}

	marks.insert(identity, Mark::InProgress);
	path.push(identity);

	if let Some(deps) = dependencies.get(identity) {
		for dep in deps {
			visit(dep, dependencies, marks, result, path)?;
		}
	}

	path.pop();
	marks.insert(identity, Mark::Done);
	result.push(identity.to_string());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::descriptor::Descriptor;
	use crate::schema::ModelHandle;
	use rstest::rstest;
	use serde_json::json;

	fn root(arena: &mut DescriptorArena, identity: &str, fields: &[(&str, Value)]) {
		let (app, rest) = identity.split_once('.').unwrap();
		let (model, key) = rest.split_once('.').unwrap();
		let mut descriptor = Descriptor::new(identity, ModelHandle::new(app, model), key);
		for (name, value) in fields {
			descriptor.fields.insert((*name).to_string(), value.clone());
		}
		arena.insert_root(descriptor).unwrap();
	}

	#[rstest]
	fn test_dependencies_precede_dependents() {
		let mut arena = DescriptorArena::new();
		root(
			&mut arena,
			"blog.Post.first",
			&[("author", json!("auth.User.admin"))],
		);
		root(&mut arena, "auth.User.admin", &[]);

		let sorted = topological_sort(&arena).unwrap();
		assert_eq!(sorted, vec!["auth.User.admin", "blog.Post.first"]);
	}

	#[rstest]
	fn test_independent_roots_keep_document_order() {
		let mut arena = DescriptorArena::new();
		root(&mut arena, "app.Thing.a", &[]);
		root(&mut arena, "app.Thing.b", &[]);
		root(&mut arena, "app.Thing.c", &[]);

		let sorted = topological_sort(&arena).unwrap();
		assert_eq!(sorted, vec!["app.Thing.a", "app.Thing.b", "app.Thing.c"]);
	}

	#[rstest]
	fn test_alias_forward_reference_creates_edge() {
		let mut arena = DescriptorArena::new();
		root(
			&mut arena,
			"blog.Post.first",
			&[("author", json!("$admin"))],
		);
		let mut admin = Descriptor::new(
			"auth.User.admin",
			ModelHandle::new("auth", "User"),
			"admin",
		);
		admin.has_explicit_alias = true;
		arena.insert_root(admin).unwrap();

		let sorted = topological_sort(&arena).unwrap();
		assert_eq!(sorted, vec!["auth.User.admin", "blog.Post.first"]);
	}

	#[rstest]
	fn test_lookup_tokens_are_not_edges() {
		let mut arena = DescriptorArena::new();
		root(
			&mut arena,
			"blog.Post.first",
			&[("author", json!("@username:alice"))],
		);

		let sorted = topological_sort(&arena).unwrap();
		assert_eq!(sorted, vec!["blog.Post.first"]);
	}

	#[rstest]
	fn test_out_of_set_identity_ignored() {
		let mut arena = DescriptorArena::new();
		root(
			&mut arena,
			"blog.Post.first",
			&[("author", json!("auth.User.preexisting"))],
		);

		let sorted = topological_sort(&arena).unwrap();
		assert_eq!(sorted.len(), 1);
	}

	#[rstest]
	fn test_cycle_detected_with_path() {
		let mut arena = DescriptorArena::new();
		root(
			&mut arena,
			"app.Node.a",
			&[("next", json!("app.Node.b"))],
		);
		root(
			&mut arena,
			"app.Node.b",
			&[("next", json!("app.Node.a"))],
		);

		let Err(SeedError::CircularDependency(path)) = topological_sort(&arena) else {
			panic!("expected circular dependency error");
		};
		assert!(path.contains("app.Node.a -> app.Node.b -> app.Node.a"));
	}

	#[rstest]
	fn test_output_is_permutation() {
		let mut arena = DescriptorArena::new();
		root(
			&mut arena,
			"app.Node.a",
			&[("next", json!("app.Node.c"))],
		);
		root(&mut arena, "app.Node.b", &[]);
		root(&mut arena, "app.Node.c", &[]);

		let sorted = topological_sort(&arena).unwrap();
		assert_eq!(sorted.len(), 3);
		for identity in ["app.Node.a", "app.Node.b", "app.Node.c"] {
			assert!(sorted.iter().any(|s| s == identity));
		}
	}
}
