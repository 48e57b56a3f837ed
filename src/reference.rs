//! Reference token grammar.
//!
//! Seed documents connect records through string tokens in three disjoint
//! forms:
//!
//! - **Alias**: `$admin`, a user-declared short name, valid anywhere in the
//!   same load.
//! - **Identity**: `auth.User.admin`, the full dotted identity of a record
//!   scheduled in the same load.
//! - **Store lookup**: `@username:alice`, `@pk:3`, `@author__username:bob`,
//!   `@{name:ACME,country:USA}`, resolved against pre-existing persisted
//!   data, never against records created in the current load.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// `$alias` form: `$` followed by a lowercase-leading identifier.
static ALIAS_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^\$[a-z_][a-z0-9_]*$").expect("valid alias pattern"));

/// Bare alias name, the `$alias` form without its sigil.
static NAME_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid name pattern"));

/// Legacy `namespace.TypeName.key` form.
static IDENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[a-z_][a-z0-9_]*\.[A-Z][A-Za-z0-9_]*\.[a-z_][a-z0-9_]*$")
		.expect("valid identity pattern")
});

/// Criteria for a store lookup, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupCriteria {
	entries: Vec<(String, Value)>,
}

impl LookupCriteria {
	/// Creates criteria from field/value pairs.
	pub fn new(entries: Vec<(String, Value)>) -> Self {
		Self { entries }
	}

	/// Returns the field/value pairs in declaration order.
	pub fn entries(&self) -> &[(String, Value)] {
		&self.entries
	}

	/// Returns a stable key for caching lookups within one load.
	pub fn cache_key(&self) -> String {
		self.to_string()
	}
}

impl std::fmt::Display for LookupCriteria {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut first = true;
		for (field, value) in &self.entries {
			if !first {
				write!(f, ", ")?;
			}
			first = false;
			match value {
				Value::String(s) => write!(f, "{}={}", field, s)?,
				other => write!(f, "{}={}", field, other)?,
			}
		}
		Ok(())
	}
}

/// A parsed reference token.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
	/// `$alias`, resolved through the registry's alias index.
	Alias(String),
	/// `namespace.TypeName.key`, resolved through direct identity lookup.
	Identity(String),
	/// `@...`, resolved by querying the backing store.
	Lookup(LookupCriteria),
}

impl Reference {
	/// Parses a raw string into a reference token, if it matches the grammar.
	pub fn parse(raw: &str) -> Option<Self> {
		if ALIAS_PATTERN.is_match(raw) {
			return Some(Self::Alias(raw[1..].to_string()));
		}
		if IDENTITY_PATTERN.is_match(raw) {
			return Some(Self::Identity(raw.to_string()));
		}
		if let Some(body) = raw.strip_prefix('@') {
			return parse_criteria(body).map(Self::Lookup);
		}
		None
	}

	/// Returns true if the value is a string matching any reference form.
	pub fn is_reference(value: &Value) -> bool {
		matches!(value, Value::String(s) if Self::parse(s).is_some())
	}

	/// Returns true for tokens resolved through the in-memory registry
	/// (alias or identity). Only these create dependency edges; store
	/// lookups point at pre-existing data.
	pub fn is_registry_reference(raw: &str) -> bool {
		ALIAS_PATTERN.is_match(raw) || IDENTITY_PATTERN.is_match(raw)
	}

	/// Returns true for `@`-prefixed store-lookup tokens.
	pub fn is_lookup(raw: &str) -> bool {
		raw.starts_with('@') && Self::parse(raw).is_some()
	}

	/// Returns true if the string is usable as a bare alias name. Anything
	/// else would produce an identity that reference tokens cannot name.
	pub fn is_valid_alias(name: &str) -> bool {
		NAME_PATTERN.is_match(name)
	}
}

/// Parses the body of an `@` token into criteria.
///
/// Accepts `field:value`, `field__nested:value`, `pk:N`, and the braced
/// multi-field form `{f1:v1,f2:v2}`.
fn parse_criteria(body: &str) -> Option<LookupCriteria> {
	let pairs: Vec<&str> = if let Some(inner) = body.strip_prefix('{') {
		let inner = inner.strip_suffix('}')?;
		inner.split(',').collect()
	} else {
		vec![body]
	};

	let mut entries = Vec::with_capacity(pairs.len());
	for pair in pairs {
		let (field, raw_value) = pair.split_once(':')?;
		let field = field.trim();
		if field.is_empty() {
			return None;
		}
		entries.push((field.to_string(), coerce_scalar(raw_value.trim())));
	}
	if entries.is_empty() {
		return None;
	}
	Some(LookupCriteria::new(entries))
}

/// Coerces a criteria value to a JSON scalar: numbers and booleans parse as
/// themselves, everything else stays a string.
fn coerce_scalar(raw: &str) -> Value {
	match serde_json::from_str::<Value>(raw) {
		Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
		_ => Value::String(raw.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_parse_alias() {
		assert_eq!(
			Reference::parse("$admin"),
			Some(Reference::Alias("admin".to_string()))
		);
	}

	#[rstest]
	#[case("$Admin")]
	#[case("$")]
	#[case("$9lives")]
	fn test_reject_bad_alias(#[case] raw: &str) {
		assert_eq!(Reference::parse(raw), None);
	}

	#[rstest]
	fn test_parse_identity() {
		assert_eq!(
			Reference::parse("auth.User.admin"),
			Some(Reference::Identity("auth.User.admin".to_string()))
		);
	}

	#[rstest]
	#[case("auth.user.admin")] // type must be capitalized
	#[case("auth.User")] // missing key
	#[case("auth.User.Admin")] // key must be lowercase-leading
	#[case("plain text")]
	fn test_reject_non_references(#[case] raw: &str) {
		assert_eq!(Reference::parse(raw), None);
	}

	#[rstest]
	fn test_parse_lookup_single() {
		let reference = Reference::parse("@username:alice").unwrap();
		let Reference::Lookup(criteria) = reference else {
			panic!("expected lookup");
		};
		assert_eq!(
			criteria.entries(),
			&[("username".to_string(), json!("alice"))]
		);
	}

	#[rstest]
	fn test_parse_lookup_pk_coerces_number() {
		let Some(Reference::Lookup(criteria)) = Reference::parse("@pk:42") else {
			panic!("expected lookup");
		};
		assert_eq!(criteria.entries(), &[("pk".to_string(), json!(42))]);
	}

	#[rstest]
	fn test_parse_lookup_traversal() {
		let Some(Reference::Lookup(criteria)) = Reference::parse("@user__username:bob") else {
			panic!("expected lookup");
		};
		assert_eq!(
			criteria.entries(),
			&[("user__username".to_string(), json!("bob"))]
		);
	}

	#[rstest]
	fn test_parse_lookup_braced_multi_field() {
		let Some(Reference::Lookup(criteria)) =
			Reference::parse("@{name:O'Reilly Media,country:USA}")
		else {
			panic!("expected lookup");
		};
		assert_eq!(
			criteria.entries(),
			&[
				("name".to_string(), json!("O'Reilly Media")),
				("country".to_string(), json!("USA")),
			]
		);
	}

	#[rstest]
	#[case("@")]
	#[case("@novalue")]
	#[case("@{}")]
	fn test_reject_bad_lookup(#[case] raw: &str) {
		assert_eq!(Reference::parse(raw), None);
	}

	#[rstest]
	fn test_registry_reference_excludes_lookup() {
		assert!(Reference::is_registry_reference("$admin"));
		assert!(Reference::is_registry_reference("auth.User.admin"));
		assert!(!Reference::is_registry_reference("@username:alice"));
		assert!(Reference::is_lookup("@username:alice"));
		assert!(!Reference::is_lookup("$admin"));
		assert!(!Reference::is_lookup("@"));
	}

	#[rstest]
	#[case("admin", true)]
	#[case("snake_case_9", true)]
	#[case("Admin", false)]
	#[case("9lives", false)]
	#[case("", false)]
	fn test_valid_alias_names(#[case] name: &str, #[case] expected: bool) {
		assert_eq!(Reference::is_valid_alias(name), expected);
	}

	#[rstest]
	fn test_criteria_display() {
		let criteria = LookupCriteria::new(vec![
			("name".to_string(), json!("ACME")),
			("pk".to_string(), json!(3)),
		]);
		assert_eq!(criteria.to_string(), "name=ACME, pk=3");
	}
}
