//! Seed document parsing and merging.
//!
//! Seed data arrives as one or more JSON or YAML sources with the shape
//! `namespace -> type -> list of field maps`. Multiple sources are
//! deep-merged in order, later sources winning on conflicting keys, before
//! any descriptor is built, so "who wins" is settled before the first side
//! effect.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{SeedError, SeedResult};

/// Supported seed document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DocumentFormat {
	/// JSON format.
	#[default]
	Json,

	/// YAML format (requires the `yaml` feature).
	Yaml,
}

impl DocumentFormat {
	/// Determines the format from a file extension.
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}
}

impl std::fmt::Display for DocumentFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Json => write!(f, "JSON"),
			Self::Yaml => write!(f, "YAML"),
		}
	}
}

/// A validated, merged seed document.
///
/// Root structure: namespace -> type -> list of field maps. An empty
/// document is valid and loads nothing.
#[derive(Debug, Clone, Default)]
pub struct SeedDocument {
	root: Map<String, Value>,
}

impl SeedDocument {
	/// Wraps an already normalized root object, validating its shape.
	pub fn from_value(value: Value) -> SeedResult<Self> {
		let root = match value {
			Value::Object(map) => map,
			Value::Null => Map::new(),
			other => {
				return Err(SeedError::Structure(format!(
					"document root must be a mapping, got {}",
					type_name(&other)
				)));
			}
		};
		let doc = Self { root };
		doc.validate()?;
		Ok(doc)
	}

	/// Returns true if the document holds no data.
	pub fn is_empty(&self) -> bool {
		self.root.is_empty()
	}

	/// Iterates `(namespace, type, objects)` triples in document order.
	pub fn collections(&self) -> impl Iterator<Item = (&str, &str, &Vec<Value>)> {
		self.root.iter().flat_map(|(app_label, models)| {
			let models = models.as_object().into_iter().flatten();
			models.filter_map(move |(model_name, objects)| {
				objects
					.as_array()
					.map(|list| (app_label.as_str(), model_name.as_str(), list))
			})
		})
	}

	/// Validates the namespace -> type -> list-of-maps shape.
	fn validate(&self) -> SeedResult<()> {
		for (app_label, models) in &self.root {
			let Some(models) = models.as_object() else {
				return Err(SeedError::Structure(format!(
					"namespace '{}' must contain a mapping of types, got {}",
					app_label,
					type_name(models)
				)));
			};

			for (model_name, objects) in models {
				let Some(objects) = objects.as_array() else {
					return Err(SeedError::Structure(format!(
						"collection '{}.{}' must contain a list of objects, got {}",
						app_label,
						model_name,
						type_name(objects)
					)));
				};

				for (idx, fields) in objects.iter().enumerate() {
					if !fields.is_object() {
						return Err(SeedError::Structure(format!(
							"item {} in '{}.{}' must be a mapping of fields, got {}",
							idx,
							app_label,
							model_name,
							type_name(fields)
						)));
					}
				}
			}
		}
		Ok(())
	}
}

/// Parser for seed documents.
///
/// Supports JSON and YAML sources (YAML requires the `yaml` feature) and
/// merges multiple sources deterministically.
#[derive(Debug, Default)]
pub struct DocumentParser;

impl DocumentParser {
	/// Creates a new document parser.
	pub fn new() -> Self {
		Self
	}

	/// Parses a seed file, detecting the format from the extension.
	///
	/// # Errors
	///
	/// Returns an error if the file cannot be read, the extension is not
	/// recognized, or the content is invalid.
	pub fn parse_file(&self, path: &Path) -> SeedResult<SeedDocument> {
		let format = DocumentFormat::from_path(path).ok_or_else(|| {
			SeedError::UnsupportedExtension(
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("(none)")
					.to_string(),
			)
		})?;

		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				SeedError::FileNotFound(path.display().to_string())
			} else {
				SeedError::Io(e)
			}
		})?;

		self.parse_str(&content, format)
	}

	/// Parses and deep-merges multiple seed files, later files overriding
	/// earlier ones on conflicting keys.
	pub fn parse_files(&self, paths: &[&Path]) -> SeedResult<SeedDocument> {
		let mut merged = Value::Object(Map::new());
		for path in paths {
			let doc = self.parse_file(path)?;
			merged = deep_merge(merged, Value::Object(doc.root));
		}
		SeedDocument::from_value(merged)
	}

	/// Parses seed data from a string.
	pub fn parse_str(&self, content: &str, format: DocumentFormat) -> SeedResult<SeedDocument> {
		let value = match format {
			DocumentFormat::Json => self.parse_json(content)?,
			DocumentFormat::Yaml => self.parse_yaml(content)?,
		};
		SeedDocument::from_value(value)
	}

	fn parse_json(&self, content: &str) -> SeedResult<Value> {
		Ok(serde_json::from_str(content)?)
	}

	#[cfg(feature = "yaml")]
	fn parse_yaml(&self, content: &str) -> SeedResult<Value> {
		// serde_yaml deserializes straight into a JSON value; YAML-only
		// constructs (non-string keys) fail here rather than downstream.
		Ok(serde_yaml::from_str(content)?)
	}

	#[cfg(not(feature = "yaml"))]
	fn parse_yaml(&self, _content: &str) -> SeedResult<Value> {
		Err(SeedError::UnsupportedExtension(
			"YAML support requires the 'yaml' feature".to_string(),
		))
	}
}

/// Deep-merges `override_value` over `base`: mappings merge recursively,
/// every other value (lists included) is replaced by the later source.
fn deep_merge(base: Value, override_value: Value) -> Value {
	match (base, override_value) {
		(Value::Object(mut base_map), Value::Object(override_map)) => {
			for (key, value) in override_map {
				// In-place update so overridden keys keep their original
				// document position.
				let merged = match base_map.get_mut(&key) {
					Some(existing) => deep_merge(std::mem::take(existing), value),
					None => value,
				};
				base_map.insert(key, merged);
			}
			Value::Object(base_map)
		}
		(_, override_value) => override_value,
	}
}

fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "list",
		Value::Object(_) => "mapping",
	}
}
