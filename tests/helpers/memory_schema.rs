//! In-memory schema provider backing the integration tests.
//!
//! Models a small fixed schema with every relation shape the loader
//! handles:
//!
//! - `auth.User` with an owned one-to-one `profile` (`auth.Profile.user`)
//! - `shop.Category` self-nested through `children` / `parent`
//! - `blog.Post` with a forward `author` and a plain `tags` association
//! - `org.Team` with a `members` association through `org.Membership`
//! - `press.Book` with a forward `publisher`, for lookup traversal
//!
//! Rows live in a `parking_lot` mutex so tests can seed pre-existing data
//! and inspect everything the loader persisted.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use nested_seed::error::{SeedError, SeedResult};
use nested_seed::reference::LookupCriteria;
use nested_seed::schema::{InstanceHandle, ModelHandle, RelationKind, SchemaProvider};

/// One persisted row.
#[derive(Debug, Clone)]
pub struct StoredRow {
	/// Assigned primary key.
	pub pk: i64,
	/// Field map exactly as persisted.
	pub fields: Map<String, Value>,
}

/// One recorded `set_association` call.
#[derive(Debug, Clone)]
pub struct AssociationCall {
	/// Model of the instance the association was set on.
	pub model: String,
	/// Primary key of that instance.
	pub pk: Value,
	/// Association field name.
	pub field: String,
	/// Primary keys of the member instances, in call order.
	pub target_pks: Vec<Value>,
}

#[derive(Default)]
struct ProviderState {
	next_pk: i64,
	rows: HashMap<String, Vec<StoredRow>>,
	association_calls: Vec<AssociationCall>,
	lookup_calls: usize,
}

/// Schema provider over in-memory tables.
pub struct MemoryProvider {
	relations: BTreeMap<(String, String), RelationKind>,
	models: Vec<String>,
	state: Mutex<ProviderState>,
}

impl MemoryProvider {
	/// Creates the provider with the fixed test schema.
	pub fn new() -> Self {
		let user = ModelHandle::new("auth", "User");
		let profile = ModelHandle::new("auth", "Profile");
		let category = ModelHandle::new("shop", "Category");
		let post = ModelHandle::new("blog", "Post");
		let tag = ModelHandle::new("blog", "Tag");
		let team = ModelHandle::new("org", "Team");
		let membership = ModelHandle::new("org", "Membership");
		let publisher = ModelHandle::new("press", "Publisher");
		let book = ModelHandle::new("press", "Book");
		let imprint = ModelHandle::new("press", "Imprint");

		let mut relations = BTreeMap::new();
		relations.insert(
			("auth.User".to_string(), "profile".to_string()),
			RelationKind::ReverseToOne {
				target: profile.clone(),
				remote_field: "user".to_string(),
			},
		);
		relations.insert(
			("auth.Profile".to_string(), "user".to_string()),
			RelationKind::ForwardToOne {
				target: user.clone(),
			},
		);
		relations.insert(
			("shop.Category".to_string(), "parent".to_string()),
			RelationKind::ForwardToOne {
				target: category.clone(),
			},
		);
		relations.insert(
			("shop.Category".to_string(), "children".to_string()),
			RelationKind::ReverseToMany {
				target: category.clone(),
				remote_field: "parent".to_string(),
			},
		);
		relations.insert(
			("blog.Post".to_string(), "author".to_string()),
			RelationKind::ForwardToOne {
				target: user.clone(),
			},
		);
		relations.insert(
			("blog.Post".to_string(), "tags".to_string()),
			RelationKind::Association {
				target: tag.clone(),
				through: None,
			},
		);
		relations.insert(
			("org.Team".to_string(), "members".to_string()),
			RelationKind::Association {
				target: user.clone(),
				through: Some(membership.clone()),
			},
		);
		relations.insert(
			("org.Membership".to_string(), "team".to_string()),
			RelationKind::ForwardToOne {
				target: team.clone(),
			},
		);
		relations.insert(
			("org.Membership".to_string(), "user".to_string()),
			RelationKind::ForwardToOne {
				target: user.clone(),
			},
		);
		relations.insert(
			("press.Book".to_string(), "publisher".to_string()),
			RelationKind::ForwardToOne {
				target: publisher.clone(),
			},
		);
		relations.insert(
			("press.Book".to_string(), "sequel".to_string()),
			RelationKind::ForwardToOne {
				target: book.clone(),
			},
		);

		let models = vec![
			user.label(),
			profile.label(),
			category.label(),
			post.label(),
			tag.label(),
			team.label(),
			membership.label(),
			publisher.label(),
			book.label(),
			imprint.label(),
		];

		Self {
			relations,
			models,
			state: Mutex::new(ProviderState::default()),
		}
	}

	/// Inserts a pre-existing row, bypassing the loader. Returns its pk.
	pub fn insert_row(&self, model: &str, fields: Map<String, Value>) -> i64 {
		let mut state = self.state.lock();
		state.next_pk += 1;
		let pk = state.next_pk;
		state
			.rows
			.entry(model.to_string())
			.or_default()
			.push(StoredRow { pk, fields });
		pk
	}

	/// Returns all rows of a model, in creation order.
	pub fn rows(&self, model: &str) -> Vec<StoredRow> {
		self.state
			.lock()
			.rows
			.get(model)
			.cloned()
			.unwrap_or_default()
	}

	/// Returns the number of rows of a model.
	pub fn count(&self, model: &str) -> usize {
		self.state
			.lock()
			.rows
			.get(model)
			.map_or(0, |rows| rows.len())
	}

	/// Finds the first row of a model whose field equals the value.
	pub fn find(&self, model: &str, field: &str, value: &Value) -> Option<StoredRow> {
		self.rows(model)
			.into_iter()
			.find(|row| row.fields.get(field) == Some(value))
	}

	/// Returns the row of a model with the given pk.
	pub fn row(&self, model: &str, pk: i64) -> Option<StoredRow> {
		self.rows(model).into_iter().find(|row| row.pk == pk)
	}

	/// Returns every recorded `set_association` call, in order.
	pub fn association_calls(&self) -> Vec<AssociationCall> {
		self.state.lock().association_calls.clone()
	}

	/// Number of `lookup` calls that reached the store.
	pub fn lookup_call_count(&self) -> usize {
		self.state.lock().lookup_calls
	}

	fn matches(&self, model: &ModelHandle, row: &StoredRow, key: &str, value: &Value) -> bool {
		if key == "pk" {
			return &json!(row.pk) == value;
		}
		if let Some((relation, remainder)) = key.split_once("__") {
			let kind = self
				.relations
				.get(&(model.label(), relation.to_string()))
				.cloned()
				.unwrap_or(RelationKind::Attribute);
			let RelationKind::ForwardToOne { target } = kind else {
				return false;
			};
			let Some(related_pk) = row.fields.get(relation).and_then(Value::as_i64) else {
				return false;
			};
			let Some(related) = self.row(&target.label(), related_pk) else {
				return false;
			};
			return self.matches(&target, &related, remainder, value);
		}
		row.fields.get(key) == Some(value)
	}
}

impl Default for MemoryProvider {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SchemaProvider for MemoryProvider {
	fn resolve_model(&self, app_label: &str, model_name: &str) -> SeedResult<ModelHandle> {
		let label = format!("{}.{}", app_label, model_name);
		if self.models.contains(&label) {
			Ok(ModelHandle::new(app_label, model_name))
		} else {
			Err(SeedError::ModelNotFound(label))
		}
	}

	fn relation_kind(&self, model: &ModelHandle, field: &str) -> RelationKind {
		self.relations
			.get(&(model.label(), field.to_string()))
			.cloned()
			.unwrap_or(RelationKind::Attribute)
	}

	fn relation_fields(&self, model: &ModelHandle) -> Vec<(String, ModelHandle)> {
		self.relations
			.iter()
			.filter(|((label, _), _)| label == &model.label())
			.filter_map(|((_, field), kind)| match kind {
				RelationKind::ForwardToOne { target } => {
					Some((field.clone(), target.clone()))
				}
				_ => None,
			})
			.collect()
	}

	async fn persist(
		&self,
		model: &ModelHandle,
		fields: &Map<String, Value>,
	) -> SeedResult<InstanceHandle> {
		let pk = self.insert_row(&model.label(), fields.clone());
		Ok(InstanceHandle::new(model.clone(), json!(pk)))
	}

	async fn lookup(
		&self,
		model: &ModelHandle,
		criteria: &LookupCriteria,
	) -> SeedResult<InstanceHandle> {
		self.state.lock().lookup_calls += 1;
		let matching: Vec<StoredRow> = self
			.rows(&model.label())
			.into_iter()
			.filter(|row| {
				criteria
					.entries()
					.iter()
					.all(|(key, value)| self.matches(model, row, key, value))
			})
			.collect();

		match matching.len() {
			0 => Err(SeedError::LookupNotFound {
				model: model.label(),
				criteria: criteria.to_string(),
			}),
			1 => Ok(InstanceHandle::new(model.clone(), json!(matching[0].pk))),
			_ => Err(SeedError::LookupAmbiguous {
				model: model.label(),
				criteria: criteria.to_string(),
			}),
		}
	}

	async fn set_association(
		&self,
		instance: &InstanceHandle,
		field: &str,
		targets: &[InstanceHandle],
	) -> SeedResult<()> {
		let mut state = self.state.lock();
		state.association_calls.push(AssociationCall {
			model: instance.model.label(),
			pk: instance.pk.clone(),
			field: field.to_string(),
			target_pks: targets.iter().map(|t| t.pk.clone()).collect(),
		});
		Ok(())
	}
}
