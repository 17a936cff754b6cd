use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Fields the server owns; client payloads can never set or change them.
const SERVER_FIELDS: [&str; 2] = ["id", "createdAt"];

/// A unique constraint value declared by an entity, e.g. `("email", "a@b.io")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    pub name: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self { name, value: value.into() }
    }
}

/// Capability set every persisted record provides to the generic
/// repository and CRUD layers.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Storage collection, also the Postgres table name.
    const COLLECTION: &'static str;
    /// Singular name used in error messages.
    const NAME: &'static str;
    /// Stored fields that API responses omit and client payloads cannot set.
    const PRIVATE_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;

    /// Derives computed fields (slugs, lower-cased emails) before validation.
    fn normalize(&mut self) {}

    fn validate(&self) -> CoreResult<()>;

    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}

/// Builds a new record from a client payload, assigning `id` and `createdAt`.
pub fn build<E: Entity>(payload: Value) -> CoreResult<E> {
    let mut fields = into_object::<E>(payload)?;
    fields.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    fields.insert("createdAt".to_string(), Value::String(Utc::now().to_rfc3339()));
    finish(Value::Object(fields))
}

/// Applies a partial update on top of `current`. Server owned fields are skipped.
pub fn merge_patch<E: Entity>(current: &E, patch: Value) -> CoreResult<E> {
    let patch = into_object::<E>(patch)?;
    let mut doc = match to_document(current)? {
        Value::Object(map) => map,
        _ => return Err(CoreError::InternalError(format!("{} did not serialize to an object", E::NAME))),
    };

    for (key, value) in patch {
        if SERVER_FIELDS.contains(&key.as_str()) {
            continue;
        }
        doc.insert(key, value);
    }

    finish(Value::Object(doc))
}

pub fn to_document<E: Entity>(record: &E) -> CoreResult<Value> {
    serde_json::to_value(record).map_err(|e| CoreError::InternalError(e.to_string()))
}

/// The document as clients see it, without `Entity::PRIVATE_FIELDS`.
pub fn to_public_document<E: Entity>(record: &E) -> CoreResult<Value> {
    let mut doc = to_document(record)?;
    if let Value::Object(map) = &mut doc {
        strip_private::<E>(map);
    }
    Ok(doc)
}

/// Drops private fields from a client payload before it reaches `build` or `merge_patch`.
pub fn strip_private<E: Entity>(fields: &mut Map<String, Value>) {
    for field in E::PRIVATE_FIELDS {
        fields.remove(*field);
    }
}

pub fn is_private<E: Entity>(field: &str) -> bool {
    E::PRIVATE_FIELDS.contains(&field)
}

pub fn from_document<E: Entity>(doc: Value) -> CoreResult<E> {
    serde_json::from_value(doc)
        .map_err(|e| CoreError::StorageError(format!("Corrupt {} document: {}", E::NAME, e)))
}

fn into_object<E: Entity>(payload: Value) -> CoreResult<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::validation(format!(
            "{} payload must be a JSON object, got {}",
            E::NAME,
            json_type(&other)
        ))),
    }
}

fn finish<E: Entity>(doc: Value) -> CoreResult<E> {
    let mut record: E = serde_json::from_value(doc)
        .map_err(|e| CoreError::validation(format!("Invalid {} data: {}", E::NAME, e)))?;
    record.normalize();
    record.validate()?;
    Ok(record)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
