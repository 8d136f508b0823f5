//! In-memory collection catalog

use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use docimport_schema::{FieldType, Format, RawDocument, Schema};

use crate::context::CallContext;
use crate::error::{ErrorKind, SizeLimit, StoreError};
use crate::validate::{check_collection_name, check_document, check_schema_update};
use crate::CollectionStore;

/// Write size limits, measured on the raw JSON text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreLimits {
    pub max_document_bytes: usize,
    pub max_transaction_bytes: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_document_bytes: 100 * 1024,
            max_transaction_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Call counters, for inspection in tests and logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub inserts: usize,
    pub inserted_documents: usize,
    pub rejected_inserts: usize,
    pub schema_updates: usize,
    pub describes: usize,
}

#[derive(Debug, Clone)]
struct Collection {
    schema: Schema,
    documents: Vec<Value>,
    keys: HashSet<String>,
    sequence: i64,
}

impl Collection {
    /// Rebuild key index and generator state from stored documents
    fn restore(schema: Schema, documents: Vec<Value>) -> Result<Self, StoreError> {
        let mut keys = HashSet::with_capacity(documents.len());
        let mut sequence = 0;

        for document in &documents {
            let Value::Object(members) = document else {
                return Err(StoreError::new(ErrorKind::Internal, "stored document is not an object"));
            };
            if let Some(key) = primary_key(&schema, members)? {
                if !keys.insert(key.clone()) {
                    return Err(StoreError::already_exists(format!("duplicate primary key {key}")));
                }
            }
            for (name, field) in &schema.fields {
                if field.auto_generate && field.field_type == FieldType::Integer {
                    if let Some(n) = members.get(name).and_then(Value::as_i64) {
                        sequence = sequence.max(n);
                    }
                }
            }
        }

        Ok(Self {
            schema,
            documents,
            keys,
            sequence,
        })
    }
}

/// Key of a document under the schema's primary key, if the schema has one
fn primary_key(schema: &Schema, members: &Map<String, Value>) -> Result<Option<String>, StoreError> {
    let Some(key_fields) = &schema.primary_key else {
        return Ok(None);
    };

    let mut parts = Vec::with_capacity(key_fields.len());
    for name in key_fields {
        let value = members
            .get(name)
            .ok_or_else(|| StoreError::invalid_argument(format!("primary key field '{name}' is missing")))?;
        parts.push(value.clone());
    }
    Ok(Some(Value::Array(parts).to_string()))
}

/// Fill absent top-level auto-generated fields
fn fill_generated(schema: &Schema, members: &mut Map<String, Value>, sequence: &mut i64) {
    for (name, field) in schema.fields.iter().filter(|(_, field)| field.auto_generate) {
        if members.contains_key(name) {
            continue;
        }
        let value = match field.shape() {
            (FieldType::String, Format::Uuid) => Value::String(Uuid::new_v4().to_string()),
            (FieldType::String, Format::DateTime) => Value::String(Utc::now().to_rfc3339()),
            (FieldType::Integer, _) => {
                *sequence += 1;
                Value::from(*sequence)
            }
            _ => continue,
        };
        members.insert(name.clone(), value);
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: BTreeMap<String, Collection>,
    limits: StoreLimits,
    stats: Cell<StoreStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.stats.get()
    }

    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn schema(&self, collection: &str) -> Option<&Schema> {
        self.collections.get(collection).map(|c| &c.schema)
    }

    pub fn documents(&self, collection: &str) -> Option<&[Value]> {
        self.collections.get(collection).map(|c| c.documents.as_slice())
    }

    fn record(&self, update: impl FnOnce(&mut StoreStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }

    /// Load a collection as persisted elsewhere
    pub(crate) fn restore(&mut self, collection: &str, schema: Schema, documents: Vec<Value>) -> Result<(), StoreError> {
        check_collection_name(collection)?;
        let restored = Collection::restore(schema, documents)?;
        self.collections.insert(collection.to_string(), restored);
        Ok(())
    }

    /// Validate a write and prepare the documents as they would be stored,
    /// generated fields included; the catalog is left untouched
    pub(crate) fn stage_insert(
        &self,
        ctx: &CallContext,
        collection: &str,
        documents: &[RawDocument],
    ) -> Result<StagedInsert, StoreError> {
        ctx.check()?;

        let staged = match self.collections.get(collection) {
            Some(target) => stage(collection, target, self.limits, documents),
            None => Err(StoreError::not_found(format!("collection '{collection}' not found"))),
        };
        if let Err(err) = &staged {
            self.record(|s| s.rejected_inserts += 1);
            debug!(collection, documents = documents.len(), error = %err, "insert rejected");
        }
        staged
    }

    pub(crate) fn commit_insert(&mut self, staged: StagedInsert) -> Result<(), StoreError> {
        let StagedInsert {
            collection,
            documents,
            keys,
            sequence,
        } = staged;
        let target = self
            .collections
            .get_mut(&collection)
            .ok_or_else(|| StoreError::not_found(format!("collection '{collection}' not found")))?;

        let inserted = documents.len();
        target.documents.extend(documents);
        target.keys.extend(keys);
        target.sequence = sequence;

        self.record(|s| {
            s.inserts += 1;
            s.inserted_documents += inserted;
        });
        debug!(collection = collection.as_str(), documents = inserted, "documents inserted");
        Ok(())
    }

    /// Validate a schema push against the stored collection and build its
    /// replacement; the catalog is left untouched
    pub(crate) fn stage_update(
        &self,
        ctx: &CallContext,
        collection: &str,
        schema_json: &str,
    ) -> Result<StagedUpdate, StoreError> {
        ctx.check()?;
        check_collection_name(collection)?;

        let mut schema = Schema::from_json(schema_json)
            .map_err(|err| StoreError::invalid_argument(format!("invalid schema: {err}")))?;
        if schema.name.is_empty() {
            schema.name = collection.to_string();
        } else if schema.name != collection {
            return Err(StoreError::invalid_argument(format!(
                "schema title '{}' does not match collection '{collection}'",
                schema.name
            )));
        }
        if let Some(key_fields) = &schema.primary_key {
            if let Some(missing) = key_fields.iter().find(|name| !schema.fields.contains_key(*name)) {
                return Err(StoreError::invalid_argument(format!(
                    "primary key field '{missing}' is not defined in the schema"
                )));
            }
        }

        let documents = match self.collections.get(collection) {
            Some(existing) => {
                check_schema_update(&existing.schema, &schema)?;
                existing.documents.clone()
            }
            None => Vec::new(),
        };

        Ok(StagedUpdate {
            collection: collection.to_string(),
            replacement: Collection::restore(schema, documents)?,
        })
    }

    pub(crate) fn commit_update(&mut self, staged: StagedUpdate) {
        self.record(|s| s.schema_updates += 1);
        debug!(
            collection = staged.collection.as_str(),
            fingerprint = %staged.replacement.schema.fingerprint(),
            "collection schema stored"
        );
        self.collections.insert(staged.collection, staged.replacement);
    }
}

/// Validated insert waiting to be committed
#[derive(Debug)]
pub(crate) struct StagedInsert {
    collection: String,
    documents: Vec<Value>,
    keys: HashSet<String>,
    sequence: i64,
}

impl StagedInsert {
    pub(crate) fn documents(&self) -> &[Value] {
        &self.documents
    }
}

/// Validated schema replacement waiting to be committed
#[derive(Debug)]
pub(crate) struct StagedUpdate {
    collection: String,
    replacement: Collection,
}

impl StagedUpdate {
    pub(crate) fn schema(&self) -> &Schema {
        &self.replacement.schema
    }
}

/// Validate a whole write without touching the collection
fn stage(
    collection: &str,
    target: &Collection,
    limits: StoreLimits,
    documents: &[RawDocument],
) -> Result<StagedInsert, StoreError> {
    let mut total = 0;
    for raw in documents {
        let size = raw.get().len();
        if size > limits.max_document_bytes {
            return Err(StoreError::size_limit(SizeLimit::Document));
        }
        total += size;
    }
    if total > limits.max_transaction_bytes {
        return Err(StoreError::size_limit(SizeLimit::Transaction));
    }

    let mut sequence = target.sequence;
    let mut keys = HashSet::new();
    let mut staged = Vec::with_capacity(documents.len());

    for (index, raw) in documents.iter().enumerate() {
        let value: Value = serde_json::from_str(raw.get())
            .map_err(|err| StoreError::invalid_argument(format!("document {index}: {err}")))?;
        let Value::Object(mut members) = value else {
            return Err(StoreError::invalid_argument(format!("document {index} is not a JSON object")));
        };

        fill_generated(&target.schema, &mut members, &mut sequence);
        check_document(&target.schema, &members)?;

        if let Some(key) = primary_key(&target.schema, &members)? {
            if target.keys.contains(&key) || !keys.insert(key.clone()) {
                return Err(StoreError::already_exists(format!("duplicate primary key {key}")));
            }
        }
        staged.push(Value::Object(members));
    }

    Ok(StagedInsert {
        collection: collection.to_string(),
        documents: staged,
        keys,
        sequence,
    })
}

impl CollectionStore for MemoryStore {
    fn insert(&mut self, ctx: &CallContext, collection: &str, documents: &[RawDocument]) -> Result<(), StoreError> {
        let staged = self.stage_insert(ctx, collection, documents)?;
        self.commit_insert(staged)
    }

    fn create_or_update_collection(
        &mut self,
        ctx: &CallContext,
        collection: &str,
        schema: &str,
    ) -> Result<(), StoreError> {
        let staged = self.stage_update(ctx, collection, schema)?;
        self.commit_update(staged);
        Ok(())
    }

    fn describe_collection(&self, ctx: &CallContext, collection: &str) -> Result<String, StoreError> {
        ctx.check()?;
        self.record(|s| s.describes += 1);

        let target = self
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::not_found(format!("collection '{collection}' not found")))?;
        target
            .schema
            .to_json()
            .map_err(|err| StoreError::new(ErrorKind::Internal, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docimport_schema::RawValue;

    fn raw(json: &str) -> RawDocument {
        RawValue::from_string(json.to_string()).unwrap()
    }

    const USERS: &str = r#"{
        "title": "users",
        "properties": {
            "id": {"type": "string", "format": "uuid", "autoGenerate": true},
            "name": {"type": "string"},
            "seq": {"type": "integer", "autoGenerate": true}
        },
        "primary_key": ["id"]
    }"#;

    fn users_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .create_or_update_collection(&CallContext::background(), "users", USERS)
            .unwrap();
        store
    }

    #[test]
    fn test_missing_collection() {
        let mut store = MemoryStore::new();
        let ctx = CallContext::background();

        let err = store.insert(&ctx, "users", &[raw(r#"{"a":1}"#)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.describe_collection(&ctx, "users").unwrap_err().is_not_found());
        assert_eq!(store.stats().rejected_inserts, 1);
    }

    #[test]
    fn test_generated_fields_filled() {
        let mut store = users_store();
        let ctx = CallContext::background();

        store
            .insert(&ctx, "users", &[raw(r#"{"name":"a"}"#), raw(r#"{"name":"b"}"#)])
            .unwrap();

        let docs = store.documents("users").unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0]["id"].as_str().map(docimport_schema::is_uuid).unwrap_or(false));
        assert_ne!(docs[0]["id"], docs[1]["id"]);
        assert_eq!(docs[0]["seq"].as_i64(), Some(1));
        assert_eq!(docs[1]["seq"].as_i64(), Some(2));
    }

    #[test]
    fn test_insert_is_all_or_nothing() {
        let mut store = users_store();
        let ctx = CallContext::background();

        let err = store
            .insert(&ctx, "users", &[raw(r#"{"name":"a"}"#), raw(r#"{"name":null}"#)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.documents("users").unwrap().len(), 0);

        store.insert(&ctx, "users", &[raw(r#"{"name":"a"}"#)]).unwrap();
        assert_eq!(store.documents("users").unwrap()[0]["seq"].as_i64(), Some(1));
    }

    #[test]
    fn test_duplicate_primary_key() {
        let mut store = users_store();
        let ctx = CallContext::background();
        let doc = r#"{"id":"1ed6ff32-4c0f-4553-9cd3-a2ea3d58e9d1","name":"a"}"#;

        store.insert(&ctx, "users", &[raw(doc)]).unwrap();
        let err = store.insert(&ctx, "users", &[raw(doc)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let other = r#"{"id":"2ed6ff32-4c0f-4553-9cd3-a2ea3d58e9d1"}"#;
        let err = store.insert(&ctx, "users", &[raw(other), raw(other)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_size_limits() {
        let mut store = MemoryStore::with_limits(StoreLimits {
            max_document_bytes: 16,
            max_transaction_bytes: 24,
        });
        let ctx = CallContext::background();
        store
            .create_or_update_collection(&ctx, "c", r#"{"properties":{"a":{"type":"integer"}}}"#)
            .unwrap();

        let err = store.insert(&ctx, "c", &[raw(r#"{"a":123456789012345}"#)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeLimitExceeded(SizeLimit::Document));

        let doc = r#"{"a":1234567}"#;
        let err = store.insert(&ctx, "c", &[raw(doc), raw(doc)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeLimitExceeded(SizeLimit::Transaction));

        store.insert(&ctx, "c", &[raw(doc)]).unwrap();
    }

    #[test]
    fn test_schema_update_must_widen() {
        let mut store = MemoryStore::new();
        let ctx = CallContext::background();

        store
            .create_or_update_collection(&ctx, "c", r#"{"properties":{"a":{"type":"integer"}}}"#)
            .unwrap();
        store
            .create_or_update_collection(&ctx, "c", r#"{"properties":{"a":{"type":"number"}}}"#)
            .unwrap();

        let err = store
            .create_or_update_collection(&ctx, "c", r#"{"properties":{"a":{"type":"string"}}}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(store.schema("c").unwrap().fields["a"].field_type, FieldType::Number);
        assert_eq!(store.stats().schema_updates, 2);
    }

    #[test]
    fn test_schema_title_must_match() {
        let mut store = MemoryStore::new();
        let err = store
            .create_or_update_collection(&CallContext::background(), "orders", USERS)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_describe_returns_wire_schema() {
        let store = users_store();
        let json = store.describe_collection(&CallContext::background(), "users").unwrap();
        let schema = Schema::from_json(&json).unwrap();

        assert_eq!(&schema, store.schema("users").unwrap());
        assert_eq!(store.stats().describes, 1);
    }

    #[test]
    fn test_cancelled_context() {
        let mut store = users_store();
        let ctx = CallContext::background();
        ctx.cancel_token().cancel();

        let err = store.insert(&ctx, "users", &[raw(r#"{"name":"a"}"#)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
