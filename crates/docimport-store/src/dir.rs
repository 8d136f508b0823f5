//! Collection catalog persisted under a local directory
//!
//! Layout: `<root>/<collection>/schema.json` holds the wire schema and
//! `<root>/<collection>/documents.jsonl` one stored document per line.
//! A write reaches the in-memory catalog only after it is on disk.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use docimport_schema::{RawDocument, Schema};

use crate::context::CallContext;
use crate::error::{ErrorKind, StoreError};
use crate::memory::{MemoryStore, StoreLimits};
use crate::CollectionStore;

const SCHEMA_FILE: &str = "schema.json";
const DOCUMENTS_FILE: &str = "documents.jsonl";

#[derive(Debug)]
pub struct DirStore {
    root: PathBuf,
    catalog: MemoryStore,
}

impl DirStore {
    /// Open (creating if needed) the store rooted at `root` and load every
    /// collection found there
    pub fn open(root: impl Into<PathBuf>, limits: StoreLimits) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let mut catalog = MemoryStore::with_limits(limits);
        for entry in fs::read_dir(&root)? {
            let dir = entry?.path();
            let schema_path = dir.join(SCHEMA_FILE);
            if !schema_path.is_file() {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let schema = Schema::from_json(&fs::read_to_string(&schema_path)?).map_err(|err| {
                StoreError::new(ErrorKind::Internal, format!("{}: {err}", schema_path.display()))
            })?;
            let documents = read_documents(&dir.join(DOCUMENTS_FILE))?;

            debug!(collection = name, documents = documents.len(), "collection loaded");
            catalog.restore(name, schema, documents)?;
        }

        info!(
            root = %root.display(),
            collections = catalog.collections().count(),
            "directory store opened"
        );

        Ok(Self { root, catalog })
    }

    /// Loaded state, for inspection
    pub fn catalog(&self) -> &MemoryStore {
        &self.catalog
    }
}

fn read_documents(path: &Path) -> Result<Vec<Value>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let reader = BufReader::new(File::open(path)?);
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .map(|document| {
            document.map_err(|err| StoreError::new(ErrorKind::Internal, format!("{}: {err}", path.display())))
        })
        .collect()
}

fn append_documents(path: &Path, documents: &[Value]) -> Result<(), StoreError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for document in documents {
        serde_json::to_writer(&mut writer, document).map_err(|err| StoreError::new(ErrorKind::Io, err.to_string()))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Replace `schema.json` through a rename so readers never see a partial file
fn write_schema(dir: &Path, schema: &Schema) -> Result<(), StoreError> {
    let json = schema
        .to_json_pretty()
        .map_err(|err| StoreError::new(ErrorKind::Internal, err.to_string()))?;

    fs::create_dir_all(dir)?;
    let staging = dir.join(format!("{SCHEMA_FILE}.tmp"));
    fs::write(&staging, json)?;
    fs::rename(&staging, dir.join(SCHEMA_FILE))?;
    Ok(())
}

impl CollectionStore for DirStore {
    fn insert(&mut self, ctx: &CallContext, collection: &str, documents: &[RawDocument]) -> Result<(), StoreError> {
        let staged = self.catalog.stage_insert(ctx, collection, documents)?;
        append_documents(&self.root.join(collection).join(DOCUMENTS_FILE), staged.documents())?;
        self.catalog.commit_insert(staged)
    }

    fn create_or_update_collection(
        &mut self,
        ctx: &CallContext,
        collection: &str,
        schema: &str,
    ) -> Result<(), StoreError> {
        let staged = self.catalog.stage_update(ctx, collection, schema)?;
        write_schema(&self.root.join(collection), staged.schema())?;
        self.catalog.commit_update(staged);
        Ok(())
    }

    fn describe_collection(&self, ctx: &CallContext, collection: &str) -> Result<String, StoreError> {
        self.catalog.describe_collection(ctx, collection)
    }
}
