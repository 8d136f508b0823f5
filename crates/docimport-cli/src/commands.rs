//! Command handlers

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use tracing::info;

use docimport_core::{DocumentSource, Importer};
use docimport_schema::{infer, InferenceOptions, Schema};
use docimport_store::{CallContext, CollectionStore, DirStore};

use crate::cli::{DescribeArgs, ImportArgs, InferArgs};
use crate::config::Config;

pub fn handle_import(config: &Config, args: ImportArgs) -> Result<()> {
    let options = args.options(&config.import.options);
    let batch_size = args.batch.batch_size.unwrap_or(config.import.batch_size);
    let source = open_source(&args.documents, batch_size)?;

    let mut store = open_store(config)?;
    let ctx = CallContext::background();

    let mut importer = Importer::open(&mut store, &ctx, args.collection.as_str(), options)?;
    let summary = importer.import_all(&ctx, source)?;

    info!(
        collection = args.collection.as_str(),
        batches = summary.batches,
        documents = summary.documents,
        evolutions = summary.evolutions,
        cleanups = summary.cleanups,
        "documents imported"
    );
    Ok(())
}

pub fn handle_infer(config: &Config, args: InferArgs) -> Result<()> {
    let options = args.inference.apply(config.import.options.clone());
    let batch_size = args.batch.batch_size.unwrap_or(config.import.batch_size);
    let source = open_source(&args.documents, batch_size)?;

    let inference = InferenceOptions {
        primary_key: options.primary_key,
        auto_generate: options.auto_generate,
        depth: options.inference_depth,
        detection: options.detection,
    };

    let mut schema = Schema::new(args.name.as_str());
    for batch in source {
        infer(&mut schema, &args.name, &batch?, &inference).context("infer schema")?;
    }

    println!("{}", schema.to_json_pretty()?);
    Ok(())
}

pub fn handle_describe(config: &Config, args: DescribeArgs) -> Result<()> {
    let store = open_store(config)?;
    let ctx = match config.import.options.call_timeout {
        Some(timeout) => CallContext::with_timeout(timeout),
        None => CallContext::background(),
    };

    let json = store
        .describe_collection(&ctx, &args.collection)
        .context("describe collection")?;
    let schema = Schema::from_json(&json)?;

    println!("{}", schema.to_json_pretty()?);
    Ok(())
}

fn open_store(config: &Config) -> Result<DirStore> {
    DirStore::open(&config.store.path, config.store.limits)
        .with_context(|| format!("open store at {}", config.store.path.display()))
}

/// Documents from the arguments, or from stdin when none are given or the
/// first one is `-`
fn open_source(documents: &[String], batch_size: usize) -> Result<DocumentSource<'static>> {
    match documents.first() {
        Some(first) if first != "-" => Ok(DocumentSource::from_args(documents, batch_size)?),
        _ => {
            let stdin = std::io::stdin();
            if documents.is_empty() && stdin.is_terminal() {
                bail!("not enough arguments: pass documents or pipe them to stdin");
            }
            Ok(DocumentSource::from_reader(stdin.lock(), batch_size)?)
        }
    }
}
