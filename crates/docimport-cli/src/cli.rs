//! Command-line surface of the `docimport` binary

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use docimport_core::ImportOptions;

#[derive(Parser, Debug)]
#[command(name = "docimport")]
#[command(about = "Infer schemas from JSON documents and import them into collections", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = "docimport.yaml")]
    pub config: PathBuf,

    /// Directory holding the collections
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import documents into a collection
    ///
    /// Detects the schema of the documents, creates the collection with it
    /// and evolves the schema as long as the change is backward compatible.
    Import(ImportArgs),

    /// Print the schema inferred from documents without touching the store
    Infer(InferArgs),

    /// Print the schema of a stored collection
    Describe(DescribeArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub collection: String,

    /// Documents or arrays of documents; `-` or nothing reads stdin
    pub documents: Vec<String>,

    /// Add documents to a collection that already exists
    #[arg(short, long)]
    pub append: bool,

    /// Do not create the collection if it doesn't exist
    #[arg(long)]
    pub no_create_collection: bool,

    /// Remove null values and empty arrays when the store rejects a batch
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub cleanup_null_values: Option<bool>,

    /// Deadline for every store call, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub inference: InferenceArgs,
}

impl ImportArgs {
    /// Layer the flags over the configured defaults
    pub fn options(&self, defaults: &ImportOptions) -> ImportOptions {
        let mut options = self.inference.apply(defaults.clone());
        options.append |= self.append;
        if self.no_create_collection {
            options.auto_create = false;
        }
        if let Some(cleanup) = self.cleanup_null_values {
            options.cleanup_null_values = cleanup;
        }
        if let Some(millis) = self.timeout_ms {
            options.call_timeout = Some(Duration::from_millis(millis));
        }
        options
    }
}

#[derive(Args, Debug)]
pub struct InferArgs {
    /// Schema title
    pub name: String,

    /// Documents or arrays of documents; `-` or nothing reads stdin
    pub documents: Vec<String>,

    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub inference: InferenceArgs,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    pub collection: String,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Documents per batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InferenceArgs {
    /// Documents examined per batch to detect field types; 0 means the whole batch
    #[arg(short = 'd', long)]
    pub inference_depth: Option<usize>,

    /// Comma separated top-level fields forming the primary key
    #[arg(long, value_delimiter = ',')]
    pub primary_key: Vec<String>,

    /// Comma separated top-level fields generated by the store
    #[arg(long, value_delimiter = ',')]
    pub autogenerate: Vec<String>,

    /// Detect RFC 3339 timestamps
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub detect_times: Option<bool>,

    /// Detect UUID strings
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub detect_uuids: Option<bool>,

    /// Detect base64 encoded byte strings
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub detect_byte_arrays: Option<bool>,

    /// Tell integers apart from floating point numbers
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub detect_integers: Option<bool>,
}

impl InferenceArgs {
    pub fn apply(&self, mut options: ImportOptions) -> ImportOptions {
        if let Some(depth) = self.inference_depth {
            options.inference_depth = depth;
        }
        if !self.primary_key.is_empty() {
            options.primary_key = self.primary_key.clone();
        }
        if !self.autogenerate.is_empty() {
            options.auto_generate = self.autogenerate.clone();
        }

        let detection = &mut options.detection;
        for (flag, switch) in [
            (self.detect_times, &mut detection.times),
            (self.detect_uuids, &mut detection.uuids),
            (self.detect_byte_arrays, &mut detection.byte_arrays),
            (self.detect_integers, &mut detection.integers),
        ] {
            if let Some(enabled) = flag {
                *switch = enabled;
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import_args(argv: &[&str]) -> ImportArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Import(args) => args,
            other => panic!("expected import, got {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = import_args(&[
            "docimport",
            "import",
            "users",
            r#"{"id":1}"#,
            "--append",
            "--no-create-collection",
            "--cleanup-null-values=false",
            "--primary-key=id,region",
            "--autogenerate",
            "created",
            "-d",
            "5",
            "--detect-byte-arrays=false",
            "--timeout-ms",
            "250",
        ]);
        let options = args.options(&ImportOptions::default());

        assert_eq!(args.documents, vec![r#"{"id":1}"#.to_string()]);
        assert!(options.append);
        assert!(!options.auto_create);
        assert!(!options.cleanup_null_values);
        assert_eq!(options.primary_key, vec!["id".to_string(), "region".to_string()]);
        assert_eq!(options.auto_generate, vec!["created".to_string()]);
        assert_eq!(options.inference_depth, 5);
        assert!(!options.detection.byte_arrays);
        assert!(options.detection.uuids);
        assert_eq!(options.call_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_absent_flags_keep_defaults() {
        let args = import_args(&["docimport", "import", "users", "-"]);
        let defaults = ImportOptions {
            inference_depth: 9,
            cleanup_null_values: false,
            ..ImportOptions::default()
        };

        assert_eq!(args.options(&defaults), defaults);
        assert_eq!(args.batch.batch_size, None);
    }

    #[test]
    fn test_bare_switch_enables() {
        let args = import_args(&["docimport", "import", "users", "--detect-times", "--cleanup-null-values"]);
        assert_eq!(args.inference.detect_times, Some(true));
        assert_eq!(args.cleanup_null_values, Some(true));
        assert!(args.documents.is_empty());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["docimport", "describe", "users", "--store", "/data", "--config", "x.yaml"]).unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/data")));
        assert_eq!(cli.config, PathBuf::from("x.yaml"));
    }
}
