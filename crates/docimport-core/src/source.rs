//! Batched document input
//!
//! Input is either one JSON array of documents or a stream of concatenated /
//! newline-delimited JSON values. Arrays are read whole and chunked; streams
//! are decoded lazily, one batch at a time.

use std::io::{self, BufRead, BufReader, Read};

use serde_json::de::IoRead;
use serde_json::StreamDeserializer;
use thiserror::Error;

use docimport_schema::{RawDocument, RawValue};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("reading input: {0}")]
    Io(#[from] io::Error),

    #[error("parsing documents: {0}")]
    Json(#[from] serde_json::Error),

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,
}

enum Input<'r> {
    Loaded(std::vec::IntoIter<RawDocument>),
    Stream(Box<StreamDeserializer<'r, IoRead<Box<dyn BufRead + 'r>>, RawDocument>>),
    Done,
}

/// Finite, non-restartable sequence of document batches
pub struct DocumentSource<'r> {
    input: Input<'r>,
    batch_size: usize,
}

impl<'r> DocumentSource<'r> {
    pub fn from_reader(reader: impl Read + 'r, batch_size: usize) -> Result<Self, SourceError> {
        check_batch_size(batch_size)?;

        let mut reader: Box<dyn BufRead + 'r> = Box::new(BufReader::new(reader));
        let input = if starts_with_array(&mut reader)? {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            let documents: Vec<RawDocument> = serde_json::from_slice(&buf)?;
            Input::Loaded(documents.into_iter())
        } else {
            Input::Stream(Box::new(
                serde_json::Deserializer::from_reader(reader).into_iter::<RawDocument>(),
            ))
        };

        Ok(Self { input, batch_size })
    }

    /// Each argument holds one document or an array of documents
    pub fn from_args<I, S>(args: I, batch_size: usize) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        check_batch_size(batch_size)?;

        let mut documents = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            if arg.trim_start().starts_with('[') {
                documents.extend(serde_json::from_str::<Vec<RawDocument>>(arg)?);
            } else {
                documents.push(RawValue::from_string(arg.to_string())?);
            }
        }

        Ok(Self {
            input: Input::Loaded(documents.into_iter()),
            batch_size,
        })
    }
}

fn check_batch_size(batch_size: usize) -> Result<(), SourceError> {
    if batch_size == 0 {
        return Err(SourceError::InvalidBatchSize);
    }
    Ok(())
}

/// Skip leading whitespace and report whether the input opens with `[`
fn starts_with_array(reader: &mut dyn BufRead) -> io::Result<bool> {
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(false);
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let is_array = buf[pos] == b'[';
                reader.consume(pos);
                return Ok(is_array);
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    }
}

impl Iterator for DocumentSource<'_> {
    type Item = Result<Vec<RawDocument>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch_size = self.batch_size;

        let (batch, failure) = match &mut self.input {
            Input::Loaded(documents) => (documents.by_ref().take(batch_size).collect::<Vec<_>>(), None),
            Input::Stream(stream) => {
                let mut batch = Vec::with_capacity(batch_size);
                let mut failure = None;
                for document in stream.by_ref().take(batch_size) {
                    match document {
                        Ok(document) => batch.push(document),
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                (batch, failure)
            }
            Input::Done => return None,
        };

        if let Some(err) = failure {
            self.input = Input::Done;
            return Some(Err(err.into()));
        }
        if batch.is_empty() {
            self.input = Input::Done;
            return None;
        }
        Some(Ok(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(source: DocumentSource<'_>) -> Vec<usize> {
        source.map(|batch| batch.unwrap().len()).collect()
    }

    #[test]
    fn test_array_input_is_chunked() {
        let input = r#"  [{"a":1},{"a":2},{"a":3},{"a":4},{"a":5}]"#;
        let source = DocumentSource::from_reader(input.as_bytes(), 2).unwrap();
        assert_eq!(sizes(source), vec![2, 2, 1]);
    }

    #[test]
    fn test_stream_input_is_read_lazily() {
        let input = "{\"a\":1}\n{\"a\":2}\n\n{\"a\":3} {\"a\":4}";
        let mut source = DocumentSource::from_reader(input.as_bytes(), 3).unwrap();

        let first = source.next().unwrap().unwrap();
        assert_eq!(first.iter().map(|d| d.get()).collect::<Vec<_>>(), vec![r#"{"a":1}"#, r#"{"a":2}"#, r#"{"a":3}"#]);
        assert_eq!(source.next().unwrap().unwrap().len(), 1);
        assert!(source.next().is_none());
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(sizes(DocumentSource::from_reader("   \n".as_bytes(), 10).unwrap()).is_empty());
        assert!(sizes(DocumentSource::from_reader("[]".as_bytes(), 10).unwrap()).is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(
            DocumentSource::from_reader("{}".as_bytes(), 0),
            Err(SourceError::InvalidBatchSize)
        ));
        assert!(matches!(
            DocumentSource::from_args(["{}"], 0),
            Err(SourceError::InvalidBatchSize)
        ));
    }

    #[test]
    fn test_malformed_stream_stops() {
        let mut source = DocumentSource::from_reader(r#"{"a":1} {"a":"#.as_bytes(), 1).unwrap();

        assert_eq!(source.next().unwrap().unwrap().len(), 1);
        assert!(matches!(source.next(), Some(Err(SourceError::Json(_)))));
        assert!(source.next().is_none());
    }

    #[test]
    fn test_malformed_array_rejected() {
        assert!(matches!(
            DocumentSource::from_reader(r#"[{"a":1},"#.as_bytes(), 1),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn test_args_mix_documents_and_arrays() {
        let args = [r#"{"a":1}"#, r#" [{"a":2},{"a":3}]"#, r#"{"a":4}"#];
        let source = DocumentSource::from_args(args, 3).unwrap();
        assert_eq!(sizes(source), vec![3, 1]);
    }

    #[test]
    fn test_large_numbers_kept_verbatim() {
        let mut source = DocumentSource::from_reader(r#"{"n":123456789012345678901234567890}"#.as_bytes(), 1).unwrap();
        assert_eq!(source.next().unwrap().unwrap()[0].get(), r#"{"n":123456789012345678901234567890}"#);
    }
}
