//! Size-adaptive sub-batch submission
//!
//! A batch is submitted through a sliding window. When the operation reports a
//! size limit the window is halved and retried; after a success the window
//! keeps the size that worked and moves on.

use thiserror::Error;
use tracing::{debug, error};

use docimport_store::StoreError;

/// Errors that can tell a size-limit rejection apart from other failures
pub trait SizeLimited {
    fn is_size_limit(&self) -> bool;
}

impl SizeLimited for StoreError {
    fn is_size_limit(&self) -> bool {
        StoreError::is_size_limit(self)
    }
}

#[derive(Debug, Error)]
pub enum SubmitError<E> {
    #[error("documents at offset {offset} ({len} in window) rejected: {source}")]
    Rejected {
        offset: usize,
        len: usize,
        #[source]
        source: E,
    },

    #[error("not all documents processed: processed {processed}, expected {expected}")]
    ProcessedCountMismatch { processed: usize, expected: usize },
}

impl<E> SubmitError<E> {
    /// Internal accounting faults; never retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, SubmitError::ProcessedCountMismatch { .. })
    }

    /// The underlying operation error, if any
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            SubmitError::Rejected { source, .. } => Some(source),
            SubmitError::ProcessedCountMismatch { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// Documents accepted by the operation
    pub submitted: usize,
    /// Operation calls made, failed ones included
    pub windows: usize,
    /// Times the window was halved
    pub splits: usize,
    /// Window size in effect at the end
    pub working_size: usize,
}

/// Submit `batch` through `operation`, halving the window on size-limit
/// failures
///
/// Order is preserved and no empty window is ever submitted. A failure that
/// is not a size limit, or a size limit on a single document, is returned
/// with the offending window.
pub fn submit_adaptive<T, E, F>(batch: &[T], mut operation: F) -> Result<SubmitReport, SubmitError<E>>
where
    E: SizeLimited,
    F: FnMut(&[T]) -> Result<(), E>,
{
    let mut report = SubmitReport {
        working_size: batch.len(),
        ..SubmitReport::default()
    };

    let mut first = 0;
    let mut last = batch.len();

    while first < batch.len() {
        report.windows += 1;

        match operation(&batch[first..last]) {
            Ok(()) => {
                let size = last - first;
                debug!(first, last, len = batch.len(), "window submitted");

                report.submitted += size;
                report.working_size = size;
                first = last;
                last = (first + size).min(batch.len());
            }
            Err(err) if err.is_size_limit() && last - first > 1 => {
                last = first + (last - first) / 2;
                report.splits += 1;
                debug!(first, last, len = batch.len(), "size limit hit, reducing window");
            }
            Err(source) => {
                let len = last - first;
                if len == 1 {
                    debug!(offset = first, "single document rejected");
                }
                return Err(SubmitError::Rejected {
                    offset: first,
                    len,
                    source,
                });
            }
        }
    }

    if report.submitted != batch.len() {
        error!(
            processed = report.submitted,
            expected = batch.len(),
            "not all documents processed"
        );
        return Err(SubmitError::ProcessedCountMismatch {
            processed: report.submitted,
            expected: batch.len(),
        });
    }

    Ok(report)
}
