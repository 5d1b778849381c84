//! Index descriptors and the per-document build report.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::embedding::{DistanceMetric, EmbeddingSpace};
use crate::error::IndexError;
use crate::listener::ListenerInfo;

/// What happened to one document when a listener processed it.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// A vector was written to the store.
    Indexed,
    /// The listener was inactive, or the build was cancelled before the
    /// document's batch started.
    Skipped,
    /// The document was not written. The store is unchanged for it.
    Failed(IndexError),
}

/// Coarse classification of a per-document failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MissingField,
    DimensionMismatch,
    Embedding,
    Other,
}

impl From<&IndexError> for FailureKind {
    fn from(err: &IndexError) -> Self {
        match err {
            IndexError::MissingField { .. } => FailureKind::MissingField,
            IndexError::DimensionMismatch { .. } => FailureKind::DimensionMismatch,
            IndexError::Embedding(_) => FailureKind::Embedding,
            _ => FailureKind::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MissingField => write!(f, "missing_field"),
            FailureKind::DimensionMismatch => write!(f, "dimension_mismatch"),
            FailureKind::Embedding => write!(f, "embedding"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}

/// A document that could not be indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub document_id: DocumentId,
    pub kind: FailureKind,
    pub message: String,
}

/// Accumulated outcome of a build, backfill or incremental apply.
///
/// Per-document failures are collected here instead of aborting the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub succeeded: Vec<DocumentId>,
    pub failures: Vec<DocumentFailure>,
    /// Documents not processed (inactive listener or cancelled build).
    pub skipped: usize,
    /// Documents whose vectors were removed from the store.
    pub removed: usize,
    /// True if the build stopped early on a cancellation request.
    pub cancelled: bool,
}

impl BuildReport {
    /// Record the outcome for one document.
    pub fn record(&mut self, document_id: DocumentId, outcome: DocumentOutcome) {
        match outcome {
            DocumentOutcome::Indexed => self.succeeded.push(document_id),
            DocumentOutcome::Skipped => self.skipped += 1,
            DocumentOutcome::Failed(err) => self.failures.push(DocumentFailure {
                document_id,
                kind: FailureKind::from(&err),
                message: err.to_string(),
            }),
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: BuildReport) {
        self.succeeded.extend(other.succeeded);
        self.failures.extend(other.failures);
        self.skipped += other.skipped;
        self.removed += other.removed;
        self.cancelled |= other.cancelled;
    }

    /// Sort ids so reports from concurrent batches compare deterministically.
    pub fn sort(&mut self) {
        self.succeeded.sort();
        self.failures
            .sort_by(|a, b| a.document_id.cmp(&b.document_id));
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of failures of one kind.
    pub fn count_kind(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

/// Read-only description of a vector index, for status output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub primary: ListenerInfo,
    pub compatible: Vec<ListenerInfo>,
    pub space: EmbeddingSpace,
    pub metric: DistanceMetric,
    pub vector_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_records_each_outcome() {
        let mut report = BuildReport::default();
        report.record("a".into(), DocumentOutcome::Indexed);
        report.record("b".into(), DocumentOutcome::Skipped);
        report.record(
            "c".into(),
            DocumentOutcome::Failed(IndexError::MissingField {
                document_id: "c".into(),
                key: "image".to_string(),
            }),
        );

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.count_kind(FailureKind::MissingField), 1);
        assert_eq!(report.failures[0].message, "document 'c' has no field 'image'");
    }

    #[test]
    fn test_merge_and_sort() {
        let mut left = BuildReport::default();
        left.record("z".into(), DocumentOutcome::Indexed);
        let mut right = BuildReport {
            cancelled: true,
            removed: 2,
            ..Default::default()
        };
        right.record("a".into(), DocumentOutcome::Indexed);

        left.merge(right);
        left.sort();

        assert_eq!(left.succeeded, vec![DocumentId::from("a"), DocumentId::from("z")]);
        assert_eq!(left.removed, 2);
        assert!(left.cancelled);
    }

    #[test]
    fn test_failure_kind_serde() {
        let json = serde_json::to_string(&FailureKind::DimensionMismatch).unwrap();
        assert_eq!(json, "\"dimension_mismatch\"");
    }
}
