//! Merge report: everything that was dropped, flagged or degraded during a merge.
//!
//! The report is an ordered list of [ReportRecord]s, each naming a subject
//! (a sample or a vertex of one of the trees), a [Reason] code and a
//! human-readable detail. It is meant to be printed or persisted by the caller.

use crate::model::VertexIndex;
use std::collections::BTreeSet;
use std::fmt;

/// The tree a vertex index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TreeSide {
    /// Tree whose structure is copied into the output
    Base,
    /// Tree whose exclusive clades are grafted onto the copy
    Other,
    /// Optional tree the output is cross-validated against
    Reference,
    /// The merged tree
    Output,
}

impl fmt::Display for TreeSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TreeSide::Base => "base",
            TreeSide::Other => "other",
            TreeSide::Reference => "reference",
            TreeSide::Output => "output",
        };
        f.write_str(name)
    }
}

/// What a [ReportRecord] is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    Sample(String),
    Vertex { side: TreeSide, index: VertexIndex },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Subject::Sample(label) => write!(f, "sample '{label}'"),
            Subject::Vertex { side, index } => write!(f, "{side} vertex {index}"),
        }
    }
}

/// Reason code of a [ReportRecord].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reason {
    /// Declared shared, but absent from at least one tree
    MissingSharedSample,
    /// Declared twice, or present in both trees without being declared shared
    DuplicateSample,
    /// Two shared samples imply different counterparts for the same vertex
    CorrespondenceConflict,
    /// A corresponding pair failed the consistency check
    ConsistencyFailure,
    /// Grafted under the output root for lack of a confirmed ancestor
    LowConfidenceGraft,
    /// Output disagrees with the reference tree
    ReferenceMismatch,
}

impl Reason {
    /// Returns a short, stable code for this reason.
    pub fn code(&self) -> &'static str {
        match self {
            Reason::MissingSharedSample => "missing",
            Reason::DuplicateSample => "duplicate",
            Reason::CorrespondenceConflict => "conflict",
            Reason::ConsistencyFailure => "inconsistent",
            Reason::LowConfidenceGraft => "low-confidence",
            Reason::ReferenceMismatch => "reference-mismatch",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single entry of a [MergeReport].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub subject: Subject,
    pub reason: Reason,
    pub detail: String,
}

impl fmt::Display for ReportRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.reason, self.subject, self.detail)
    }
}

// =#========================================================================#=
// MERGE REPORT
// =#========================================================================#=
/// Ordered collection of [ReportRecord]s produced by one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    records: Vec<ReportRecord>,
}

impl MergeReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record about a sample.
    pub fn sample(&mut self, label: &str, reason: Reason, detail: String) {
        self.push(ReportRecord {
            subject: Subject::Sample(label.to_string()),
            reason,
            detail,
        });
    }

    /// Appends a record about a vertex.
    pub fn vertex(&mut self, side: TreeSide, index: VertexIndex, reason: Reason, detail: String) {
        self.push(ReportRecord {
            subject: Subject::Vertex { side, index },
            reason,
            detail,
        });
    }

    /// Appends a record.
    pub fn push(&mut self, record: ReportRecord) {
        self.records.push(record);
    }

    /// Returns all records in the order they were produced.
    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    /// Returns the records with the given reason.
    pub fn with_reason(&self, reason: Reason) -> impl Iterator<Item = &ReportRecord> {
        self.records.iter().filter(move |r| r.reason == reason)
    }

    /// Returns the number of records with the given reason.
    pub fn count(&self, reason: Reason) -> usize {
        self.with_reason(reason).count()
    }

    /// Returns the sorted, deduplicated labels of all samples named in a record,
    /// i.e. the samples that were dropped or flagged.
    pub fn unmerged_samples(&self) -> Vec<String> {
        let samples: BTreeSet<&str> = self
            .records
            .iter()
            .filter_map(|r| match &r.subject {
                Subject::Sample(label) => Some(label.as_str()),
                Subject::Vertex { .. } => None,
            })
            .collect();
        samples.into_iter().map(str::to_string).collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Merge report ({} records):", self.records.len())?;
        for record in &self.records {
            writeln!(f, "  {record}")?;
        }
        Ok(())
    }
}
