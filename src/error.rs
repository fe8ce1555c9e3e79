//!
//! Error types of gphmm
//!
use thiserror::Error;

///
/// The step of the computation in which an error surfaced.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// reading records at the I/O boundary
    Input,
    /// `compute_probability` (Forward / Viterbi)
    Alignment,
    /// expected-count computation of training
    EStep,
    /// parameter re-estimation of training
    MStep,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Stage::Input => write!(f, "input"),
            Stage::Alignment => write!(f, "alignment"),
            Stage::EStep => write!(f, "E-step"),
            Stage::MStep => write!(f, "M-step"),
        }
    }
}

/// Unified error type of gphmm operations.
#[derive(Debug, Error)]
pub enum GphmmError {
    /// a sequence contains a character outside `ACGT`
    #[error("[{stage}] record `{record}`: invalid base `{base}` at position {position}")]
    InvalidSequence {
        record: String,
        stage: Stage,
        position: usize,
        base: char,
    },

    /// the query or the reference is empty
    #[error("[{stage}] record `{record}`: empty {which} sequence")]
    EmptySequence {
        record: String,
        stage: Stage,
        which: &'static str,
    },

    /// per-base quality values do not match the query
    #[error("[{stage}] record `{record}`: {reason}")]
    InvalidQuality {
        record: String,
        stage: Stage,
        reason: String,
    },

    /// a probability table is not stochastic
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    /// an id in the pairs table is absent from the sequence collection
    #[error("[{stage}] record `{id}` referenced in the pairs table is missing from the sequences")]
    MissingRecord { id: String, stage: Stage },

    /// a non-finite value appeared while scoring or training.
    /// `iteration` is set for faults inside the EM loop.
    #[error("[{stage}] {}non-finite value in `{field}`", iteration_label(.iteration))]
    NumericInstability {
        field: String,
        iteration: Option<usize>,
        stage: Stage,
    },

    /// scoring results do not line up with the rows of the pairs table
    #[error("{rows} rows in the pairs table but {results} scoring results")]
    ResultCountMismatch { rows: usize, results: usize },

    /// the worker pool could not be created
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// malformed JSON artifact
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// malformed tabular input
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

fn iteration_label(iteration: &Option<usize>) -> String {
    match iteration {
        Some(k) => format!("iteration {}: ", k),
        None => String::new(),
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GphmmError>;

impl GphmmError {
    ///
    /// Re-label a record-level error with the stage it surfaced in.
    /// Errors that are not tied to a record are returned unchanged.
    ///
    pub fn in_stage(self, new_stage: Stage) -> Self {
        match self {
            GphmmError::InvalidSequence {
                record,
                position,
                base,
                ..
            } => GphmmError::InvalidSequence {
                record,
                stage: new_stage,
                position,
                base,
            },
            GphmmError::EmptySequence { record, which, .. } => GphmmError::EmptySequence {
                record,
                stage: new_stage,
                which,
            },
            GphmmError::InvalidQuality { record, reason, .. } => GphmmError::InvalidQuality {
                record,
                stage: new_stage,
                reason,
            },
            other => other,
        }
    }
}
