//!
//! SequencePair: the (query, reference, quality) input of one alignment
//!
use crate::common::{base_to_index, sequence_to_string, Quality, Sequence};
use crate::error::{GphmmError, Result, Stage};

///
/// A validated pair of a noisy query read and its reference.
///
/// Bases are upper-cased on construction, so `query()` and `reference()`
/// only contain `ACGT`.
///
#[derive(Clone, Debug, PartialEq)]
pub struct SequencePair {
    id: String,
    query: Sequence,
    reference: Sequence,
    qv: Quality,
}

impl SequencePair {
    ///
    /// Validate and construct a pair.
    ///
    /// * `EmptySequence` if either sequence is empty
    /// * `InvalidSequence` at the first non-ACGT character
    /// * `InvalidQuality` if a per-base quality vector has the wrong length
    ///
    /// Errors are labeled with `Stage::Input`; callers re-label them with
    /// `GphmmError::in_stage`.
    ///
    pub fn new<S: Into<String>>(
        id: S,
        query: &[u8],
        reference: &[u8],
        qv: Quality,
    ) -> Result<SequencePair> {
        let id = id.into();
        let query = normalize(&id, "query", query)?;
        let reference = normalize(&id, "reference", reference)?;
        if let Quality::PerBase(qvs) = &qv {
            if qvs.len() != query.len() {
                return Err(GphmmError::InvalidQuality {
                    record: id,
                    stage: Stage::Input,
                    reason: format!(
                        "{} quality values for a query of length {}",
                        qvs.len(),
                        query.len()
                    ),
                });
            }
        }
        Ok(SequencePair {
            id,
            query,
            reference,
            qv,
        })
    }
    ///
    /// Pair with the default quality value (20)
    ///
    pub fn with_default_qv<S: Into<String>>(
        id: S,
        query: &[u8],
        reference: &[u8],
    ) -> Result<SequencePair> {
        SequencePair::new(id, query, reference, Quality::default())
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn query(&self) -> &[u8] {
        &self.query
    }
    pub fn reference(&self) -> &[u8] {
        &self.reference
    }
    pub fn qv(&self) -> &Quality {
        &self.qv
    }
    /// query as base indices (`A=0, C=1, G=2, T=3`)
    pub fn query_indices(&self) -> Vec<usize> {
        to_indices(&self.query)
    }
    /// reference as base indices (`A=0, C=1, G=2, T=3`)
    pub fn reference_indices(&self) -> Vec<usize> {
        to_indices(&self.reference)
    }
}

impl std::fmt::Display for SequencePair {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "id: {}", self.id)?;
        writeln!(f, "query: {}", sequence_to_string(&self.query))?;
        writeln!(f, "reference: {}", sequence_to_string(&self.reference))?;
        write!(f, "qv: {}", self.qv)
    }
}

fn normalize(id: &str, which: &'static str, seq: &[u8]) -> Result<Sequence> {
    if seq.is_empty() {
        return Err(GphmmError::EmptySequence {
            record: id.to_owned(),
            stage: Stage::Input,
            which,
        });
    }
    seq.iter()
        .enumerate()
        .map(|(position, &base)| {
            base_to_index(base)
                .map(|_| base.to_ascii_uppercase())
                .ok_or_else(|| GphmmError::InvalidSequence {
                    record: id.to_owned(),
                    stage: Stage::Input,
                    position,
                    base: base as char,
                })
        })
        .collect()
}

fn to_indices(seq: &[u8]) -> Vec<usize> {
    // bases were validated on construction
    seq.iter().filter_map(|&b| base_to_index(b)).collect()
}
