//!
//! Sequence and alphabet definitions shared by every module
//!

/// Type of DNA sequence (bytes over `ACGT`)
pub type Sequence = Vec<u8>;

/// Quality value (Phred-like score) of a single base.
pub type Qv = u8;

/// Quality value assumed when a record does not carry one.
pub const DEFAULT_QV: Qv = 20;

/// Number of symbols in the alphabet.
pub const N_BASES: usize = 4;

///
/// Array of valid DNA bases, in the fixed `A, C, G, T` order used to
/// label every table in the model.
///
pub const VALID_BASES: [u8; N_BASES] = [b'A', b'C', b'G', b'T'];

/// Convert Sequence(Vec<u8>) into str
/// useful in displaying
pub fn sequence_to_string(seq: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(seq)
}

///
/// Index of a base in `VALID_BASES`. Lowercase bases are accepted.
///
pub fn base_to_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

///
/// Inverse of `base_to_index`
///
pub fn index_to_base(index: usize) -> u8 {
    VALID_BASES[index]
}

///
/// Quality values attached to a query read.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Quality {
    /// one value shared by all bases
    Scalar(Qv),
    /// one value per query base
    PerBase(Vec<Qv>),
}

impl Quality {
    ///
    /// Quality value of the `i`-th base (0-origin).
    /// Positions past the end reuse the last value.
    ///
    pub fn at(&self, i: usize) -> Qv {
        match self {
            Quality::Scalar(qv) => *qv,
            Quality::PerBase(qvs) => match qvs.get(i) {
                Some(&qv) => qv,
                None => qvs.last().copied().unwrap_or(DEFAULT_QV),
            },
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality::Scalar(DEFAULT_QV)
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Quality::Scalar(qv) => write!(f, "{}", qv),
            Quality::PerBase(qvs) => {
                let s: Vec<String> = qvs.iter().map(|qv| qv.to_string()).collect();
                write!(f, "{}", s.join(","))
            }
        }
    }
}
