//!
//! AlignmentResult definitions
//!
use crate::params::State;
use std::str::FromStr;

///
/// Output mode of `compute_probability`
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// log-probability only
    Short,
    /// log-probability and the Viterbi state path
    Long,
}

impl FromStr for Mode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(Mode::Short),
            "long" => Ok(Mode::Long),
            _ => Err(format!("unknown mode `{}` (expected short or long)", s)),
        }
    }
}

///
/// Result of scoring one SequencePair
///
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentResult {
    ///
    /// Forward log-probability (natural log, `<= 0`)
    ///
    pub log_probability: f64,
    ///
    /// log-probability of the single Viterbi path (long mode only)
    ///
    pub viterbi_log_probability: Option<f64>,
    ///
    /// Viterbi state path, one label per alignment column (long mode only)
    ///
    pub state_path: Option<Vec<State>>,
}

impl AlignmentResult {
    pub fn short(log_probability: f64) -> Self {
        AlignmentResult {
            log_probability,
            viterbi_log_probability: None,
            state_path: None,
        }
    }
    pub fn long(log_probability: f64, viterbi_log_probability: f64, path: Vec<State>) -> Self {
        AlignmentResult {
            log_probability,
            viterbi_log_probability: Some(viterbi_log_probability),
            state_path: Some(path),
        }
    }
    ///
    /// State path as a string of `M`, `I`, `D`
    ///
    pub fn path_string(&self) -> Option<String> {
        self.state_path
            .as_ref()
            .map(|path| path.iter().map(|s| s.to_string()).collect())
    }
}

impl std::fmt::Display for AlignmentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.log_probability)?;
        if let Some(path) = self.path_string() {
            write!(f, "\t{}", path)?;
        }
        Ok(())
    }
}
