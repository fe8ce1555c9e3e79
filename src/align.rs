//!
//! Aligner: dynamic programming on the three-state pair HMM
//!
//! * Forward: total probability `P(query, reference)` summed over all alignments
//! * Backward: the same total computed from the end, used by training
//! * Viterbi: the most probable state path
//!
//! # Grid
//!
//! Cell `(i, j)` holds the probability of having emitted `query[..i]` and
//! `reference[..j]` with the last emission made by state M, I or D.
//! `i = 0..=n` (query), `j = 0..=m` (reference). `M(0,0) = 1` is the begin
//! state.
//!
pub mod backward;
pub mod forward;
pub mod result;
pub mod table;
pub mod viterbi;

pub use result::{AlignmentResult, Mode};
pub use table::DPTable;

use crate::common::N_BASES;
use crate::error::{GphmmError, Result, Stage};
use crate::pair::SequencePair;
use crate::params::{ParameterSet, State};
use crate::prob::Prob;
use log::debug;

///
/// Log emission/transition tables specialized for one SequencePair.
///
/// Transitions leaving row `i` use the quality value of the next query base
/// to be emitted, `qv[min(i, n-1)]`.
///
pub struct Scorer<'a> {
    pair: &'a SequencePair,
    query: Vec<usize>,
    reference: Vec<usize>,
    emit_m: [[Prob; N_BASES]; N_BASES],
    emit_i: [Prob; N_BASES],
    emit_d: [Prob; N_BASES],
    trans: Vec<[[Prob; 3]; 3]>,
}

impl<'a> Scorer<'a> {
    pub fn new(pair: &'a SequencePair, params: &ParameterSet) -> Self {
        let query = pair.query_indices();
        let reference = pair.reference_indices();

        let mut emit_m = [[Prob::zero(); N_BASES]; N_BASES];
        let mut emit_i = [Prob::zero(); N_BASES];
        let mut emit_d = [Prob::zero(); N_BASES];
        for x in 0..N_BASES {
            emit_i[x] = params.emission_log_prob(State::Ins, None, Some(x));
            emit_d[x] = params.emission_log_prob(State::Del, Some(x), None);
            for y in 0..N_BASES {
                emit_m[x][y] = params.emission_log_prob(State::Match, Some(x), Some(y));
            }
        }

        let trans = (0..=query.len())
            .map(|i| {
                let t = params.transition_matrix(pair.qv().at(i));
                let mut row = [[Prob::zero(); 3]; 3];
                for from in 0..3 {
                    for to in 0..3 {
                        row[from][to] = Prob::from_prob(t[from][to]);
                    }
                }
                row
            })
            .collect();

        Scorer {
            pair,
            query,
            reference,
            emit_m,
            emit_i,
            emit_d,
            trans,
        }
    }
    pub fn pair(&self) -> &SequencePair {
        self.pair
    }
    /// query length
    pub fn n(&self) -> usize {
        self.query.len()
    }
    /// reference length
    pub fn m(&self) -> usize {
        self.reference.len()
    }
    /// query base index emitted when entering row `i` (`i >= 1`)
    pub fn query_base(&self, i: usize) -> usize {
        self.query[i - 1]
    }
    /// reference base index emitted when entering column `j` (`j >= 1`)
    pub fn reference_base(&self, j: usize) -> usize {
        self.reference[j - 1]
    }
    ///
    /// Emission probability of entering cell `(i, j)` in `state`.
    /// Cells that the state cannot be entered at (e.g. `M(0, j)`) are `p=0`.
    ///
    pub fn emission(&self, state: State, i: usize, j: usize) -> Prob {
        match state {
            State::Match if i > 0 && j > 0 => {
                self.emit_m[self.reference_base(j)][self.query_base(i)]
            }
            State::Ins if i > 0 => self.emit_i[self.query_base(i)],
            State::Del if j > 0 => self.emit_d[self.reference_base(j)],
            _ => Prob::zero(),
        }
    }
    ///
    /// Transition probability `from -> to` leaving a cell in row `i`
    ///
    pub fn transition(&self, i: usize, from: State, to: State) -> Prob {
        self.trans[i][from.index()][to.index()]
    }
}

///
/// Score a SequencePair under a ParameterSet.
///
/// * `Mode::Short`: Forward log-probability only
/// * `Mode::Long`: Forward log-probability plus the Viterbi state path
///
pub fn compute_probability(
    pair: &SequencePair,
    params: &ParameterSet,
    mode: Mode,
) -> Result<AlignmentResult> {
    let scorer = Scorer::new(pair, params);
    let forward = scorer.forward();
    let log_probability = forward.full_prob().to_log_value();
    if log_probability.is_nan() {
        return Err(GphmmError::NumericInstability {
            field: format!("logProbability of `{}`", pair.id()),
            iteration: None,
            stage: Stage::Alignment,
        });
    }
    debug!("{}: forward={}", pair.id(), log_probability);

    match mode {
        Mode::Short => Ok(AlignmentResult::short(log_probability)),
        Mode::Long => {
            let (viterbi, path) = scorer.viterbi();
            Ok(AlignmentResult::long(
                log_probability,
                viterbi.to_log_value(),
                path,
            ))
        }
    }
}

///
/// Validate raw sequences into a SequencePair and score it.
/// Invalid input is reported with `Stage::Alignment`.
///
pub fn score_sequences(
    id: &str,
    query: &[u8],
    reference: &[u8],
    qv: crate::common::Quality,
    params: &ParameterSet,
    mode: Mode,
) -> Result<AlignmentResult> {
    let pair = SequencePair::new(id, query, reference, qv)
        .map_err(|e| e.in_stage(Stage::Alignment))?;
    compute_probability(&pair, params, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Quality;

    fn example_pair() -> SequencePair {
        SequencePair::new("q/r", b"ATGCGATGCA", b"ATGTACGATGA", Quality::Scalar(20)).unwrap()
    }

    #[test]
    fn concrete_example_is_finite_negative_and_reproducible() {
        let params = ParameterSet::default();
        let pair = example_pair();
        let r1 = compute_probability(&pair, &params, Mode::Short).unwrap();
        let r2 = compute_probability(&pair, &params, Mode::Short).unwrap();
        println!("{}", r1);
        assert!(r1.log_probability.is_finite());
        assert!(r1.log_probability < 0.0);
        assert_eq!(r1.log_probability.to_bits(), r2.log_probability.to_bits());
        assert!(r1.state_path.is_none());
    }
    #[test]
    fn long_mode_has_path_covering_both_sequences() {
        let params = ParameterSet::default();
        let pair = example_pair();
        let short = compute_probability(&pair, &params, Mode::Short).unwrap();
        let long = compute_probability(&pair, &params, Mode::Long).unwrap();
        assert_eq!(short.log_probability, long.log_probability);
        let path = long.state_path.as_ref().unwrap();
        let n_query = path.iter().filter(|s| s.consumes_query()).count();
        let n_ref = path.iter().filter(|s| s.consumes_reference()).count();
        assert_eq!(n_query, 10);
        assert_eq!(n_ref, 11);
        // the best single path cannot be more probable than all paths together
        assert!(long.viterbi_log_probability.unwrap() <= long.log_probability + 1e-9);
    }
    #[test]
    fn identical_query_scores_higher_than_substituted() {
        let params = ParameterSet::default();
        let reference = b"ACGTTGCAAGCTTAGCCGATAGGCTAACGT";
        let mut mutated = reference.to_vec();
        for &pos in &[3, 11, 19, 25] {
            mutated[pos] = match mutated[pos] {
                b'A' => b'C',
                b'C' => b'G',
                b'G' => b'T',
                _ => b'A',
            };
        }
        let qv = Quality::Scalar(40);
        let same = score_sequences("same", reference, reference, qv.clone(), &params, Mode::Short)
            .unwrap();
        let diff = score_sequences("diff", &mutated, reference, qv, &params, Mode::Short).unwrap();
        assert!(same.log_probability >= diff.log_probability);
    }
    #[test]
    fn invalid_input_reports_alignment_stage() {
        let params = ParameterSet::default();
        let e = score_sequences("bad", b"ACGX", b"ACGT", Quality::default(), &params, Mode::Short)
            .unwrap_err();
        assert!(matches!(
            e,
            GphmmError::InvalidSequence {
                stage: Stage::Alignment,
                position: 3,
                ..
            }
        ));
        let e = score_sequences("empty", b"ACG", b"", Quality::default(), &params, Mode::Short)
            .unwrap_err();
        assert!(matches!(
            e,
            GphmmError::EmptySequence {
                stage: Stage::Alignment,
                ..
            }
        ));
    }
    #[test]
    fn per_base_quality_changes_score() {
        let params = ParameterSet::default();
        let low = score_sequences(
            "low",
            b"ACGTACGT",
            b"ACGTTACGT",
            Quality::PerBase(vec![5; 8]),
            &params,
            Mode::Short,
        )
        .unwrap();
        let high = score_sequences(
            "high",
            b"ACGTACGT",
            b"ACGTTACGT",
            Quality::PerBase(vec![50; 8]),
            &params,
            Mode::Short,
        )
        .unwrap();
        // a deletion is required, which is more likely at low quality
        assert!(low.log_probability > high.log_probability);
    }
}
