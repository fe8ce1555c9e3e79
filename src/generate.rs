//!
//! Generator: random reference sequences and simulated noisy reads
//!
//! Reads are sampled from the same transition/emission model that the
//! Aligner scores, so generated pairs serve both as training data and as a
//! check of the Aligner.
//!
pub mod picker;

use crate::common::{base_to_index, sequence_to_string, Quality, Sequence, N_BASES, VALID_BASES};
use crate::error::{GphmmError, Result, Stage};
use crate::pair::SequencePair;
use crate::params::{ParameterSet, State};
use log::debug;
use picker::{pick_base, pick_with_prob};
use rand::prelude::*;
use rand_distr::Normal;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Redraws allowed per reference before giving up on a non-empty read
const MAX_REDRAWS: usize = 1000;

///
/// Generate `n` random sequences.
///
/// * length: `max(1, round(Normal(mean_len, sd_len)))`
/// * bases: iid from `base_distribution` over `ACGT` (uniform if `None`)
///
/// All draws come from one `Xoshiro256PlusPlus` seeded with `seed`.
///
pub fn generate_random_sequences(
    n: usize,
    mean_len: f64,
    sd_len: f64,
    base_distribution: Option<&[f64; N_BASES]>,
    seed: u64,
) -> Result<Vec<Sequence>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let normal = Normal::new(mean_len, sd_len).map_err(|e| GphmmError::InvalidParameter {
        field: "sdLen".to_owned(),
        reason: e.to_string(),
    })?;
    let uniform = [0.25; N_BASES];
    let dist = base_distribution.unwrap_or(&uniform);

    let mut seqs = Vec::with_capacity(n);
    for _ in 0..n {
        let length = normal.sample(&mut rng).round().max(1.0) as usize;
        let seq = (0..length)
            .map(|_| pick_base(&mut rng, dist, "baseDistribution"))
            .collect::<Result<Sequence>>()?;
        seqs.push(seq);
    }
    Ok(seqs)
}

///
/// Struct for storing a sampled read and the state path that emitted it
///
#[derive(Clone, Debug, PartialEq)]
pub struct SampledRead {
    pub read: Sequence,
    pub path: Vec<State>,
}

impl SampledRead {
    /// `(i, j)` grid cells entered by Match states along the path
    pub fn match_cells(&self) -> Vec<(usize, usize)> {
        path_match_cells(&self.path)
    }
}

impl std::fmt::Display for SampledRead {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let path: String = self.path.iter().map(|s| s.to_string()).collect();
        write!(f, "{}\t{}", sequence_to_string(&self.read), path)
    }
}

///
/// Convert a state path into the `(i, j)` cells of its Match states
///
pub fn path_match_cells(path: &[State]) -> Vec<(usize, usize)> {
    let (mut i, mut j) = (0, 0);
    let mut cells = Vec::new();
    for &state in path {
        if state.consumes_query() {
            i += 1;
        }
        if state.consumes_reference() {
            j += 1;
        }
        if state == State::Match {
            cells.push((i, j));
        }
    }
    cells
}

///
/// Simulate one noisy read of `true_sequence`.
///
/// The walk starts in the begin state (Match at `(0, 0)`). While reference
/// bases remain, the next state is drawn from the transition row at the
/// quality of the next query base:
///
/// * M: emits a query base from `pp[ref]` and consumes the reference base
/// * I: emits a query base from `q_x`
/// * D: consumes the reference base
///
/// After the reference is exhausted, the walk continues with I with
/// probability `t(s, I)` and otherwise terminates.
///
pub fn generate_read(
    true_sequence: &[u8],
    params: &ParameterSet,
    qv: &Quality,
    seed: u64,
) -> Result<SampledRead> {
    let reference: Vec<usize> = true_sequence
        .iter()
        .enumerate()
        .map(|(position, &base)| {
            base_to_index(base).ok_or(GphmmError::InvalidSequence {
                record: "trueSequence".to_owned(),
                stage: Stage::Input,
                position,
                base: base as char,
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut read = Sequence::new();
    let mut path = Vec::new();
    let mut state = State::Match;
    let mut j = 0;

    loop {
        let t = params.transition_matrix(qv.at(read.len()))[state.index()];
        let next = if j < reference.len() {
            let choices = [
                (State::Match, t[0]),
                (State::Ins, t[1]),
                (State::Del, t[2]),
            ];
            pick_with_prob(&mut rng, &choices, "transition")?
        } else if rng.gen::<f64>() < t[State::Ins.index()] {
            State::Ins
        } else {
            break;
        };

        match next {
            State::Match => {
                let r = reference[j];
                read.push(pick_base(&mut rng, &params.pp()[r], "pp")?);
                j += 1;
            }
            State::Ins => read.push(pick_base(&mut rng, params.q_x(), "qX")?),
            State::Del => j += 1,
        }
        path.push(next);
        state = next;
    }
    Ok(SampledRead { read, path })
}

///
/// Generate `n` training pairs: random references and one simulated read
/// of each.
///
/// Reads are sampled with seeds `seed + 1, seed + 2, ...` in order; a read
/// that came out empty is redrawn with the next seed. Per-base quality is
/// resized to the length of the read.
///
pub fn generate_training_pairs(
    n: usize,
    mean_len: f64,
    sd_len: f64,
    params: &ParameterSet,
    qv: &Quality,
    seed: u64,
) -> Result<Vec<SequencePair>> {
    let references = generate_random_sequences(n, mean_len, sd_len, None, seed)?;
    let mut next_seed = seed;
    let mut pairs = Vec::with_capacity(n);
    for (k, reference) in references.iter().enumerate() {
        let id = format!("read{}/ref{}", k, k);
        let mut sampled = None;
        for _ in 0..MAX_REDRAWS {
            next_seed = next_seed.wrapping_add(1);
            let s = generate_read(reference, params, qv, next_seed)?;
            if !s.read.is_empty() {
                sampled = Some(s);
                break;
            }
            debug!("{}: empty read with seed {}, redrawing", id, next_seed);
        }
        let sampled = sampled.ok_or(GphmmError::EmptySequence {
            record: id.clone(),
            stage: Stage::Input,
            which: "query",
        })?;
        let pair_qv = match qv {
            Quality::Scalar(q) => Quality::Scalar(*q),
            Quality::PerBase(_) => Quality::PerBase((0..sampled.read.len()).map(|i| qv.at(i)).collect()),
        };
        pairs.push(SequencePair::new(id, &sampled.read, reference, pair_qv)?);
    }
    Ok(pairs)
}

///
/// Reference base marginal of a set of sequences, usable as
/// `base_distribution` of `generate_random_sequences`.
///
pub fn base_composition(seqs: &[Sequence]) -> [f64; N_BASES] {
    let mut counts = [0.0; N_BASES];
    for base in seqs.iter().flatten() {
        if let Some(x) = base_to_index(*base) {
            counts[x] += 1.0;
        }
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
        counts
    } else {
        [1.0 / VALID_BASES.len() as f64; N_BASES]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{compute_probability, Mode};

    #[test]
    fn random_sequences_are_deterministic() {
        let a = generate_random_sequences(10, 50.0, 10.0, None, 0).unwrap();
        let b = generate_random_sequences(10, 50.0, 10.0, None, 0).unwrap();
        let c = generate_random_sequences(10, 50.0, 10.0, None, 1).unwrap();
        for s in a.iter() {
            println!("{}", sequence_to_string(s));
        }
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|s| !s.is_empty()));
    }
    #[test]
    fn random_sequences_lengths_and_bases() {
        // zero deviation gives exact lengths
        let seqs = generate_random_sequences(5, 30.0, 0.0, None, 3).unwrap();
        assert!(seqs.iter().all(|s| s.len() == 30));
        // lengths are floored at 1
        let seqs = generate_random_sequences(20, -5.0, 1.0, None, 3).unwrap();
        assert!(seqs.iter().all(|s| s.len() == 1));
        // base distribution is followed
        let seqs = generate_random_sequences(3, 40.0, 0.0, Some(&[0.0, 0.0, 0.0, 1.0]), 3).unwrap();
        assert!(seqs.iter().flatten().all(|&b| b == b'T'));
        let comp = base_composition(&seqs);
        assert_eq!(comp, [0.0, 0.0, 0.0, 1.0]);
    }
    #[test]
    fn random_sequences_reject_bad_inputs() {
        assert!(generate_random_sequences(3, 40.0, -1.0, None, 0).is_err());
        assert!(generate_random_sequences(3, 40.0, 1.0, Some(&[0.0; 4]), 0).is_err());
    }
    #[test]
    fn read_path_is_consistent_with_sequences() {
        let params = ParameterSet::uniform(0.1).unwrap();
        let reference = generate_random_sequences(1, 200.0, 0.0, None, 5)
            .unwrap()
            .remove(0);
        let sampled = generate_read(&reference, &params, &Quality::default(), 7).unwrap();
        let n_query = sampled.path.iter().filter(|s| s.consumes_query()).count();
        let n_ref = sampled.path.iter().filter(|s| s.consumes_reference()).count();
        assert_eq!(n_query, sampled.read.len());
        assert_eq!(n_ref, reference.len());
        // no I-D or D-I steps
        for w in sampled.path.windows(2) {
            assert!(!matches!(
                (w[0], w[1]),
                (State::Ins, State::Del) | (State::Del, State::Ins)
            ));
        }
        let again = generate_read(&reference, &params, &Quality::default(), 7).unwrap();
        assert_eq!(sampled, again);
    }
    #[test]
    fn read_of_clean_model_is_close_to_reference() {
        let params = ParameterSet::uniform(0.001).unwrap();
        let reference = b"ACGTTGCAAGCTTAGCCGATAGGCTAACGT";
        let sampled = generate_read(reference, &params, &Quality::Scalar(40), 0).unwrap();
        let n_match = sampled.path.iter().filter(|&&s| s == State::Match).count();
        assert!(n_match >= 27);
    }
    #[test]
    fn invalid_true_sequence_is_rejected() {
        let e = generate_read(b"ACGN", &ParameterSet::default(), &Quality::default(), 0).unwrap_err();
        assert!(matches!(e, GphmmError::InvalidSequence { position: 3, .. }));
    }
    #[test]
    fn viterbi_recovers_sampled_path() {
        let params = ParameterSet::uniform(0.02).unwrap();
        let references = generate_random_sequences(5, 150.0, 10.0, None, 11).unwrap();
        for (k, reference) in references.iter().enumerate() {
            let sampled = generate_read(reference, &params, &Quality::default(), 100 + k as u64)
                .unwrap();
            if sampled.read.is_empty() {
                continue;
            }
            let pair = SequencePair::with_default_qv("v", &sampled.read, reference).unwrap();
            let r = compute_probability(&pair, &params, Mode::Long).unwrap();
            assert!(r.log_probability.is_finite());
            let truth = sampled.match_cells();
            let decoded = path_match_cells(r.state_path.as_ref().unwrap());
            let agree = truth.iter().filter(|c| decoded.contains(c)).count();
            let ratio = agree as f64 / truth.len() as f64;
            println!("{} {}", k, ratio);
            assert!(ratio > 0.8);
        }
    }
    #[test]
    fn training_pairs_are_valid_and_deterministic() {
        let params = ParameterSet::default();
        let a = generate_training_pairs(8, 40.0, 5.0, &params, &Quality::Scalar(20), 9).unwrap();
        let b = generate_training_pairs(8, 40.0, 5.0, &params, &Quality::Scalar(20), 9).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_eq!(a[3].id(), "read3/ref3");
        let c = generate_training_pairs(4, 20.0, 0.0, &params, &Quality::PerBase(vec![30]), 9)
            .unwrap();
        for pair in c.iter() {
            assert_eq!(pair.qv(), &Quality::PerBase(vec![30; pair.query().len()]));
        }
    }
}
