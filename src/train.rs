//!
//! Trainer: Baum-Welch (EM) estimation of a ParameterSet from a set of
//! SequencePairs
//!
//! Each iteration runs
//!
//! 1. E-step: Forward/Backward of every pair in parallel, reduced into one
//!    `SufficientStatistics` after all workers have finished
//! 2. M-step: closed-form re-estimation from the aggregate counts
//!
//! The log-likelihood of the E-step is recorded for every iteration, so
//! `log_likelihoods[k]` is the likelihood of the parameters entering
//! iteration `k`.
//!
pub mod mstep;
pub mod stats;

pub use stats::{IndelTally, SufficientStatistics};

use crate::error::{GphmmError, Result, Stage};
use crate::pair::SequencePair;
use crate::params::ParameterSet;
use log::{debug, info};
use rayon::prelude::*;

///
/// Configuration of a training run
///
#[derive(Clone, Debug, PartialEq)]
pub struct TrainConfig {
    /// upper bound of EM iterations
    pub max_iterations: usize,
    /// stop early when the log-likelihood improves by less than this
    pub tolerance: Option<f64>,
    /// pseudocount added to every expected count in the M-step
    pub smoothing: f64,
    /// number of E-step workers. `None` uses all logical cores.
    pub n_threads: Option<usize>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            max_iterations: 10,
            tolerance: None,
            smoothing: 1e-3,
            n_threads: None,
        }
    }
}

///
/// Parameters and history between iterations
///
#[derive(Clone, Debug)]
pub struct TrainingState {
    pub params: ParameterSet,
    pub iteration: usize,
    pub log_likelihoods: Vec<f64>,
    pub converged: bool,
}

impl TrainingState {
    pub fn new(params: ParameterSet) -> Self {
        TrainingState {
            params,
            iteration: 0,
            log_likelihoods: Vec::new(),
            converged: false,
        }
    }
    fn update(&mut self, params: ParameterSet, log_likelihood: f64, tolerance: Option<f64>) {
        if let (Some(tol), Some(&last)) = (tolerance, self.log_likelihoods.last()) {
            if log_likelihood - last < tol {
                self.converged = true;
            }
        }
        self.log_likelihoods.push(log_likelihood);
        self.params = params;
        self.iteration += 1;
    }
}

///
/// Output of `Trainer::run`
///
#[derive(Clone, Debug)]
pub struct TrainingResult {
    pub params: ParameterSet,
    pub log_likelihoods: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

impl From<TrainingState> for TrainingResult {
    fn from(state: TrainingState) -> Self {
        TrainingResult {
            params: state.params,
            log_likelihoods: state.log_likelihoods,
            iterations: state.iteration,
            converged: state.converged,
        }
    }
}

///
/// Baum-Welch trainer
///
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Trainer { config }
    }
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }
    ///
    /// Run EM from `init` until `max_iterations` or convergence.
    ///
    /// The E-step runs on a dedicated rayon pool of `n_threads` workers.
    /// Any failing pair aborts the whole run.
    ///
    pub fn run(&self, pairs: &[SequencePair], init: &ParameterSet) -> Result<TrainingResult> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n_threads) = self.config.n_threads {
            builder = builder.num_threads(n_threads);
        }
        let pool = builder.build()?;
        info!(
            "training on {} pairs with {} threads",
            pairs.len(),
            pool.current_num_threads()
        );

        let mut state = TrainingState::new(init.clone());
        while state.iteration < self.config.max_iterations && !state.converged {
            let iteration = state.iteration;
            let stats = pool.install(|| e_step(pairs, &state.params, iteration))?;
            let params = mstep::m_step(&stats, &state.params, self.config.smoothing, iteration)?;
            info!(
                "iteration={} log_likelihood={}",
                iteration, stats.log_likelihood
            );
            debug!(
                "transition frequencies {:?}",
                stats.transition_frequencies()
            );
            debug!("{}", params);
            state.update(params, stats.log_likelihood, self.config.tolerance);
        }
        if state.converged {
            info!("converged after {} iterations", state.iteration);
        }
        Ok(state.into())
    }
}

///
/// E-step over all pairs: posterior counts of each pair computed in
/// parallel, then summed in input order.
///
pub fn e_step(
    pairs: &[SequencePair],
    params: &ParameterSet,
    iteration: usize,
) -> Result<SufficientStatistics> {
    let per_pair: Vec<SufficientStatistics> = pairs
        .par_iter()
        .map(|pair| SufficientStatistics::from_pair(pair, params, iteration))
        .collect::<Result<Vec<_>>>()?;
    let total: SufficientStatistics = per_pair.into_iter().sum();
    total.check_finite(iteration)?;
    Ok(total)
}

///
/// Build SequencePairs for training from raw records.
/// Invalid records are reported with `Stage::EStep`.
///
pub fn pairs_for_training<I>(records: I) -> Result<Vec<SequencePair>>
where
    I: IntoIterator<Item = (String, Vec<u8>, Vec<u8>, crate::common::Quality)>,
{
    records
        .into_iter()
        .map(|(id, query, reference, qv)| {
            SequencePair::new(id, &query, &reference, qv).map_err(|e| e.in_stage(Stage::EStep))
        })
        .collect()
}

///
/// Run exactly `max_iterations` EM iterations with the default
/// configuration and return the final parameters with one log-likelihood
/// per iteration.
///
pub fn train_parameters(
    pairs: &[SequencePair],
    init: &ParameterSet,
    max_iterations: usize,
) -> Result<(ParameterSet, Vec<f64>)> {
    let config = TrainConfig {
        max_iterations,
        ..TrainConfig::default()
    };
    let result = Trainer::new(config).run(pairs, init)?;
    if result.log_likelihoods.iter().any(|ll| !ll.is_finite()) {
        return Err(GphmmError::NumericInstability {
            field: "logLikelihood".to_owned(),
            iteration: Some(result.iterations),
            stage: Stage::EStep,
        });
    }
    Ok((result.params, result.log_likelihoods))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Quality;
    use crate::generate::generate_training_pairs;
    use crate::params::ROW_SUM_TOLERANCE;

    fn training_set(n_pairs: usize, seed: u64) -> Vec<SequencePair> {
        let truth = ParameterSet::uniform(0.05).unwrap();
        generate_training_pairs(n_pairs, 60.0, 5.0, &truth, &Quality::Scalar(20), seed).unwrap()
    }

    #[test]
    fn train_runs_exact_number_of_iterations() {
        let pairs = training_set(50, 0);
        let init = ParameterSet::default();
        let (params, lls) = train_parameters(&pairs, &init, 5).unwrap();
        println!("{:?}", lls);
        println!("{}", params);
        assert_eq!(lls.len(), 5);
        assert!(lls.iter().all(|ll| ll.is_finite() && *ll < 0.0));
        let (_, residual) = params.max_row_residual();
        assert!(residual < ROW_SUM_TOLERANCE);
        for qv in [0, 20, 40] {
            for row in params.transition_matrix(qv).iter() {
                assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            }
        }
    }
    #[test]
    fn log_likelihood_does_not_decrease() {
        let pairs = training_set(30, 10);
        let init = ParameterSet::default();
        let (_, lls) = train_parameters(&pairs, &init, 6).unwrap();
        for w in lls.windows(2) {
            // smoothing allows a tiny relative slack
            assert!(w[1] >= w[0] - 1e-3 * w[0].abs(), "{:?}", lls);
        }
        assert!(lls[lls.len() - 1] > lls[0]);
    }
    #[test]
    fn training_moves_towards_truth() {
        let pairs = training_set(40, 20);
        let init = ParameterSet::default();
        let (params, _) = train_parameters(&pairs, &init, 8).unwrap();
        // the truth has a 5% substitution rate, the start 3%
        let mismatch = 1.0 - params.pp()[0][0];
        assert!(mismatch > 0.03, "mismatch={}", mismatch);
        // q_x has no preference between bases
        assert!(params.q_x().iter().all(|&x| x > 0.1));
    }
    #[test]
    fn zero_iterations_returns_init() {
        let pairs = training_set(3, 30);
        let init = ParameterSet::default();
        let (params, lls) = train_parameters(&pairs, &init, 0).unwrap();
        assert!(lls.is_empty());
        assert_eq!(params, init);
    }
    #[test]
    fn worker_count_does_not_change_result() {
        let pairs = training_set(12, 40);
        let init = ParameterSet::default();
        let run = |n_threads| {
            let config = TrainConfig {
                max_iterations: 2,
                n_threads: Some(n_threads),
                ..TrainConfig::default()
            };
            Trainer::new(config).run(&pairs, &init).unwrap()
        };
        let r1 = run(1);
        let r4 = run(4);
        assert_eq!(r1.log_likelihoods, r4.log_likelihoods);
        assert_eq!(r1.params, r4.params);
    }
    #[test]
    fn tolerance_stops_early() {
        let pairs = training_set(10, 50);
        let config = TrainConfig {
            max_iterations: 50,
            tolerance: Some(1e6),
            ..TrainConfig::default()
        };
        let r = Trainer::new(config)
            .run(&pairs, &ParameterSet::default())
            .unwrap();
        // the second iteration cannot improve by 1e6
        assert!(r.converged);
        assert_eq!(r.iterations, 2);
        assert_eq!(r.log_likelihoods.len(), 2);
    }
    #[test]
    fn invalid_records_report_e_step() {
        let records = vec![
            (
                "ok".to_owned(),
                b"ACGT".to_vec(),
                b"ACGT".to_vec(),
                Quality::default(),
            ),
            (
                "bad".to_owned(),
                b"ACNT".to_vec(),
                b"ACGT".to_vec(),
                Quality::default(),
            ),
        ];
        let e = pairs_for_training(records).unwrap_err();
        assert!(matches!(
            e,
            GphmmError::InvalidSequence {
                stage: Stage::EStep,
                ..
            }
        ));
        assert!(e.to_string().contains("`bad`"));
    }
    #[test]
    fn collapse_without_smoothing_is_reported() {
        // a single pair of all-A never emits C/G/T from the reference,
        // so the pp rows of C/G/T have no counts
        let pairs = vec![SequencePair::with_default_qv("a", b"AAAA", b"AAAA").unwrap()];
        let config = TrainConfig {
            max_iterations: 1,
            smoothing: 0.0,
            ..TrainConfig::default()
        };
        let e = Trainer::new(config)
            .run(&pairs, &ParameterSet::default())
            .unwrap_err();
        assert!(matches!(
            e,
            GphmmError::NumericInstability {
                stage: Stage::MStep,
                iteration: Some(0),
                ..
            }
        ));
    }
}
