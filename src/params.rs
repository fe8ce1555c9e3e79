//!
//! ParameterSet of the generalized pair HMM
//!
//! * emissions: `q_r`, `pp` (Match), `q_x` (Ins), `q_y` (Del)
//! * transitions: derived from the quality-dependent indel probabilities
//!   `delta_x(qv)` (insertion) and `delta_y(qv)` (deletion)
//!
//! ```text
//!   from \ to |  M               |  I   |  D
//!   ----------+------------------+------+------------
//!   M         | (1-dx)(1-dy)     |  dx  | (1-dx) dy
//!   I         |  1-dx            |  dx  |  0
//!   D         |  1-dy            |  0   |  dy
//! ```
//!
pub mod artifact;

use crate::common::{Qv, N_BASES};
use crate::error::{GphmmError, Result};
use crate::prob::Prob;
use serde::{Deserialize, Serialize};

/// Lower bound of `delta_x(qv)` and `delta_y(qv)`
pub const MIN_INDEL: f64 = 1e-6;

/// Upper bound of `delta_x(qv)` and `delta_y(qv)`
pub const MAX_INDEL: f64 = 1.0 - 1e-6;

/// Allowed deviation of a probability row sum from 1
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

///
/// Hidden states of the pair HMM
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// match or mismatch: consumes one query and one reference base
    Match,
    /// insertion: consumes one query base
    Ins,
    /// deletion: consumes one reference base
    Del,
}

impl State {
    /// all states in the `M, I, D` order used by the transition tables
    pub const ALL: [State; 3] = [State::Match, State::Ins, State::Del];

    /// row/column index in the transition tables
    pub fn index(self) -> usize {
        match self {
            State::Match => 0,
            State::Ins => 1,
            State::Del => 2,
        }
    }
    /// this state emits a query base
    pub fn consumes_query(self) -> bool {
        matches!(self, State::Match | State::Ins)
    }
    /// this state emits a reference base
    pub fn consumes_reference(self) -> bool {
        matches!(self, State::Match | State::Del)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            State::Match => write!(f, "M"),
            State::Ins => write!(f, "I"),
            State::Del => write!(f, "D"),
        }
    }
}

///
/// Linear function of a quality value `intercept + slope * qv`,
/// clamped into `[MIN_INDEL, MAX_INDEL]`.
///
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearIndel {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearIndel {
    pub fn new(intercept: f64, slope: f64) -> Self {
        LinearIndel { intercept, slope }
    }
    /// indel probability at the quality value
    pub fn prob(&self, qv: Qv) -> f64 {
        let x = self.intercept + self.slope * f64::from(qv);
        x.max(MIN_INDEL).min(MAX_INDEL)
    }
}

impl std::fmt::Display for LinearIndel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} + {} * qv", self.intercept, self.slope)
    }
}

///
/// Emission and transition parameters of the GPHMM.
///
/// Immutable once constructed: every constructor validates that all
/// distributions are stochastic.
///
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "artifact::ParameterArtifact", into = "artifact::ParameterArtifact")]
pub struct ParameterSet {
    q_r: [f64; N_BASES],
    q_x: [f64; N_BASES],
    q_y: [f64; N_BASES],
    pp: [[f64; N_BASES]; N_BASES],
    delta_x: LinearIndel,
    delta_y: LinearIndel,
}

impl ParameterSet {
    ///
    /// Construct and validate a ParameterSet.
    ///
    /// Returns `InvalidParameter` if any of `q_r`, `q_x`, `q_y`, or a row of
    /// `pp` has a negative/non-finite entry or does not sum to 1.
    ///
    pub fn new(
        q_r: [f64; N_BASES],
        q_x: [f64; N_BASES],
        q_y: [f64; N_BASES],
        pp: [[f64; N_BASES]; N_BASES],
        delta_x: LinearIndel,
        delta_y: LinearIndel,
    ) -> Result<ParameterSet> {
        let params = ParameterSet {
            q_r,
            q_x,
            q_y,
            pp,
            delta_x,
            delta_y,
        };
        params.validate()?;
        Ok(params)
    }
    ///
    /// Non-degenerate starting point of training
    ///
    /// * uniform `q_r`, `q_x`, `q_y`
    /// * `pp` with 0.97 on the diagonal
    /// * 2% insertion/deletion at qv 20
    ///
    pub fn initialize_default() -> ParameterSet {
        let (mat, mism) = (0.97, 0.01);
        let mut pp = [[mism; N_BASES]; N_BASES];
        for (r, row) in pp.iter_mut().enumerate() {
            row[r] = mat;
        }
        ParameterSet {
            q_r: [0.25; N_BASES],
            q_x: [0.25; N_BASES],
            q_y: [0.25; N_BASES],
            pp,
            delta_x: LinearIndel::new(0.03, -0.0005),
            delta_y: LinearIndel::new(0.03, -0.0005),
        }
    }
    /// Uniform error profile: substitution rate `p_error` spread evenly over
    /// the 3 other bases, indel probability `p_error` at every quality.
    pub fn uniform(p_error: f64) -> Result<ParameterSet> {
        let mut pp = [[p_error / 3.0; N_BASES]; N_BASES];
        for (r, row) in pp.iter_mut().enumerate() {
            row[r] = 1.0 - p_error;
        }
        ParameterSet::new(
            [0.25; N_BASES],
            [0.25; N_BASES],
            [0.25; N_BASES],
            pp,
            LinearIndel::new(p_error, 0.0),
            LinearIndel::new(p_error, 0.0),
        )
    }

    //
    // accessors
    //

    pub fn q_r(&self) -> &[f64; N_BASES] {
        &self.q_r
    }
    pub fn q_x(&self) -> &[f64; N_BASES] {
        &self.q_x
    }
    pub fn q_y(&self) -> &[f64; N_BASES] {
        &self.q_y
    }
    pub fn pp(&self) -> &[[f64; N_BASES]; N_BASES] {
        &self.pp
    }
    pub fn delta_x(&self) -> LinearIndel {
        self.delta_x
    }
    pub fn delta_y(&self) -> LinearIndel {
        self.delta_y
    }

    //
    // probability model
    //

    /// `(delta_x(qv), delta_y(qv))`
    pub fn indel_probs(&self, qv: Qv) -> (f64, f64) {
        (self.delta_x.prob(qv), self.delta_y.prob(qv))
    }
    ///
    /// Transition probabilities `T[from][to]` at the quality value `qv`
    /// of the next query base to be emitted.
    ///
    pub fn transition_matrix(&self, qv: Qv) -> [[f64; 3]; 3] {
        let (dx, dy) = self.indel_probs(qv);
        [
            [(1.0 - dx) * (1.0 - dy), dx, (1.0 - dx) * dy],
            [1.0 - dx, dx, 0.0],
            [1.0 - dy, 0.0, dy],
        ]
    }
    ///
    /// Log transition probability `from -> to`
    ///
    pub fn transition_log_prob(&self, from: State, to: State, qv: Qv) -> Prob {
        Prob::from_prob(self.transition_matrix(qv)[from.index()][to.index()])
    }
    ///
    /// Log emission probability of a state.
    ///
    /// * Match: `q_r[ref] * pp[ref][query]`
    /// * Ins: `q_x[query]`
    /// * Del: `q_y[ref]`
    ///
    /// A base that the state needs but is `None` yields `p=0`.
    ///
    pub fn emission_log_prob(
        &self,
        state: State,
        ref_base: Option<usize>,
        query_base: Option<usize>,
    ) -> Prob {
        match (state, ref_base, query_base) {
            (State::Match, Some(r), Some(q)) => {
                Prob::from_prob(self.q_r[r]) * Prob::from_prob(self.pp[r][q])
            }
            (State::Ins, _, Some(q)) => Prob::from_prob(self.q_x[q]),
            (State::Del, Some(r), _) => Prob::from_prob(self.q_y[r]),
            _ => Prob::zero(),
        }
    }

    //
    // validation
    //

    ///
    /// Named list of all distributions that must sum to one.
    ///
    pub fn distributions(&self) -> Vec<(String, &[f64; N_BASES])> {
        let mut ret = vec![
            ("qR".to_owned(), &self.q_r),
            ("qX".to_owned(), &self.q_x),
            ("qY".to_owned(), &self.q_y),
        ];
        for (r, row) in self.pp.iter().enumerate() {
            ret.push((format!("pp[{}]", crate::common::index_to_base(r) as char), row));
        }
        ret
    }
    ///
    /// Largest `|sum - 1|` over all distributions, with the field name.
    ///
    pub fn max_row_residual(&self) -> (String, f64) {
        self.distributions().into_iter().fold(
            (String::new(), 0.0),
            |(name_max, residual_max), (name, row)| {
                let residual = (row.iter().sum::<f64>() - 1.0).abs();
                if residual > residual_max {
                    (name, residual)
                } else {
                    (name_max, residual_max)
                }
            },
        )
    }
    fn validate(&self) -> Result<()> {
        for (name, row) in self.distributions() {
            if let Some(x) = row.iter().find(|x| !x.is_finite() || **x < 0.0) {
                return Err(GphmmError::InvalidParameter {
                    field: name,
                    reason: format!("entry {} is not a probability", x),
                });
            }
            let sum: f64 = row.iter().sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(GphmmError::InvalidParameter {
                    field: name,
                    reason: format!("row sums to {} instead of 1", sum),
                });
            }
        }
        for (name, delta) in [("deltaX", self.delta_x), ("deltaY", self.delta_y)] {
            if !delta.intercept.is_finite() || !delta.slope.is_finite() {
                return Err(GphmmError::InvalidParameter {
                    field: name.to_owned(),
                    reason: format!("non-finite coefficient ({})", delta),
                });
            }
        }
        Ok(())
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        ParameterSet::initialize_default()
    }
}

impl std::fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "qR: {:?}", self.q_r)?;
        writeln!(f, "qX: {:?}", self.q_x)?;
        writeln!(f, "qY: {:?}", self.q_y)?;
        for (r, row) in self.pp.iter().enumerate() {
            writeln!(f, "pp[{}]: {:?}", crate::common::index_to_base(r) as char, row)?;
        }
        writeln!(f, "deltaX: {}", self.delta_x)?;
        write!(f, "deltaY: {}", self.delta_y)
    }
}
