//!
//! SufficientStatistics: expected event counts of the E-step
//!
use crate::align::Scorer;
use crate::common::{Qv, N_BASES};
use crate::error::{GphmmError, Result, Stage};
use crate::pair::SequencePair;
use crate::params::{ParameterSet, State};
use crate::prob::Prob;
use std::collections::BTreeMap;

///
/// Expected number of Bernoulli trials of the two indel decisions
/// made when leaving a state at one quality value.
///
/// * insertion decision (rate `delta_x`): made from M and I
/// * deletion decision (rate `delta_y`): made from M (after not inserting) and D
///
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IndelTally {
    pub ins: f64,
    pub no_ins: f64,
    pub del: f64,
    pub no_del: f64,
}

impl IndelTally {
    ///
    /// Add `count` expected transitions `from -> to`
    ///
    pub fn add(&mut self, from: State, to: State, count: f64) {
        match (from, to) {
            (State::Match, State::Ins) | (State::Ins, State::Ins) => self.ins += count,
            (State::Match, State::Match) => {
                self.no_ins += count;
                self.no_del += count;
            }
            (State::Match, State::Del) => {
                self.no_ins += count;
                self.del += count;
            }
            (State::Ins, State::Match) => self.no_ins += count,
            (State::Del, State::Del) => self.del += count,
            (State::Del, State::Match) => self.no_del += count,
            // forbidden transitions carry no mass
            (State::Ins, State::Del) | (State::Del, State::Ins) => {}
        }
    }
}

impl<'a> std::ops::AddAssign<&'a IndelTally> for IndelTally {
    fn add_assign(&mut self, other: &'a IndelTally) {
        self.ins += other.ins;
        self.no_ins += other.no_ins;
        self.del += other.del;
        self.no_del += other.no_del;
    }
}

///
/// Posterior expected counts accumulated over one or more pairs.
///
/// Additive: statistics of independent pairs are combined with `+=`.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SufficientStatistics {
    /// `[ref][query]` expected Match emissions
    pub counts_emission_m: [[f64; N_BASES]; N_BASES],
    /// `[query]` expected Ins emissions
    pub counts_emission_i: [f64; N_BASES],
    /// `[ref]` expected Del emissions
    pub counts_emission_d: [f64; N_BASES],
    /// `[from][to]` expected transitions over `M, I, D`.
    /// Diagnostic only: the M-step re-derives transitions from
    /// `indel_tallies`, this table is logged per iteration.
    pub counts_transition: [[f64; 3]; 3],
    /// indel decisions grouped by quality value
    pub indel_tallies: BTreeMap<Qv, IndelTally>,
    /// sum of log P(query, reference) of the pairs
    pub log_likelihood: f64,
    /// number of pairs accumulated
    pub n_pairs: usize,
}

impl SufficientStatistics {
    pub fn zero() -> Self {
        SufficientStatistics::default()
    }
    ///
    /// E-step of a single pair: run forward and backward and collect the
    /// posterior expected counts.
    ///
    /// ```text
    /// emission of s at (i,j):     f_s(i,j) b_s(i,j) / P
    /// transition s -> t leaving (i,j) into (i',j'):
    ///     f_s(i,j) T_st(qv_i) e_t(i',j') b_t(i',j') / P
    /// ```
    ///
    /// Returns `NumericInstability` (stage E-step) naming the pair if its
    /// total probability is zero or not finite.
    ///
    pub fn from_pair(
        pair: &SequencePair,
        params: &ParameterSet,
        iteration: usize,
    ) -> Result<SufficientStatistics> {
        let s = Scorer::new(pair, params);
        let f = s.forward();
        let b = s.backward();
        let z = f.full_prob();
        if z.is_zero() || !z.to_log_value().is_finite() {
            return Err(GphmmError::NumericInstability {
                field: format!("logLikelihood of `{}`", pair.id()),
                iteration: Some(iteration),
                stage: Stage::EStep,
            });
        }

        let mut stats = SufficientStatistics::zero();
        let (n, m) = (s.n(), s.m());
        for i in 0..=n {
            let qv = pair.qv().at(i);
            let mut tally = IndelTally::default();
            for j in 0..=m {
                // emissions
                for &state in State::ALL.iter() {
                    let post = posterior(f.get(i, j, state) * b.get(i, j, state), z);
                    if post == 0.0 {
                        continue;
                    }
                    match state {
                        State::Match if i > 0 && j > 0 => {
                            stats.counts_emission_m[s.reference_base(j)][s.query_base(i)] += post
                        }
                        State::Ins if i > 0 => stats.counts_emission_i[s.query_base(i)] += post,
                        State::Del if j > 0 => stats.counts_emission_d[s.reference_base(j)] += post,
                        _ => {}
                    }
                }

                // transitions leaving (i, j)
                for &from in State::ALL.iter() {
                    let pf = f.get(i, j, from);
                    if pf.is_zero() {
                        continue;
                    }
                    for &to in State::ALL.iter() {
                        let (ti, tj) = match to {
                            State::Match => (i + 1, j + 1),
                            State::Ins => (i + 1, j),
                            State::Del => (i, j + 1),
                        };
                        if ti > n || tj > m {
                            continue;
                        }
                        let x = pf
                            * s.transition(i, from, to)
                            * s.emission(to, ti, tj)
                            * b.get(ti, tj, to);
                        let count = posterior(x, z);
                        stats.counts_transition[from.index()][to.index()] += count;
                        tally.add(from, to, count);
                    }
                }
            }
            *stats.indel_tallies.entry(qv).or_default() += &tally;
        }
        stats.log_likelihood = z.to_log_value();
        stats.n_pairs = 1;
        Ok(stats)
    }
    ///
    /// Report the first non-finite or negative aggregate count.
    ///
    pub fn check_finite(&self, iteration: usize) -> Result<()> {
        let bad = |field: String| GphmmError::NumericInstability {
            field,
            iteration: Some(iteration),
            stage: Stage::EStep,
        };
        let ok = |x: f64| x.is_finite() && x >= 0.0;
        for (r, row) in self.counts_emission_m.iter().enumerate() {
            if !row.iter().all(|&x| ok(x)) {
                return Err(bad(format!("countsEmissionM[{}]", r)));
            }
        }
        if !self.counts_emission_i.iter().all(|&x| ok(x)) {
            return Err(bad("countsEmissionI".to_owned()));
        }
        if !self.counts_emission_d.iter().all(|&x| ok(x)) {
            return Err(bad("countsEmissionD".to_owned()));
        }
        for (k, row) in self.counts_transition.iter().enumerate() {
            if !row.iter().all(|&x| ok(x)) {
                return Err(bad(format!("countsTransition[{}]", State::ALL[k])));
            }
        }
        for (qv, t) in self.indel_tallies.iter() {
            if ![t.ins, t.no_ins, t.del, t.no_del].iter().all(|&x| ok(x)) {
                return Err(bad(format!("indelTally[qv={}]", qv)));
            }
        }
        if !self.log_likelihood.is_finite() {
            return Err(bad("logLikelihood".to_owned()));
        }
        Ok(())
    }
    /// total expected Match emissions
    pub fn total_match(&self) -> f64 {
        self.counts_emission_m.iter().flatten().sum()
    }
    ///
    /// Row-normalized `counts_transition`. Rows without mass stay zero.
    ///
    pub fn transition_frequencies(&self) -> [[f64; 3]; 3] {
        let mut freqs = [[0.0; 3]; 3];
        for (row, counts) in freqs.iter_mut().zip(self.counts_transition.iter()) {
            let total: f64 = counts.iter().sum();
            if total > 0.0 {
                for (f, c) in row.iter_mut().zip(counts.iter()) {
                    *f = c / total;
                }
            }
        }
        freqs
    }
}

fn posterior(x: Prob, z: Prob) -> f64 {
    (x / z).to_value()
}

impl<'a> std::ops::AddAssign<&'a SufficientStatistics> for SufficientStatistics {
    fn add_assign(&mut self, other: &'a SufficientStatistics) {
        for (a, b) in self
            .counts_emission_m
            .iter_mut()
            .flatten()
            .zip(other.counts_emission_m.iter().flatten())
        {
            *a += b;
        }
        for (a, b) in self
            .counts_emission_i
            .iter_mut()
            .zip(other.counts_emission_i.iter())
        {
            *a += b;
        }
        for (a, b) in self
            .counts_emission_d
            .iter_mut()
            .zip(other.counts_emission_d.iter())
        {
            *a += b;
        }
        for (a, b) in self
            .counts_transition
            .iter_mut()
            .flatten()
            .zip(other.counts_transition.iter().flatten())
        {
            *a += b;
        }
        for (qv, tally) in other.indel_tallies.iter() {
            *self.indel_tallies.entry(*qv).or_default() += tally;
        }
        self.log_likelihood += other.log_likelihood;
        self.n_pairs += other.n_pairs;
    }
}

impl std::iter::Sum for SufficientStatistics {
    fn sum<I>(iter: I) -> SufficientStatistics
    where
        I: Iterator<Item = SufficientStatistics>,
    {
        iter.fold(SufficientStatistics::zero(), |mut a, b| {
            a += &b;
            a
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Quality;

    #[test]
    fn emission_counts_cover_every_base() {
        let params = ParameterSet::default();
        let pair =
            SequencePair::new("p", b"ATGCGATGCA", b"ATGTACGATGA", Quality::Scalar(20)).unwrap();
        let stats = SufficientStatistics::from_pair(&pair, &params, 0).unwrap();
        let n_match = stats.total_match();
        let n_ins: f64 = stats.counts_emission_i.iter().sum();
        let n_del: f64 = stats.counts_emission_d.iter().sum();
        // every query base is emitted by exactly one of M or I
        assert_abs_diff_eq!(n_match + n_ins, 10.0, epsilon = 1e-6);
        // every reference base is emitted by exactly one of M or D
        assert_abs_diff_eq!(n_match + n_del, 11.0, epsilon = 1e-6);
        // one transition per alignment column
        let n_trans: f64 = stats.counts_transition.iter().flatten().sum();
        assert_abs_diff_eq!(n_trans, n_match + n_ins + n_del, epsilon = 1e-6);
        // forbidden transitions have no mass
        assert_eq!(stats.counts_transition[1][2], 0.0);
        assert_eq!(stats.counts_transition[2][1], 0.0);
        assert_eq!(stats.indel_tallies.len(), 1);
        assert!(stats.check_finite(0).is_ok());
        assert_eq!(stats.n_pairs, 1);
        assert!(stats.log_likelihood < 0.0);
    }
    #[test]
    fn identical_pair_counts_are_mostly_match() {
        let params = ParameterSet::default();
        let pair = SequencePair::with_default_qv("p", b"ACGTACGTAC", b"ACGTACGTAC").unwrap();
        let stats = SufficientStatistics::from_pair(&pair, &params, 0).unwrap();
        assert!(stats.total_match() > 9.5);
        // A->A on the diagonal
        assert!(stats.counts_emission_m[0][0] > 2.9);
        let freqs = stats.transition_frequencies();
        let m_row: f64 = freqs[State::Match.index()].iter().sum();
        assert_abs_diff_eq!(m_row, 1.0, epsilon = 1e-12);
        assert!(freqs[State::Match.index()][State::Match.index()] > 0.9);
    }
    #[test]
    fn statistics_are_additive() {
        let params = ParameterSet::default();
        let p1 = SequencePair::with_default_qv("p1", b"ACGT", b"ACGGT").unwrap();
        let p2 = SequencePair::new("p2", b"TTGA", b"TTA", Quality::Scalar(30)).unwrap();
        let s1 = SufficientStatistics::from_pair(&p1, &params, 0).unwrap();
        let s2 = SufficientStatistics::from_pair(&p2, &params, 0).unwrap();
        let total: SufficientStatistics = vec![s1.clone(), s2.clone()].into_iter().sum();
        assert_eq!(total.n_pairs, 2);
        assert_abs_diff_eq!(
            total.log_likelihood,
            s1.log_likelihood + s2.log_likelihood,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            total.total_match(),
            s1.total_match() + s2.total_match(),
            epsilon = 1e-12
        );
        assert_eq!(total.indel_tallies.len(), 2);
    }
    #[test]
    fn impossible_pair_is_reported_with_its_id() {
        // reference base A can be emitted by neither Match nor Del
        let base = ParameterSet::default();
        let no_a = [0.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        let params = ParameterSet::new(
            no_a,
            *base.q_x(),
            no_a,
            *base.pp(),
            base.delta_x(),
            base.delta_y(),
        )
        .unwrap();
        let pair = SequencePair::with_default_qv("read7/ref7", b"CAGT", b"CAGT").unwrap();
        let e = SufficientStatistics::from_pair(&pair, &params, 4).unwrap_err();
        match e {
            GphmmError::NumericInstability {
                field,
                iteration,
                stage,
            } => {
                assert_eq!(field, "logLikelihood of `read7/ref7`");
                assert_eq!(iteration, Some(4));
                assert_eq!(stage, Stage::EStep);
            }
            e => panic!("unexpected error {}", e),
        }
        // pairs without A are still fine
        let pair = SequencePair::with_default_qv("ok", b"CGT", b"CGT").unwrap();
        assert!(SufficientStatistics::from_pair(&pair, &params, 4).is_ok());
    }
    #[test]
    fn non_finite_counts_are_reported() {
        let mut stats = SufficientStatistics::zero();
        stats.counts_emission_d[2] = f64::NAN;
        let e = stats.check_finite(3).unwrap_err();
        assert_eq!(
            e.to_string(),
            "[E-step] iteration 3: non-finite value in `countsEmissionD`"
        );
    }
}
