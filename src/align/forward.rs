//!
//! Forward algorithm
//!
use super::{DPTable, Scorer};
use crate::params::State::{Del, Ins, Match};
use crate::prob::Prob;

impl<'a> Scorer<'a> {
    ///
    /// Run Forward algorithm
    ///
    /// `f_s(i, j)` = P(emits `query[..i]`, `reference[..j]` and now in state `s`)
    ///
    pub fn forward(&self) -> DPTable {
        let (n, m) = (self.n(), self.m());
        let mut t = DPTable::zero(n, m, true);
        for i in 0..=n {
            for j in 0..=m {
                if i == 0 && j == 0 {
                    // begin state has all the mass
                    t[(0, 0)] = [Prob::one(), Prob::zero(), Prob::zero()];
                    continue;
                }
                let fm = self.fm(&t, i, j);
                let fi = self.fi(&t, i, j);
                let fd = self.fd(&t, i, j);
                t[(i, j)] = [fm, fi, fd];
            }
        }
        t
    }
    /// `Match` state
    ///
    /// ```text
    /// fm(i,j) = e_M(ref[j], query[i]) * (
    ///     fm(i-1,j-1) t_MM + fi(i-1,j-1) t_IM + fd(i-1,j-1) t_DM
    /// )
    /// ```
    fn fm(&self, t: &DPTable, i: usize, j: usize) -> Prob {
        if i == 0 || j == 0 {
            return Prob::zero();
        }
        let [m, ins, d] = t[(i - 1, j - 1)];
        let from = m * self.transition(i - 1, Match, Match)
            + ins * self.transition(i - 1, Ins, Match)
            + d * self.transition(i - 1, Del, Match);
        self.emission(Match, i, j) * from
    }
    /// `Ins` state
    ///
    /// ```text
    /// fi(i,j) = e_I(query[i]) * ( fm(i-1,j) t_MI + fi(i-1,j) t_II )
    /// ```
    fn fi(&self, t: &DPTable, i: usize, j: usize) -> Prob {
        if i == 0 {
            return Prob::zero();
        }
        let [m, ins, _] = t[(i - 1, j)];
        let from = m * self.transition(i - 1, Match, Ins) + ins * self.transition(i - 1, Ins, Ins);
        self.emission(Ins, i, j) * from
    }
    /// `Del` state
    ///
    /// ```text
    /// fd(i,j) = e_D(ref[j]) * ( fm(i,j-1) t_MD + fd(i,j-1) t_DD )
    /// ```
    ///
    /// `(i, j-1)` is in the same row, so it is already filled.
    fn fd(&self, t: &DPTable, i: usize, j: usize) -> Prob {
        if j == 0 {
            return Prob::zero();
        }
        let [m, _, d] = t[(i, j - 1)];
        let from = m * self.transition(i, Match, Del) + d * self.transition(i, Del, Del);
        self.emission(Del, i, j) * from
    }
}

#[cfg(test)]
mod tests {
    use crate::align::Scorer;
    use crate::pair::SequencePair;
    use crate::params::{ParameterSet, State};
    use crate::prob::p;

    #[test]
    fn forward_single_base() {
        // only one alignment of A vs A: M
        let params = ParameterSet::default();
        let pair = SequencePair::with_default_qv("a", b"A", b"A").unwrap();
        let s = Scorer::new(&pair, &params);
        let f = s.forward();
        let (dx, dy) = params.indel_probs(20);
        let p_mm = (1.0 - dx) * (1.0 - dy);
        // paths: M, (I,D) is not allowed, (D,I) is not allowed
        assert_abs_diff_eq!(
            f.get(1, 1, State::Match),
            p(0.25 * 0.97 * p_mm),
            epsilon = 1e-12
        );
        assert!(f.get(1, 1, State::Ins).is_zero());
        assert!(f.get(1, 1, State::Del).is_zero());
        // first row only holds deletions, first column only insertions
        assert!(!f.get(0, 1, State::Del).is_zero());
        assert!(f.get(0, 1, State::Match).is_zero());
        assert!(!f.get(1, 0, State::Ins).is_zero());
        assert!(f.get(1, 0, State::Del).is_zero());
    }
    #[test]
    fn forward_is_a_probability() {
        let params = ParameterSet::default();
        let pair = SequencePair::with_default_qv("x", b"ACGGTAC", b"ACGTTAC").unwrap();
        let f = Scorer::new(&pair, &params).forward();
        let full = f.full_prob();
        assert!(full.to_log_value().is_finite());
        assert!(full.to_log_value() < 0.0);
    }
}
