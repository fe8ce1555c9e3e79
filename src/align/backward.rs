//!
//! Backward algorithm
//!
use super::{DPTable, Scorer};
use crate::params::State;
use crate::prob::Prob;

impl<'a> Scorer<'a> {
    ///
    /// Run Backward algorithm
    ///
    /// `b_s(i, j)` = P(emits `query[i..]`, `reference[j..]` | in state `s` at `(i, j)`)
    ///
    /// ```text
    /// b_s(n,m) = 1
    /// b_s(i,j) =   t_sM e_M(i+1,j+1) bM(i+1,j+1)
    ///            + t_sI e_I(i+1)     bI(i+1,j)
    ///            + t_sD e_D(j+1)     bD(i,j+1)
    /// ```
    ///
    pub fn backward(&self) -> DPTable {
        let (n, m) = (self.n(), self.m());
        let mut t = DPTable::zero(n, m, false);
        for i in (0..=n).rev() {
            for j in (0..=m).rev() {
                if i == n && j == m {
                    t[(n, m)] = [Prob::one(); 3];
                    continue;
                }
                let mut cell = [Prob::zero(); 3];
                for &from in State::ALL.iter() {
                    cell[from.index()] = self.b_step(&t, i, j, from);
                }
                t[(i, j)] = cell;
            }
        }
        t
    }
    fn b_step(&self, t: &DPTable, i: usize, j: usize, from: State) -> Prob {
        let (n, m) = (self.n(), self.m());
        let mut p = Prob::zero();
        if i < n && j < m {
            p += self.transition(i, from, State::Match)
                * self.emission(State::Match, i + 1, j + 1)
                * t.get(i + 1, j + 1, State::Match);
        }
        if i < n {
            p += self.transition(i, from, State::Ins)
                * self.emission(State::Ins, i + 1, j)
                * t.get(i + 1, j, State::Ins);
        }
        if j < m {
            p += self.transition(i, from, State::Del)
                * self.emission(State::Del, i, j + 1)
                * t.get(i, j + 1, State::Del);
        }
        p
    }
}

#[cfg(test)]
mod tests {
    use crate::align::Scorer;
    use crate::common::Quality;
    use crate::pair::SequencePair;
    use crate::params::ParameterSet;
    use test_case::test_case;

    #[test_case(b"ACGT", b"ACGT" ; "identical")]
    #[test_case(b"ATGCGATGCA", b"ATGTACGATGA" ; "with indels")]
    #[test_case(b"T", b"GGGCA" ; "short query")]
    #[test_case(b"CCCCAAAAC", b"G" ; "short reference")]
    fn forward_and_backward_agree(query: &[u8], reference: &[u8]) {
        let params = ParameterSet::default();
        let pair = SequencePair::new("fb", query, reference, Quality::Scalar(15)).unwrap();
        let s = Scorer::new(&pair, &params);
        let pf = s.forward().full_prob();
        let pb = s.backward().full_prob();
        assert_abs_diff_eq!(pf, pb, epsilon = 1e-9);
    }
    #[test]
    fn forward_and_backward_agree_with_per_base_quality() {
        let params = ParameterSet::default();
        let pair = SequencePair::new(
            "fb",
            b"ACGTTGA",
            b"ACTTGGA",
            Quality::PerBase(vec![3, 10, 20, 30, 40, 50, 60]),
        )
        .unwrap();
        let s = Scorer::new(&pair, &params);
        assert_abs_diff_eq!(
            s.forward().full_prob(),
            s.backward().full_prob(),
            epsilon = 1e-9
        );
    }
}
