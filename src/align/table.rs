//!
//! DPTable: `(n+1) x (m+1)` grid of `[M, I, D]` probabilities
//!
use crate::params::State;
use crate::prob::Prob;

///
/// Dense DP table.
///
/// `table[(i, j)][s]` is the probability of state `s` at cell `(i, j)`.
///
#[derive(Debug, Clone)]
pub struct DPTable {
    n_rows: usize,
    n_cols: usize,
    data: Vec<[Prob; 3]>,
    is_forward: bool,
}

impl DPTable {
    ///
    /// Table with every cell `p=0`, for query length `n` and reference length `m`.
    ///
    pub fn zero(n: usize, m: usize, is_forward: bool) -> Self {
        DPTable {
            n_rows: n + 1,
            n_cols: m + 1,
            data: vec![[Prob::zero(); 3]; (n + 1) * (m + 1)],
            is_forward,
        }
    }
    /// query length `n`
    pub fn n(&self) -> usize {
        self.n_rows - 1
    }
    /// reference length `m`
    pub fn m(&self) -> usize {
        self.n_cols - 1
    }
    pub fn is_forward(&self) -> bool {
        self.is_forward
    }
    pub fn get(&self, i: usize, j: usize, state: State) -> Prob {
        self[(i, j)][state.index()]
    }
    ///
    /// Full probability of the emissions.
    ///
    /// ```text
    /// forward:  P = fM(n,m) + fI(n,m) + fD(n,m)
    /// backward: P = bM(0,0)   (begin state)
    /// ```
    ///
    pub fn full_prob(&self) -> Prob {
        if self.is_forward() {
            self[(self.n(), self.m())].iter().sum()
        } else {
            self.get(0, 0, State::Match)
        }
    }
}

impl std::ops::Index<(usize, usize)> for DPTable {
    type Output = [Prob; 3];
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        &self.data[i * self.n_cols + j]
    }
}

impl std::ops::IndexMut<(usize, usize)> for DPTable {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        &mut self.data[i * self.n_cols + j]
    }
}

impl std::fmt::Display for DPTable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "i\tj\tM\tI\tD")?;
        for i in 0..self.n_rows {
            for j in 0..self.n_cols {
                let [m, ins, d] = self[(i, j)];
                writeln!(
                    f,
                    "{}\t{}\t{:.4}\t{:.4}\t{:.4}",
                    i,
                    j,
                    m.to_log_value(),
                    ins.to_log_value(),
                    d.to_log_value()
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prob::p;

    #[test]
    fn table_index() {
        let mut t = DPTable::zero(2, 3, true);
        assert_eq!(t.n(), 2);
        assert_eq!(t.m(), 3);
        t[(2, 3)] = [p(0.1), p(0.2), p(0.3)];
        t[(1, 2)][State::Del.index()] = p(0.5);
        assert_eq!(t.get(1, 2, State::Del), p(0.5));
        assert!(t.get(0, 0, State::Match).is_zero());
        assert_abs_diff_eq!(t.full_prob(), p(0.6), epsilon = 1e-12);

        let mut b = DPTable::zero(2, 3, false);
        b[(0, 0)][State::Match.index()] = p(0.25);
        assert_eq!(b.full_prob(), p(0.25));
    }
}
