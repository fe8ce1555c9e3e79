//!
//! Viterbi algorithm with traceback
//!
use super::{DPTable, Scorer};
use crate::params::State::{self, Del, Ins, Match};
use crate::prob::{max_with_arg, Prob};

/// Backpointer grid: the previous state of each `(cell, state)`
struct Pointers {
    n_cols: usize,
    data: Vec<[Option<State>; 3]>,
}

impl Pointers {
    fn new(n: usize, m: usize) -> Self {
        Pointers {
            n_cols: m + 1,
            data: vec![[None; 3]; (n + 1) * (m + 1)],
        }
    }
    fn get(&self, i: usize, j: usize, state: State) -> Option<State> {
        self.data[i * self.n_cols + j][state.index()]
    }
    fn set(&mut self, i: usize, j: usize, state: State, prev: Option<State>) {
        self.data[i * self.n_cols + j][state.index()] = prev;
    }
}

impl<'a> Scorer<'a> {
    ///
    /// Most probable state path and its probability.
    ///
    /// The path has one label per alignment column, in alignment order;
    /// the begin state is not part of it.
    ///
    pub fn viterbi(&self) -> (Prob, Vec<State>) {
        let (n, m) = (self.n(), self.m());
        let mut t = DPTable::zero(n, m, true);
        let mut bp = Pointers::new(n, m);
        for i in 0..=n {
            for j in 0..=m {
                if i == 0 && j == 0 {
                    t[(0, 0)] = [Prob::one(), Prob::zero(), Prob::zero()];
                    continue;
                }
                for &state in State::ALL.iter() {
                    let (prev, p) = self.v_step(&t, i, j, state);
                    t[(i, j)][state.index()] = p;
                    bp.set(i, j, state, prev);
                }
            }
        }

        let last: Vec<(State, Prob)> = State::ALL
            .iter()
            .map(|&s| (s, t.get(n, m, s)))
            .collect();
        let (best, p_best) = max_with_arg(&last).unwrap_or((Match, Prob::zero()));
        (p_best, traceback(&bp, n, m, best))
    }
    ///
    /// `combine = max` version of the forward recursion, returning the argmax.
    ///
    fn v_step(&self, t: &DPTable, i: usize, j: usize, state: State) -> (Option<State>, Prob) {
        let (pi, pj, from): (usize, usize, &[State]) = match state {
            Match if i > 0 && j > 0 => (i - 1, j - 1, &[Match, Ins, Del][..]),
            Ins if i > 0 => (i - 1, j, &[Match, Ins][..]),
            Del if j > 0 => (i, j - 1, &[Match, Del][..]),
            _ => return (None, Prob::zero()),
        };
        let candidates: Vec<(State, Prob)> = from
            .iter()
            .map(|&s| (s, t.get(pi, pj, s) * self.transition(pi, s, state)))
            .collect();
        match max_with_arg(&candidates) {
            Some((prev, p)) => (Some(prev), self.emission(state, i, j) * p),
            None => (None, Prob::zero()),
        }
    }
}

fn traceback(bp: &Pointers, n: usize, m: usize, last: State) -> Vec<State> {
    let mut path = Vec::with_capacity(n + m);
    let (mut i, mut j) = (n, m);
    let mut state = last;
    while i > 0 || j > 0 {
        path.push(state);
        let prev = bp.get(i, j, state);
        match state {
            Match => {
                i -= 1;
                j -= 1;
            }
            Ins => i -= 1,
            Del => j -= 1,
        }
        match prev {
            Some(prev) => state = prev,
            None => break,
        }
    }
    path.reverse();
    path
}
