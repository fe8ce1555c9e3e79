//!
//! M-step: closed-form re-estimation of a ParameterSet from
//! SufficientStatistics
//!
//! * emissions: normalized expected counts with an additive pseudocount
//! * indel functions: per-qv Bernoulli rates fitted by weighted least squares
//!
use super::stats::SufficientStatistics;
use crate::common::N_BASES;
use crate::error::{GphmmError, Result, Stage};
use crate::params::{LinearIndel, ParameterSet};

///
/// Re-estimate all parameters.
///
/// `smoothing` is added to every count before normalizing. With
/// `smoothing = 0`, a distribution without any expected count collapses and
/// is reported as `NumericInstability` at `Stage::MStep`.
///
pub fn m_step(
    stats: &SufficientStatistics,
    prev: &ParameterSet,
    smoothing: f64,
    iteration: usize,
) -> Result<ParameterSet> {
    let bad = |field: String| GphmmError::NumericInstability {
        field,
        iteration: Some(iteration),
        stage: Stage::MStep,
    };

    // pp[r][q] and q_r[r] from Match counts
    let mut pp = [[0.0; N_BASES]; N_BASES];
    let mut ref_totals = [0.0; N_BASES];
    for r in 0..N_BASES {
        let row: Vec<f64> = stats.counts_emission_m[r]
            .iter()
            .map(|c| c + smoothing)
            .collect();
        ref_totals[r] = row.iter().sum();
        pp[r] = normalize(&row).ok_or_else(|| {
            bad(format!(
                "pp[{}]",
                crate::common::index_to_base(r) as char
            ))
        })?;
    }
    let q_r = normalize(&ref_totals).ok_or_else(|| bad("qR".to_owned()))?;
    let q_x = normalize(&add_pseudocount(&stats.counts_emission_i, smoothing))
        .ok_or_else(|| bad("qX".to_owned()))?;
    let q_y = normalize(&add_pseudocount(&stats.counts_emission_d, smoothing))
        .ok_or_else(|| bad("qY".to_owned()))?;

    // indel functions
    let ins: Vec<(f64, f64, f64)> = stats
        .indel_tallies
        .iter()
        .map(|(&qv, t)| (f64::from(qv), t.ins, t.no_ins))
        .collect();
    let del: Vec<(f64, f64, f64)> = stats
        .indel_tallies
        .iter()
        .map(|(&qv, t)| (f64::from(qv), t.del, t.no_del))
        .collect();
    let delta_x = fit_indel(&ins, prev.delta_x(), smoothing);
    let delta_y = fit_indel(&del, prev.delta_y(), smoothing);
    for (name, d) in [("deltaX", delta_x), ("deltaY", delta_y)] {
        if !d.intercept.is_finite() || !d.slope.is_finite() {
            return Err(bad(name.to_owned()));
        }
    }

    ParameterSet::new(q_r, q_x, q_y, pp, delta_x, delta_y)
}

fn add_pseudocount(counts: &[f64; N_BASES], smoothing: f64) -> [f64; N_BASES] {
    let mut ret = *counts;
    for x in ret.iter_mut() {
        *x += smoothing;
    }
    ret
}

///
/// Divide by the sum. `None` if the sum is zero or any entry is non-finite.
///
fn normalize(xs: &[f64]) -> Option<[f64; N_BASES]> {
    let total: f64 = xs.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    let mut ret = [0.0; N_BASES];
    for (y, x) in ret.iter_mut().zip(xs.iter()) {
        *y = x / total;
    }
    Some(ret)
}

///
/// Fit `intercept + slope * qv` to the smoothed per-qv event rates
/// `(events + s) / (events + non_events + 2s)`, weighted by the number of
/// trials at each qv.
///
/// * no trials at all: `prev` is kept
/// * a single distinct qv: the slope of `prev` is kept and only the
///   intercept is moved so that the line passes through the observed rate
///
pub fn fit_indel(points: &[(f64, f64, f64)], prev: LinearIndel, smoothing: f64) -> LinearIndel {
    let samples: Vec<(f64, f64, f64)> = points
        .iter()
        .filter_map(|&(qv, events, non_events)| {
            let trials = events + non_events;
            if trials > 0.0 {
                let rate = (events + smoothing) / (trials + 2.0 * smoothing);
                Some((qv, rate, trials))
            } else {
                None
            }
        })
        .collect();
    let w: f64 = samples.iter().map(|(_, _, w)| w).sum();
    if samples.is_empty() || w <= 0.0 {
        return prev;
    }
    let mean_q = samples.iter().map(|(q, _, w)| q * w).sum::<f64>() / w;
    let mean_r = samples.iter().map(|(_, r, w)| r * w).sum::<f64>() / w;
    let var: f64 = samples
        .iter()
        .map(|(q, _, w)| w * (q - mean_q).powi(2))
        .sum();
    let cov: f64 = samples
        .iter()
        .map(|(q, r, w)| w * (q - mean_q) * (r - mean_r))
        .sum();

    let slope = if var > 1e-12 * w { cov / var } else { prev.slope };
    LinearIndel::new(mean_r - slope * mean_q, slope)
}
