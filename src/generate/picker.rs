//!
//! Weighted random choices used by the read sampler
//!
use crate::common::{N_BASES, VALID_BASES};
use crate::error::{GphmmError, Result};
use rand::prelude::*;

///
/// pick randomly from the choices with its own probability.
///
/// `field` names the distribution in the error returned when the weights
/// are unusable (all zero, negative or non-finite).
///
pub fn pick_with_prob<R: Rng, T: Copy>(rng: &mut R, choices: &[(T, f64)], field: &str) -> Result<T> {
    choices
        .choose_weighted(rng, |item| item.1)
        .map(|item| item.0)
        .map_err(|e| GphmmError::InvalidParameter {
            field: field.to_owned(),
            reason: e.to_string(),
        })
}

///
/// Pick a base from a distribution over `ACGT`
///
pub fn pick_base<R: Rng>(rng: &mut R, dist: &[f64; N_BASES], field: &str) -> Result<u8> {
    let choices: Vec<(u8, f64)> = VALID_BASES.iter().copied().zip(dist.iter().copied()).collect();
    pick_with_prob(rng, &choices, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn picker_follows_weights() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        for _ in 0..100 {
            let b = pick_base(&mut rng, &[0.0, 0.0, 1.0, 0.0], "test").unwrap();
            assert_eq!(b, b'G');
        }
        let n_a = (0..1000)
            .filter(|_| pick_with_prob(&mut rng, &[(true, 0.9), (false, 0.1)], "test").unwrap())
            .count();
        assert!(n_a > 850 && n_a < 950);
    }
    #[test]
    fn picker_rejects_zero_weights() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        let e = pick_base(&mut rng, &[0.0; 4], "qX").unwrap_err();
        assert!(e.to_string().contains("`qX`"));
    }
}
