//!
//! Persisted shape of a ParameterSet
//!
//! ```text
//! {
//!   "qR": {"A": .., "C": .., "G": .., "T": ..},
//!   "qX": {..}, "qY": {..},
//!   "pp": {"A": {"A": .., "C": .., ..}, "C": {..}, ..},
//!   "deltaX": {"intercept": .., "slope": ..},
//!   "deltaY": {"intercept": .., "slope": ..}
//! }
//! ```
//!
//! Every distribution is keyed by base so the nucleotide order is explicit.
//!
use super::{LinearIndel, ParameterSet};
use crate::common::{index_to_base, N_BASES, VALID_BASES};
use crate::error::GphmmError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;

/// Distribution over `ACGT` keyed by base letter
pub type BaseDist = BTreeMap<String, f64>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterArtifact {
    #[serde(rename = "qR")]
    pub q_r: BaseDist,
    #[serde(rename = "qX")]
    pub q_x: BaseDist,
    #[serde(rename = "qY")]
    pub q_y: BaseDist,
    pub pp: BTreeMap<String, BaseDist>,
    #[serde(rename = "deltaX")]
    pub delta_x: LinearIndel,
    #[serde(rename = "deltaY")]
    pub delta_y: LinearIndel,
}

fn to_base_dist(xs: &[f64; N_BASES]) -> BaseDist {
    xs.iter()
        .enumerate()
        .map(|(i, &x)| ((index_to_base(i) as char).to_string(), x))
        .collect()
}

fn from_base_dist(field: &str, dist: &BaseDist) -> Result<[f64; N_BASES], GphmmError> {
    if let Some(key) = dist
        .keys()
        .find(|key| !VALID_BASES.iter().any(|&b| key.as_str() == (b as char).to_string()))
    {
        return Err(GphmmError::InvalidParameter {
            field: field.to_owned(),
            reason: format!("unknown base label `{}`", key),
        });
    }
    let mut xs = [0.0; N_BASES];
    for (i, x) in xs.iter_mut().enumerate() {
        let key = (index_to_base(i) as char).to_string();
        *x = *dist
            .get(&key)
            .ok_or_else(|| GphmmError::InvalidParameter {
                field: field.to_owned(),
                reason: format!("missing entry for base `{}`", key),
            })?;
    }
    Ok(xs)
}

impl From<ParameterSet> for ParameterArtifact {
    fn from(params: ParameterSet) -> Self {
        ParameterArtifact {
            q_r: to_base_dist(params.q_r()),
            q_x: to_base_dist(params.q_x()),
            q_y: to_base_dist(params.q_y()),
            pp: params
                .pp()
                .iter()
                .enumerate()
                .map(|(r, row)| ((index_to_base(r) as char).to_string(), to_base_dist(row)))
                .collect(),
            delta_x: params.delta_x(),
            delta_y: params.delta_y(),
        }
    }
}

impl TryFrom<ParameterArtifact> for ParameterSet {
    type Error = GphmmError;
    fn try_from(artifact: ParameterArtifact) -> Result<Self, Self::Error> {
        let empty = BaseDist::new();
        let mut pp = [[0.0; N_BASES]; N_BASES];
        for (r, row) in pp.iter_mut().enumerate() {
            let key = (index_to_base(r) as char).to_string();
            let field = format!("pp[{}]", key);
            *row = from_base_dist(&field, artifact.pp.get(&key).unwrap_or(&empty))?;
        }
        ParameterSet::new(
            from_base_dist("qR", &artifact.q_r)?,
            from_base_dist("qX", &artifact.q_x)?,
            from_base_dist("qY", &artifact.q_y)?,
            pp,
            artifact.delta_x,
            artifact.delta_y,
        )
    }
}
