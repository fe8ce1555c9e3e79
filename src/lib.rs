//!
//! gphmm: generalized pair hidden Markov model of a noisy read and its
//! reference
//!
//! * `align`: Forward / Backward / Viterbi scoring of a SequencePair
//! * `train`: Baum-Welch estimation of a ParameterSet
//! * `generate`: random references and simulated reads
//!
#[macro_use]
extern crate approx;

pub mod align;
pub mod common;
pub mod error;
pub mod generate;
pub mod io;
pub mod pair;
pub mod params;
pub mod prob;
pub mod train;

pub use align::{compute_probability, score_sequences, AlignmentResult, Mode};
pub use common::Quality;
pub use error::{GphmmError, Result, Stage};
pub use generate::{generate_random_sequences, generate_read, generate_training_pairs};
pub use pair::SequencePair;
pub use params::{ParameterSet, State};
pub use train::{train_parameters, TrainConfig, Trainer, TrainingResult};
