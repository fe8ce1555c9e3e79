//!
//! I/O adapters around the core
//!
//! * `fasta`: sequence collections
//! * `table`: pairs table input and scored-pairs table output
//! * `json`: parameter and log-likelihood artifacts
//!
pub mod fasta;
pub mod json;
pub mod table;
