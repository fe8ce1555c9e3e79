//!
//! Tab-separated pairs table
//!
//! ```text
//! # query_id	reference_id	qv
//! read0	ref0	20
//! read1	ref0
//! ```
//!
//! Lines starting with `#` and blank lines are skipped. The `qv` column is
//! optional. Scores are written back as a table with fixed columns, see
//! `write_scored_pairs`.
//!
use super::fasta::SequenceCollection;
use crate::align::AlignmentResult;
use crate::common::{Quality, Qv};
use crate::error::{GphmmError, Result, Stage};
use crate::pair::SequencePair;
use itertools::Itertools;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

///
/// One row of the pairs table
///
#[derive(Clone, Debug, PartialEq)]
pub struct PairRow {
    pub query_id: String,
    pub reference_id: String,
    pub qv: Option<Qv>,
}

impl PairRow {
    /// `query_id/reference_id`, used as the SequencePair id
    pub fn pair_id(&self) -> String {
        format!("{}/{}", self.query_id, self.reference_id)
    }
    fn fields(&self) -> Vec<String> {
        let mut fields = vec![self.query_id.clone(), self.reference_id.clone()];
        if let Some(qv) = self.qv {
            fields.push(qv.to_string());
        }
        fields
    }
}

pub fn parse_pairs_table<R: BufRead>(reader: R) -> Result<Vec<PairRow>> {
    let mut rows = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let row = match fields.as_slice() {
            [query_id, reference_id] => PairRow {
                query_id: query_id.to_string(),
                reference_id: reference_id.to_string(),
                qv: None,
            },
            [query_id, reference_id, qv] => PairRow {
                query_id: query_id.to_string(),
                reference_id: reference_id.to_string(),
                qv: Some(qv.parse().map_err(|_| GphmmError::Parse {
                    line: line_no,
                    reason: format!("quality value `{}` is not an integer in 0..=255", qv),
                })?),
            },
            _ => {
                return Err(GphmmError::Parse {
                    line: line_no,
                    reason: format!("expected 2 or 3 tab-separated fields, found {}", fields.len()),
                })
            }
        };
        rows.push(row);
    }
    Ok(rows)
}

pub fn read_pairs_table<P: AsRef<Path>>(filename: P) -> Result<Vec<PairRow>> {
    let file = File::open(filename)?;
    parse_pairs_table(BufReader::new(file))
}

///
/// Join the table with the query and reference collections.
///
/// An id absent from its collection is `MissingRecord`; invalid sequences
/// are reported by the SequencePair constructor. Both at `Stage::Input`.
///
pub fn join_pairs(
    rows: &[PairRow],
    queries: &SequenceCollection,
    references: &SequenceCollection,
    default_qv: Qv,
) -> Result<Vec<SequencePair>> {
    rows.iter()
        .map(|row| {
            let query = queries.get(&row.query_id).ok_or_else(|| GphmmError::MissingRecord {
                id: row.query_id.clone(),
                stage: Stage::Input,
            })?;
            let reference =
                references
                    .get(&row.reference_id)
                    .ok_or_else(|| GphmmError::MissingRecord {
                        id: row.reference_id.clone(),
                        stage: Stage::Input,
                    })?;
            let qv = Quality::Scalar(row.qv.unwrap_or(default_qv));
            SequencePair::new(row.pair_id(), query, reference, qv)
        })
        .collect()
}

///
/// Write rows in the layout read by `parse_pairs_table`. The `qv` field is
/// written only for rows that carry one.
///
pub fn write_pairs_table<W: Write>(writer: W, rows: &[PairRow]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    writeln!(writer, "# query_id\treference_id\tqv")?;
    for row in rows.iter() {
        writeln!(writer, "{}", row.fields().iter().join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_pairs_table<P: AsRef<Path>>(filename: P, rows: &[PairRow]) -> Result<()> {
    write_pairs_table(File::create(filename)?, rows)
}

///
/// Write one line per row, in input order, with the columns
///
/// ```text
/// query_id  reference_id  qv  log_probability  [viterbi_log_probability  path]
/// ```
///
/// `qv` is the effective quality (`default_qv` for rows without one). The
/// two Viterbi columns are present when any result carries a path, and are
/// empty for results that do not.
///
pub fn write_scored_pairs<W: Write>(
    writer: W,
    rows: &[PairRow],
    results: &[AlignmentResult],
    default_qv: Qv,
) -> Result<()> {
    if rows.len() != results.len() {
        return Err(GphmmError::ResultCountMismatch {
            rows: rows.len(),
            results: results.len(),
        });
    }
    let with_path = results.iter().any(|r| r.state_path.is_some());
    let mut writer = BufWriter::new(writer);
    write!(writer, "# {}", SCORED_COLUMNS.iter().join("\t"))?;
    if with_path {
        write!(writer, "\t{}", SCORED_PATH_COLUMNS.iter().join("\t"))?;
    }
    writeln!(writer)?;
    for (row, result) in rows.iter().zip(results.iter()) {
        let mut fields = vec![
            row.query_id.clone(),
            row.reference_id.clone(),
            row.qv.unwrap_or(default_qv).to_string(),
            result.log_probability.to_string(),
        ];
        if with_path {
            fields.push(
                result
                    .viterbi_log_probability
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
            fields.push(result.path_string().unwrap_or_default());
        }
        writeln!(writer, "{}", fields.iter().join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Columns always present in the scored-pairs table
pub const SCORED_COLUMNS: [&str; 4] = ["query_id", "reference_id", "qv", "log_probability"];
/// Columns appended for long-mode results
pub const SCORED_PATH_COLUMNS: [&str; 2] = ["viterbi_log_probability", "path"];

pub fn save_scored_pairs<P: AsRef<Path>>(
    filename: P,
    rows: &[PairRow],
    results: &[AlignmentResult],
    default_qv: Qv,
) -> Result<()> {
    write_scored_pairs(File::create(filename)?, rows, results, default_qv)
}
