//!
//! JSON artifacts
//!
//! * parameter artifact: one ParameterSet (see `params::artifact`)
//! * log-likelihood artifact: array of numbers, one per EM iteration,
//!   written one value per line
//!
use crate::error::Result;
use crate::params::ParameterSet;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Formatter that puts every element of the top-level array on its own line
#[derive(Default)]
struct RowsFormatter {
    depth: usize,
}

impl Formatter for RowsFormatter {
    fn begin_array<W: ?Sized + Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.depth += 1;
        w.write_all(b"[")
    }
    fn end_array<W: ?Sized + Write>(&mut self, w: &mut W) -> io::Result<()> {
        self.depth -= 1;
        if self.depth == 0 {
            w.write_all(b"\n")?;
        }
        w.write_all(b"]")
    }
    fn begin_array_value<W: ?Sized + Write>(&mut self, w: &mut W, first: bool) -> io::Result<()> {
        if !first {
            w.write_all(b",")?;
        }
        if self.depth == 1 {
            w.write_all(b"\n\t")?;
        }
        Ok(())
    }
}

//
// parameters
//

pub fn write_params<W: Write>(writer: W, params: &ParameterSet) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, params)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

///
/// Parse a parameter artifact. The ParameterSet is re-validated, so a
/// non-stochastic artifact is rejected.
///
pub fn parse_params<R: Read>(reader: R) -> Result<ParameterSet> {
    let params = serde_json::from_reader(BufReader::new(reader))?;
    Ok(params)
}

pub fn save_params<P: AsRef<Path>>(filename: P, params: &ParameterSet) -> Result<()> {
    write_params(File::create(filename)?, params)
}

pub fn load_params<P: AsRef<Path>>(filename: P) -> Result<ParameterSet> {
    parse_params(File::open(filename)?)
}

//
// log-likelihood history
//

pub fn write_log_likelihoods<W: Write>(writer: W, lls: &[f64]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    {
        let mut ser = serde_json::Serializer::with_formatter(&mut writer, RowsFormatter::default());
        lls.serialize(&mut ser)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn parse_log_likelihoods<R: Read>(reader: R) -> Result<Vec<f64>> {
    let lls = serde_json::from_reader(BufReader::new(reader))?;
    Ok(lls)
}

pub fn save_log_likelihoods<P: AsRef<Path>>(filename: P, lls: &[f64]) -> Result<()> {
    write_log_likelihoods(File::create(filename)?, lls)
}

pub fn load_log_likelihoods<P: AsRef<Path>>(filename: P) -> Result<Vec<f64>> {
    parse_log_likelihoods(File::open(filename)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GphmmError;

    #[test]
    fn log_likelihoods_one_per_line() {
        let mut buf = Vec::new();
        write_log_likelihoods(&mut buf, &[-10.5, -9.25, -9.0]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        println!("{}", text);
        assert_eq!(text, "[\n\t-10.5,\n\t-9.25,\n\t-9.0\n]\n");
        let lls = parse_log_likelihoods(text.as_bytes()).unwrap();
        assert_eq!(lls, vec![-10.5, -9.25, -9.0]);

        let mut buf = Vec::new();
        write_log_likelihoods(&mut buf, &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "[\n]\n");
    }
    #[test]
    fn params_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let path = path.to_str().unwrap();
        let params = ParameterSet::uniform(1.0 / 7.0).unwrap();
        save_params(path, &params).unwrap();
        let loaded = load_params(path).unwrap();
        assert_eq!(params, loaded);
    }
    #[test]
    fn broken_params_are_rejected() {
        let mut buf = Vec::new();
        write_params(&mut buf, &ParameterSet::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        // break the diagonal of the A and C rows of pp
        let broken = text.replacen("0.97", "0.5", 2);
        let e = parse_params(broken.as_bytes()).unwrap_err();
        println!("{}", e);
        assert!(matches!(e, GphmmError::Json(_)));
        assert!(e.to_string().contains("pp["));
        assert!(parse_params(&b"{\"qR\": 1}"[..]).is_err());
    }
}
