//!
//! FASTA reading and writing of sequence collections
//!
use crate::common::Sequence;
use crate::error::Result;
use bio::io::fasta;
use log::warn;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

///
/// Records of a FASTA file in file order, with lookup by id.
///
#[derive(Clone, Debug, Default)]
pub struct SequenceCollection {
    records: Vec<(String, Sequence)>,
    index: HashMap<String, usize>,
}

impl SequenceCollection {
    pub fn new() -> Self {
        SequenceCollection::default()
    }
    ///
    /// Append a record. A duplicated id replaces the lookup target with the
    /// later record.
    ///
    pub fn push(&mut self, id: String, seq: Sequence) {
        if self.index.contains_key(&id) {
            warn!("duplicated id `{}` in sequence collection", id);
        }
        self.index.insert(id.clone(), self.records.len());
        self.records.push((id, seq));
    }
    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.index.get(id).map(|&i| self.records[i].1.as_slice())
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.records
            .iter()
            .map(|(id, seq)| (id.as_str(), seq.as_slice()))
    }
}

impl std::iter::FromIterator<(String, Sequence)> for SequenceCollection {
    fn from_iter<I: IntoIterator<Item = (String, Sequence)>>(iter: I) -> Self {
        let mut c = SequenceCollection::new();
        for (id, seq) in iter {
            c.push(id, seq);
        }
        c
    }
}

///
/// Parse FASTA records from a reader. Sequences are kept as written; they are
/// validated when a SequencePair is built from them.
///
pub fn parse_sequences<R: Read>(reader: R) -> Result<SequenceCollection> {
    let reader = fasta::Reader::new(reader);
    let mut c = SequenceCollection::new();
    for result in reader.records() {
        let record = result?;
        c.push(record.id().to_owned(), record.seq().to_vec());
    }
    Ok(c)
}

pub fn read_sequences<P: AsRef<Path>>(filename: P) -> Result<SequenceCollection> {
    let file = File::open(filename)?;
    parse_sequences(BufReader::new(file))
}

///
/// Write `(id, seq)` records as FASTA
///
pub fn write_sequences<'a, W, I>(writer: W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = fasta::Writer::new(writer);
    for (id, seq) in records {
        writer.write(id, None, seq)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_sequences<'a, P, I>(filename: P, records: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let file = File::create(filename)?;
    write_sequences(file, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fasta_parse_and_lookup() {
        let text = b">r0 first\nACGT\nAC\n>r1\nTTTT\n";
        let c = parse_sequences(&text[..]).unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("r0"), Some(&b"ACGTAC"[..]));
        assert_eq!(c.get("r1"), Some(&b"TTTT"[..]));
        assert_eq!(c.get("r2"), None);
        let ids: Vec<&str> = c.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["r0", "r1"]);
    }
    #[test]
    fn fasta_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa");
        let path = path.to_str().unwrap();
        let records: Vec<(String, Sequence)> = vec![
            ("a".to_owned(), b"ACGTTGCA".to_vec()),
            ("b".to_owned(), b"GG".to_vec()),
        ];
        save_sequences(
            path,
            records.iter().map(|(id, s)| (id.as_str(), s.as_slice())),
        )
        .unwrap();
        let c = read_sequences(path).unwrap();
        assert_eq!(c.get("a"), Some(&b"ACGTTGCA"[..]));
        assert_eq!(c.get("b"), Some(&b"GG"[..]));
        assert!(read_sequences("/nonexistent/seqs.fa").is_err());
    }
}
