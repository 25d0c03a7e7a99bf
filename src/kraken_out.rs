//src/kraken_out.rs

use std::io::{self, BufRead};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::textio::open_text_reader;
use crate::types::{ReadRecord, TaxId, UNCLASSIFIED_TAXID};

fn taxid_pattern() -> &'static Regex {
    static TAXID_RE: OnceLock<Regex> = OnceLock::new();
    TAXID_RE.get_or_init(|| Regex::new(r"taxid\s+(\d+)").expect("static regex"))
}

/// Predicted taxid from the third Kraken column.
///
/// The column holds either a bare taxid or, with `--use-names`, text such as
/// `Escherichia coli (taxid 562)`. Status `U`, blank fields and text without
/// a taxid all map to the unclassified sentinel.
pub fn parse_pred_taxid(status: &str, field: &str) -> TaxId {
    if status == "U" {
        return UNCLASSIFIED_TAXID;
    }
    let s = field.trim();
    if s.is_empty() {
        return UNCLASSIFIED_TAXID;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().unwrap_or(UNCLASSIFIED_TAXID);
    }
    taxid_pattern()
        .captures(s)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(UNCLASSIFIED_TAXID)
}

/// Parse one output line. Only the first three tab-separated fields are
/// split off; the k-mer hit list that follows is left untouched.
/// Returns `None` for blank or short lines.
pub fn parse_output_line(line: &str) -> Option<ReadRecord> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return None;
    }
    let mut fields = line.splitn(4, '\t');
    let status = fields.next()?;
    let read_id = fields.next()?;
    let pred_field = fields.next()?;

    Some(ReadRecord {
        read_id: read_id.to_string(),
        pred_taxid: parse_pred_taxid(status, pred_field),
    })
}

/// Streams `ReadRecord`s out of a Kraken-style classifier output, one line at a time.
pub struct KrakenOutputReader<R: BufRead> {
    reader: R,
    line: String,
}

impl<R: BufRead> KrakenOutputReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }
}

impl KrakenOutputReader<Box<dyn BufRead>> {
    /// Open a (possibly `.gz`) classifier output file.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(open_text_reader(path)?))
    }
}

impl<R: BufRead> Iterator for KrakenOutputReader<R> {
    type Item = io::Result<ReadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    if let Some(record) = parse_output_line(&self.line) {
                        return Some(Ok(record));
                    }
                    // blank or short line: skip
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
