use std::io::Read;

use crate::error::{AlignError, Result};

/// A delimited text table: one header row plus rectangular string rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse a table whose first record is the header.
    ///
    /// Quoting follows RFC 4180, so quoted fields may hold delimiters, `""`
    /// escapes and line breaks. Blank lines are skipped. Every row must have
    /// as many fields as the header. `table` names the input in errors.
    pub fn read<R: Read>(reader: R, delimiter: u8, table: &'static str) -> Result<Table> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);

        let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if header.is_empty() {
            return Err(AlignError::MissingHeader { table });
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(ragged_or_csv)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Table { header, rows })
    }

    pub fn num_columns(&self) -> usize {
        self.header.len()
    }

    /// Fail unless the table has at least `needed` columns.
    pub fn require_columns(&self, needed: usize, table: &'static str) -> Result<()> {
        if self.num_columns() < needed {
            return Err(AlignError::TooFewColumns {
                table,
                needed,
                got: self.num_columns(),
            });
        }
        Ok(())
    }
}

fn ragged_or_csv(err: csv::Error) -> AlignError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => AlignError::RaggedRow {
            line: pos.as_ref().map_or(0, |p| p.line() as usize),
            expected: *expected_len as usize,
            got: *len as usize,
        },
        _ => AlignError::Csv(err),
    }
}
