//! `lm-align` - Merges human reading-time tables with per-word language
//! model surprisal.
//!
//! Inputs:
//! - a comma-separated reading-time table whose first column is the word
//! - a tab-separated surprisal table whose columns 2 and 3 are the word and
//!   its surprisal
//!
//! Output is a comma-separated table with a leading unnamed index column,
//! then `Word`, `surprisal` and the remaining reading-time columns.

pub mod error;
pub mod harmonize;
pub mod table;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::info;

pub use error::{AlignError, Result};
pub use harmonize::{harmonize_rows, AlignOptions, MergedRow};
pub use table::Table;

/// Write merged rows as CSV. `measure_columns` names the fields of
/// [`MergedRow::measures`].
pub fn write_merged<W: Write>(
    writer: W,
    measure_columns: &[String],
    rows: &[MergedRow],
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["", "Word", "surprisal"];
    header.extend(measure_columns.iter().map(String::as_str));
    wtr.write_record(&header)?;

    for (i, row) in rows.iter().enumerate() {
        let index = i.to_string();
        let mut fields = vec![index.as_str(), row.word.as_str(), row.surprisal.as_str()];
        fields.extend(row.measures.iter().map(String::as_str));
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Align the two input files and write the merged table to `output_path`.
///
/// Returns the number of merged rows.
pub fn harmonize(
    reading_times_path: &Path,
    surprisal_path: &Path,
    output_path: &Path,
    options: AlignOptions,
) -> Result<usize> {
    let reference = Table::read(File::open(reading_times_path)?, b',', "reading-time")?;
    let surprisals = Table::read(File::open(surprisal_path)?, b'\t', "surprisal")?;

    let merged = harmonize_rows(&reference, &surprisals, options)?;
    write_merged(File::create(output_path)?, &reference.header[1..], &merged)?;

    info!(
        rows = merged.len(),
        output = %output_path.display(),
        "wrote aligned table"
    );
    Ok(merged.len())
}
