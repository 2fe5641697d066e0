//! CSV export for batch simulation results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::batch::SimulationResult;

/// Exports a simulation result to a CSV file at the given path.
///
/// Writes a `time,<column>...` header followed by one row per sample.
/// Produces deterministic output for identical inputs.
///
/// # Arguments
///
/// * `result` - Recorded batch run
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(result: &SimulationResult, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(result, buf)
}

/// Writes a simulation result as CSV to any writer.
///
/// Values use Rust's shortest round-trip float formatting.
///
/// # Arguments
///
/// * `result` - Recorded batch run
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(result: &SimulationResult, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header = Vec::with_capacity(result.columns.len() + 1);
    header.push("time");
    header.extend(result.columns.iter().map(|c| c.name.as_str()));
    wtr.write_record(&header)?;

    let mut row = Vec::with_capacity(header.len());
    for (i, t) in result.time.iter().enumerate() {
        row.clear();
        row.push(t.to_string());
        row.extend(
            result
                .columns
                .iter()
                .map(|c| c.values.get(i).map_or_else(String::new, f64::to_string)),
        );
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
