//! Result rows out (and back in, for downstream commands).

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::driver::RuleRow;

/// Write rows to `path`; `.json` selects JSON, anything else CSV.
pub fn write_rows(path: &Path, rows: &[RuleRow]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    let written = if super::is_json(path) {
        write_rows_json(writer, rows)
    } else {
        write_rows_csv(writer, rows)
    };
    written.with_context(|| format!("Failed to write results to {}", path.display()))
}

pub fn write_rows_csv<W: Write>(writer: W, rows: &[RuleRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_rows_json<W: Write>(mut writer: W, rows: &[RuleRow]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Read rows previously written by [`write_rows`].
pub fn read_rows(path: &Path) -> Result<Vec<RuleRow>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let rows = if super::is_json(path) {
        serde_json::from_reader(reader).map_err(anyhow::Error::from)
    } else {
        read_rows_csv(reader)
    };
    rows.with_context(|| format!("Failed to read rules from {}", path.display()))
}

pub fn read_rows_csv<R: Read>(reader: R) -> Result<Vec<RuleRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("Malformed row at line {}", i + 2)))
        .collect()
}
