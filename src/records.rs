//! Record table persistence
//!
//! The handoff artifact between extraction and everything downstream: a CSV
//! file with the header `time,latitude,longitude` and one row per anchor.

use crate::{FlightTrackError, RawRecord};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

pub const RECORD_COLUMNS: [&str; 3] = ["time", "latitude", "longitude"];

/// Writes the record table, header row included.
pub fn write_records<W: Write>(writer: W, records: &[RawRecord]) -> Result<(), FlightTrackError> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    // explicit header so an empty table still carries its columns
    csv_writer.write_record(RECORD_COLUMNS)?;
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Reads a record table, checking the header matches the expected columns.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<RawRecord>, FlightTrackError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers = csv_reader.headers()?;
    if headers.iter().ne(RECORD_COLUMNS) {
        return Err(FlightTrackError::ConfigError(format!(
            "record table columns must be {:?}, found {:?}",
            RECORD_COLUMNS,
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub fn write_record_table(path: &Path, records: &[RawRecord]) -> Result<(), FlightTrackError> {
    let file = std::fs::File::create(path)?;
    write_records(file, records)?;
    debug!(path = %path.display(), rows = records.len(), "Wrote record table");
    Ok(())
}

pub fn read_record_table(path: &Path) -> Result<Vec<RawRecord>, FlightTrackError> {
    let file = std::fs::File::open(path)?;
    let records = read_records(file)?;
    debug!(path = %path.display(), rows = records.len(), "Read record table");
    Ok(records)
}
