//! The vendor's fixed-column wire format: tab-delimited, CRLF-terminated,
//! header row, no quoting. Pure transforms, no network or storage I/O.
//!
//! Outbound rows are built by fallible conversions from domain records and a
//! conversion failure excludes only that record; inbound parsing collects
//! row-level failures without aborting siblings.

pub mod fields;
pub mod formats;

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Row delimiter and terminator are a byte-exact vendor contract.
const DELIMITER: u8 = b'\t';

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to write vendor file: {0}")]
    Write(#[from] csv::Error),
    #[error("failed to flush vendor file: {0}")]
    Flush(#[from] std::io::Error),
}

/// One source record a writer refused to encode, with the caller-facing
/// reason. The record itself stays untouched for the caller to flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub index: usize,
    pub reason: String,
}

/// Result of encoding a batch: the serialized payload plus which input
/// indices made it in and which were rejected.
#[derive(Debug)]
pub struct EncodeOutcome {
    pub payload: Vec<u8>,
    pub accepted: Vec<usize>,
    pub rejected: Vec<RejectedRecord>,
}

/// Result of decoding a batch: typed rows plus human-readable descriptions of
/// the rows that could not be parsed.
#[derive(Debug)]
pub struct DecodeOutcome<Row> {
    pub rows: Vec<Row>,
    pub invalid: Vec<String>,
}

/// Serialize rows in the shared dialect, header first. Row structs carry the
/// vendor column names via serde renames, so field order is column order.
pub(crate) fn write_rows<Row: Serialize>(rows: &[Row]) -> Result<Vec<u8>, CodecError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .terminator(csv::Terminator::CRLF)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| CodecError::Flush(err.into_error()))
}

/// Parse a header-bearing stream into typed rows, one parse failure per bad
/// row. A missing expected column fails each row, never the whole file.
pub(crate) fn read_rows<Row, R>(reader: R) -> DecodeOutcome<Row>
where
    Row: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = reader_builder().from_reader(reader);
    let mut outcome = DecodeOutcome {
        rows: Vec::new(),
        invalid: Vec::new(),
    };
    for (index, row) in csv_reader.deserialize::<Row>().enumerate() {
        match row {
            Ok(row) => outcome.rows.push(row),
            Err(err) => outcome.invalid.push(format!("row {}: {}", index + 1, err)),
        }
    }
    outcome
}

/// Like [`read_rows`], but each typed row keeps the raw tab-joined cells the
/// vendor sent, for records that must retain their source line.
pub(crate) fn read_rows_with_raw<Row, R>(reader: R) -> DecodeOutcome<(Row, String)>
where
    Row: DeserializeOwned,
    R: Read,
{
    let mut csv_reader = reader_builder().from_reader(reader);
    let mut outcome = DecodeOutcome {
        rows: Vec::new(),
        invalid: Vec::new(),
    };
    let headers = match csv_reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => {
            outcome.invalid.push(format!("header: {}", err));
            return outcome;
        }
    };
    for (index, record) in csv_reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                outcome.invalid.push(format!("row {}: {}", index + 1, err));
                continue;
            }
        };
        match record.deserialize::<Row>(Some(&headers)) {
            Ok(row) => {
                let raw = record.iter().collect::<Vec<_>>().join("\t");
                outcome.rows.push((row, raw));
            }
            Err(err) => outcome.invalid.push(format!("row {}: {}", index + 1, err)),
        }
    }
    outcome
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(DELIMITER)
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All);
    builder
}
