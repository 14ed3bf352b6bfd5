use crate::{config::Config, record::RawRecord};
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Please upload a CSV file: {0}")]
    NotCsv(String),

    #[error("dataset delimiter must be a single byte, got {0:?}")]
    BadDelimiter(String),

    #[error("dataset exceeds max_rows ({0})")]
    TooManyRows(usize),

    #[error("Error parsing file: {0}")]
    Parse(#[from] csv::Error),

    #[error("reading dataset: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads a delimited dataset from disk, enforcing the `.csv` extension when configured.
pub fn load(cfg: &Config, path: &Path) -> Result<Vec<RawRecord>, DatasetError> {
    if cfg.dataset.require_csv_extension {
        let is_csv = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if !is_csv {
            return Err(DatasetError::NotCsv(path.display().to_string()));
        }
    }

    let file = std::fs::File::open(path)?;
    parse(cfg, file)
}

/// Header row names the fields; source order is kept. Only truly empty lines are skipped:
/// a row of empty cells such as `,,,` is still a record.
pub fn parse<R: Read>(cfg: &Config, input: R) -> Result<Vec<RawRecord>, DatasetError> {
    let delimiter = match cfg.dataset.delimiter.as_bytes() {
        [b] => *b,
        _ => return Err(DatasetError::BadDelimiter(cfg.dataset.delimiter.clone())),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| {
            if cfg.dataset.trim_headers {
                h.trim().to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if cfg.dataset.max_rows > 0 && records.len() >= cfg.dataset.max_rows {
            return Err(DatasetError::TooManyRows(cfg.dataset.max_rows));
        }
        records.push(RawRecord::from_pairs(
            headers.iter().cloned().zip(row.iter().map(str::to_string)),
        ));
    }

    debug!(rows = records.len(), columns = headers.len(), "dataset parsed");
    Ok(records)
}
