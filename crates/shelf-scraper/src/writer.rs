use std::io;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::record::CleanRecord;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvWriterConfig {
    #[serde(default = "default_csv_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_csv_terminator")]
    pub terminator: CsvTerminator,
    #[serde(default = "default_csv_headers")]
    pub headers: bool,
}

impl Default for CsvWriterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            terminator: CsvTerminator::Any('\n'),
            headers: true,
        }
    }
}

fn default_csv_delimiter() -> char {
    CsvWriterConfig::default().delimiter
}

fn default_csv_terminator() -> CsvTerminator {
    CsvWriterConfig::default().terminator
}

fn default_csv_headers() -> bool {
    CsvWriterConfig::default().headers
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CsvTerminator {
    CRLF,
    Any(char),
}

impl From<CsvTerminator> for csv::Terminator {
    fn from(source: CsvTerminator) -> Self {
        match source {
            CsvTerminator::CRLF => Self::CRLF,
            CsvTerminator::Any(c) => Self::Any(c as u8),
        }
    }
}

impl From<&CsvWriterConfig> for csv::WriterBuilder {
    fn from(c: &CsvWriterConfig) -> Self {
        let mut builder = csv::WriterBuilder::new();
        builder.delimiter(c.delimiter as u8);
        builder.terminator(c.terminator.into());
        builder.has_headers(c.headers);
        builder
    }
}

/// Writes `records` with a `laptops,prices,ratings,votes` header, returns the
/// number of rows written
pub fn write_records<'a, W, I>(wtr: W, records: I, config: &CsvWriterConfig) -> anyhow::Result<usize>
where
    W: io::Write,
    I: IntoIterator<Item = &'a CleanRecord>,
{
    let mut wtr = csv::WriterBuilder::from(config).from_writer(wtr);
    let mut rows = 0;
    for record in records {
        wtr.serialize(record)?;
        rows += 1;
    }
    if rows == 0 && config.headers {
        wtr.write_record(["laptops", "prices", "ratings", "votes"])?;
    }
    wtr.flush()?;
    Ok(rows)
}

/// Creates missing parent directories, overwrites an existing file
pub fn write_dataset<'a, I>(path: &Path, records: I, config: &CsvWriterConfig) -> anyhow::Result<usize>
where
    I: IntoIterator<Item = &'a CleanRecord>,
{
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs_err::create_dir_all(dir)?;
    }
    let file = fs_err::File::create(path)?;
    let rows = write_records(file, records, config)
        .with_context(|| format!("Couldn't write dataset to {}", path.display()))?;
    log::info!("Wrote {rows} records to {}", path.display());
    Ok(rows)
}

pub fn read_dataset(path: &Path) -> anyhow::Result<Vec<CleanRecord>> {
    let file = fs_err::File::open(path)?;
    csv::Reader::from_reader(file)
        .deserialize()
        .collect::<Result<Vec<CleanRecord>, _>>()
        .with_context(|| format!("Couldn't read dataset {}", path.display()))
}
