use crate::error::{Result, ScoutError};
use crate::models::ListingRecord;
use crate::settings::{OutputConfig, OutputFormat};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persists the records of a finished run.
pub trait ResultSink: Send + Sync {
    /// Write `records` to a new file named after `destination_hint`.
    ///
    /// Returns `Ok(None)` without touching the filesystem when there is
    /// nothing to write.
    fn write(&self, records: &[ListingRecord], destination_hint: &str) -> Result<Option<PathBuf>>;
}

/// Build the sink selected by the output configuration.
pub fn sink_for(output: &OutputConfig) -> Box<dyn ResultSink> {
    match output.format {
        OutputFormat::Xlsx => Box::new(XlsxSink::new(output.directory.clone())),
        OutputFormat::Json => Box::new(JsonSink::new(output.directory.clone())),
    }
}

/// Configured directory if any, else the desktop, else the working directory.
pub fn resolve_output_dir(configured: Option<&Path>) -> PathBuf {
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    dirs::desktop_dir()
        .filter(|d| d.is_dir())
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `Leads_{hint}_{YYYYMMDD_HHMMSS}.{ext}`, with characters that are not
/// valid in a file name replaced by `-`.
pub fn output_file_name(hint: &str, at: DateTime<Local>, format: OutputFormat) -> String {
    format!(
        "Leads_{}_{}.{}",
        file_safe(hint),
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn file_safe(hint: &str) -> String {
    hint.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

fn prepare_path(directory: Option<&Path>, hint: &str, format: OutputFormat) -> Result<PathBuf> {
    let dir = resolve_output_dir(directory);
    if directory.is_some() {
        fs::create_dir_all(&dir)?;
    }
    Ok(dir.join(output_file_name(hint, Local::now(), format)))
}

pub struct XlsxSink {
    directory: Option<PathBuf>,
}

impl XlsxSink {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }
}

impl ResultSink for XlsxSink {
    fn write(&self, records: &[ListingRecord], destination_hint: &str) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            debug!("No records, skipping spreadsheet");
            return Ok(None);
        }

        let path = prepare_path(self.directory.as_deref(), destination_hint, OutputFormat::Xlsx)?;
        let export_err = |e: rust_xlsxwriter::XlsxError| ScoutError::Export {
            path: path.clone(),
            message: e.to_string(),
        };

        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let sheet = workbook.add_worksheet();

        for (col, name) in ListingRecord::COLUMNS.iter().enumerate() {
            sheet
                .write_string_with_format(0, col as u16, *name, &header)
                .map_err(export_err)?;
        }
        for (idx, record) in records.iter().enumerate() {
            let row = idx as u32 + 1;
            for (col, cell) in record.cells().iter().enumerate() {
                sheet.write_string(row, col as u16, *cell).map_err(export_err)?;
            }
        }

        workbook.save(&path).map_err(export_err)?;
        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(Some(path))
    }
}

pub struct JsonSink {
    directory: Option<PathBuf>,
}

impl JsonSink {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }
}

impl ResultSink for JsonSink {
    fn write(&self, records: &[ListingRecord], destination_hint: &str) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            debug!("No records, skipping JSON export");
            return Ok(None);
        }

        let path = prepare_path(self.directory.as_deref(), destination_hint, OutputFormat::Json)?;
        let json = serde_json::to_string_pretty(records).map_err(|e| ScoutError::Export {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, json)?;
        info!("Wrote {} records to {}", records.len(), path.display());
        Ok(Some(path))
    }
}
