//! Rendering of fetched records as CSV, JSON, or a plain text table.

use crate::error::{Result, ScopusError};
use crate::scopus::{ArticleRecord, UNKNOWN};
use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Column order for CSV output
pub const RECORD_COLUMNS: &[&str] = &[
    "title",
    "authors",
    "publication_date",
    "citations",
    "journal",
    "journal_link",
    "doi_link",
];

/// Widest title shown in table output
const TABLE_TITLE_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = ScopusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ScopusError::Validation(format!("Unknown output format: {}", other))),
        }
    }
}

/// Write records to `writer` in the given format.
pub fn write_records<W: Write>(writer: W, records: &[ArticleRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(writer, records),
        OutputFormat::Csv => write_csv(writer, records),
        OutputFormat::Table => write_table(writer, records),
    }
}

/// Save records to a file.
pub fn save_records(path: &Path, records: &[ArticleRecord], format: OutputFormat) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_records(std::io::BufWriter::new(file), records, format)?;
    info!(path = %path.display(), count = records.len(), "Saved records");
    Ok(())
}

fn write_json<W: Write>(mut writer: W, records: &[ArticleRecord]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn write_csv<W: Write>(writer: W, records: &[ArticleRecord]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    // Header written by hand so an empty result still gets one
    wtr.write_record(RECORD_COLUMNS)?;
    for record in records {
        wtr.serialize(record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn write_table<W: Write>(mut writer: W, records: &[ArticleRecord]) -> Result<()> {
    if records.is_empty() {
        writeln!(writer, "No articles found.")?;
        return Ok(());
    }

    let mut out = String::new();
    for (idx, record) in records.iter().enumerate() {
        let title = record.title.as_deref().unwrap_or(UNKNOWN);
        let _ = writeln!(out, "{:>3}. {}", idx + 1, truncate(title, TABLE_TITLE_WIDTH));
        let _ = writeln!(
            out,
            "     {} | {} | cited by {}",
            record.authors,
            record.publication_date,
            record.citations
        );
        let _ = writeln!(
            out,
            "     {} | {}",
            record.journal.as_deref().unwrap_or(UNKNOWN),
            record.doi_link
        );
    }

    writer.write_all(out.as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
