//! `tidemark errors` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use tidemark_capture::ErrorRecord;

use crate::cli::{ErrorsAction, ErrorsArgs};
use crate::commands::read_input;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `errors` command.
pub fn execute(args: ErrorsArgs, writer: &OutputWriter) -> Result<(), CliError> {
    match args.action {
        ErrorsAction::Compress { input } => {
            let report = compress(&read_input(&input)?)?;
            writer.render(&report)
        }
        ErrorsAction::Decompress { input } => {
            let report = decompress(&read_input(&input)?)?;
            writer.render(&report)
        }
    }
}

fn compress(json: &str) -> Result<CompressReport, CliError> {
    let records: Vec<ErrorRecord> = serde_json::from_str(json)?;
    let compressed = tidemark_capture::compress(&records);
    info!(records = records.len(), bytes = compressed.len(), "compressed error records");
    Ok(CompressReport {
        records: records.len(),
        compressed,
    })
}

fn decompress(value: &str) -> Result<DecompressReport, CliError> {
    let records = tidemark_capture::decompress(value)?;
    info!(records = records.len(), "decompressed error records");
    Ok(DecompressReport { records })
}

/// Compressed error payload.
#[derive(Debug, Serialize)]
pub struct CompressReport {
    pub records: usize,
    pub compressed: String,
}

impl Render for CompressReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.compressed)
    }
}

/// Decompressed error payload.
#[derive(Debug, Serialize)]
pub struct DecompressReport {
    pub records: Vec<ErrorRecord>,
}

impl Render for DecompressReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "{} error record(s)", self.records.len())?;
        for record in &self.records {
            write!(w, "  {} x{}", record.message.red(), record.count)?;
            if let Some(ref source) = record.source {
                write!(
                    w,
                    " at {}:{}:{}",
                    source,
                    record.line.unwrap_or_default(),
                    record.column.unwrap_or_default()
                )?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_minimal_record() {
        let report = compress(r#"[{"message":"boom"}]"#).expect("valid JSON");
        assert_eq!(report.records, 1);
        assert_eq!(report.compressed, "~(~(m~'boom))");
    }

    #[test]
    fn test_compress_rejects_invalid_json() {
        let err = compress("{not json").expect_err("invalid JSON");
        assert!(matches!(err, CliError::Json(_)));
    }

    #[test]
    fn test_decompress_round_trips_compressed_output() {
        let json = r#"[{"message":"boom","source":"app.js","line":10,"column":5,"count":3}]"#;
        let compressed = compress(json).expect("compress").compressed;
        let report = decompress(&compressed).expect("decompress");
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].count, 3);
        assert_eq!(report.records[0].line, Some(10));
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        let err = decompress("~(~(m").expect_err("truncated input");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_decompress_report_text() {
        let report = DecompressReport {
            records: vec![ErrorRecord::new("boom").at("app.js", 1, 2)],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("1 error record(s)"));
        assert!(output.contains("app.js:1:2"));
    }
}
