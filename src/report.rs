use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::batch::{BatchReport, PairOutcome};
use crate::models::{ComparisonResult, Measurement, Point2};

pub const DELIMITER: char = ';';

pub const CSV_HEADER: [&str; 8] = [
    "comparison",
    "center offset (B relative to A)",
    "rotation delta",
    "left corner (B relative to A)",
    "right corner (B relative to A)",
    "left corner absolute",
    "right corner absolute",
    "1px in cm",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "comparison_results.csv",
            ReportFormat::Json => "comparison_results.json",
        }
    }
}

pub fn format_mm_px(mm: f64, px: f64) -> String {
    format!("{:.6} mm | {:.6} px", mm, px)
}

pub fn format_deg(deg: f64) -> String {
    format!("{:.6} °", deg)
}

pub fn format_point(p: Point2) -> String {
    format!("({:.2}, {:.2})", p.x, p.y)
}

pub fn format_factor(v: f64) -> String {
    format!("{:.8}", v)
}

/// Quote a field only when it contains the delimiter, a quote or a line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([DELIMITER, '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn result_cells(r: &ComparisonResult) -> Vec<String> {
    vec![
        format_mm_px(r.offset_center_mm, r.offset_center_px),
        format_deg(r.rotation_delta_deg),
        format_mm_px(r.left_offset_mm, r.left_offset_px),
        format_mm_px(r.right_offset_mm, r.right_offset_px),
        format_point(r.current_left_abs),
        format_point(r.current_right_abs),
        format_factor(r.cm_per_pixel),
    ]
}

/// Cells of one report row. A failed pair keeps its label, carries the
/// error in the first metric column and `-` everywhere else.
pub fn csv_row(outcome: &PairOutcome) -> Vec<String> {
    let mut row = vec![outcome.label.clone()];
    match &outcome.result {
        Ok(r) => row.extend(result_cells(r)),
        Err(e) => {
            row.push(format!("FAILED: {}", e));
            row.extend(std::iter::repeat_n("-".to_string(), CSV_HEADER.len() - 2));
        }
    }
    row
}

fn write_line<W: Write>(writer: &mut W, cells: &[String]) -> std::io::Result<()> {
    let line: Vec<Cow<'_, str>> = cells.iter().map(|c| escape_field(c)).collect();
    writeln!(writer, "{}", line.join(DELIMITER.to_string().as_str()))
}

pub fn write_csv<W: Write>(mut writer: W, report: &BatchReport) -> Result<()> {
    let header: Vec<String> = CSV_HEADER.iter().map(|h| h.to_string()).collect();
    write_line(&mut writer, &header)?;
    for outcome in &report.pairs {
        write_line(&mut writer, &csv_row(outcome))?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonComparison<'a> {
    comparison: &'a str,
    current: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a ComparisonResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    reference: String,
    reference_measurement: &'a Measurement,
    comparisons: Vec<JsonComparison<'a>>,
}

pub fn write_json<W: Write>(mut writer: W, report: &BatchReport) -> Result<()> {
    let comparisons = report
        .pairs
        .iter()
        .map(|p| JsonComparison {
            comparison: &p.label,
            current: p.current.display().to_string(),
            result: p.result.as_ref().ok(),
            error_kind: p.result.as_ref().err().map(|e| e.kind()),
            error: p.result.as_ref().err().map(|e| e.to_string()),
        })
        .collect();
    let json = JsonReport {
        reference: report.reference.display().to_string(),
        reference_measurement: &report.reference_measurement,
        comparisons,
    };
    serde_json::to_writer_pretty(&mut writer, &json)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write the report into `path`, creating parent directories
pub fn write_report(path: &Path, report: &BatchReport, format: ReportFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create report {}", path.display()))?;
    let writer = BufWriter::new(file);
    match format {
        ReportFormat::Csv => write_csv(writer, report),
        ReportFormat::Json => write_json(writer, report),
    }
}
