//! Semicolon-separated export of a metrics table
//!
//! Fields are separated by `;` and decimals use `,` so the file opens
//! directly in spreadsheet locales that expect it. Undefined values (NaN)
//! are written as empty fields.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::metrics::{ClassMetrics, ClassMetricsTable, METRIC_COUNT, METRIC_NAMES};

pub const EXPORT_DELIMITER: u8 = b';';

/// `landscape_metrics_<YYYYmmdd_HHMMSS>.csv`
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("landscape_metrics_{}.csv", at.format("%Y%m%d_%H%M%S"))
}

fn format_decimal(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string().replace('.', ",")
    }
}

fn parse_decimal(field: &str) -> Result<f64> {
    if field.is_empty() {
        return Ok(f64::NAN);
    }
    field
        .replace(',', ".")
        .parse()
        .map_err(|_| Error::Export(format!("invalid decimal field: {:?}", field)))
}

/// Header row: class code, label, then the metric names
pub fn header() -> Vec<&'static str> {
    let mut header = Vec::with_capacity(METRIC_COUNT + 2);
    header.push("class");
    header.push("label");
    header.extend(METRIC_NAMES);
    header
}

/// Writes `table` in export format
pub fn write_table<W: std::io::Write>(table: &ClassMetricsTable, out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(EXPORT_DELIMITER)
        .from_writer(out);

    writer.write_record(header())?;
    for row in &table.rows {
        let mut record = Vec::with_capacity(METRIC_COUNT + 2);
        record.push(row.metrics.class_code.to_string());
        record.push(row.label.clone());
        record.extend(row.metrics.values().iter().map(|v| format_decimal(*v)));
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|e| Error::Export(e.to_string()))?;
    Ok(())
}

pub fn table_to_bytes(table: &ClassMetricsTable) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_table(table, &mut buffer)?;
    Ok(buffer)
}

/// Reads an export back into `(label, metrics)` pairs
pub fn parse_export(data: &[u8]) -> Result<Vec<(String, ClassMetrics)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(EXPORT_DELIMITER)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != METRIC_COUNT + 2 {
            return Err(Error::Export(format!(
                "expected {} fields, found {}",
                METRIC_COUNT + 2,
                record.len()
            )));
        }
        let code: i32 = record[0]
            .parse()
            .map_err(|_| Error::Export(format!("invalid class code: {:?}", &record[0])))?;
        let mut values = [0.0; METRIC_COUNT];
        for (slot, field) in values.iter_mut().zip(record.iter().skip(2)) {
            *slot = parse_decimal(field)?;
        }
        rows.push((record[1].to_string(), ClassMetrics::from_values(code, values)));
    }
    Ok(rows)
}
