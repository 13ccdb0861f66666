//! Delimited text to `.xlsx`.
//!
//! The first line of the input is the header row. Every later row must have
//! the same number of columns. Conversion is pure: the workbook's creation
//! time is pinned, so the same input always gives the same bytes.

use crate::error::{AutoVpnError, Result};
use rust_xlsxwriter::{Color, DocProperties, ExcelDateTime, Format, FormatAlign, Workbook};

pub const DEFAULT_SHEET_NAME: &str = "VPN Profiles";

const MIN_COLUMN_WIDTH: usize = 8;
const MAX_COLUMN_WIDTH: usize = 50;
const HEADER_BACKGROUND: u32 = 0xCCCCCC;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub delimiter: u8,
    /// When set, the header must have exactly this many columns.
    pub expected_columns: Option<usize>,
    pub sheet_name: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            expected_columns: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

/// Converts comma-separated text with default options.
pub fn convert(raw: &str) -> Result<Vec<u8>> {
    convert_with(raw, &ConvertOptions::default())
}

pub fn convert_with(raw: &str, options: &ConvertOptions) -> Result<Vec<u8>> {
    let rows = parse_rows(raw, options)?;
    write_workbook(&rows, &options.sheet_name)
}

fn malformed(line: u64, reason: impl Into<String>) -> AutoVpnError {
    AutoVpnError::MalformedInput {
        line,
        reason: reason.into(),
    }
}

/// Header first, then data rows; all the same width.
pub fn parse_rows(raw: &str, options: &ConvertOptions) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .trim(csv::Trim::All)
        .delimiter(options.delimiter)
        .from_reader(raw.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(0);
            match e.kind() {
                csv::ErrorKind::UnequalLengths {
                    expected_len, len, ..
                } => malformed(
                    line,
                    format!("expected {} columns, found {}", expected_len, len),
                ),
                _ => malformed(line, e.to_string()),
            }
        })?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let Some(header) = rows.first() else {
        return Err(malformed(1, "input is empty"));
    };
    if let Some(expected) = options.expected_columns {
        if header.len() != expected {
            return Err(malformed(
                1,
                format!("expected {} columns, found {}", expected, header.len()),
            ));
        }
    }
    if rows.len() < 2 {
        return Err(malformed(2, "no data rows after the header"));
    }
    Ok(rows)
}

fn column_width(rows: &[Vec<String>], col: usize) -> f64 {
    let longest = rows
        .iter()
        .filter_map(|r| r.get(col))
        .map(|cell| cell.chars().count())
        .max()
        .unwrap_or(0);
    (longest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH) as f64
}

fn write_workbook(rows: &[Vec<String>], sheet_name: &str) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let properties =
        DocProperties::new().set_creation_datetime(&ExcelDateTime::from_ymd(2000, 1, 1)?);
    workbook.set_properties(&properties);

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_BACKGROUND))
        .set_align(FormatAlign::Center);
    let cell_format = Format::new().set_align(FormatAlign::Center);

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    for (r, row) in rows.iter().enumerate() {
        let format = if r == 0 { &header_format } else { &cell_format };
        for (c, value) in row.iter().enumerate() {
            // Values stay text: leading zeros and long digit strings in
            // usernames and passwords must survive.
            sheet.write_string_with_format(r as u32, c as u16, value, format)?;
        }
    }

    let columns = rows.first().map(Vec::len).unwrap_or(0);
    for c in 0..columns {
        sheet.set_column_width(c as u16, column_width(rows, c))?;
    }

    Ok(workbook.save_to_buffer()?)
}
