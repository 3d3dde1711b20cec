//! Tabular file parsing.
//!
//! One entry point, [`read_table`], dispatching on file extension:
//! Excel workbooks (`.xlsx`, `.xls`, `.xlsb`, `.ods`) through `calamine`
//! and delimited text (`.csv`) through the `csv` crate. Both produce the
//! same loosely-typed [`Table`]; the first row is always the header.
//!
//! Numeric-looking text in CSV cells is parsed into numbers to match what
//! the Excel path produces for the same data. Date detection is NOT
//! attempted here; cells stay text until a builder coerces them.

use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use super::{Table, Value};

/// Parses a single tabular file into a [`Table`].
///
/// The first row supplies column names; blank header cells are named
/// `UNNAMED_<index>`. Any structural problem (unreadable workbook, no
/// sheets, ragged CSV rows) is an error - partially parsed files are never
/// returned.
pub fn read_table(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match ext.as_str() {
        "xlsx" | "xls" | "xlsb" | "ods" => read_excel(path)?,
        "csv" => read_csv(path)?,
        other => bail!("unsupported source file extension '{other}'"),
    };

    debug!(
        file = %path.display(),
        rows = table.n_rows(),
        cols = table.n_cols(),
        "parsed source file"
    );
    Ok(table)
}

fn header_name(cell: Option<&Data>, idx: usize) -> String {
    match cell {
        Some(Data::Empty) | None => format!("UNNAMED_{idx}"),
        Some(d) => d.to_string().trim().to_string(),
    }
}

fn read_excel(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("cannot open workbook {}", path.display()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("workbook {} has no sheets", path.display()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("cannot read sheet '{sheet_name}' of {}", path.display()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        // A sheet with no cells at all: no columns, no rows.
        return Ok(Table::default());
    };

    let headers: Vec<String> =
        (0..header_row.len()).map(|i| header_name(header_row.get(i), i)).collect();
    let n_cols = headers.len();
    let mut table = Table::new(headers);

    for row in rows {
        let mut cells = Vec::with_capacity(n_cols);
        for i in 0..n_cols {
            cells.push(excel_cell(row.get(i)));
        }
        table.push_row(cells);
    }
    Ok(table)
}

fn excel_cell(cell: Option<&Data>) -> Value {
    match cell {
        None | Some(Data::Empty) => Value::Null,
        Some(Data::Int(i)) => Value::Int(*i),
        Some(Data::Float(f)) => Value::Float(*f),
        Some(Data::Bool(b)) => Value::Bool(*b),
        Some(Data::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::Str(trimmed.to_string())
            }
        }
        Some(Data::DateTime(dt)) => {
            dt.as_datetime().map_or(Value::Null, Value::DateTime)
        }
        Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => Value::Str(s.clone()),
        // Cell-level errors (#N/A, #DIV/0!, ...) load as missing.
        Some(Data::Error(_)) => Value::Null,
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("cannot read header row of {}", path.display()))?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim();
            if h.is_empty() { format!("UNNAMED_{i}") } else { h.to_string() }
        })
        .collect();

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record =
            record.with_context(|| format!("malformed CSV record in {}", path.display()))?;
        table.push_row(record.iter().map(csv_cell).collect());
    }
    Ok(table)
}

fn csv_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Str(trimmed.to_string())
}
