//! Loosely-typed in-memory tables.
//!
//! Spreadsheet sources carry no schema worth trusting: the same logical
//! source can gain or lose columns between monthly files, and a column that
//! held integers in one file holds blanks or text in the next. [`Table`]
//! therefore models a table the way the sources actually behave - named
//! columns of dynamically-typed, nullable cells ([`Value`]) - and defers
//! strict typing to the fact builders, which know the schema they expect.
//!
//! Row-wise concatenation across files of one source computes the column
//! superset and null-fills the gaps; it never errors on mismatched column
//! sets. Type widening happens only at the Parquet boundary (see
//! [`parquet`]), where each column is assigned the narrowest Arrow type
//! that can carry all of its cells.

pub mod parquet;
pub mod reader;

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;

/// A single dynamically-typed cell.
///
/// `Null` is the absence marker used for blank spreadsheet cells and for
/// columns introduced by concatenation. Arithmetic helpers treat `Int` and
/// `Float` interchangeably via [`Value::as_f64`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/blank cell.
    Null,
    /// Boolean cell.
    Bool(bool),
    /// Integer cell.
    Int(i64),
    /// Floating-point cell.
    Float(f64),
    /// Text cell.
    Str(String),
    /// Date/datetime cell (naive; source files carry no timezone).
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether the cell is the null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the cell, promoting integers to floats.
    ///
    /// Returns `None` for non-numeric cells, including numeric-looking text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the cell (floats are not truncated).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text view of the cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Datetime view, coercing text cells on a best-effort basis.
    ///
    /// Text is tried against the formats the source spreadsheets actually
    /// use (ISO date/datetime and `dd/mm/yyyy`); anything unparseable is
    /// `None`, mirroring the coerce-to-missing behavior builders rely on.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            Self::Str(s) => parse_datetime(s.trim()),
            _ => None,
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = chrono::NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

/// A row-major table with named columns and dynamically-typed cells.
///
/// Rows always have exactly one cell per column; [`Table::push_row`]
/// enforces the arity. Column names are unique; lookups by name are O(1)
/// through an internal index map.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given column names.
    ///
    /// Duplicate column names keep the first occurrence's index; later
    /// duplicates are unreachable by name but preserved positionally.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `true` when the table has zero rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, in declaration order.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Appends a row. The cell count must match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "row arity {} does not match column count {}",
            row.len(),
            self.columns.len()
        );
        self.rows.push(row);
    }

    /// Borrowed view of one row.
    pub fn row(&self, idx: usize) -> &[Value] {
        &self.rows[idx]
    }

    /// Cell at (row, column-name), `None` when the column doesn't exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.column_index(column).map(|c| &self.rows[row][c])
    }

    /// Replaces the cell at (row, column-name). No-op if the column is absent.
    pub fn set(&mut self, row: usize, column: &str, value: Value) {
        if let Some(c) = self.column_index(column) {
            self.rows[row][c] = value;
        }
    }

    /// Adds a column computed per-row, or overwrites it if it exists.
    pub fn add_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Self, usize) -> Value,
    {
        let values: Vec<Value> = (0..self.n_rows()).map(|i| f(self, i)).collect();
        match self.column_index(name) {
            Some(c) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[c] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                self.index.insert(name.to_string(), self.columns.len() - 1);
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// Keeps only rows satisfying the predicate.
    pub fn retain_rows<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&Self, usize) -> bool,
    {
        let keep: Vec<bool> = (0..self.n_rows()).map(|i| predicate(self, i)).collect();
        let mut it = keep.into_iter();
        self.rows.retain(|_| it.next().unwrap_or(false));
    }

    /// Renames columns through a mapping function, rebuilding the name index.
    pub fn rename_columns<F>(&mut self, f: F)
    where
        F: Fn(&str) -> String,
    {
        self.columns = self.columns.iter().map(|c| f(c)).collect();
        self.index.clear();
        for (i, name) in self.columns.iter().enumerate() {
            self.index.entry(name.clone()).or_insert(i);
        }
    }

    /// Row-wise union of several tables.
    ///
    /// The result's columns are the superset of all input columns, in
    /// first-seen order; cells for columns a given input lacks are filled
    /// with [`Value::Null`]. Differing column sets across inputs are by
    /// design not an error.
    pub fn concat<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a Self>,
    {
        let tables: Vec<&Self> = tables.into_iter().collect();
        let mut merged = Vec::new();
        for t in &tables {
            for name in &t.columns {
                if !merged.contains(name) {
                    merged.push(name.clone());
                }
            }
        }
        let mut out = Self::new(merged);
        for t in &tables {
            // Per-table mapping from output column -> input column index.
            let mapping: Vec<Option<usize>> =
                out.columns.iter().map(|name| t.column_index(name)).collect();
            for row in &t.rows {
                let cells = mapping
                    .iter()
                    .map(|m| m.map_or(Value::Null, |c| row[c].clone()))
                    .collect();
                out.rows.push(cells);
            }
        }
        out
    }
}
