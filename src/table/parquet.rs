//! Parquet serialization for [`Table`].
//!
//! Each column is assigned the narrowest Arrow type that carries all of its
//! cells: all-int columns become nullable `Int64`, int/float mixes widen to
//! `Float64`, datetimes become millisecond timestamps, and anything mixed
//! beyond that is rendered to `Utf8`. The widening is one-way and documented
//! behavior of the cache round-trip, not an error.
//!
//! Writes go through a temp-file-then-rename sequence so a concurrent reader
//! can never observe a partially written artifact.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, BooleanBuilder, Float64Array, Float64Builder, Int64Array,
    Int64Builder, StringArray, StringBuilder, TimestampMillisecondArray,
    TimestampMillisecondBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

use crate::core::SemModelError;

use super::{Table, Value};

/// Narrowest common cell type observed while scanning a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColType {
    Unknown,
    Bool,
    Int,
    Float,
    Str,
    DateTime,
}

impl ColType {
    fn merge(self, v: &Value) -> Self {
        let observed = match v {
            Value::Null => return self,
            Value::Bool(_) => Self::Bool,
            Value::Int(_) => Self::Int,
            Value::Float(_) => Self::Float,
            Value::Str(_) => Self::Str,
            Value::DateTime(_) => Self::DateTime,
        };
        match (self, observed) {
            (Self::Unknown, o) => o,
            (s, o) if s == o => s,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Str,
        }
    }

    fn arrow_type(self) -> DataType {
        match self {
            Self::Bool => DataType::Boolean,
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::DateTime => DataType::Timestamp(TimeUnit::Millisecond, None),
            // All-null columns serialize as nullable text.
            Self::Unknown | Self::Str => DataType::Utf8,
        }
    }
}

fn artifact_err(path: &Path, reason: impl ToString) -> SemModelError {
    SemModelError::ArtifactError {
        file: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn column_array(table: &Table, col: usize, ty: ColType) -> ArrayRef {
    let cells = (0..table.n_rows()).map(|r| &table.row(r)[col]);
    match ty {
        ColType::Bool => {
            let mut b = BooleanBuilder::new();
            for v in cells {
                match v {
                    Value::Bool(x) => b.append_value(*x),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColType::Int => {
            let mut b = Int64Builder::new();
            for v in cells {
                match v {
                    Value::Int(x) => b.append_value(*x),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColType::Float => {
            let mut b = Float64Builder::new();
            for v in cells {
                match v.as_f64() {
                    Some(x) => b.append_value(x),
                    None => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColType::DateTime => {
            let mut b = TimestampMillisecondBuilder::new();
            for v in cells {
                match v {
                    Value::DateTime(dt) => b.append_value(dt.and_utc().timestamp_millis()),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        ColType::Unknown | ColType::Str => {
            let mut b = StringBuilder::new();
            for v in cells {
                if v.is_null() {
                    b.append_null();
                } else {
                    b.append_value(v.to_string());
                }
            }
            Arc::new(b.finish())
        }
    }
}

fn to_record_batch(table: &Table, path: &Path) -> Result<RecordBatch, SemModelError> {
    if table.n_cols() == 0 {
        return Err(artifact_err(path, "cannot serialize a table with no columns"));
    }

    let mut types = vec![ColType::Unknown; table.n_cols()];
    for r in 0..table.n_rows() {
        for (c, v) in table.row(r).iter().enumerate() {
            types[c] = types[c].merge(v);
        }
    }

    let fields: Vec<Field> = table
        .column_names()
        .iter()
        .zip(&types)
        .map(|(name, ty)| Field::new(name, ty.arrow_type(), true))
        .collect();
    let arrays: Vec<ArrayRef> =
        types.iter().enumerate().map(|(c, ty)| column_array(table, c, *ty)).collect();

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|e| artifact_err(path, e))
}

/// Serializes a table to a Parquet file, atomically replacing any prior file.
///
/// The data is written to `<path>.tmp` in the same directory and renamed
/// into place, so the artifact at `path` is always either the old complete
/// file or the new complete file. Parent directories are created as needed.
pub fn write_parquet_atomic(path: &Path, table: &Table) -> Result<(), SemModelError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let batch = to_record_batch(table, path)?;
    let tmp_path = path.with_extension("parquet.tmp");

    {
        let file = File::create(&tmp_path)?;
        let mut writer =
            ArrowWriter::try_new(file, batch.schema(), None).map_err(|e| artifact_err(path, e))?;
        writer.write(&batch).map_err(|e| artifact_err(path, e))?;
        writer.close().map_err(|e| artifact_err(path, e))?;
    }

    fs::rename(&tmp_path, path)?;
    debug!(
        path = %path.display(),
        rows = table.n_rows(),
        cols = table.n_cols(),
        "wrote parquet artifact"
    );
    Ok(())
}

/// Reads a Parquet file back into a [`Table`].
///
/// Only the types this module writes are accepted; anything else in the file
/// is an artifact error naming the column type.
pub fn read_parquet(path: &Path) -> Result<Table, SemModelError> {
    let file = File::open(path)?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| artifact_err(path, e))?;
    let schema = builder.schema().clone();
    let reader = builder.build().map_err(|e| artifact_err(path, e))?;

    let mut table = Table::new(schema.fields().iter().map(|f| f.name().clone()));
    for batch in reader {
        let batch = batch.map_err(|e| artifact_err(path, e))?;
        append_batch(&mut table, &batch, path)?;
    }
    Ok(table)
}

fn append_batch(table: &mut Table, batch: &RecordBatch, path: &Path) -> Result<(), SemModelError> {
    let n_cols = batch.num_columns();
    for r in 0..batch.num_rows() {
        let mut row = Vec::with_capacity(n_cols);
        for c in 0..n_cols {
            row.push(cell_from_array(batch.column(c), r, path)?);
        }
        table.push_row(row);
    }
    Ok(())
}

fn cell_from_array(array: &ArrayRef, row: usize, path: &Path) -> Result<Value, SemModelError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<BooleanArray>() {
        return Ok(Value::Bool(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok(Value::Int(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Ok(Value::Float(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Ok(Value::Str(a.value(row).to_string()));
    }
    if let Some(a) = any.downcast_ref::<TimestampMillisecondArray>() {
        return chrono::DateTime::from_timestamp_millis(a.value(row))
            .map(|dt| Value::DateTime(dt.naive_utc()))
            .ok_or_else(|| artifact_err(path, "timestamp out of range"));
    }
    Err(artifact_err(
        path,
        format!("unsupported column type {:?}", array.data_type()),
    ))
}
