use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
    UInt32Type, UInt64Type, UInt8Type,
};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell of a query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "NULL"),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Tabular result of a query. Every row holds exactly `columns.len()` cells;
/// a result with no rows still carries the column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds a result from the arrow batches DuckDB hands back.
    pub fn from_batches(columns: Vec<String>, batches: &[RecordBatch]) -> Result<Self, ArrowError> {
        let mut rows = Vec::with_capacity(batches.iter().map(|b| b.num_rows()).sum());

        for batch in batches {
            if batch.num_columns() != columns.len() {
                return Err(ArrowError::SchemaError(format!(
                    "batch has {} columns, expected {}",
                    batch.num_columns(),
                    columns.len()
                )));
            }

            for row in 0..batch.num_rows() {
                let cells = batch
                    .columns()
                    .iter()
                    .map(|array| scalar_at(array, row))
                    .collect::<Result<Vec<_>, _>>()?;
                rows.push(cells);
            }
        }

        Ok(Self { columns, rows })
    }
}

fn scalar_at(array: &ArrayRef, row: usize) -> Result<Scalar, ArrowError> {
    if array.is_null(row) {
        return Ok(Scalar::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => Scalar::Bool(array.as_boolean().value(row)),
        DataType::Int8 => Scalar::Int(array.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Scalar::Int(array.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Scalar::Int(array.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Scalar::Int(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Scalar::Int(array.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Scalar::Int(array.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Scalar::Int(array.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let v = array.as_primitive::<UInt64Type>().value(row);
            i64::try_from(v)
                .map(Scalar::Int)
                .unwrap_or_else(|_| Scalar::Text(v.to_string()))
        }
        DataType::Float32 => Scalar::Float(array.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Scalar::Float(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Scalar::Text(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Scalar::Text(array.as_string::<i64>().value(row).to_string()),
        // Dates, decimals, intervals, nested types: use arrow's own rendering
        _ => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FormatOptions::default())?;
            Scalar::Text(formatter.value(row).to_string())
        }
    };

    Ok(value)
}
