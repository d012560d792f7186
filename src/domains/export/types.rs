use crate::config::{APPROVED_AMOUNT_COLUMN, APPROVED_COUNT_COLUMN};
use crate::errors::{ExportError, ExportResult};
use arrow::array::{
    Array, Decimal128Array, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::PathBuf;

/// What a finished export reports back to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub rows: usize,
    pub approved_transactions: Decimal,
    pub approved_amount: Decimal,
}

impl ExportSummary {
    pub fn from_batch(batch: &RecordBatch) -> ExportResult<Self> {
        Self::from_batches(std::slice::from_ref(batch))
    }

    /// Row count plus the approved count and amount totals across all batches
    pub fn from_batches(batches: &[RecordBatch]) -> ExportResult<Self> {
        let mut summary = Self {
            rows: 0,
            approved_transactions: Decimal::ZERO,
            approved_amount: Decimal::ZERO,
        };

        for batch in batches {
            summary.rows += batch.num_rows();
            summary.approved_transactions =
                checked_total(summary.approved_transactions, column_total(batch, APPROVED_COUNT_COLUMN)?)?;
            summary.approved_amount =
                checked_total(summary.approved_amount, column_total(batch, APPROVED_AMOUNT_COLUMN)?)?;
        }

        Ok(summary)
    }
}

/// Export stage that is about to start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Reading,
    Writing { rows: usize },
}

/// Written file plus the numbers reported for it
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub output_path: PathBuf,
    pub bytes_written: u64,
    pub duration_ms: u64,
    pub summary: ExportSummary,
}

impl ExportReport {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!(
                "Success! Exported {} rows to {}",
                self.summary.rows,
                self.output_path.display()
            ),
            format!(
                "  Total approved transactions: {}",
                self.summary.approved_transactions.normalize()
            ),
            format!(
                "  Total approved amount (cents): {}",
                format_thousands(&self.summary.approved_amount)
            ),
        ]
    }
}

fn checked_total(acc: Decimal, value: Decimal) -> ExportResult<Decimal> {
    acc.checked_add(value)
        .ok_or_else(|| ExportError::Serialization("Aggregate sum overflowed".to_string()))
}

/// Sum a numeric column, skipping nulls
pub fn column_total(batch: &RecordBatch, column: &str) -> ExportResult<Decimal> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| ExportError::Schema(format!("Column '{}' not found in result set", column)))?;

    let values: Vec<Decimal> = match array.data_type() {
        DataType::Int16 => downcast::<Int16Array>(array, column)?
            .iter()
            .flatten()
            .map(Decimal::from)
            .collect(),
        DataType::Int32 => downcast::<Int32Array>(array, column)?
            .iter()
            .flatten()
            .map(Decimal::from)
            .collect(),
        DataType::Int64 => downcast::<Int64Array>(array, column)?
            .iter()
            .flatten()
            .map(Decimal::from)
            .collect(),
        DataType::Float32 => downcast::<Float32Array>(array, column)?
            .iter()
            .flatten()
            .map(|v| float_to_decimal(v as f64, column))
            .collect::<ExportResult<_>>()?,
        DataType::Float64 => downcast::<Float64Array>(array, column)?
            .iter()
            .flatten()
            .map(|v| float_to_decimal(v, column))
            .collect::<ExportResult<_>>()?,
        DataType::Decimal128(_, scale) => {
            let scale = u32::try_from(*scale).map_err(|_| {
                ExportError::Schema(format!("Negative scale on column '{}'", column))
            })?;
            downcast::<Decimal128Array>(array, column)?
                .iter()
                .flatten()
                .map(|raw| {
                    Decimal::try_from_i128_with_scale(raw, scale)
                        .map_err(|e| ExportError::Schema(format!("Column '{}': {}", column, e)))
                })
                .collect::<ExportResult<_>>()?
        }
        other => {
            return Err(ExportError::Schema(format!(
                "Column '{}' has non-numeric type {}",
                column, other
            )))
        }
    };

    values
        .into_iter()
        .try_fold(Decimal::ZERO, checked_total)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, column: &str) -> ExportResult<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ExportError::Schema(format!("Unexpected array layout for column '{}'", column)))
}

fn float_to_decimal(value: f64, column: &str) -> ExportResult<Decimal> {
    Decimal::try_from(value)
        .map_err(|e| ExportError::Schema(format!("Column '{}' value {}: {}", column, value, e)))
}

/// Render a decimal with comma thousands separators, e.g. `1234567` -> `1,234,567`
pub fn format_thousands(value: &Decimal) -> String {
    let rendered = value.normalize().to_string();
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
