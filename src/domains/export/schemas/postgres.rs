use crate::errors::{ExportError, ExportResult};
use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, Row, TypeInfo};
use std::sync::Arc;

/// Widest precision an Arrow Decimal128 can carry
pub const DECIMAL_PRECISION: u8 = 38;

/// How a PostgreSQL column is decoded and which Arrow type it lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Numeric,
    Text,
    Uuid,
    Json,
    Bytes,
    Date,
    Timestamp,
    TimestampTz,
}

impl ColumnKind {
    /// Map a PostgreSQL type name as reported by the driver.
    ///
    /// sqlx reports display names, so `bpchar` arrives as `CHAR` and the
    /// single-byte `"char"` type as `"CHAR"` (quoted, unsupported).
    pub fn from_pg_type(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "BOOL" => ColumnKind::Boolean,
            "INT2" => ColumnKind::Int16,
            "INT4" => ColumnKind::Int32,
            "INT8" => ColumnKind::Int64,
            "FLOAT4" => ColumnKind::Float32,
            "FLOAT8" => ColumnKind::Float64,
            "NUMERIC" => ColumnKind::Numeric,
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => ColumnKind::Text,
            "UUID" => ColumnKind::Uuid,
            "JSON" | "JSONB" => ColumnKind::Json,
            "BYTEA" => ColumnKind::Bytes,
            "DATE" => ColumnKind::Date,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "TIMESTAMPTZ" => ColumnKind::TimestampTz,
            _ => return None,
        };
        Some(kind)
    }

    fn empty_data(self) -> ColumnData {
        match self {
            ColumnKind::Boolean => ColumnData::Boolean(Vec::new()),
            ColumnKind::Int16 => ColumnData::Int16(Vec::new()),
            ColumnKind::Int32 => ColumnData::Int32(Vec::new()),
            ColumnKind::Int64 => ColumnData::Int64(Vec::new()),
            ColumnKind::Float32 => ColumnData::Float32(Vec::new()),
            ColumnKind::Float64 => ColumnData::Float64(Vec::new()),
            ColumnKind::Numeric => ColumnData::Decimal(Vec::new()),
            ColumnKind::Text | ColumnKind::Uuid | ColumnKind::Json => ColumnData::Text(Vec::new()),
            ColumnKind::Bytes => ColumnData::Binary(Vec::new()),
            ColumnKind::Date => ColumnData::Date(Vec::new()),
            ColumnKind::Timestamp => ColumnData::Timestamp(Vec::new()),
            ColumnKind::TimestampTz => ColumnData::TimestampTz(Vec::new()),
        }
    }
}

/// Buffered values of one column, nulls kept as `None`
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Boolean(Vec<Option<bool>>),
    Int16(Vec<Option<i16>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Decimal(Vec<Option<Decimal>>),
    Text(Vec<Option<String>>),
    Binary(Vec<Option<Vec<u8>>>),
    Date(Vec<Option<NaiveDate>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
    TimestampTz(Vec<Option<DateTime<Utc>>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Int16(v) => v.len(),
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Decimal(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Binary(v) => v.len(),
            ColumnData::Date(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
            ColumnData::TimestampTz(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arrow type this data is written as. Decimal scale is the largest scale present
    /// so every value fits without rounding.
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Boolean(_) => DataType::Boolean,
            ColumnData::Int16(_) => DataType::Int16,
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Decimal(values) => {
                DataType::Decimal128(DECIMAL_PRECISION, decimal_scale(values) as i8)
            }
            ColumnData::Text(_) => DataType::Utf8,
            ColumnData::Binary(_) => DataType::Binary,
            ColumnData::Date(_) => DataType::Date32,
            ColumnData::Timestamp(_) => DataType::Timestamp(TimeUnit::Microsecond, None),
            ColumnData::TimestampTz(_) => {
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
            }
        }
    }

    fn into_array(self) -> ExportResult<ArrayRef> {
        let array: ArrayRef = match self {
            ColumnData::Boolean(v) => Arc::new(BooleanArray::from(v)),
            ColumnData::Int16(v) => Arc::new(Int16Array::from(v)),
            ColumnData::Int32(v) => Arc::new(Int32Array::from(v)),
            ColumnData::Int64(v) => Arc::new(Int64Array::from(v)),
            ColumnData::Float32(v) => Arc::new(Float32Array::from(v)),
            ColumnData::Float64(v) => Arc::new(Float64Array::from(v)),
            ColumnData::Decimal(v) => {
                let scale = decimal_scale(&v);
                let raw = v
                    .into_iter()
                    .map(|value| value.map(|d| mantissa_at_scale(d, scale)).transpose())
                    .collect::<ExportResult<Vec<Option<i128>>>>()?;
                Arc::new(
                    Decimal128Array::from(raw)
                        .with_precision_and_scale(DECIMAL_PRECISION, scale as i8)?,
                )
            }
            ColumnData::Text(v) => Arc::new(StringArray::from(v)),
            ColumnData::Binary(v) => {
                Arc::new(v.iter().map(|b| b.as_deref()).collect::<BinaryArray>())
            }
            ColumnData::Date(v) => {
                let epoch = DateTime::<Utc>::UNIX_EPOCH.date_naive();
                let days: Vec<Option<i32>> = v
                    .into_iter()
                    .map(|d| d.map(|d| d.signed_duration_since(epoch).num_days() as i32))
                    .collect();
                Arc::new(Date32Array::from(days))
            }
            ColumnData::Timestamp(v) => {
                let micros: Vec<Option<i64>> = v
                    .into_iter()
                    .map(|ts| ts.map(|ts| ts.and_utc().timestamp_micros()))
                    .collect();
                Arc::new(TimestampMicrosecondArray::from(micros))
            }
            ColumnData::TimestampTz(v) => {
                let micros: Vec<Option<i64>> = v
                    .into_iter()
                    .map(|ts| ts.map(|ts| ts.timestamp_micros()))
                    .collect();
                Arc::new(TimestampMicrosecondArray::from(micros).with_timezone("UTC"))
            }
        };
        Ok(array)
    }
}

fn decimal_scale(values: &[Option<Decimal>]) -> u32 {
    values.iter().flatten().map(|d| d.scale()).max().unwrap_or(0)
}

/// Integer mantissa of `value` at exactly `scale` digits.
///
/// `Decimal::rescale` silently settles for a smaller scale when the widened
/// mantissa would overflow 96 bits, which would shift the value by powers of ten.
fn mantissa_at_scale(value: Decimal, scale: u32) -> ExportResult<i128> {
    let mut rescaled = value;
    rescaled.rescale(scale);
    if rescaled.scale() != scale {
        return Err(ExportError::Serialization(format!(
            "NUMERIC value {} cannot be stored with scale {}",
            value, scale
        )));
    }
    Ok(rescaled.mantissa())
}

/// One result column: its name, decode strategy and buffered values
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    pub name: String,
    pub kind: ColumnKind,
    pub data: ColumnData,
}

impl ColumnBuffer {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            data: kind.empty_data(),
        }
    }

    fn push_from_row(&mut self, row: &PgRow, index: usize) -> Result<(), sqlx::Error> {
        match &mut self.data {
            ColumnData::Boolean(v) => v.push(row.try_get(index)?),
            ColumnData::Int16(v) => v.push(row.try_get(index)?),
            ColumnData::Int32(v) => v.push(row.try_get(index)?),
            ColumnData::Int64(v) => v.push(row.try_get(index)?),
            ColumnData::Float32(v) => v.push(row.try_get(index)?),
            ColumnData::Float64(v) => v.push(row.try_get(index)?),
            ColumnData::Decimal(v) => v.push(row.try_get(index)?),
            ColumnData::Binary(v) => v.push(row.try_get(index)?),
            ColumnData::Date(v) => v.push(row.try_get(index)?),
            ColumnData::Timestamp(v) => v.push(row.try_get(index)?),
            ColumnData::TimestampTz(v) => v.push(row.try_get(index)?),
            ColumnData::Text(v) => {
                let value = match self.kind {
                    ColumnKind::Uuid => row
                        .try_get::<Option<uuid::Uuid>, _>(index)?
                        .map(|id| id.hyphenated().to_string()),
                    ColumnKind::Json => row
                        .try_get::<Option<serde_json::Value>, _>(index)?
                        .map(|json| json.to_string()),
                    _ => row.try_get::<Option<String>, _>(index)?,
                };
                v.push(value);
            }
        }
        Ok(())
    }
}

/// Accumulates query rows column by column and turns them into one RecordBatch
#[derive(Debug, Clone)]
pub struct RecordBatchBuilder {
    columns: Vec<ColumnBuffer>,
    rows: usize,
}

impl RecordBatchBuilder {
    pub fn new(columns: Vec<ColumnBuffer>) -> Self {
        let rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        Self { columns, rows }
    }

    /// Set up one buffer per result column, rejecting types with no lossless mapping
    pub fn for_pg_columns(columns: &[PgColumn]) -> ExportResult<Self> {
        let buffers = columns
            .iter()
            .map(|column| -> ExportResult<ColumnBuffer> {
                let type_name = column.type_info().name();
                let kind = ColumnKind::from_pg_type(type_name).ok_or_else(|| {
                    ExportError::UnsupportedColumnType {
                        column: column.name().to_string(),
                        type_name: type_name.to_string(),
                    }
                })?;
                log::debug!("Column '{}' ({}) -> {:?}", column.name(), type_name, kind);
                Ok(ColumnBuffer::new(column.name(), kind))
            })
            .collect::<ExportResult<Vec<_>>>()?;

        Ok(Self::new(buffers))
    }

    pub fn append_row(&mut self, row: &PgRow) -> ExportResult<()> {
        for (index, column) in self.columns.iter_mut().enumerate() {
            column.push_from_row(row, index).map_err(|e| {
                ExportError::Query(format!("Failed to decode column '{}': {}", column.name, e))
            })?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|c| Field::new(&c.name, c.data.data_type(), true))
                .collect::<Vec<_>>(),
        )
    }

    pub fn finish(self) -> ExportResult<RecordBatch> {
        if let Some(column) = self.columns.iter().find(|c| c.data.len() != self.rows) {
            return Err(ExportError::Schema(format!(
                "Column '{}' has {} values, expected {}",
                column.name,
                column.data.len(),
                self.rows
            )));
        }

        let schema = Arc::new(self.schema());
        let arrays = self
            .columns
            .into_iter()
            .map(|c| c.data.into_array())
            .collect::<ExportResult<Vec<_>>>()?;

        // Explicit row count keeps zero-column results valid
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pg_type_mapping() {
        // Names as sqlx's PgTypeInfo::name() reports them after resolving the OID
        let cases = [
            ("BOOL", ColumnKind::Boolean),
            ("INT2", ColumnKind::Int16),
            ("INT4", ColumnKind::Int32),
            ("INT8", ColumnKind::Int64),
            ("FLOAT4", ColumnKind::Float32),
            ("FLOAT8", ColumnKind::Float64),
            ("NUMERIC", ColumnKind::Numeric),
            ("TEXT", ColumnKind::Text),
            ("VARCHAR", ColumnKind::Text),
            ("CHAR", ColumnKind::Text),
            ("NAME", ColumnKind::Text),
            ("UUID", ColumnKind::Uuid),
            ("JSON", ColumnKind::Json),
            ("JSONB", ColumnKind::Json),
            ("BYTEA", ColumnKind::Bytes),
            ("DATE", ColumnKind::Date),
            ("TIMESTAMP", ColumnKind::Timestamp),
            ("TIMESTAMPTZ", ColumnKind::TimestampTz),
        ];
        for (name, kind) in cases {
            assert_eq!(ColumnKind::from_pg_type(name), Some(kind), "{name}");
        }

        for name in ["\"CHAR\"", "INTERVAL", "INT4[]", "MONEY", "TIME", "?"] {
            assert_eq!(ColumnKind::from_pg_type(name), None, "{name}");
        }
    }

    #[test]
    fn test_text_like_kinds_share_storage() {
        for kind in [ColumnKind::Text, ColumnKind::Uuid, ColumnKind::Json] {
            let buffer = ColumnBuffer::new("c", kind);
            assert_eq!(buffer.data.data_type(), DataType::Utf8);
        }
    }

    #[test]
    fn test_decimal_scale_widens_to_largest() {
        let data = ColumnData::Decimal(vec![Some(dec!(10)), None, Some(dec!(1.255)), Some(dec!(3.5))]);
        assert_eq!(data.data_type(), DataType::Decimal128(38, 3));

        let array = data.into_array().unwrap();
        let decimals = array.as_any().downcast_ref::<Decimal128Array>().unwrap();
        assert_eq!(decimals.value(0), 10_000);
        assert!(decimals.is_null(1));
        assert_eq!(decimals.value(2), 1_255);
        assert_eq!(decimals.value(3), 3_500);
    }

    #[test]
    fn test_decimal_that_cannot_widen_is_rejected() {
        // 1e20 at scale 9 needs more than 96 bits of mantissa
        let data = ColumnData::Decimal(vec![
            Some(dec!(100000000000000000000)),
            Some(dec!(0.000000001)),
        ]);
        assert!(matches!(data.into_array(), Err(ExportError::Serialization(_))));
    }

    #[test]
    fn test_large_decimal_keeps_exact_value() {
        let data = ColumnData::Decimal(vec![Some(dec!(100000000000000000000)), Some(dec!(0.5))]);
        let array = data.into_array().unwrap();
        let decimals = array.as_any().downcast_ref::<Decimal128Array>().unwrap();
        assert_eq!(decimals.scale(), 1);
        assert_eq!(decimals.value(0), 1_000_000_000_000_000_000_000);
        assert_eq!(decimals.value(1), 5);
    }

    #[test]
    fn test_all_null_decimal_uses_zero_scale() {
        let data = ColumnData::Decimal(vec![None, None]);
        assert_eq!(data.data_type(), DataType::Decimal128(38, 0));
    }

    #[test]
    fn test_dates_and_timestamps() {
        let day = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        let array = ColumnData::Date(vec![Some(day), None]).into_array().unwrap();
        let dates = array.as_any().downcast_ref::<Date32Array>().unwrap();
        assert_eq!(dates.value(0), 10);
        assert!(dates.is_null(1));

        let ts = day.and_hms_opt(0, 0, 1).unwrap();
        let array = ColumnData::Timestamp(vec![Some(ts)]).into_array().unwrap();
        let stamps = array.as_any().downcast_ref::<TimestampMicrosecondArray>().unwrap();
        assert_eq!(stamps.value(0), 10 * 86_400 * 1_000_000 + 1_000_000);

        let array = ColumnData::TimestampTz(vec![Some(ts.and_utc())]).into_array().unwrap();
        assert_eq!(
            array.data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
        );
    }

    #[test]
    fn test_builder_preserves_column_order_and_nulls() {
        let builder = RecordBatchBuilder::new(vec![
            ColumnBuffer {
                name: "bin".into(),
                kind: ColumnKind::Text,
                data: ColumnData::Text(vec![Some("411111".into()), None]),
            },
            ColumnBuffer {
                name: "day".into(),
                kind: ColumnKind::Date,
                data: ColumnData::Date(vec![NaiveDate::from_ymd_opt(2024, 1, 1), None]),
            },
            ColumnBuffer {
                name: "flag".into(),
                kind: ColumnKind::Boolean,
                data: ColumnData::Boolean(vec![Some(true), Some(false)]),
            },
        ]);
        assert_eq!(builder.num_rows(), 2);

        let batch = builder.finish().unwrap();
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["bin", "day", "flag"]);
        assert!(batch.schema().fields().iter().all(|f| f.is_nullable()));
        assert_eq!(batch.num_rows(), 2);
        assert!(batch.column(0).is_null(1));
    }

    #[test]
    fn test_builder_rejects_ragged_columns() {
        let builder = RecordBatchBuilder::new(vec![
            ColumnBuffer {
                name: "a".into(),
                kind: ColumnKind::Int32,
                data: ColumnData::Int32(vec![Some(1), Some(2)]),
            },
            ColumnBuffer {
                name: "b".into(),
                kind: ColumnKind::Int32,
                data: ColumnData::Int32(vec![Some(1)]),
            },
        ]);
        assert!(matches!(builder.finish(), Err(ExportError::Schema(_))));
    }

    #[test]
    fn test_empty_result_keeps_schema() {
        let builder = RecordBatchBuilder::new(vec![
            ColumnBuffer::new("bin", ColumnKind::Text),
            ColumnBuffer::new("total_approved_amount", ColumnKind::Numeric),
        ]);
        let batch = builder.finish().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 2);
    }
}
