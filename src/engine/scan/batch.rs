use std::sync::Arc;

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder, DurationMicrosecondBuilder,
    Float32Builder, Float64Builder, Int8Builder, Int16Builder, Int32Builder, Int64Builder,
    StringBuilder, TimestampMicrosecondBuilder, UInt8Builder, UInt16Builder, UInt32Builder,
    UInt64Builder,
};
use arrow_array::{ArrayRef, NullArray, RecordBatch, RecordBatchOptions};
use arrow_schema::{DataType, Field, SchemaRef, TimeUnit};

use super::reader::PartitionReader;
use crate::engine::errors::ScanError;
use crate::engine::types::ScalarValue;

fn mismatch(field: &Field, value: &ScalarValue) -> ScanError {
    ScanError::Batch(format!(
        "column {} of type {} cannot hold {:?}",
        field.name(),
        field.data_type(),
        value
    ))
}

macro_rules! build_primitive {
    ($builder:ty, $variant:ident, $rows:expr, $col:expr, $field:expr) => {{
        let mut builder = <$builder>::with_capacity($rows.len());
        for row in $rows {
            match &row[$col] {
                ScalarValue::$variant(v) => builder.append_value(*v),
                ScalarValue::Null => builder.append_null(),
                other => return Err(mismatch($field, other)),
            }
        }
        Arc::new(builder.finish()) as ArrayRef
    }};
}

fn build_column(field: &Field, rows: &[Vec<ScalarValue>], col: usize) -> Result<ArrayRef, ScanError> {
    let array = match field.data_type() {
        DataType::Null => Arc::new(NullArray::new(rows.len())) as ArrayRef,
        DataType::Boolean => build_primitive!(BooleanBuilder, Boolean, rows, col, field),
        DataType::Int8 => build_primitive!(Int8Builder, Int8, rows, col, field),
        DataType::Int16 => build_primitive!(Int16Builder, Int16, rows, col, field),
        DataType::Int32 => build_primitive!(Int32Builder, Int32, rows, col, field),
        DataType::Int64 => build_primitive!(Int64Builder, Int64, rows, col, field),
        DataType::UInt8 => build_primitive!(UInt8Builder, UInt8, rows, col, field),
        DataType::UInt16 => build_primitive!(UInt16Builder, UInt16, rows, col, field),
        DataType::UInt32 => build_primitive!(UInt32Builder, UInt32, rows, col, field),
        DataType::UInt64 => build_primitive!(UInt64Builder, UInt64, rows, col, field),
        DataType::Float32 => build_primitive!(Float32Builder, Float32, rows, col, field),
        DataType::Float64 => build_primitive!(Float64Builder, Float64, rows, col, field),
        DataType::Date32 => build_primitive!(Date32Builder, Date32, rows, col, field),
        DataType::Duration(TimeUnit::Microsecond) => {
            build_primitive!(DurationMicrosecondBuilder, DurationMicros, rows, col, field)
        }
        DataType::Timestamp(TimeUnit::Microsecond, tz) => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(rows.len())
                .with_timezone_opt(tz.clone());
            for row in rows {
                match &row[col] {
                    ScalarValue::TimestampMicros(v) => builder.append_value(*v),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(field, other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Decimal128(precision, scale) => {
            let mut builder = Decimal128Builder::with_capacity(rows.len())
                .with_precision_and_scale(*precision, *scale)
                .map_err(|e| ScanError::Batch(e.to_string()))?;
            for row in rows {
                match &row[col] {
                    ScalarValue::Decimal128 { value, .. } => builder.append_value(*value),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(field, other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(rows.len(), rows.len() * 8);
            for row in rows {
                match &row[col] {
                    ScalarValue::Utf8(s) => builder.append_value(s),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(field, other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::with_capacity(rows.len(), rows.len() * 8);
            for row in rows {
                match &row[col] {
                    ScalarValue::Binary(b) => builder.append_value(b),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(field, other)),
                }
            }
            Arc::new(builder.finish())
        }
        other => {
            return Err(ScanError::Batch(format!(
                "column {} has unsupported type {}",
                field.name(),
                other
            )));
        }
    };
    Ok(array)
}

/// Builds a record batch from rows laid out like `schema`. A schema without
/// fields yields a batch that only carries the row count.
pub fn rows_to_record_batch(
    schema: &SchemaRef,
    rows: &[Vec<ScalarValue>],
) -> Result<RecordBatch, ScanError> {
    if schema.fields().is_empty() {
        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        return RecordBatch::try_new_with_options(Arc::clone(schema), Vec::new(), &options)
            .map_err(|e| ScanError::Batch(e.to_string()));
    }
    let width = schema.fields().len();
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(ScanError::Batch(format!(
            "row has {} values, schema has {} fields",
            row.len(),
            width
        )));
    }
    let arrays = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(col, field)| build_column(field, rows, col))
        .collect::<Result<Vec<_>, _>>()?;
    RecordBatch::try_new(Arc::clone(schema), arrays).map_err(|e| ScanError::Batch(e.to_string()))
}

/// Drains a partition reader into record batches of at most `batch_size`
/// rows. The reader is closed once it is exhausted or fails.
pub struct BatchingReader<R: PartitionReader> {
    reader: R,
    schema: SchemaRef,
    batch_size: usize,
    done: bool,
}

impl<R: PartitionReader> BatchingReader<R> {
    pub fn new(reader: R, schema: SchemaRef, batch_size: usize) -> Self {
        Self {
            reader,
            schema,
            batch_size: batch_size.max(1),
            done: false,
        }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn next_batch(&mut self) -> Result<Option<RecordBatch>, ScanError> {
        if self.done {
            return Ok(None);
        }
        let mut rows = Vec::with_capacity(self.batch_size);
        while rows.len() < self.batch_size {
            match self.reader.next() {
                Ok(true) => match self.reader.get() {
                    Ok(row) => rows.push(row),
                    Err(e) => {
                        self.finish();
                        return Err(e);
                    }
                },
                Ok(false) => {
                    self.finish();
                    break;
                }
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            }
        }
        if rows.is_empty() {
            return Ok(None);
        }
        rows_to_record_batch(&self.schema, &rows).map(Some)
    }

    fn finish(&mut self) {
        self.done = true;
        self.reader.close();
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: PartitionReader> Iterator for BatchingReader<R> {
    type Item = Result<RecordBatch, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}
