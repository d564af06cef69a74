use ndarray::{s, Array1, ArrayView1};

use crate::math::InterpHelper;
use crate::records::{DecodedMessage, FieldValue, KindSchema};

/// One field across all rows of a series.
///
/// Values are always numeric; cells that do not parse are NaN. When any cell
/// was non-numeric the raw strings are kept alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    values: Array1<f64>,
    text: Option<Vec<String>>,
}

impl Column {
    fn from_cells(cells: &[Option<&FieldValue>]) -> Self {
        let values = cells
            .iter()
            .map(|cell| cell.map_or(f64::NAN, FieldValue::as_f64))
            .collect();
        let text = cells
            .iter()
            .any(|cell| cell.map_or(false, |v| !v.is_numeric()))
            .then(|| {
                cells
                    .iter()
                    .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default())
                    .collect()
            });
        Self { values, text }
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    pub fn text(&self) -> Option<&[String]> {
        self.text.as_deref()
    }

    fn slice(&self, start: usize, end: usize) -> Column {
        Column {
            values: self.values.slice(s![start..end]).to_owned(),
            text: self.text.as_ref().map(|text| text[start..end].to_vec()),
        }
    }

    fn value(&self, row: usize) -> FieldValue {
        match &self.text {
            Some(text) if self.values[row].is_nan() && !text[row].is_empty() => {
                FieldValue::Text(text[row].clone())
            }
            _ => FieldValue::Number(self.values[row]),
        }
    }
}

/// Columnar, time-ordered rows of one message kind.
///
/// Rows are sorted by time ascending, stable for equal times. Rows without a
/// finite time sort last. The time column is always numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSeries {
    schema: KindSchema,
    columns: Vec<Column>,
    len: usize,
}

impl SampleSeries {
    pub fn empty(schema: KindSchema) -> Self {
        Self::build(schema, Vec::new())
    }

    pub fn build(schema: KindSchema, rows: Vec<DecodedMessage>) -> Self {
        let time_of = |row: &DecodedMessage| row.number(&schema.time_field).unwrap_or(f64::NAN);
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| {
            let (ta, tb) = (time_of(&rows[a]), time_of(&rows[b]));
            match (ta.is_nan(), tb.is_nan()) {
                (false, false) => ta.total_cmp(&tb),
                (ta_nan, tb_nan) => ta_nan.cmp(&tb_nan),
            }
        });

        let columns = schema
            .fields
            .iter()
            .map(|name| {
                let cells: Vec<Option<&FieldValue>> =
                    order.iter().map(|&i| rows[i].get(name)).collect();
                Column::from_cells(&cells)
            })
            .collect();

        Self {
            len: rows.len(),
            schema,
            columns,
        }
    }

    pub fn kind(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &KindSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn field_names(&self) -> &[String] {
        &self.schema.fields
    }

    /// Numeric view of a field; `None` only for unknown fields.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.columns
            .get(self.schema.field_index(name)?)
            .map(Column::values)
    }

    /// Raw strings of a field that carried at least one non-numeric cell.
    pub fn text_column(&self, name: &str) -> Option<&[String]> {
        self.columns.get(self.schema.field_index(name)?)?.text()
    }

    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.column(&self.schema.time_field)
            .unwrap_or_else(|| ArrayView1::from(&[] as &[f64]))
    }

    /// Rebuilds row `index` as a message.
    pub fn row(&self, index: usize) -> Option<DecodedMessage> {
        if index >= self.len {
            return None;
        }
        Some(DecodedMessage::new(
            self.schema.name.clone(),
            self.schema
                .fields
                .iter()
                .cloned()
                .zip(self.columns.iter().map(|column| column.value(index)))
                .collect(),
        ))
    }

    /// Rows with `start <= t < end`.
    pub fn between(&self, start: f64, end: f64) -> SampleSeries {
        let times = self.times();
        let lower = InterpHelper::search_sorted(times, start);
        let upper = InterpHelper::search_sorted(times, end).max(lower);
        Self {
            schema: self.schema.clone(),
            columns: self
                .columns
                .iter()
                .map(|column| column.slice(lower, upper))
                .collect(),
            len: upper - lower,
        }
    }
}
