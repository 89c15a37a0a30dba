use super::result_set::ResultSet;
use super::row::Row;
use crate::types::Value;

/// How a query's rows are delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    /// Every row as a column-name mapping
    RowMapping,
    /// Every row as positional values
    RowTuple,
    /// The first row as a mapping; stepping stops after it
    SingleRowMapping,
    /// The first column of every row
    SingleColumnSequence,
    /// The first column of the first row
    SingleValue,
    /// Column names only; the final statement is not stepped
    ColumnNameList,
}

/// A query's output in the shape that was asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    Rows(ResultSet),
    Tuples(Vec<Vec<Value>>),
    SingleRow(Option<Row>),
    Column(Vec<Value>),
    Single(Option<Value>),
    ColumnNames(Vec<String>),
}

impl Materialized {
    /// What a shape yields when the SQL text holds no statement.
    #[must_use]
    pub fn empty(shape: ResultShape) -> Self {
        match shape {
            ResultShape::RowMapping => Materialized::Rows(ResultSet::default()),
            ResultShape::RowTuple => Materialized::Tuples(Vec::new()),
            ResultShape::SingleRowMapping => Materialized::SingleRow(None),
            ResultShape::SingleColumnSequence => Materialized::Column(Vec::new()),
            ResultShape::SingleValue => Materialized::Single(None),
            ResultShape::ColumnNameList => Materialized::ColumnNames(Vec::new()),
        }
    }

    #[must_use]
    pub fn shape(&self) -> ResultShape {
        match self {
            Materialized::Rows(_) => ResultShape::RowMapping,
            Materialized::Tuples(_) => ResultShape::RowTuple,
            Materialized::SingleRow(_) => ResultShape::SingleRowMapping,
            Materialized::Column(_) => ResultShape::SingleColumnSequence,
            Materialized::Single(_) => ResultShape::SingleValue,
            Materialized::ColumnNames(_) => ResultShape::ColumnNameList,
        }
    }

    /// Number of rows represented; the column-name list counts as zero.
    #[must_use]
    pub fn row_count(&self) -> usize {
        match self {
            Materialized::Rows(rs) => rs.len(),
            Materialized::Tuples(rows) => rows.len(),
            Materialized::SingleRow(row) => usize::from(row.is_some()),
            Materialized::Column(values) => values.len(),
            Materialized::Single(value) => usize::from(value.is_some()),
            Materialized::ColumnNames(_) => 0,
        }
    }
}
