//! Turn stepped engine rows into the caller's requested shape.

use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::ValueRef;

use super::result_set::ResultSet;
use super::row::Row;
use super::shape::{Materialized, ResultShape};
use crate::connection::Connection;
use crate::error::DbError;
use crate::statement::{StepFlow, StepState, drive};
use crate::types::Value;

pub(crate) fn column_names(stmt: &Statement<'_>) -> Arc<Vec<String>> {
    Arc::new(
        stmt.column_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    )
}

/// Copy one engine value out of the row buffer. Text is decoded lossily.
pub(crate) fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

pub(crate) fn row_values(row: &rusqlite::Row<'_>, count: usize) -> Result<Vec<Value>, DbError> {
    (0..count)
        .map(|idx| Ok(value_from_ref(row.get_ref(idx)?)))
        .collect()
}

fn first_value(row: &rusqlite::Row<'_>) -> Result<Value, DbError> {
    Ok(value_from_ref(row.get_ref(0)?))
}

pub(crate) fn rows(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<ResultSet, DbError> {
    let columns = column_names(stmt);
    let count = columns.len();
    let mut result_set = ResultSet::new(columns);
    drive(conn, stmt, state, |row| {
        result_set.add_row_values(row_values(row, count)?);
        Ok(StepFlow::Continue)
    })?;
    Ok(result_set)
}

pub(crate) fn tuples(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<Vec<Vec<Value>>, DbError> {
    let count = stmt.column_count();
    let mut out = Vec::new();
    drive(conn, stmt, state, |row| {
        out.push(row_values(row, count)?);
        Ok(StepFlow::Continue)
    })?;
    Ok(out)
}

pub(crate) fn single_row(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<Option<Row>, DbError> {
    let columns = column_names(stmt);
    let mut out = None;
    drive(conn, stmt, state, |row| {
        out = Some(Row::new(Arc::clone(&columns), row_values(row, columns.len())?));
        Ok(StepFlow::Halt)
    })?;
    Ok(out)
}

pub(crate) fn single_column(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<Vec<Value>, DbError> {
    let mut out = Vec::new();
    if stmt.column_count() == 0 {
        drive(conn, stmt, state, |_| Ok(StepFlow::Continue))?;
        return Ok(out);
    }
    drive(conn, stmt, state, |row| {
        out.push(first_value(row)?);
        Ok(StepFlow::Continue)
    })?;
    Ok(out)
}

/// Column 0 of the first row; `None` for no rows, no columns, or NULL.
pub(crate) fn single_value(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<Option<Value>, DbError> {
    let has_columns = stmt.column_count() > 0;
    let mut out = None;
    drive(conn, stmt, state, |row| {
        if has_columns {
            out = Some(first_value(row)?).filter(|v| !v.is_null());
        }
        Ok(StepFlow::Halt)
    })?;
    Ok(out)
}

/// Step to completion, discarding rows.
pub(crate) fn discard(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
) -> Result<(), DbError> {
    drive(conn, stmt, state, |_| Ok(StepFlow::Continue))
}

/// Stream every row, as a mapping, through `f`.
pub(crate) fn each<F>(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
    mut f: F,
) -> Result<usize, DbError>
where
    F: FnMut(Row) -> Result<(), DbError>,
{
    let columns = column_names(stmt);
    let index = Arc::new(super::row::index_columns(&columns));
    let mut seen = 0;
    drive(conn, stmt, state, |row| {
        let values = row_values(row, columns.len())?;
        f(Row::with_index(Arc::clone(&columns), Arc::clone(&index), values))?;
        seen += 1;
        Ok(StepFlow::Continue)
    })?;
    Ok(seen)
}

pub(crate) fn collect(
    conn: &Connection,
    stmt: &mut Statement<'_>,
    state: &mut StepState,
    shape: ResultShape,
) -> Result<Materialized, DbError> {
    Ok(match shape {
        ResultShape::RowMapping => Materialized::Rows(rows(conn, stmt, state)?),
        ResultShape::RowTuple => Materialized::Tuples(tuples(conn, stmt, state)?),
        ResultShape::SingleRowMapping => Materialized::SingleRow(single_row(conn, stmt, state)?),
        ResultShape::SingleColumnSequence => {
            Materialized::Column(single_column(conn, stmt, state)?)
        }
        ResultShape::SingleValue => Materialized::Single(single_value(conn, stmt, state)?),
        ResultShape::ColumnNameList => {
            Materialized::ColumnNames(column_names(stmt).as_ref().clone())
        }
    })
}
