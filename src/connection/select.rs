use rusqlite::ffi;

use super::Connection;
use crate::error::DbError;
use crate::results::materialize;
use crate::results::{Materialized, ResultSet, ResultShape, Row};
use crate::split::StatementCursor;
use crate::statement::PreparedStatement;
use crate::types::{Params, Value};

impl Connection {
    /// Run `sql` and return every row of its last statement as a column mapping.
    ///
    /// Text holding several statements runs them in order; a fault in any of them
    /// stops the chain, and writes made by earlier statements stay.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn query(&self, sql: &str, params: impl Into<Params>) -> Result<ResultSet, DbError> {
        Ok(self
            .run_chain(sql, params.into(), materialize::rows)?
            .unwrap_or_default())
    }

    /// Every row as positional values.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn query_tuple(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<Vec<Value>>, DbError> {
        Ok(self
            .run_chain(sql, params.into(), materialize::tuples)?
            .unwrap_or_default())
    }

    /// The first row, or `None`. Stepping stops after one row.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn query_single_row(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Option<Row>, DbError> {
        Ok(self
            .run_chain(sql, params.into(), materialize::single_row)?
            .flatten())
    }

    /// The first column of every row.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn query_single_column(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<Value>, DbError> {
        Ok(self
            .run_chain(sql, params.into(), materialize::single_column)?
            .unwrap_or_default())
    }

    /// The first column of the first row; `None` when there is no row or it is NULL.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn query_single_value(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Option<Value>, DbError> {
        Ok(self
            .run_chain(sql, params.into(), materialize::single_value)?
            .flatten())
    }

    /// Column names of the last statement, which is compiled but not stepped.
    ///
    /// # Errors
    ///
    /// Returns `DbError` if any statement fails to compile, or an earlier one fails to run.
    pub fn columns(&self, sql: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .run_chain(sql, Params::default(), |_, stmt, _| {
                Ok(materialize::column_names(stmt).as_ref().clone())
            })?
            .unwrap_or_default())
    }

    /// Run `sql`, delivering its rows in the requested shape.
    ///
    /// # Errors
    ///
    /// Returns `DbError` on compile, binding, engine, busy or interrupt faults.
    pub fn query_as(
        &self,
        shape: ResultShape,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Materialized, DbError> {
        Ok(self
            .run_chain(sql, params.into(), |conn, stmt, state| {
                materialize::collect(conn, stmt, state, shape)
            })?
            .unwrap_or_else(|| Materialized::empty(shape)))
    }

    /// Stream rows of the last statement through `f`; returns how many were seen.
    ///
    /// An error from `f` stops stepping and is returned as is.
    ///
    /// # Errors
    ///
    /// Returns the first fault from the engine or from `f`.
    pub fn query_each<F>(&self, sql: &str, params: impl Into<Params>, f: F) -> Result<usize, DbError>
    where
        F: FnMut(Row) -> Result<(), DbError>,
    {
        Ok(self
            .run_chain(sql, params.into(), |conn, stmt, state| {
                materialize::each(conn, stmt, state, f)
            })?
            .unwrap_or_default())
    }

    /// Compile exactly one statement for repeated use.
    ///
    /// # Errors
    ///
    /// Returns `DbError::SqlError` for compile faults, for empty text, and for text
    /// holding more than one statement.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>, DbError> {
        let db = self.handle()?;
        let mut cursor = StatementCursor::new(sql);
        let Some((text, stmt)) = cursor
            .next_statement(|candidate| db.prepare(candidate))
            .map_err(|e| self.record(e))?
        else {
            return Err(DbError::SqlError {
                code: ffi::SQLITE_MISUSE,
                message: "no SQL statement to prepare".into(),
                offset: None,
            });
        };
        if !cursor.is_finished() {
            return Err(DbError::SqlError {
                code: ffi::SQLITE_ERROR,
                message: "prepare accepts a single statement".into(),
                offset: Some(cursor.offset()),
            });
        }
        Ok(PreparedStatement::new(self, stmt, text.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "create table t (id integer primary key, name text); \
             insert into t (name) values ('a'), ('b'), ('c')",
            (),
        )
        .unwrap();
        conn
    }

    #[test]
    fn columns_come_from_the_compiled_statement() {
        let conn = conn();
        assert_eq!(conn.columns("select id, name as n from t").unwrap(), vec!["id", "n"]);
        assert!(conn.columns("  ").unwrap().is_empty());
    }

    #[test]
    fn query_each_streams_every_row() {
        let conn = conn();
        let mut names = Vec::new();
        let seen = conn
            .query_each("select name from t order by id", (), |row| {
                names.push(row.get("name").cloned());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, 3);
        assert_eq!(names[2], Some(Value::Text("c".into())));
    }

    #[test]
    fn query_each_stops_on_callback_error() {
        let conn = conn();
        let mut calls = 0;
        let err = conn
            .query_each("select * from t", (), |_| {
                calls += 1;
                Err(DbError::ArgumentError("stop".into()))
            })
            .unwrap_err();
        assert!(matches!(err, DbError::ArgumentError(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn prepare_rejects_multiple_and_empty_text() {
        let conn = conn();
        assert!(matches!(
            conn.prepare("select 1; select 2"),
            Err(DbError::SqlError { offset: Some(9), .. })
        ));
        assert!(matches!(conn.prepare(" -- nothing"), Err(DbError::SqlError { .. })));
    }

    #[test]
    fn query_as_dispatches_on_shape() {
        let conn = conn();
        let out = conn
            .query_as(ResultShape::SingleValue, "select name from t where id = ?", params![2])
            .unwrap();
        assert_eq!(out, Materialized::Single(Some(Value::Text("b".into()))));

        let out = conn.query_as(ResultShape::RowTuple, "", ()).unwrap();
        assert_eq!(out, Materialized::Tuples(Vec::new()));
    }
}
