//! Materialized query output.

pub(crate) mod materialize;
pub mod result_set;
pub mod row;
pub mod shape;

pub use result_set::ResultSet;
pub use row::Row;
pub use shape::{Materialized, ResultShape};
