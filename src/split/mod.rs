//! Walk SQL text one statement at a time.
//!
//! The scanner only proposes where a statement may end: every `;` outside string
//! literals, quoted identifiers and comments. The engine decides. A candidate it
//! reports as incomplete input (a `;` inside a `CREATE TRIGGER ... BEGIN ... END`
//! body, for instance) is extended to the next candidate and compiled again.
//! Statements are compiled lazily, so a later statement may depend on what an
//! earlier one created.

mod parsers;
mod scanner;

use crate::error::{DbError, is_incomplete};
use scanner::{Segment, segments};

/// Position in a multi-statement text.
pub(crate) struct StatementCursor<'a> {
    sql: &'a str,
    segments: Vec<Segment>,
    next: usize,
    start: usize,
}

impl<'a> StatementCursor<'a> {
    pub(crate) fn new(sql: &'a str) -> Self {
        Self {
            sql,
            segments: segments(sql),
            next: 0,
            start: 0,
        }
    }

    /// Byte offset where the unconsumed text begins.
    pub(crate) fn offset(&self) -> usize {
        self.start
    }

    /// True once only whitespace, comments and stray `;` remain.
    pub(crate) fn is_finished(&self) -> bool {
        self.segments[self.next..].iter().all(|s| !s.has_content)
    }

    /// Compile the next statement with `compile`, which receives candidate text
    /// starting at the current offset. Returns the statement's text and the
    /// compiled value, or `None` when no statement remains.
    ///
    /// Compile faults carry offsets relative to the whole text.
    pub(crate) fn next_statement<S, F>(&mut self, mut compile: F) -> Result<Option<(&'a str, S)>, DbError>
    where
        F: FnMut(&str) -> Result<S, rusqlite::Error>,
    {
        let mut content = false;
        while let Some(segment) = self.segments.get(self.next).copied() {
            self.next += 1;
            content |= segment.has_content;
            if !content {
                self.start = segment.end;
                continue;
            }

            let sql = self.sql;
            let text = &sql[self.start..segment.end];
            match compile(text) {
                Ok(stmt) => {
                    self.start = segment.end;
                    return Ok(Some((text, stmt)));
                }
                Err(err) if is_incomplete(&err) && self.next < self.segments.len() => {
                    tracing::trace!(offset = self.start, "statement continues past `;`");
                }
                Err(err) => return Err(DbError::from(err).shift_offset(self.start)),
            }
        }
        Ok(None)
    }
}
