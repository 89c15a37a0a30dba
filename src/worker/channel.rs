use std::any::Any;

use tokio::sync::oneshot;

use crate::connection::Connection;
use crate::error::DbError;
use crate::results::{Materialized, ResultShape};
use crate::types::Params;

pub(super) type BoxedResponse = Result<Box<dyn Any + Send>, DbError>;
pub(super) type BoxedCallback = Box<dyn FnOnce(&mut Connection) -> BoxedResponse + Send>;

pub(super) enum Command {
    Query {
        sql: String,
        params: Params,
        shape: ResultShape,
        respond_to: oneshot::Sender<Result<Materialized, DbError>>,
    },
    Execute {
        sql: String,
        params: Params,
        respond_to: oneshot::Sender<Result<usize, DbError>>,
    },
    BatchExecute {
        sql: String,
        sets: Vec<Params>,
        respond_to: oneshot::Sender<Result<usize, DbError>>,
    },
    WithConnection {
        callback: BoxedCallback,
        respond_to: oneshot::Sender<BoxedResponse>,
    },
    Close {
        respond_to: oneshot::Sender<Result<(), DbError>>,
    },
    Shutdown,
}

impl Command {
    pub(super) fn name(&self) -> &'static str {
        match self {
            Command::Query { .. } => "query",
            Command::Execute { .. } => "execute",
            Command::BatchExecute { .. } => "batch execute",
            Command::WithConnection { .. } => "connection callback",
            Command::Close { .. } => "close",
            Command::Shutdown => "shutdown",
        }
    }
}
