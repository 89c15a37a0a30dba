use std::sync::mpsc::Receiver;

use crate::connection::Connection;

use super::channel::Command;

pub(super) fn run_worker(mut conn: Connection, receiver: &Receiver<Command>) {
    while let Ok(command) = receiver.recv() {
        tracing::trace!(command = command.name(), "worker received command");
        match command {
            Command::Shutdown => break,
            Command::Query {
                sql,
                params,
                shape,
                respond_to,
            } => {
                let _ = respond_to.send(conn.query_as(shape, &sql, params));
            }
            Command::Execute {
                sql,
                params,
                respond_to,
            } => {
                let _ = respond_to.send(conn.execute(&sql, params));
            }
            Command::BatchExecute {
                sql,
                sets,
                respond_to,
            } => {
                let _ = respond_to.send(conn.batch_execute(&sql, sets));
            }
            Command::WithConnection {
                callback,
                respond_to,
            } => {
                let _ = respond_to.send(callback(&mut conn));
            }
            Command::Close { respond_to } => {
                let _ = respond_to.send(conn.close());
            }
        }
    }

    if let Err(err) = conn.close() {
        tracing::warn!(error = %err, "worker failed to close connection");
    }
    tracing::debug!("worker stopped");
}
