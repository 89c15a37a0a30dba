use std::sync::{Arc, Mutex};

use coop_sqlite::prelude::*;

#[test]
fn closed_connections_refuse_work() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Connection::open_in_memory()?;
    conn.execute("create table t (x)", ())?;
    conn.close()?;
    assert!(conn.is_closed());
    // closing again is harmless
    conn.close()?;

    assert!(matches!(conn.query("select 1", ()), Err(DbError::ClosedError)));
    assert!(matches!(conn.execute("insert into t values (1)", ()), Err(DbError::ClosedError)));
    assert!(matches!(conn.prepare("select 1"), Err(DbError::ClosedError)));
    assert!(matches!(conn.total_changes(), Err(DbError::ClosedError)));
    Ok(())
}

#[test]
fn read_only_connections_reject_writes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ro.db");
    Connection::open(&path, OpenOptions::default())?.execute("create table t (x)", ())?;

    let conn = Connection::open(&path, OpenOptions::builder().read_only(true).finish())?;
    assert!(conn.is_read_only());
    let err = conn.execute("insert into t values (1)", ()).unwrap_err();
    let code = err.code().expect("engine fault");
    assert_eq!(code & 0xff, 8, "{err}");
    assert_eq!(conn.errcode(), code);
    Ok(())
}

#[test]
fn unopenable_sources_fail_at_open() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("no/such/dir/x.db");
    assert!(matches!(
        Connection::open(&missing, OpenOptions::default()),
        Err(DbError::OpenError { .. })
    ));

    let garbage = dir.path().join("garbage.db");
    std::fs::write(&garbage, vec![0x5a_u8; 4096])?;
    match Connection::open(&garbage, OpenOptions::default()) {
        Err(DbError::OpenError { location, .. }) => assert!(location.ends_with("garbage.db")),
        other => panic!("expected open error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn trace_sink_sees_each_statement() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let seen = Arc::clone(&seen);
        Arc::new(move |sql: &str| seen.lock().unwrap().push(sql.to_string())) as TraceSink
    };
    conn.trace(Some(sink));
    conn.execute("create table t (x);\n  insert into t values (1);  ", ())?;
    conn.query("select x from t", ())?;
    let outcome = conn.transaction(|tx| {
        tx.execute("insert into t values (2)", ())?;
        coop_sqlite::rollback::<()>()
    })?;
    assert!(!outcome.is_committed());
    conn.transaction(|tx| Ok(tx.execute("insert into t values (3)", ())?))?;
    conn.trace(None);
    conn.query("select 2", ())?;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "create table t (x);",
            "insert into t values (1);",
            "select x from t",
            "BEGIN DEFERRED",
            "insert into t values (2)",
            "ROLLBACK",
            "BEGIN DEFERRED",
            "insert into t values (3)",
            "COMMIT",
        ]
    );
    Ok(())
}

#[test]
fn error_details_follow_the_last_fault() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    assert_eq!(conn.errcode(), 0);
    assert_eq!(conn.errmsg(), "not an error");

    let err = conn.query("select * from nowhere", ()).unwrap_err();
    assert!(matches!(err, DbError::SqlError { .. }));
    assert_eq!(conn.errcode(), 1);
    assert!(conn.errmsg().contains("no such table: nowhere"));
    assert_eq!(conn.last_error().map(|e| e.code), Some(1));
    Ok(())
}

#[test]
fn change_counters_and_rowids() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute("create table t (id integer primary key, x)", ())?;
    assert_eq!(conn.total_changes()?, 0);

    assert_eq!(conn.execute("insert into t (x) values (1), (2), (3)", ())?, 3);
    assert_eq!(conn.last_insert_rowid()?, 3);
    assert_eq!(conn.execute("update t set x = x + 1 where id > 1", ())?, 2);
    assert_eq!(conn.total_changes()?, 5);
    // reads do not repeat the previous write's count
    assert_eq!(conn.execute("select * from t", ())?, 0);
    assert_eq!(conn.changes()?, 2);
    Ok(())
}

#[test]
fn wal_option_switches_journal_mode() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("wal.db");
    let conn = OpenOptions::builder().wal(true).open(&path)?;
    assert_eq!(
        conn.query_single_value("pragma journal_mode", ())?,
        Some(Value::Text("wal".into()))
    );

    let memory = OpenOptions::builder().wal(true).open(":memory:")?;
    assert_eq!(
        memory.query_single_value("pragma journal_mode", ())?,
        Some(Value::Text("memory".into()))
    );
    Ok(())
}
