use coop_sqlite::prelude::*;

fn seeded() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    conn.execute(
        "create table people (id integer primary key, name text, score real, avatar blob);
         insert into people (name, score, avatar) values ('ann', 1.5, x'00ff'), ('bob', null, null);",
        (),
    )?;
    Ok(conn)
}

#[test]
fn mappings_and_tuples_carry_the_same_values() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    let rows = conn.query("select * from people order by id", ())?;
    let tuples = conn.query_tuple("select * from people order by id", ())?;

    assert_eq!(rows.column_names(), ["id", "name", "score", "avatar"]);
    assert_eq!(
        rows.iter().map(|r| r.values.clone()).collect::<Vec<_>>(),
        tuples
    );
    assert_eq!(rows.results[0].get("avatar"), Some(&Value::Blob(vec![0x00, 0xff])));
    assert_eq!(rows.results[0].get("score"), Some(&Value::Real(1.5)));
    assert_eq!(rows.results[1].get("score"), Some(&Value::Null));
    Ok(())
}

#[test]
fn single_value_and_absent_marker() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    assert_eq!(
        conn.query_single_value("select count(*) from people", ())?,
        Some(Value::Integer(2))
    );
    assert_eq!(
        conn.query_single_value("select name from people where id = 99", ())?,
        None
    );
    assert_eq!(
        conn.query_single_value("select score from people where name = 'bob'", ())?,
        None
    );
    Ok(())
}

#[test]
fn single_row_and_single_column() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    let row = conn
        .query_single_row("select name, score from people order by id", ())?
        .expect("first row");
    assert_eq!(row.get("name"), Some(&Value::Text("ann".into())));
    assert!(conn.query_single_row("select * from people where 0", ())?.is_none());

    assert_eq!(
        conn.query_single_column("select name from people order by id", ())?,
        vec![Value::Text("ann".into()), Value::Text("bob".into())]
    );
    Ok(())
}

#[test]
fn columns_do_not_run_the_statement() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    let names = conn.columns("insert into people (name) values ('cat') returning id, name")?;
    assert_eq!(names, vec!["id", "name"]);
    assert_eq!(
        conn.query_single_value("select count(*) from people", ())?,
        Some(Value::Integer(2))
    );
    Ok(())
}

#[test]
fn chain_returns_results_of_the_last_statement() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    let values = conn.query_single_column(
        "create table x (a); insert into x values (1), (2); select a from x order by a",
        (),
    )?;
    assert_eq!(values, vec![Value::Integer(1), Value::Integer(2)]);
    Ok(())
}

#[test]
fn trigger_body_with_inner_semicolons_runs_as_one_statement() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    conn.execute(
        "create table t (x); create table c (n); insert into c values (0);
         create trigger flag after insert on t begin
           update c set n = case when new.x > 0 then 1 else 0 end;
           update c set n = n * 10 where new.x > 100;
         end;
         insert into t values (5);",
        (),
    )?;
    assert_eq!(conn.query_single_value("select n from c", ())?, Some(Value::Integer(1)));

    conn.execute("insert into t values (500)", ())?;
    assert_eq!(conn.query_single_value("select n from c", ())?, Some(Value::Integer(10)));
    Ok(())
}

#[test]
fn fault_halts_the_chain_without_undoing_earlier_writes() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    let err = conn
        .execute(
            "insert into people (name) values ('cat');
             insert into nowhere values (1);
             insert into people (name) values ('dog');",
            (),
        )
        .unwrap_err();
    assert!(matches!(err, DbError::SqlError { .. }));
    assert!(err.to_string().contains("nowhere"));
    assert_eq!(
        conn.query_single_column("select name from people order by id", ())?,
        vec![
            Value::Text("ann".into()),
            Value::Text("bob".into()),
            Value::Text("cat".into())
        ]
    );
    assert!(!conn.transaction_active()?);
    Ok(())
}

#[test]
fn empty_text_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    assert!(conn.query("", ())?.is_empty());
    assert!(conn.query_tuple("   \n", ())?.is_empty());
    assert_eq!(conn.execute("-- just a comment", ())?, 0);
    assert_eq!(conn.query_single_value(" ; ", ())?, None);
    assert!(conn.query_single_row("/* nothing */", ())?.is_none());
    Ok(())
}

#[test]
fn invalid_utf8_text_is_decoded_lossily() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open_in_memory()?;
    assert_eq!(
        conn.query_single_value("select cast(x'6f6bff' as text)", ())?,
        Some(Value::Text("ok\u{fffd}".into()))
    );
    Ok(())
}

#[test]
fn prepared_statement_reruns_from_the_first_row() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded()?;
    let mut stmt = conn.prepare("select name from people where id >= ? order by id")?;
    assert_eq!(stmt.columns(), ["name"]);
    assert_eq!(stmt.parameter_count(), 1);

    let first = stmt.query_single_value(params![1])?;
    let again = stmt.query_single_value(params![1])?;
    assert_eq!(first, again);
    assert_eq!(stmt.query_single_column(params![2])?, vec![Value::Text("bob".into())]);
    assert_eq!(stmt.state(), coop_sqlite::StepState::Done);

    let mut seen = Vec::new();
    let count = stmt.for_each(params![1], |row| {
        seen.push(row.values[0].clone());
        Ok(())
    })?;
    assert_eq!(count, 2);
    Ok(())
}
