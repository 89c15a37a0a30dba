use chrono::NaiveDate;
use coop_sqlite::prelude::*;
use serde::Serialize;

fn conn() -> Result<Connection, DbError> {
    Connection::open_in_memory()
}

#[test]
fn positional_and_explicit_indices() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    assert_eq!(
        conn.query_single_value("select ? + ?", params![1, 2])?,
        Some(Value::Integer(3))
    );
    assert_eq!(
        conn.query_tuple("select ?2, ?1", params!["a", "b"])?,
        vec![vec![Value::Text("b".into()), Value::Text("a".into())]]
    );
    Ok(())
}

#[test]
fn named_parameters_accept_any_marker() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    let row = conn.query_tuple(
        "select :a, @b, $c",
        HostValue::hash([(":a", 1), ("b", 2), ("c", 3)]),
    )?;
    assert_eq!(
        row,
        vec![vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]]
    );

    let by_symbol = conn.query_single_value(
        "select :name",
        HostValue::hash([(HostValue::symbol("name"), HostValue::from("sym"))]),
    )?;
    assert_eq!(by_symbol, Some(Value::Text("sym".into())));
    Ok(())
}

#[test]
fn mapping_integer_keys_are_positions_and_unknown_names_are_ignored()
-> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    let row = conn.query_tuple(
        "select ?, ?",
        HostValue::hash([(HostValue::from(2), HostValue::from("two"))]),
    )?;
    assert_eq!(row, vec![vec![Value::Null, Value::Text("two".into())]]);

    let value = conn.query_single_value(
        "select :known",
        HostValue::hash([("known", 1), ("unknown", 2)]),
    )?;
    assert_eq!(value, Some(Value::Integer(1)));
    Ok(())
}

#[test]
fn unsupported_keys_and_values_name_their_type() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    let err = conn
        .query("select :a", HostValue::hash([(HostValue::Float(1.5), HostValue::from(1))]))
        .unwrap_err();
    assert!(matches!(err, DbError::ParameterError(ref m) if m.contains("float")), "{err}");

    let err = conn
        .query("select ?", params![HostValue::Array(vec![])])
        .unwrap_err();
    assert!(matches!(err, DbError::ParameterError(ref m) if m.contains("array")), "{err}");

    let err = conn
        .query("select ?", params![HostValue::Object("Thread".into())])
        .unwrap_err();
    assert!(matches!(err, DbError::ParameterError(ref m) if m.contains("Thread")), "{err}");

    let err = conn.query("select ?", params![1, 2]).unwrap_err();
    assert!(matches!(err, DbError::ParameterError(_)), "{err}");

    // the connection is still usable
    assert_eq!(conn.query_single_value("select 1", ())?, Some(Value::Integer(1)));
    Ok(())
}

#[test]
fn numeric_extremes_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    conn.execute("create table nums (i integer, r real)", ())?;
    let ints = [
        i64::MIN,
        i64::MIN + 1,
        i64::from(i32::MIN) - 1,
        i64::from(i32::MIN),
        i64::from(i32::MIN) + 1,
        -1,
        0,
        1,
        i64::from(i32::MAX) - 1,
        i64::from(i32::MAX),
        i64::from(i32::MAX) + 1,
        i64::MAX - 1,
        i64::MAX,
    ];
    let floats = [f64::MIN, -0.5, 0.0, f64::MIN_POSITIVE, 1.5, f64::MAX];

    conn.batch_execute("insert into nums (i) values (?)", ints.iter().map(|n| params![*n]))?;
    conn.batch_execute("insert into nums (r) values (?)", floats.iter().map(|f| params![*f]))?;

    let stored_ints = conn.query_single_column("select i from nums where i is not null order by rowid", ())?;
    assert_eq!(stored_ints, ints.iter().map(|n| Value::Integer(*n)).collect::<Vec<_>>());
    let stored_floats = conn.query_single_column("select r from nums where r is not null order by rowid", ())?;
    assert_eq!(stored_floats, floats.iter().map(|f| Value::Real(*f)).collect::<Vec<_>>());

    // 32-bit host integers bind directly
    for n in [i32::MIN, i32::MIN + 1, i32::MAX - 1, i32::MAX] {
        assert_eq!(
            conn.query_single_value("select i from nums where i = ?", params![n])?,
            Some(Value::Integer(i64::from(n)))
        );
    }

    let err = conn
        .query("select ?", params![i128::from(i64::MAX) + 1])
        .unwrap_err();
    assert!(matches!(err, DbError::ParameterError(ref m) if m.contains("big integer")));
    Ok(())
}

#[test]
fn binary_binds_as_blob_and_strings_as_text() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    let kinds = conn.query_tuple(
        "select typeof(?), typeof(?), typeof(?), typeof(?), ?",
        params![Binary(b"abc".to_vec()), "abc", (), true, false],
    )?;
    assert_eq!(
        kinds,
        vec![vec![
            Value::Text("blob".into()),
            Value::Text("text".into()),
            Value::Text("null".into()),
            Value::Text("integer".into()),
            Value::Integer(0),
        ]]
    );
    Ok(())
}

#[test]
fn timestamps_bind_as_text() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    let at = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .expect("valid timestamp");
    let value = conn.query_single_value("select ?", params![at])?;
    match value {
        Some(Value::Text(text)) => assert!(text.starts_with("2024-01-02 03:04:05"), "{text}"),
        other => panic!("unexpected {other:?}"),
    }
    Ok(())
}

#[derive(Serialize)]
struct Person {
    name: String,
    age: i64,
}

#[test]
fn records_fill_named_placeholders() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    conn.execute("create table people (name text, age integer, note text)", ())?;
    let ann = Person {
        name: "ann".into(),
        age: 41,
    };
    conn.execute(
        "insert into people values (:name, :age, :note)",
        HostValue::record(&ann)?,
    )?;
    let row = conn
        .query_single_row("select * from people", ())?
        .expect("inserted row");
    assert_eq!(row.get("name"), Some(&Value::Text("ann".into())));
    assert_eq!(row.get("age"), Some(&Value::Integer(41)));
    assert_eq!(row.get("note"), Some(&Value::Null));
    Ok(())
}

#[test]
fn rebinding_never_leaks_previous_values() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    let mut stmt = conn.prepare("select ?1, ?2")?;
    assert_eq!(
        stmt.query_tuple(params![1, 2])?,
        vec![vec![Value::Integer(1), Value::Integer(2)]]
    );
    assert_eq!(
        stmt.query_tuple(HostValue::hash([(1, 5)]))?,
        vec![vec![Value::Integer(5), Value::Null]]
    );
    Ok(())
}

#[test]
fn batch_execute_inserts_every_set() -> Result<(), Box<dyn std::error::Error>> {
    let conn = conn()?;
    conn.execute("create table t (x integer, label text)", ())?;
    let sets: Vec<Params> = (0..1000).map(|i| params![i, format!("row {i}")]).collect();
    assert_eq!(conn.batch_execute("insert into t values (?, ?)", sets)?, 1000);
    assert_eq!(
        conn.query_single_value("select sum(x) from t", ())?,
        Some(Value::Integer(499_500))
    );
    Ok(())
}
