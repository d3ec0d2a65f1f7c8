//! End-to-end behavior of the statement pool.

mod fixtures;

use fixtures::open_session;
use tether::prelude::*;

#[test]
fn one_statement_per_slot_with_tolerant_tails() {
    let session = open_session();
    let db = session.database();
    db.execute("create table t (a integer)").unwrap();

    // Trailing separators and spaces are harmless.
    let mut ok = db.statement("insert into t (a) values (1);  ").unwrap();
    ok.step_final().unwrap();

    // A second statement is not.
    let err = db
        .statement("insert into t (a) values (1); insert into t (a) values (2)")
        .unwrap_err();
    assert!(matches!(err, Error::TooManyStatements { .. }));
}

#[test]
fn rebinding_after_a_bad_parameter_works_on_a_fresh_acquisition() {
    let session = open_session();
    let db = session.database();
    db.execute("create table t (a integer)").unwrap();
    db.execute("insert into t (a) values (7)").unwrap();

    let text = "select a from t where a = :A";
    {
        let mut poisoned = db.statement(text).unwrap();
        assert_eq!(
            poisoned.bind(":X", 7i64).unwrap_err(),
            Error::NoParameter {
                name: ":X".to_string()
            }
        );
    }

    let mut clean = db.statement(text).unwrap();
    clean.bind(":A", 7i64).unwrap();
    assert!(clean.step().unwrap());
    assert_eq!(clean.extract::<i64>(0).unwrap(), 7);
}

#[test]
fn overlapping_acquisitions_never_share_a_slot() {
    let session = open_session();
    let db = session.database();
    db.execute(
        "create table planets (name text, size text); \
         insert into planets (name, size) values ('Venus', 'medium'); \
         insert into planets (name, size) values ('Earth', 'medium')",
    )
    .unwrap();

    let text = "select name from planets where size = 'medium'";
    let mut outer = db.statement(text).unwrap();
    assert!(outer.step().unwrap());

    // An inner acquisition mid-iteration gets its own slot and cursor.
    let mut inner = db.statement(text).unwrap();
    assert!(inner.step().unwrap());
    assert!(inner.step().unwrap());
    assert!(!inner.step().unwrap());
    drop(inner);

    // The outer cursor was not perturbed.
    assert_eq!(outer.extract::<String>(0).unwrap(), "Venus");
    assert!(outer.step().unwrap());
    assert_eq!(outer.extract::<String>(0).unwrap(), "Earth");
    assert!(!outer.step().unwrap());
}

#[test]
fn a_three_row_cursor_cycles() {
    let session = open_session();
    let db = session.database();
    db.execute(
        "create table t (a integer); \
         insert into t (a) values (10); \
         insert into t (a) values (20); \
         insert into t (a) values (30)",
    )
    .unwrap();

    let mut select = db.statement("select a from t").unwrap();
    assert!(select.step().unwrap());
    assert!(select.step().unwrap());
    assert!(select.step().unwrap());
    assert!(!select.step().unwrap());
    // Exhaustion rewound the cursor: the next step replays row one.
    assert!(select.step().unwrap());
    assert_eq!(select.extract::<i64>(0).unwrap(), 10);
}

#[test]
fn expecting_no_rows_is_enforced() {
    let session = open_session();
    let db = session.database();
    db.execute(
        "create table t (a integer); \
         insert into t (a) values (1); \
         insert into t (a) values (2)",
    )
    .unwrap();

    let mut select = db.statement("select a from t").unwrap();
    assert!(select.step().unwrap());
    assert_eq!(select.step_final().unwrap_err(), Error::UnexpectedResultRow);
}

#[test]
fn pool_grows_only_under_contention() {
    let session = open_session();
    let db = session.database();
    db.execute("create table t (a integer)").unwrap();

    let text = "select a from t";
    {
        let _one = db.statement(text).unwrap();
        let _two = db.statement(text).unwrap();
        assert_eq!(db.pool_stats().slots, 2);
        assert_eq!(db.pool_stats().in_use, 2);
    }
    // Sequential reuse keeps the pool at its high-water mark.
    {
        let _again = db.statement(text).unwrap();
    }
    assert_eq!(db.pool_stats().slots, 2);
    assert_eq!(db.pool_stats().in_use, 0);
}
