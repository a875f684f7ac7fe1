//! String element assignment: 1-based, code-point-aware, single-character.

use pasrun::ast::{BinaryOp, Expr, Stmt};
use pasrun::error::ExecError;
use pasrun::meta::RecordInfo;
use pasrun::{Interpreter, Value};

use super::{run, run_err};

#[test]
fn character_assignment_is_one_based_and_rune_aware() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("s", Some("String"), Some(Expr::str("abc"))),
            Stmt::assign(Expr::index(Expr::ident("s"), vec![Expr::int(2)]), Expr::str("é")),
        ],
    );
    match it.get_var("s") {
        Some(Value::Str(s)) => {
            assert_eq!(s.as_ref(), "aéc");
            assert_eq!(s.chars().count(), 3);
        }
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn replacement_must_be_exactly_one_code_point() {
    let mut it = Interpreter::new();
    let err = run_err(
        &mut it,
        vec![
            Stmt::var("s", Some("String"), Some(Expr::str("abc"))),
            Stmt::assign(Expr::index(Expr::ident("s"), vec![Expr::int(2)]), Expr::str("xy")),
        ],
    );
    match err {
        ExecError::InvalidCharacterAssignment { got } => assert_eq!(got, "xy"),
        other => panic!("expected InvalidCharacterAssignment, got {other:?}"),
    }
    // The string is untouched on failure.
    assert_eq!(it.get_var("s"), Some(Value::str("abc")));
}

#[test]
fn element_index_bounds_are_one_to_length() {
    let mut it = Interpreter::new();
    for bad in [0, 4] {
        let err = run_err(
            &mut it,
            vec![
                Stmt::var("s", Some("String"), Some(Expr::str("abc"))),
                Stmt::assign(
                    Expr::index(Expr::ident("s"), vec![Expr::int(bad)]),
                    Expr::str("x"),
                ),
            ],
        );
        match err {
            ExecError::IndexOutOfBounds { index, lo, hi } => {
                assert_eq!((index, lo, hi), (bad, 1, 3));
            }
            other => panic!("expected IndexOutOfBounds, got {other:?}"),
        }
    }
}

#[test]
fn element_reads_yield_single_characters() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![Stmt::var("s", Some("String"), Some(Expr::str("héllo")))],
    );
    let c = it
        .eval_expr(&Expr::index(Expr::ident("s"), vec![Expr::int(2)]))
        .unwrap();
    assert_eq!(c, Value::str("é"));
}

#[test]
fn element_assignment_writes_back_through_a_record_field() {
    let mut it = Interpreter::new();
    it.registry
        .register_record(RecordInfo::new("TNamed").field("Name", "String"));
    run(
        &mut it,
        vec![
            Stmt::var("r", Some("TNamed"), None),
            Stmt::assign(Expr::member(Expr::ident("r"), "Name"), Expr::str("héllo")),
            Stmt::assign(
                Expr::index(Expr::member(Expr::ident("r"), "Name"), vec![Expr::int(2)]),
                Expr::str("e"),
            ),
        ],
    );
    let name = it
        .eval_expr(&Expr::member(Expr::ident("r"), "Name"))
        .unwrap();
    assert_eq!(name, Value::str("hello"));
}

#[test]
fn string_concatenation_compound() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("s", Some("String"), Some(Expr::str("ab"))),
            Stmt::compound(Expr::ident("s"), BinaryOp::Add, Expr::str("c")),
        ],
    );
    assert_eq!(it.get_var("s"), Some(Value::str("abc")));
}
