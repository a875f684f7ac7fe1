//! Static vs. dynamic array semantics: copy-on-assign, aliasing, bounds.

use pasrun::ast::{Expr, Param, Routine, Stmt};
use pasrun::error::ExecError;
use pasrun::value::ArrayKind;
use pasrun::{Interpreter, Value};

use super::{call_stmt, run, run_err};

fn with_row_type() -> Interpreter {
    let mut it = Interpreter::new();
    it.registry.register_array_type(
        "TRow",
        ArrayKind::Static { low: 1, high: 3 },
        Some("Integer"),
    );
    it
}

#[test]
fn static_array_assignment_copies_the_backing_storage() {
    let mut it = with_row_type();
    run(
        &mut it,
        vec![
            Stmt::var(
                "a",
                Some("TRow"),
                Some(Expr::ArrayLit(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
            ),
            Stmt::var("b", None, Some(Expr::ident("a"))),
            Stmt::assign(Expr::index(Expr::ident("b"), vec![Expr::int(1)]), Expr::int(99)),
        ],
    );
    let a1 = it
        .eval_expr(&Expr::index(Expr::ident("a"), vec![Expr::int(1)]))
        .unwrap();
    let b1 = it
        .eval_expr(&Expr::index(Expr::ident("b"), vec![Expr::int(1)]))
        .unwrap();
    assert_eq!(a1, Value::Int(1));
    assert_eq!(b1, Value::Int(99));
}

#[test]
fn dynamic_array_assignment_aliases_the_backing_storage() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var(
                "a",
                None,
                Some(Expr::ArrayLit(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
            ),
            Stmt::var("b", None, Some(Expr::ident("a"))),
            Stmt::assign(Expr::index(Expr::ident("b"), vec![Expr::int(0)]), Expr::int(99)),
        ],
    );
    let a0 = it
        .eval_expr(&Expr::index(Expr::ident("a"), vec![Expr::int(0)]))
        .unwrap();
    assert_eq!(a0, Value::Int(99));
}

#[test]
fn static_bounds_violation_reports_the_declared_range() {
    let mut it = Interpreter::new();
    it.registry.register_array_type(
        "TWindow",
        ArrayKind::Static { low: 5, high: 7 },
        Some("Integer"),
    );
    let err = run_err(
        &mut it,
        vec![
            Stmt::var("a", Some("TWindow"), None),
            Stmt::assign(Expr::index(Expr::ident("a"), vec![Expr::int(8)]), Expr::int(1)),
        ],
    );
    match err {
        ExecError::IndexOutOfBounds { index, lo, hi } => {
            assert_eq!((index, lo, hi), (8, 5, 7));
        }
        other => panic!("expected IndexOutOfBounds, got {other:?}"),
    }
}

#[test]
fn dynamic_bounds_violation_reports_the_length() {
    let mut it = Interpreter::new();
    let err = run_err(
        &mut it,
        vec![
            Stmt::var(
                "a",
                None,
                Some(Expr::ArrayLit(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
            ),
            Stmt::assign(Expr::index(Expr::ident("a"), vec![Expr::int(3)]), Expr::int(0)),
        ],
    );
    match err {
        ExecError::IndexOutOfBounds { index, lo, hi } => {
            assert_eq!((index, lo, hi), (3, 0, 2));
        }
        other => panic!("expected IndexOutOfBounds, got {other:?}"),
    }
}

#[test]
fn static_index_translates_to_a_physical_offset() {
    let mut it = with_row_type();
    run(
        &mut it,
        vec![
            Stmt::var(
                "a",
                Some("TRow"),
                Some(Expr::ArrayLit(vec![Expr::int(10), Expr::int(20), Expr::int(30)])),
            ),
            Stmt::assign(Expr::index(Expr::ident("a"), vec![Expr::int(3)]), Expr::int(33)),
        ],
    );
    let a3 = it
        .eval_expr(&Expr::index(Expr::ident("a"), vec![Expr::int(3)]))
        .unwrap();
    assert_eq!(a3, Value::Int(33));
}

#[test]
fn nested_dynamic_arrays_index_through() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var(
                "m",
                None,
                Some(Expr::ArrayLit(vec![
                    Expr::ArrayLit(vec![Expr::int(1), Expr::int(2)]),
                    Expr::ArrayLit(vec![Expr::int(3), Expr::int(4)]),
                ])),
            ),
            Stmt::assign(
                Expr::index(Expr::ident("m"), vec![Expr::int(1), Expr::int(0)]),
                Expr::int(9),
            ),
        ],
    );
    let v = it
        .eval_expr(&Expr::index(
            Expr::ident("m"),
            vec![Expr::int(1), Expr::int(0)],
        ))
        .unwrap();
    assert_eq!(v, Value::Int(9));
}

#[test]
fn static_array_by_value_param_copies_by_ref_aliases() {
    let mut it = with_row_type();
    it.register_routine(Routine::procedure(
        "MutCopy",
        vec![Param::by_value("a")],
        vec![Stmt::assign(
            Expr::index(Expr::ident("a"), vec![Expr::int(1)]),
            Expr::int(99),
        )],
    ));
    it.register_routine(Routine::procedure(
        "MutRef",
        vec![Param::by_ref("a")],
        vec![Stmt::assign(
            Expr::index(Expr::ident("a"), vec![Expr::int(1)]),
            Expr::int(99),
        )],
    ));
    run(
        &mut it,
        vec![
            Stmt::var(
                "x",
                Some("TRow"),
                Some(Expr::ArrayLit(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
            ),
            call_stmt(Expr::ident("MutCopy"), vec![Expr::ident("x")]),
        ],
    );
    let x1 = it
        .eval_expr(&Expr::index(Expr::ident("x"), vec![Expr::int(1)]))
        .unwrap();
    assert_eq!(x1, Value::Int(1));

    run(
        &mut it,
        vec![call_stmt(Expr::ident("MutRef"), vec![Expr::ident("x")])],
    );
    let x1 = it
        .eval_expr(&Expr::index(Expr::ident("x"), vec![Expr::int(1)]))
        .unwrap();
    assert_eq!(x1, Value::Int(99));
}

#[test]
fn indexing_a_scalar_is_not_indexable() {
    let mut it = Interpreter::new();
    let err = run_err(
        &mut it,
        vec![
            Stmt::var("x", Some("Integer"), Some(Expr::int(1))),
            Stmt::assign(Expr::index(Expr::ident("x"), vec![Expr::int(0)]), Expr::int(2)),
        ],
    );
    assert!(matches!(err, ExecError::NotIndexable { .. }));
}
