//! Guest exceptions: raise/except/finally, bare re-raise, and the
//! interaction with reference counting.

use pasrun::ast::{BinaryOp, ExceptClause, Expr, Routine, Stmt};
use pasrun::meta::ClassInfo;
use pasrun::{Interpreter, Value};

use super::{run, run_err};

fn try_stmt(
    body: Vec<Stmt>,
    except: Option<ExceptClause>,
    finally: Option<Vec<Stmt>>,
) -> Stmt {
    Stmt::Try {
        body,
        except,
        finally,
    }
}

#[test]
fn raise_is_caught_and_bound() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("msg", Some("String"), None),
            try_stmt(
                vec![Stmt::Raise(Some(Expr::str("boom")))],
                Some(ExceptClause {
                    binding: Some("e".into()),
                    body: vec![Stmt::assign(Expr::ident("msg"), Expr::ident("e"))],
                }),
                None,
            ),
        ],
    );
    assert_eq!(it.get_var("msg"), Some(Value::str("boom")));
}

#[test]
fn finally_runs_even_when_unhandled() {
    let mut it = Interpreter::new();
    it.define_global("cleaned", Value::Int(0));
    let err = run_err(
        &mut it,
        vec![try_stmt(
            vec![Stmt::Raise(Some(Expr::str("boom")))],
            None,
            Some(vec![Stmt::assign(Expr::ident("cleaned"), Expr::int(1))]),
        )],
    );
    assert!(err.is_raised());
    assert_eq!(it.get_var("cleaned"), Some(Value::Int(1)));
    assert_eq!(it.take_exception(), Some(Value::str("boom")));
}

#[test]
fn finally_runs_after_a_handler() {
    let mut it = Interpreter::new();
    it.define_global("order", Value::str(""));
    run(
        &mut it,
        vec![try_stmt(
            vec![Stmt::Raise(Some(Expr::str("x")))],
            Some(ExceptClause {
                binding: None,
                body: vec![Stmt::compound(
                    Expr::ident("order"),
                    BinaryOp::Add,
                    Expr::str("handler;"),
                )],
            }),
            Some(vec![Stmt::compound(
                Expr::ident("order"),
                BinaryOp::Add,
                Expr::str("finally;"),
            )]),
        )],
    );
    assert_eq!(it.get_var("order"), Some(Value::str("handler;finally;")));
}

#[test]
fn bare_raise_rethrows_the_handled_exception() {
    let mut it = Interpreter::new();
    let err = run_err(
        &mut it,
        vec![try_stmt(
            vec![Stmt::Raise(Some(Expr::str("original")))],
            Some(ExceptClause {
                binding: None,
                body: vec![Stmt::Raise(None)],
            }),
            None,
        )],
    );
    assert!(err.is_raised());
    assert_eq!(it.take_exception(), Some(Value::str("original")));
}

#[test]
fn division_by_zero_raises_a_guest_exception() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("msg", Some("String"), None),
            Stmt::var("x", Some("Integer"), Some(Expr::int(1))),
            try_stmt(
                vec![Stmt::assign(
                    Expr::ident("x"),
                    Expr::binary(BinaryOp::IntDiv, Expr::ident("x"), Expr::int(0)),
                )],
                Some(ExceptClause {
                    binding: Some("e".into()),
                    body: vec![Stmt::assign(Expr::ident("msg"), Expr::ident("e"))],
                }),
                None,
            ),
        ],
    );
    assert_eq!(it.get_var("msg"), Some(Value::str("division by zero")));
    // The failed statement never wrote through.
    assert_eq!(it.get_var("x"), Some(Value::Int(1)));
}

#[test]
fn a_raised_object_is_released_after_handling() {
    let mut it = Interpreter::new();
    it.registry.register_class(ClassInfo::new("TError").method(
        Routine::procedure(
            "Destroy",
            vec![],
            vec![Stmt::compound(
                Expr::ident("destroyed"),
                BinaryOp::Add,
                Expr::int(1),
            )],
        ),
    ));
    it.define_global("destroyed", Value::Int(0));
    run(
        &mut it,
        vec![try_stmt(
            vec![Stmt::Raise(Some(Expr::new_object("TError", vec![])))],
            Some(ExceptClause {
                binding: Some("e".into()),
                body: vec![],
            }),
            None,
        )],
    );
    assert_eq!(it.get_var("destroyed"), Some(Value::Int(1)));
}

#[test]
fn execution_continues_after_a_handled_exception() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("x", Some("Integer"), Some(Expr::int(0))),
            try_stmt(
                vec![Stmt::Raise(Some(Expr::str("skip")))],
                Some(ExceptClause {
                    binding: None,
                    body: vec![],
                }),
                None,
            ),
            Stmt::assign(Expr::ident("x"), Expr::int(5)),
        ],
    );
    assert_eq!(it.get_var("x"), Some(Value::Int(5)));
}
