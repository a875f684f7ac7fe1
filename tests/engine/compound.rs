//! Compound assignment: read-modify-write through every target shape, with
//! accessors and sub-expressions evaluated exactly once.

use pasrun::ast::{BinaryOp, Expr, Param, Routine, Stmt};
use pasrun::error::ExecError;
use pasrun::meta::{ClassInfo, PropertyAccess, PropertyInfo};
use pasrun::{Interpreter, Symbol, Value};

use super::{run, run_err};

#[test]
fn integer_compound_operators() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("x", Some("Integer"), Some(Expr::int(10))),
            Stmt::compound(Expr::ident("x"), BinaryOp::Add, Expr::int(5)),
            Stmt::compound(Expr::ident("x"), BinaryOp::Sub, Expr::int(3)),
            Stmt::compound(Expr::ident("x"), BinaryOp::Mul, Expr::int(2)),
        ],
    );
    assert_eq!(it.get_var("x"), Some(Value::Int(24)));
}

#[test]
fn float_division_compound() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![
            Stmt::var("f", Some("Float"), Some(Expr::float(9.0))),
            Stmt::compound(Expr::ident("f"), BinaryOp::Div, Expr::int(2)),
        ],
    );
    assert_eq!(it.get_var("f"), Some(Value::Float(4.5)));
}

fn probe_class() -> ClassInfo {
    ClassInfo::new("TProbe")
        .field("FValue", "Integer")
        .field("FReads", "Integer")
        .field("FWrites", "Integer")
        .method(Routine::function(
            "GetV",
            vec![],
            "Integer",
            vec![
                Stmt::compound(Expr::ident("FReads"), BinaryOp::Add, Expr::int(1)),
                Stmt::Exit(Some(Expr::ident("FValue"))),
            ],
        ))
        .method(Routine::procedure(
            "SetV",
            vec![Param::by_value("v")],
            vec![
                Stmt::compound(Expr::ident("FWrites"), BinaryOp::Add, Expr::int(1)),
                Stmt::assign(Expr::ident("FValue"), Expr::ident("v")),
            ],
        ))
        .property(PropertyInfo::new(
            "Value",
            PropertyAccess::Method(Symbol::new("GetV")),
            PropertyAccess::Method(Symbol::new("SetV")),
        ))
}

#[test]
fn property_compound_visits_each_accessor_once() {
    let mut it = Interpreter::new();
    it.registry.register_class(probe_class());
    run(
        &mut it,
        vec![
            Stmt::var("p", None, Some(Expr::new_object("TProbe", vec![]))),
            Stmt::assign(Expr::member(Expr::ident("p"), "Value"), Expr::int(5)),
            Stmt::compound(
                Expr::member(Expr::ident("p"), "Value"),
                BinaryOp::Add,
                Expr::int(1),
            ),
        ],
    );
    match it.get_var("p") {
        Some(Value::Object(obj)) => {
            assert_eq!(obj.get_field("FValue"), Some(Value::Int(6)));
            // One getter visit (the compound read), two setter visits (the
            // plain assignment and the compound write).
            assert_eq!(obj.get_field("FReads"), Some(Value::Int(1)));
            assert_eq!(obj.get_field("FWrites"), Some(Value::Int(2)));
        }
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn index_expression_is_evaluated_once() {
    let mut it = Interpreter::new();
    it.register_routine(Routine::function(
        "PickIndex",
        vec![],
        "Integer",
        vec![
            Stmt::compound(Expr::ident("evals"), BinaryOp::Add, Expr::int(1)),
            Stmt::Exit(Some(Expr::int(1))),
        ],
    ));
    it.define_global("evals", Value::Int(0));
    run(
        &mut it,
        vec![
            Stmt::var(
                "a",
                None,
                Some(Expr::ArrayLit(vec![Expr::int(10), Expr::int(20), Expr::int(30)])),
            ),
            Stmt::compound(
                Expr::index(Expr::ident("a"), vec![Expr::call(Expr::ident("PickIndex"), vec![])]),
                BinaryOp::Add,
                Expr::int(5),
            ),
        ],
    );
    let a1 = it
        .eval_expr(&Expr::index(Expr::ident("a"), vec![Expr::int(1)]))
        .unwrap();
    assert_eq!(a1, Value::Int(25));
    assert_eq!(it.get_var("evals"), Some(Value::Int(1)));
}

#[test]
fn operand_type_mismatch_reports_the_operator() {
    let mut it = Interpreter::new();
    let err = run_err(
        &mut it,
        vec![
            Stmt::var("b", Some("Boolean"), Some(Expr::bool(true))),
            Stmt::compound(Expr::ident("b"), BinaryOp::Add, Expr::int(1)),
        ],
    );
    match err {
        ExecError::TypeMismatch { op, left, right } => {
            assert_eq!(op, "+");
            assert_eq!(left, "Boolean");
            assert_eq!(right, "Integer");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
}

#[test]
fn compound_through_a_var_parameter() {
    let mut it = Interpreter::new();
    it.register_routine(Routine::procedure(
        "Double",
        vec![Param::by_ref("x")],
        vec![Stmt::compound(Expr::ident("x"), BinaryOp::Mul, Expr::int(2))],
    ));
    run(
        &mut it,
        vec![
            Stmt::var("n", Some("Integer"), Some(Expr::int(21))),
            Stmt::Expr(Expr::call(Expr::ident("Double"), vec![Expr::ident("n")])),
        ],
    );
    assert_eq!(it.get_var("n"), Some(Value::Int(42)));
}
