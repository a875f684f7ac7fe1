//! Interface wrappers: wrap/retain/release around re-pointing, member
//! dispatch through the underlying object, unset-interface behavior.

use pasrun::ast::{BinaryOp, Expr, Routine, Stmt};
use pasrun::error::ExecError;
use pasrun::meta::{ClassInfo, InterfaceInfo, PropertyAccess, PropertyInfo};
use pasrun::{Interpreter, Symbol, Value};

use super::{block, run, run_err};

fn impl_interp() -> Interpreter {
    let mut it = Interpreter::new();
    it.registry.register_interface(InterfaceInfo::new("IThing"));
    it.registry.register_class(
        ClassInfo::new("TImpl")
            .field("FX", "Integer")
            .method(Routine::function(
                "GetX",
                vec![],
                "Integer",
                vec![Stmt::Exit(Some(Expr::ident("FX")))],
            )),
    );
    it
}

#[test]
fn assigning_an_object_wraps_and_retains() {
    let mut it = impl_interp();
    run(
        &mut it,
        vec![
            Stmt::var("o", None, Some(Expr::new_object("TImpl", vec![]))),
            Stmt::var("i", Some("IThing"), None),
            Stmt::assign(Expr::ident("i"), Expr::ident("o")),
        ],
    );
    match it.get_var("i") {
        Some(Value::Interface(iface)) => {
            assert_eq!(iface.interface_name.as_str(), "IThing");
            let underlying = iface.underlying.as_ref().expect("wrapper should be set");
            // One reference from `o`, one from the wrapper.
            assert_eq!(underlying.ref_count(), 2);
        }
        other => panic!("expected interface, got {other:?}"),
    }
}

#[test]
fn repointing_releases_the_old_and_retains_the_new() {
    let mut it = impl_interp();
    it.registry.register_class(ClassInfo::new("TCounted").method(
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
        vec![block(vec![
            Stmt::var("i", Some("IThing"), None),
            Stmt::assign(Expr::ident("i"), Expr::new_object("TCounted", vec![])),
            Stmt::assign(Expr::ident("i"), Expr::new_object("TCounted", vec![])),
            Stmt::assign(Expr::ident("i"), Expr::nil()),
        ])],
    );
    assert_eq!(it.get_var("destroyed"), Some(Value::Int(2)));
}

#[test]
fn assigning_nil_leaves_an_unset_wrapper() {
    let mut it = impl_interp();
    run(
        &mut it,
        vec![
            Stmt::var("i", Some("IThing"), None),
            Stmt::assign(Expr::ident("i"), Expr::new_object("TImpl", vec![])),
            Stmt::assign(Expr::ident("i"), Expr::nil()),
        ],
    );
    match it.get_var("i") {
        Some(Value::Interface(iface)) => assert!(iface.underlying.is_none()),
        other => panic!("expected interface, got {other:?}"),
    }
}

#[test]
fn member_access_dispatches_through_the_underlying_object() {
    let mut it = impl_interp();
    run(
        &mut it,
        vec![
            Stmt::var("i", Some("IThing"), None),
            Stmt::assign(Expr::ident("i"), Expr::new_object("TImpl", vec![])),
            Stmt::assign(Expr::member(Expr::ident("i"), "FX"), Expr::int(5)),
        ],
    );
    let x = it
        .eval_expr(&Expr::call(
            Expr::member(Expr::ident("i"), "GetX"),
            vec![],
        ))
        .unwrap();
    assert_eq!(x, Value::Int(5));
}

#[test]
fn interface_declared_property_reads_through_the_wrapper() {
    let mut it = Interpreter::new();
    it.registry.register_interface(InterfaceInfo::new("INamed").property(
        PropertyInfo::new(
            "X",
            PropertyAccess::Field(Symbol::new("FX")),
            PropertyAccess::Field(Symbol::new("FX")),
        ),
    ));
    it.registry
        .register_class(ClassInfo::new("TImpl").field("FX", "Integer"));
    run(
        &mut it,
        vec![
            Stmt::var("i", Some("INamed"), None),
            Stmt::assign(Expr::ident("i"), Expr::new_object("TImpl", vec![])),
            Stmt::assign(Expr::member(Expr::ident("i"), "X"), Expr::int(11)),
        ],
    );
    let x = it.eval_expr(&Expr::member(Expr::ident("i"), "X")).unwrap();
    assert_eq!(x, Value::Int(11));
}

#[test]
fn interface_to_interface_assignment_counts_both_holders() {
    let mut it = impl_interp();
    run(
        &mut it,
        vec![
            Stmt::var("o", None, Some(Expr::new_object("TImpl", vec![]))),
            Stmt::var("i1", Some("IThing"), None),
            Stmt::assign(Expr::ident("i1"), Expr::ident("o")),
            Stmt::var("i2", Some("IThing"), None),
            Stmt::assign(Expr::ident("i2"), Expr::ident("i1")),
        ],
    );
    match it.get_var("o") {
        Some(Value::Object(obj)) => assert_eq!(obj.ref_count(), 3),
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn member_assignment_through_an_unset_interface_fails() {
    let mut it = impl_interp();
    let err = run_err(
        &mut it,
        vec![
            Stmt::var("i", Some("IThing"), None),
            Stmt::assign(Expr::member(Expr::ident("i"), "FX"), Expr::int(1)),
        ],
    );
    match err {
        ExecError::MemberAssignmentUnsupported { kind, .. } => {
            assert_eq!(kind, "unset interface");
        }
        other => panic!("expected MemberAssignmentUnsupported, got {other:?}"),
    }
}
