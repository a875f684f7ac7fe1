//! Host embedding surface: JSON bridge in both directions.

use pasrun::api::{value_from_json, value_to_json};
use pasrun::ast::{Expr, Stmt};
use pasrun::meta::RecordInfo;
use pasrun::{Interpreter, Value};
use serde_json::json;

use super::run;

#[test]
fn json_config_is_readable_from_scripts() {
    let mut it = Interpreter::new();
    it.define_global(
        "cfg",
        value_from_json(&json!({"port": 8080, "hosts": ["a", "b"]})),
    );
    run(
        &mut it,
        vec![
            // Field lookup is case-insensitive, like every identifier.
            Stmt::var("p", None, Some(Expr::member(Expr::ident("cfg"), "Port"))),
            Stmt::var(
                "h",
                None,
                Some(Expr::index(
                    Expr::member(Expr::ident("cfg"), "hosts"),
                    vec![Expr::int(1)],
                )),
            ),
        ],
    );
    assert_eq!(it.get_var("p"), Some(Value::Int(8080)));
    assert_eq!(it.get_var("h"), Some(Value::str("b")));
}

#[test]
fn script_results_export_as_json() {
    let mut it = Interpreter::new();
    it.registry.register_record(
        RecordInfo::new("TPoint")
            .field("X", "Integer")
            .field("Y", "Integer"),
    );
    run(
        &mut it,
        vec![
            Stmt::var("p", Some("TPoint"), None),
            Stmt::assign(Expr::member(Expr::ident("p"), "X"), Expr::int(3)),
        ],
    );
    let p = it.get_var("p").expect("p should exist");
    assert_eq!(value_to_json(&p).unwrap(), json!({"X": 3, "Y": 0}));
}

#[test]
fn dynamic_arrays_export_as_json_arrays() {
    let mut it = Interpreter::new();
    run(
        &mut it,
        vec![Stmt::var(
            "a",
            None,
            Some(Expr::ArrayLit(vec![
                Expr::int(1),
                Expr::str("two"),
                Expr::bool(true),
            ])),
        )],
    );
    let a = it.get_var("a").expect("a should exist");
    assert_eq!(value_to_json(&a).unwrap(), json!([1, "two", true]));
}
