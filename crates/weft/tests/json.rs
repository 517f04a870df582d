//! End-to-end tests for the JSON grammar.

use bumpalo::Bump;
use indoc::indoc;
use weft::{json, CompiledParser, Grammar, Parser, TreeParser, Value};

fn obj(entries: Vec<(&str, Value)>) -> Value {
    Value::object(entries.into_iter().map(|(k, v)| (k.to_string(), v)))
}

fn seq(items: Vec<Value>) -> Value {
    Value::Seq(items)
}

/// Parse with both engines and require agreement.
fn parse(input: &str) -> Value {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let root = json::value(&g);
    let tree = TreeParser::new(root)
        .parse_complete(input)
        .expect("tree parser succeeds");
    let compiled = CompiledParser::compile(&arena, root)
        .expect("json grammar compiles")
        .parse_complete(input)
        .expect("compiled parser succeeds");
    assert_eq!(tree, compiled, "engines disagree on {input:?}");
    tree
}

#[test]
fn scalars() {
    assert_eq!(parse("42"), Value::Int(42));
    assert_eq!(parse("-7"), Value::Int(-7));
    assert_eq!(parse("4.25"), Value::Float(4.25));
    assert_eq!(parse("-3.5"), Value::Float(-3.5));
    assert_eq!(parse("true"), Value::Bool(true));
    assert_eq!(parse("false"), Value::Bool(false));
    assert_eq!(parse("null"), Value::Null);
    assert_eq!(parse("\"hi\""), Value::Str("hi".into()));
    assert_eq!(parse("'hi'"), Value::Str("hi".into()));
}

#[test]
fn surrounding_whitespace() {
    assert_eq!(parse("  42\n"), Value::Int(42));
}

#[test]
fn strings_with_escapes() {
    assert_eq!(parse(r#""a\"b""#), Value::Str("a\"b".into()));
    assert_eq!(parse(r#"{"k": "a\"b"}"#), obj(vec![("k", Value::Str("a\"b".into()))]));
    assert_eq!(parse(r#"'a\'b'"#), Value::Str("a'b".into()));
}

#[test]
fn only_the_delimiter_is_escapable() {
    // A backslash before the other quote style is an ordinary character.
    assert_eq!(parse(r#""a\'b""#), Value::Str(r"a\'b".into()));
    assert_eq!(parse(r#"'a\"b'"#), Value::Str(r#"a\"b"#.into()));
}

#[test]
fn arrays() {
    assert_eq!(parse("[]"), seq(vec![]));
    assert_eq!(parse("[1]"), seq(vec![Value::Int(1)]));
    assert_eq!(
        parse("[1, 2, 3]"),
        seq(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(parse("[[],[]]"), seq(vec![seq(vec![]), seq(vec![])]));
}

#[test]
fn array_with_null_first_element() {
    assert_eq!(
        parse("[null, 0]"),
        seq(vec![Value::Null, Value::Int(0)])
    );
}

#[test]
fn objects() {
    assert_eq!(parse("{}"), obj(vec![]));
    assert_eq!(parse(r#"{"a": 1}"#), obj(vec![("a", Value::Int(1))]));
    assert_eq!(
        parse(r#"{"a": 1, "b": 2}"#),
        obj(vec![("a", Value::Int(1)), ("b", Value::Int(2))])
    );
}

#[test]
fn round_trip_mixed_object() {
    assert_eq!(
        parse(r#"{"a": [1, 2, -3.5, "x"]}"#),
        obj(vec![(
            "a",
            seq(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Float(-3.5),
                Value::Str("x".into()),
            ]),
        )])
    );
}

#[test]
fn nested_document() {
    let input = indoc! {r#"
        {
            "name": "Adventure",
            "tags": ["fun", "puzzle"],
            "stats": {"plays": 15, "rating": 4.5},
            "published": true,
            "archived": null
        }"#};
    assert_eq!(
        parse(input),
        obj(vec![
            ("name", Value::Str("Adventure".into())),
            (
                "tags",
                seq(vec![Value::Str("fun".into()), Value::Str("puzzle".into())]),
            ),
            (
                "stats",
                obj(vec![
                    ("plays", Value::Int(15)),
                    ("rating", Value::Float(4.5)),
                ]),
            ),
            ("published", Value::Bool(true)),
            ("archived", Value::Null),
        ])
    );
}

#[test]
fn convenience_entry_point() {
    assert_eq!(
        json::parse(r#"[true, "x"]"#).unwrap(),
        seq(vec![Value::Bool(true), Value::Str("x".into())])
    );
}

#[test]
fn rejects_malformed_input() {
    let err = json::parse(r#"{"a": }"#).unwrap_err();
    assert!(err.to_string().starts_with("At line 1"), "got: {err}");
    assert!(json::parse("[1, 2").is_err());
    assert!(json::parse("{\"a\" 1}").is_err());
    assert!(json::parse("").is_err());
}

#[test]
fn reports_the_line_of_the_failure() {
    let err = json::parse("[1,\n 2,\n oops]").unwrap_err();
    assert_eq!(err.line, 3);
}
