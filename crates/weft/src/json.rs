//! A JSON-style grammar built from the combinators.
//!
//! Exercises every part of the library: recursion through forward rules,
//! alternation, repetition with separators, escapes in strings, and value
//! transforms. Numbers become `Int` or `Float` depending on whether a
//! fraction is present; objects become `Map` values.

use bumpalo::Bump;
use hashbrown::HashMap;

use crate::error::ParseError;
use crate::grammar::{Grammar, Node};
use crate::parser::Parser;
use crate::value::Value;
use crate::vm::CompiledParser;

/// Build the grammar for a JSON value in `g`'s arena.
pub fn value<'a>(g: &Grammar<'a>) -> &'a Node<'a> {
    let ws = g.many(g.one_of(" \t\n\r"));
    let digits = g.named(g.run_of("0123456789", "", 1), "digits");

    let number = g.named(
        g.lift(
            &[
                g.opt_or(g.one_of("-"), Value::Str(String::new())),
                digits,
                g.opt(g.pair(g.one_of("."), digits)),
            ],
            make_number,
        ),
        "number",
    );

    let string = g.named(
        g.either(quoted(g, '"'), quoted(g, '\'')),
        "string",
    );

    let object = g.forward();
    let array = g.forward();

    let simple = g.named(
        g.choice(&[
            string,
            number,
            object,
            array,
            g.keyword("true", Value::Bool(true)),
            g.keyword("false", Value::Bool(false)),
            g.keyword("null", Value::Null),
        ]),
        "value",
    );
    let value = g.keep_right(ws, g.keep_left(simple, ws));

    let key = g.named(g.keep_left(string, g.one_of(":")), "key");
    let member = g.pair(g.keep_right(ws, key), value);
    let members = g.sep_by(member, g.one_of(","));
    object.bind(g.keep_right(
        g.one_of("{"),
        g.keep_left(g.map(members, make_object), g.one_of("}")),
    ));

    let elements = g.sep_by(value, g.one_of(","));
    array.bind(g.keep_right(g.one_of("["), g.keep_left(elements, g.one_of("]"))));

    g.named(value, "json value")
}

/// Parse one JSON value, requiring all input to be consumed.
pub fn parse(input: &str) -> Result<Value, ParseError> {
    let arena = Bump::new();
    let g = Grammar::new(&arena);
    let root = value(&g);
    // The grammar is static, so compilation cannot fail.
    let parser = CompiledParser::compile(&arena, root).expect("json grammar compiles");
    parser.parse_complete(input)
}

/// A quoted string: printable characters except the quote, with the quote
/// itself available as a backslash escape.
fn quoted<'a>(g: &Grammar<'a>, quote: char) -> &'a Node<'a> {
    let body: String = (' '..='~').filter(|&c| c != quote).collect();
    // Only the delimiter escapes; the other quote style stays literal.
    let escapes = quote.to_string();
    let quote = g.one_of(&escapes);
    g.keep_right(
        quote,
        g.keep_left(g.run_of(&body, &escapes, 0), quote),
    )
}

fn make_number(parts: Vec<Value>) -> Result<Value, String> {
    let mut text = String::new();
    for part in &parts {
        collect_text(&mut text, part);
    }
    if text.contains('.') {
        text.parse::<f64>().map(Value::Float).map_err(|e| e.to_string())
    } else {
        text.parse::<i64>().map(Value::Int).map_err(|e| e.to_string())
    }
}

fn collect_text(out: &mut String, value: &Value) {
    match value {
        Value::Char(c) => out.push(*c),
        Value::Str(s) => out.push_str(s),
        Value::Seq(items) => {
            for item in items {
                collect_text(out, item);
            }
        }
        _ => {}
    }
}

fn make_object(members: Value) -> Result<Value, String> {
    let members = match members {
        Value::Seq(members) => members,
        _ => return Err("Expected a sequence of key/value pairs.".to_string()),
    };
    let mut map = HashMap::with_capacity(members.len());
    for member in members {
        let mut kv = match member {
            Value::Seq(kv) if kv.len() == 2 => kv,
            _ => return Err("Malformed key/value pair.".to_string()),
        };
        let value = kv.pop().expect("checked length");
        let key = kv.pop().expect("checked length");
        match key {
            Value::Str(key) => {
                map.insert(key, value);
            }
            _ => return Err("Object keys must be strings.".to_string()),
        }
    }
    Ok(Value::Map(map))
}
