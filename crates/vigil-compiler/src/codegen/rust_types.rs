//! Rust names and value expressions for generated code.

use serde_json::Value;

use crate::ir::{Expr, Literal};

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
    "where", "while", "yield",
];

/// Converts a snake_case or camelCase name to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    s.split(['_', '-', '.'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// Converts a PascalCase or camelCase name to snake_case.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(c.to_lowercase());
        } else if c == '-' || c == '.' {
            result.push('_');
        } else {
            result.push(c);
        }
    }
    result
}

/// SCREAMING_SNAKE_CASE, for statics.
pub fn to_screaming_snake_case(s: &str) -> String {
    to_snake_case(s).to_uppercase()
}

/// A snake_case identifier, raw when it collides with a keyword.
pub fn ident(s: &str) -> String {
    let snake = to_snake_case(s);
    if KEYWORDS.contains(&snake.as_str()) {
        format!("r#{snake}")
    } else {
        snake
    }
}

/// Runtime value of a literal. Numbers keep their source notation when it
/// does not fit a JSON number.
pub fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(text) => {
            serde_json::from_str::<serde_json::Number>(text.trim())
                .map(Value::Number)
                .unwrap_or_else(|_| Value::String(text.clone()))
        }
        Literal::String(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    }
}

/// Rust source producing a `Value` for an initializer expression.
pub fn value_expr(expr: &Expr) -> String {
    match expr {
        Expr::Literal { value } => match literal_value(value) {
            Value::String(s) => format!("json!({s:?})"),
            other => format!("json!({other})"),
        },
        Expr::FeatureCall { .. } | Expr::Source { .. } => format!("Value::from({expr})"),
    }
}
