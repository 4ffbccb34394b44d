//! Purpose: Render pretty JSON with optional ANSI colorization for CLI output.
//! Exports: `colorize_json`.
//! Role: Small, pure formatter used by CLI emission paths.
//! Invariants: When color is disabled, output equals serde_json::to_string_pretty.
//! Invariants: ANSI escapes appear only when explicitly enabled.
use std::fmt::Write as _;

use serde_json::Value;

// 8/16-color codes that stay readable on light and dark themes.
#[derive(Clone, Copy)]
enum Tone {
    Key,
    Str,
    Num,
    Lit,
    Punct,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Key => "36",
            Tone::Str => "32",
            Tone::Num => "33",
            Tone::Lit => "35",
            Tone::Punct => "39",
        }
    }
}

pub(crate) fn colorize_json(value: &Value, use_color: bool) -> String {
    let mut out = String::new();
    emit(&mut out, value, 0, use_color);
    out
}

fn emit(out: &mut String, value: &Value, depth: usize, color: bool) {
    match value {
        Value::Null => token(out, "null", Tone::Lit, color),
        Value::Bool(true) => token(out, "true", Tone::Lit, color),
        Value::Bool(false) => token(out, "false", Tone::Lit, color),
        Value::Number(number) => token(out, &number.to_string(), Tone::Num, color),
        Value::String(text) => quoted(out, text, Tone::Str, color),
        Value::Array(items) if items.is_empty() => token(out, "[]", Tone::Punct, color),
        Value::Array(items) => {
            token(out, "[", Tone::Punct, color);
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    token(out, ",", Tone::Punct, color);
                }
                out.push('\n');
                indent(out, depth + 1);
                emit(out, item, depth + 1, color);
            }
            out.push('\n');
            indent(out, depth);
            token(out, "]", Tone::Punct, color);
        }
        Value::Object(map) if map.is_empty() => token(out, "{}", Tone::Punct, color),
        Value::Object(map) => {
            token(out, "{", Tone::Punct, color);
            for (index, (key, entry)) in map.iter().enumerate() {
                if index > 0 {
                    token(out, ",", Tone::Punct, color);
                }
                out.push('\n');
                indent(out, depth + 1);
                quoted(out, key, Tone::Key, color);
                token(out, ":", Tone::Punct, color);
                out.push(' ');
                emit(out, entry, depth + 1, color);
            }
            out.push('\n');
            indent(out, depth);
            token(out, "}", Tone::Punct, color);
        }
    }
}

fn quoted(out: &mut String, text: &str, tone: Tone, color: bool) {
    let encoded = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    token(out, &encoded, tone, color);
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn token(out: &mut String, text: &str, tone: Tone, color: bool) {
    if color {
        let _ = write!(out, "\u{1b}[{}m{text}\u{1b}[0m", tone.code());
    } else {
        out.push_str(text);
    }
}
