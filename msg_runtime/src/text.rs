//! Text renderer — canonical human-readable form of a message.
//!
//! One `name: value` line per value, nested messages as indented
//! `name { ... }` blocks, unknown fields by number after declared ones.
//! Strings and bytes are quoted with C-style escapes.

use std::fmt::Write as _;

use crate::field_map::FieldValue;
use crate::message::Message;
use crate::unknown::UnknownFieldSet;
use crate::value::Value;

pub fn render<M: Message + ?Sized>(message: &M) -> String {
    let mut out = String::new();
    write_message(message, 0, &mut out);
    out
}

fn write_message<M: Message + ?Sized>(message: &M, depth: usize, out: &mut String) {
    for (field, value) in message.fields().iter() {
        match value {
            FieldValue::Singular(v) => write_value(field.name(), v, depth, out),
            FieldValue::Repeated(values) => {
                for v in values {
                    write_value(field.name(), v, depth, out);
                }
            }
        }
    }
    write_unknown(message.unknown_fields(), depth, out);
}

fn write_value(name: &str, value: &Value, depth: usize, out: &mut String) {
    indent(depth, out);
    match value {
        Value::Message(child) => {
            let _ = writeln!(out, "{} {{", name);
            write_message(&**child, depth + 1, out);
            indent(depth, out);
            out.push_str("}\n");
        }
        scalar => {
            let _ = writeln!(out, "{}: {}", name, format_scalar(scalar));
        }
    }
}

fn format_scalar(value: &Value) -> String {
    match value {
        Value::Double(v) => format_float(*v, v.to_string()),
        Value::Float(v) => format_float(*v as f64, v.to_string()),
        Value::I32(v) | Value::Enum(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) => v.to_string(),
        Value::Bool(v) => v.to_string(),
        Value::String(s) => quote(s.as_bytes()),
        Value::Bytes(b) => quote(b),
        Value::Message(_) => String::new(),
    }
}

/// `shortest` is the value's `Display` form at its declared width.
fn format_float(v: f64, shortest: String) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        shortest
    }
}

fn write_unknown(unknown: &UnknownFieldSet, depth: usize, out: &mut String) {
    for (number, field) in unknown.iter() {
        for v in &field.varint {
            indent(depth, out);
            let _ = writeln!(out, "{}: {}", number, v);
        }
        for v in &field.fixed32 {
            indent(depth, out);
            let _ = writeln!(out, "{}: 0x{:08x}", number, v);
        }
        for v in &field.fixed64 {
            indent(depth, out);
            let _ = writeln!(out, "{}: 0x{:016x}", number, v);
        }
        for b in &field.length_delimited {
            indent(depth, out);
            let _ = writeln!(out, "{}: {}", number, quote(b));
        }
        for g in &field.group {
            indent(depth, out);
            let _ = writeln!(out, "{} {{", number);
            write_unknown(g, depth + 1, out);
            indent(depth, out);
            out.push_str("}\n");
        }
    }
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

/// Double-quoted, printable ASCII kept, everything else escaped.
fn quote(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() + 2);
    s.push('"');
    for &b in bytes {
        match b {
            b'\n' => s.push_str("\\n"),
            b'\r' => s.push_str("\\r"),
            b'\t' => s.push_str("\\t"),
            b'"' => s.push_str("\\\""),
            b'\'' => s.push_str("\\'"),
            b'\\' => s.push_str("\\\\"),
            0x20..=0x7e => s.push(b as char),
            _ => {
                let _ = write!(s, "\\{:03o}", b);
            }
        }
    }
    s.push('"');
    s
}
