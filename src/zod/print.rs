//! TypeScript rendering of validator expressions.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Arg, BEGIN_MARKER, END_MARKER, Generated, Zod};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap());

impl fmt::Display for Generated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BEGIN_MARKER} {} {END_MARKER}", self.0)
    }
}

impl fmt::Display for Zod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zod::Validator { name, args } => {
                write!(f, "z.{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            Zod::Method { recv, name, args } => {
                write!(f, "{recv}.{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Zod(zod) => write!(f, "{zod}"),
            Arg::List(items) => {
                f.write_str("[")?;
                write_list(f, items)?;
                f.write_str("]")
            }
            Arg::Object(fields) if fields.is_empty() => f.write_str("{}"),
            Arg::Object(fields) => {
                f.write_str("{ ")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_key(f, key)?;
                    write!(f, ": {value}")?;
                }
                f.write_str(" }")
            }
            Arg::Str(s) => write_string(f, s),
            Arg::Num(n) => match n.0 {
                x if x.is_infinite() && x > 0.0 => f.write_str("Infinity"),
                x if x.is_infinite() => f.write_str("-Infinity"),
                x => write!(f, "{x}"),
            },
            Arg::Bool(b) => write!(f, "{b}"),
            Arg::BigInt(digits) => write!(f, "{digits}n"),
            Arg::Ident(name) => f.write_str(name),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_key(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    if IDENTIFIER.is_match(key) {
        f.write_str(key)
    } else {
        write_string(f, key)
    }
}

/// Double-quoted, JSON escaping (valid TypeScript).
fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
    f.write_str(&quoted)
}
