use serde_json::{Map, Value};

/// A message that carried its own JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    /// Value of the object's `message` key.
    pub message: Value,
    /// Every other key, as parsed.
    pub context: Map<String, Value>,
}

/// Split a rendered message that is a JSON object with a `message` key.
///
/// Only text that starts with `{` and ends with `}` is parsed. Returns
/// `None` when the text is not an object, does not parse, or has no
/// `message` key; the caller then uses the text verbatim.
pub fn split(text: &str) -> Option<Embedded> {
    if !(text.starts_with('{') && text.ends_with('}')) {
        return None;
    }
    let mut object = parse_object(text)?;
    let message = object.remove("message")?;
    Some(Embedded { message, context: object })
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    if let Ok(object) = serde_json::from_str::<Map<String, Value>>(text) {
        return Some(object);
    }
    if !text.contains('\'') {
        return None;
    }
    serde_json::from_str(&double_quote(text)?).ok()
}

/// Rewrite single-quoted strings as double-quoted ones.
///
/// Returns `None` when a single-quoted string is left unterminated.
fn double_quote(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                copy_string(&mut chars, &mut out, '"')?;
            }
            '\'' => {
                out.push('"');
                copy_string(&mut chars, &mut out, '\'')?;
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Copy the body of a string literal opened by `quote`, emitting it as a
/// double-quoted JSON string body including the closing `"`.
fn copy_string(chars: &mut std::str::Chars<'_>, out: &mut String, quote: char) -> Option<()> {
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next()?;
                if escaped == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(escaped);
                }
            }
            '"' if quote == '\'' => out.push_str("\\\""),
            c if c == quote => {
                out.push('"');
                return Some(());
            }
            other => out.push(other),
        }
    }
    None
}
