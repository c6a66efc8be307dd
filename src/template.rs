//! Named-placeholder substitution for map messages.
//!
//! A placeholder is `{name}` where `name` is one or more characters up to
//! the first `}`. Known names are replaced by the string form of their
//! value; unknown names stay in the output untouched, braces included.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("placeholder pattern is valid"));

/// Result of one substitution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Fields that were referenced by the template and found, in string form.
    pub substituted: BTreeMap<String, String>,
}

/// String form of a field value: strings verbatim, booleans as
/// `true`/`false`, numbers in plain decimal, anything else as compact JSON.
pub fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => plain_decimal(f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

// `f64`'s `Display` never switches to exponent notation.
fn plain_decimal(f: f64) -> String {
    let s = f.to_string();
    if f.is_finite() && !s.contains('.') {
        format!("{}.0", s)
    } else {
        s
    }
}

/// Resolve every `{name}` in `template` against `fields`.
///
/// Blank templates are returned as-is without scanning.
pub fn format(template: &str, fields: &BTreeMap<String, Value>) -> Rendered {
    if template.trim().is_empty() {
        return Rendered {
            text: template.to_string(),
            substituted: BTreeMap::new(),
        };
    }

    let mut substituted = BTreeMap::new();
    let text = PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match fields.get(name) {
                Some(value) => {
                    let s = coerce(value);
                    substituted.insert(name.to_string(), s.clone());
                    s
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    Rendered { text, substituted }
}

/// Log message made of a template and an explicit field map.
///
/// Fields are kept in lexicographic key order. Nothing is cached between
/// calls: every accessor re-runs the substitution against the current
/// fields, so adding a field is always reflected and a shared message
/// carries no mutable state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapMessage {
    template: String,
    fields: BTreeMap<String, Value>,
}

impl MapMessage {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style [`MapMessage::insert`].
    pub fn add(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn render(&self) -> Rendered {
        format(&self.template, &self.fields)
    }

    pub fn formatted_message(&self) -> String {
        self.render().text
    }

    /// Fields the template actually used, in string form.
    pub fn substituted_fields(&self) -> BTreeMap<String, String> {
        self.render().substituted
    }

    /// Every field in string form, referenced by the template or not.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), coerce(v)))
            .collect()
    }
}
