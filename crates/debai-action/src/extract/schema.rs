//! Schema validation and value coercion.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::types::{ArgValue, Arguments, ParamSpec, ParamType, ToolDeclaration};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.+-]+@[\w.-]+\.\w+$").unwrap());

/// True for a plausible `local@domain.tld` address.
pub fn is_email(text: &str) -> bool {
    EMAIL_RE.is_match(text)
}

/// Outcome of validating raw values against a declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validated {
    pub arguments: Arguments,
    /// Required parameters with no usable value, in declaration order.
    pub missing: Vec<String>,
}

/// Coerce `raw` into typed arguments.
///
/// Unknown keys are dropped, values that fail coercion count as absent,
/// and absent optional parameters take their default.
pub fn validate(decl: &ToolDeclaration, raw: &Map<String, Value>) -> Validated {
    let mut validated = Validated::default();

    for spec in &decl.params {
        let value = raw.get(&spec.name).and_then(|v| {
            let coerced = coerce(spec, v);
            if coerced.is_none() && !v.is_null() {
                debug!(tool = %decl.kind, param = %spec.name, value = %v, "Discarding invalid value");
            }
            coerced
        });

        match (value, &spec.default) {
            (Some(value), _) => validated.arguments.insert(spec.name.clone(), value),
            (None, Some(default)) => validated.arguments.insert(spec.name.clone(), default.clone()),
            (None, None) if spec.required => validated.missing.push(spec.name.clone()),
            (None, None) => {}
        }
    }
    validated
}

/// Coerce a single raw value to the parameter's type.
pub fn coerce(spec: &ParamSpec, value: &Value) -> Option<ArgValue> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        return None;
    }

    match &spec.ty {
        ParamType::Text => Some(ArgValue::Text(text)),
        ParamType::Email => {
            let email = text.trim_end_matches('.');
            is_email(email).then(|| ArgValue::Text(email.to_string()))
        }
        ParamType::Phone => normalize_phone(&text).map(ArgValue::Text),
        ParamType::Integer => text.replace(',', "").parse().ok().map(ArgValue::Integer),
        ParamType::Boolean => parse_bool(&text).map(ArgValue::Bool),
        ParamType::Choice { .. } => spec
            .ty
            .choice_for(&text)
            .map(|v| ArgValue::Text(v.to_string())),
    }
}

/// Keep `+`, digits and dashes; require at least five digits.
fn normalize_phone(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+' || *c == '-')
        .collect();
    let digits = cleaned.chars().filter(char::is_ascii_digit).count();
    let allowed = text
        .chars()
        .all(|c| c.is_ascii_digit() || "+-() .".contains(c));
    (allowed && digits >= 5).then_some(cleaned)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}
