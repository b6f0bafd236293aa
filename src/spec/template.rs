// src/spec/template.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, TrackingError};
use crate::spec::value::Value;

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("literal pattern"));

/// Renders every `{key}` placeholder in `template` from `params`.
///
/// Text outside placeholders is copied through untouched, including braces
/// that do not form a well-formed key. A placeholder whose key is missing
/// from `params` is an error.
pub fn render_template(template: &str, params: &BTreeMap<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in KEY_RE.captures_iter(template) {
        let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        match params.get(key.as_str()) {
            Some(value) => out.push_str(&value.to_string()),
            None => return Err(TrackingError::TemplateKey(key.as_str().to_owned())),
        }
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Renders a template into a [`Value`].
///
/// A template that is exactly one placeholder, `"{key}"`, passes the looked
/// up value through unchanged so non-string parameters survive injection.
/// Anything else renders to a string.
pub fn render_value(template: &str, params: &BTreeMap<String, Value>) -> Result<Value> {
    if let Some(key) = exact_key(template) {
        return match params.get(key) {
            Some(value) => Ok(value.clone()),
            None => Err(TrackingError::TemplateKey(key.to_owned())),
        };
    }
    render_template(template, params).map(Value::Str)
}

fn exact_key(template: &str) -> Option<&str> {
    let caps = KEY_RE.captures(template)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == template.len() {
        caps.get(1).map(|m| m.as_str())
    } else {
        None
    }
}
