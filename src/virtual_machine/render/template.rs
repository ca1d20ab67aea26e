//! `{{.symbol}}` placeholder substitution.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*\.([A-Za-z0-9_]+)\s*\}\}").unwrap());

/// Substitutes every placeholder with its value; unknown names render empty.
pub fn render(template: &str, values: &BTreeMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            values.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Symbols referenced by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let name = &caps[1];
        if !out.iter().any(|s| s == name) {
            out.push(name.to_string());
        }
    }
    out
}
