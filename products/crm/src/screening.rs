//! Heuristic request-body screening.
//!
//! JSON bodies are screened value by value after decoding, so escape
//! sequences in the wire format never trip the command-injection rule.
//! Bodies that are not JSON are screened as raw text.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Threat {
    SqlInjection,
    Xss,
    PathTraversal,
    CommandInjection,
}

const SQL_KEYWORDS: &[&str] = &["select", "insert", "delete", "update", "drop", "union"];
const XSS_MARKERS: &[&str] = &["<script>", "javascript:", "onload=", "onerror="];
const TRAVERSAL_MARKERS: &[&str] = &["../", "..\\"];
const SHELL_MARKERS: &[&str] = &["&&", "|", ";", ">", "$", "`", "\\"];

impl Threat {
    /// Evaluation order; the first matching rule names the threat.
    pub const ALL: [Threat; 4] = [
        Threat::SqlInjection,
        Threat::Xss,
        Threat::PathTraversal,
        Threat::CommandInjection,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Threat::SqlInjection => "sql_injection",
            Threat::Xss => "xss",
            Threat::PathTraversal => "path_traversal",
            Threat::CommandInjection => "command_injection",
        }
    }

    pub fn detail(self) -> &'static str {
        match self {
            Threat::SqlInjection => "Potential SQL Injection detected",
            Threat::Xss => "Potential XSS attack detected",
            Threat::PathTraversal => "Potential Path Traversal attack detected",
            Threat::CommandInjection => "Potential Command Injection attack detected",
        }
    }

    pub fn matches(self, text: &str) -> bool {
        match self {
            Threat::SqlInjection => contains_any(&text.to_lowercase(), SQL_KEYWORDS),
            Threat::Xss => contains_any(&text.to_lowercase(), XSS_MARKERS),
            Threat::PathTraversal => contains_any(text, TRAVERSAL_MARKERS),
            Threat::CommandInjection => contains_any(text, SHELL_MARKERS),
        }
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

pub fn scan_text(text: &str) -> Option<Threat> {
    Threat::ALL.into_iter().find(|threat| threat.matches(text))
}

/// Screens a request body. Empty bodies always pass.
pub fn scan_body(body: &[u8]) -> Option<Threat> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => {
            let mut strings = Vec::new();
            collect_strings(&value, &mut strings);
            Threat::ALL
                .into_iter()
                .find(|threat| strings.iter().any(|s| threat.matches(s)))
        }
        Err(_) => scan_text(&String::from_utf8_lossy(body)),
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
