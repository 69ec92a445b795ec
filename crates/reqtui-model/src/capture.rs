//! Capture Spec, Captured Value, Capture Store, and expression evaluation
//! (spec §3, §4.2).

use crate::headers::Headers;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureScope {
    Request,
    File,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSpec {
    pub scope: CaptureScope,
    pub name: String,
    pub expression: String,
    pub secret: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedValue {
    pub scope: CaptureScope,
    pub environment: String,
    pub file_path: Option<String>,
    pub name: String,
    pub value: String,
    pub secret: bool,
    pub created_at: DateTime<Utc>,
}

/// Keys are `(environment, name)` for globals and `(environment, file_path,
/// name)` for file-scoped captures (spec §3).
#[derive(Debug, Default)]
pub struct CaptureStore {
    globals: HashMap<(String, String), CapturedValue>,
    file_scoped: HashMap<(String, String, String), CapturedValue>,
}

impl CaptureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_global(
        &mut self,
        env: &str,
        name: &str,
        value: impl Into<String>,
        secret: bool,
        now: DateTime<Utc>,
    ) {
        self.globals.insert(
            (env.to_string(), name.to_string()),
            CapturedValue {
                scope: CaptureScope::Global,
                environment: env.to_string(),
                file_path: None,
                name: name.to_string(),
                value: value.into(),
                secret,
                created_at: now,
            },
        );
    }

    pub fn snapshot_globals(&self, env: &str) -> Vec<CapturedValue> {
        let mut out: Vec<_> = self
            .globals
            .iter()
            .filter(|((e, _), _)| e == env)
            .map(|(_, v)| v.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn clear_globals(&mut self, env: &str) {
        self.globals.retain(|(e, _), _| e != env);
    }

    pub fn set_file(
        &mut self,
        env: &str,
        path: &str,
        name: &str,
        value: impl Into<String>,
        secret: bool,
        now: DateTime<Utc>,
    ) {
        self.file_scoped.insert(
            (env.to_string(), path.to_string(), name.to_string()),
            CapturedValue {
                scope: CaptureScope::File,
                environment: env.to_string(),
                file_path: Some(path.to_string()),
                name: name.to_string(),
                value: value.into(),
                secret,
                created_at: now,
            },
        );
    }

    pub fn snapshot_file(&self, env: &str, path: &str) -> Vec<CapturedValue> {
        let mut out: Vec<_> = self
            .file_scoped
            .iter()
            .filter(|((e, p, _), _)| e == env && p == path)
            .map(|(_, v)| v.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn get_global(&self, env: &str, name: &str) -> Option<&str> {
        self.globals
            .get(&(env.to_string(), name.to_string()))
            .map(|v| v.value.as_str())
    }

    pub fn get_file(&self, env: &str, path: &str, name: &str) -> Option<&str> {
        self.file_scoped
            .get(&(env.to_string(), path.to_string(), name.to_string()))
            .map(|v| v.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// Expression evaluation
// ---------------------------------------------------------------------------

/// Context exposed to a capture expression (spec §4.2).
pub struct ResponseEvalContext<'a> {
    pub status: Option<&'a str>,
    pub code: Option<u16>,
    pub headers: Option<&'a Headers>,
    pub json: Option<&'a serde_json::Value>,
    pub text: Option<&'a str>,
    pub stream: Option<StreamEvalContext<'a>>,
}

pub struct StreamEvalContext<'a> {
    pub kind: &'a str,
    pub summary: &'a serde_json::Value,
    pub events: &'a [serde_json::Value],
}

#[derive(Debug, Clone, PartialEq)]
enum PathToken {
    Field(String),
    Index(i64),
}

fn parse_path(path: &str) -> Vec<PathToken> {
    let mut tokens = Vec::new();
    let mut field = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !field.is_empty() {
                    tokens.push(PathToken::Field(std::mem::take(&mut field)));
                }
            }
            '[' => {
                if !field.is_empty() {
                    tokens.push(PathToken::Field(std::mem::take(&mut field)));
                }
                let mut idx = String::new();
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        break;
                    }
                    idx.push(c2);
                }
                if let Ok(n) = idx.trim().parse::<i64>() {
                    tokens.push(PathToken::Index(n));
                }
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() {
        tokens.push(PathToken::Field(field));
    }
    tokens
}

/// Walk a JSON value along a dotted/bracketed path, resolving negative array
/// indices from the end (spec §4.2, testable property #5).
pub fn json_walk<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for token in parse_path(path) {
        current = match token {
            PathToken::Field(name) => current.get(&name)?,
            PathToken::Index(i) => {
                let arr = current.as_array()?;
                let idx = if i < 0 {
                    arr.len().checked_sub((-i) as usize)?
                } else {
                    i as usize
                };
                arr.get(idx)?
            }
        };
    }
    Some(current)
}

fn json_to_capture_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluate a `{{response...}}`/`{{stream...}}`-style capture expression
/// (the inner path, without the surrounding `{{ }}`) against a response
/// context. Returns `None` if the path cannot be resolved.
pub fn evaluate_expression(expression: &str, ctx: &ResponseEvalContext) -> Option<String> {
    let expr = expression.trim();
    if let Some(rest) = expr.strip_prefix("response.") {
        if rest == "status" {
            return ctx.status.map(|s| s.to_string());
        }
        if rest == "code" {
            return ctx.code.map(|c| c.to_string());
        }
        if rest == "text" {
            return ctx.text.map(|s| s.to_string());
        }
        if let Some(header_name) = rest.strip_prefix("headers.") {
            return ctx.headers.and_then(|h| h.get(header_name)).map(String::from);
        }
        if let Some(json_path) = rest.strip_prefix("json.") {
            let json = ctx.json?;
            return json_walk(json, json_path).map(json_to_capture_string);
        }
        if rest == "json" {
            return ctx.json.map(json_to_capture_string);
        }
        return None;
    }
    if let Some(rest) = expr.strip_prefix("stream.") {
        let stream = ctx.stream.as_ref()?;
        if rest == "kind" {
            return Some(stream.kind.to_string());
        }
        if let Some(summary_path) = rest.strip_prefix("summary.") {
            return json_walk(stream.summary, summary_path).map(json_to_capture_string);
        }
        if let Some(events_rest) = rest.strip_prefix("events") {
            // events_rest looks like "[<idx>]" optionally followed by ".<path>"
            let tokens = parse_path(events_rest);
            let mut iter = tokens.into_iter();
            let PathToken::Index(idx) = iter.next()? else {
                return None;
            };
            let resolved_idx = if idx < 0 {
                stream.events.len().checked_sub((-idx) as usize)?
            } else {
                idx as usize
            };
            let event = stream.events.get(resolved_idx)?;
            let remaining: Vec<String> = iter
                .map(|t| match t {
                    PathToken::Field(f) => f,
                    PathToken::Index(i) => format!("[{i}]"),
                })
                .collect();
            if remaining.is_empty() {
                return Some(json_to_capture_string(event));
            }
            let rejoined = remaining.join(".");
            return json_walk(event, &rejoined).map(json_to_capture_string);
        }
    }
    None
}
