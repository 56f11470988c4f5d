//! Cell values and column coercion.
//!
//! Spreadsheet exports carry flags in every shape imaginable: `TRUE`, `1`,
//! `1.0`, `x`, or an empty cell. Coercion maps all of them onto one `Value`
//! per column kind, and `to_cell_string` renders the canonical form back.
//! The pair is a fixed point: coerce(render(coerce(raw))) == coerce(raw).

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// How a column's cells are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    #[default]
    Text,
    Bool,
    /// Stored as text so unedited cells round-trip untouched.
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn default_for(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Bool => Value::Bool(false),
            ColumnKind::Text | ColumnKind::Date => Value::Text(String::new()),
        }
    }

    /// Interpret a raw cell string as a value of `kind`.
    pub fn coerce(kind: ColumnKind, raw: &str) -> Self {
        match kind {
            ColumnKind::Bool => Value::Bool(coerce_bool(raw)),
            ColumnKind::Text | ColumnKind::Date => Value::Text(raw.to_string()),
        }
    }

    /// Convert a value reported by the editing grid.
    pub fn from_json(kind: ColumnKind, json: &serde_json::Value) -> Self {
        use serde_json::Value as J;

        match kind {
            ColumnKind::Bool => Value::Bool(match json {
                J::Bool(b) => *b,
                J::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f != 0.0),
                J::String(s) => coerce_bool(s),
                J::Null | J::Array(_) | J::Object(_) => false,
            }),
            ColumnKind::Text | ColumnKind::Date => Value::Text(match json {
                J::String(s) => s.clone(),
                J::Null => String::new(),
                J::Bool(b) => bool_text(*b).to_string(),
                J::Number(n) => n.to_string(),
                other => other.to_string(),
            }),
        }
    }

    /// Canonical cell text for write-back.
    pub fn to_cell_string(&self) -> String {
        self.display().into_owned()
    }

    pub fn display(&self) -> Cow<'_, str> {
        match self {
            Value::Bool(b) => Cow::Borrowed(bool_text(*b)),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bool(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

fn bool_text(b: bool) -> &'static str {
    if b { "TRUE" } else { "FALSE" }
}

/// Lenient boolean parse. Empty, `FALSE`, `0`, `0.0`, `nan` are all false.
pub fn coerce_bool(raw: &str) -> bool {
    let s = raw.trim();
    if s.is_empty() {
        return false;
    }
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "x" | "✓" => return true,
        "false" | "f" | "no" | "n" => return false,
        _ => {}
    }
    match s.parse::<f64>() {
        Ok(n) => n.is_finite() && n != 0.0,
        Err(_) => false,
    }
}
