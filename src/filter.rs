//! Filter module: compiled output and how it combines with a layer's own filter.
//!
//! This module provides the CompiledExpression type and merge_with_layer_filter.

use crate::compiler::Dialect;
use crate::schema::ConnectionKind;
use serde::{Serialize, Deserialize};
use std::fmt;

/// Expression text produced by one compiler backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledExpression {
    pub dialect: Dialect,
    pub text: String,
}

impl CompiledExpression {
    pub fn new(dialect: Dialect, text: impl Into<String>) -> Self {
        Self { dialect, text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Text ready to be installed as the layer's filter.
    pub fn merged(&self, connection: ConnectionKind, existing: Option<&LayerFilter>) -> String {
        merge_with_layer_filter(&self.text, connection, existing)
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Filter already configured on a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerFilter {
    /// An expression the new filter is ANDed with.
    Expression(String),
    /// Anything else (plain string, regex); replaced by the new filter.
    Plain(String),
}

impl LayerFilter {
    pub fn is_expression(&self) -> bool {
        matches!(self, LayerFilter::Expression(_))
    }
}

/// Combines a compiled expression with the layer's existing filter.
///
/// SQL databases and plugin sources get the expression parenthesized. OGR
/// sources get a `WHERE ` clause unless the existing filter is a non-WHERE
/// expression. An existing expression is kept as `((existing) and expr)`.
pub fn merge_with_layer_filter(expr: &str, connection: ConnectionKind, existing: Option<&LayerFilter>) -> String {
    let existing = match existing {
        Some(LayerFilter::Expression(text)) => Some(text.as_str()),
        _ => None,
    };
    let body = match connection {
        ConnectionKind::PostGis
        | ConnectionKind::OracleSpatial
        | ConnectionKind::Plugin
        | ConnectionKind::SqlPlugin => format!("({})", expr),
        _ => expr.to_string(),
    };

    let mut existing = existing;
    let mut out = String::new();
    if connection == ConnectionKind::Ogr {
        match existing {
            None => out.push_str("WHERE "),
            Some(text) if starts_with_where(text) => {
                out.push_str("WHERE ");
                existing = Some(&text[6..]);
            }
            Some(_) => {}
        }
    }

    match existing {
        Some(prior) => {
            out.push_str("((");
            out.push_str(prior);
            out.push_str(") and ");
            out.push_str(&body);
            out.push(')');
        }
        None => out.push_str(&body),
    }
    out
}

fn starts_with_where(text: &str) -> bool {
    text.get(..6).map_or(false, |head| head.eq_ignore_ascii_case("WHERE "))
}
