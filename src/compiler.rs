//! Compiler module: the backend contract and rules shared by every dialect.
//!
//! This module provides the ExpressionCompiler trait and the helpers the
//! Mapserver, SQL and Common backends build on.

use crate::expr::{LikeOptions, LogicalOp, PredicateNode};
use crate::filter::CompiledExpression;
use crate::schema::SchemaOracle;
use crate::types::{is_decimal, is_numeric, FieldType};
use crate::CompileError;
use serde::{Serialize, Deserialize};
use tracing::debug;

/// Target expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    Mapserver,
    Sql,
    Common,
}

impl Dialect {
    /// Whether `value` may be written as a bare number. SQL backends only
    /// take decimal literals; the expression dialects follow `strtod`.
    pub fn is_number(self, value: &str) -> bool {
        match self {
            Dialect::Sql => is_decimal(value),
            Dialect::Mapserver | Dialect::Common => is_numeric(value),
        }
    }
}

/// Translates a predicate tree into one dialect.
///
/// `Ok(None)` means the tree (or a part the result depends on) has no
/// expression in this dialect. Errors are reserved for unsafe input and
/// capability failures.
pub trait ExpressionCompiler {
    fn dialect(&self) -> Dialect;

    fn compile(&self, tree: &PredicateNode, schema: &dyn SchemaOracle) -> Result<Option<String>, CompileError>;

    /// Like [`compile`](Self::compile), tagging the text with its dialect.
    fn compile_expression(
        &self,
        tree: &PredicateNode,
        schema: &dyn SchemaOracle,
    ) -> Result<Option<CompiledExpression>, CompileError> {
        Ok(self
            .compile(tree, schema)?
            .map(|text| CompiledExpression::new(self.dialect(), text)))
    }
}

/// How a comparison value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
    Numeric,
    String,
    Date,
}

/// A value is numeric unless the attribute is declared Character, the value
/// is missing, or it does not fully parse as a number.
pub(crate) fn is_string_value(dialect: Dialect, schema: &dyn SchemaOracle, property: &str, value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => {
            schema.attribute_type(property).map(|t| t.is_character()).unwrap_or(false) || !dialect.is_number(v)
        }
    }
}

/// Between bounds share one quoting decision.
pub(crate) fn is_string_range(
    dialect: Dialect,
    schema: &dyn SchemaOracle,
    property: &str,
    lower: &str,
    upper: &str,
) -> bool {
    is_string_value(dialect, schema, property, Some(lower)) || !dialect.is_number(upper)
}

/// Value kind honoring declared Date attributes.
pub(crate) fn value_kind(schema: &dyn SchemaOracle, property: &str, values: &[Option<&str>]) -> ValueKind {
    let declared = schema.attribute_type(property);
    if values.iter().all(Option::is_some) && declared == Some(FieldType::Date) {
        return ValueKind::Date;
    }
    let string = match values {
        [lower, upper] => match (lower, upper) {
            (Some(lo), Some(hi)) => is_string_range(Dialect::Common, schema, property, lo, hi),
            _ => true,
        },
        _ => values.iter().any(|v| is_string_value(Dialect::Common, schema, property, *v)),
    };
    if string {
        ValueKind::String
    } else {
        ValueKind::Numeric
    }
}

pub(crate) fn property_of(node: &PredicateNode) -> Option<&str> {
    match node {
        PredicateNode::PropertyName(name) => Some(name),
        _ => None,
    }
}

/// Like metacharacters, `None` when any of them is empty.
pub(crate) fn like_chars(like: Option<&LikeOptions>) -> Option<(char, char, char)> {
    like.and_then(LikeOptions::chars)
}

/// The other child of an AND whose BBOX child is `lifted`, the node the
/// dispatcher applies as the query rectangle. Any other BBOX is compiled
/// where it stands.
pub(crate) fn bbox_sibling<'t>(
    op: LogicalOp,
    left: &'t PredicateNode,
    right: Option<&'t PredicateNode>,
    lifted: Option<&PredicateNode>,
) -> Option<&'t PredicateNode> {
    let (right, lifted) = (right?, lifted?);
    if op != LogicalOp::And {
        return None;
    }
    if std::ptr::eq(left, lifted) {
        Some(right)
    } else if std::ptr::eq(right, lifted) {
        Some(left)
    } else {
        None
    }
}

/// Bare ids of a FeatureId node: comma lists split, empty tokens dropped and
/// `typename.` prefixes removed.
pub(crate) fn feature_ids(tokens: &[String]) -> Vec<&str> {
    tokens
        .iter()
        .flat_map(|t| t.split(','))
        .map(|t| crate::expr::strip_feature_type(t.trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Ids of a FeatureId node and whether they are written as strings. One
/// non-numeric id quotes the whole list.
pub(crate) fn feature_id_list(dialect: Dialect, tokens: &[String]) -> Option<(Vec<&str>, bool)> {
    let ids = feature_ids(tokens);
    if ids.is_empty() {
        return None;
    }
    let string = ids.iter().any(|id| !dialect.is_number(id));
    Some((ids, string))
}

pub(crate) fn dropped(dialect: Dialect, node: &PredicateNode) -> Option<String> {
    debug!(dialect = ?dialect, node = node.tag(), "no expression for filter fragment");
    None
}
