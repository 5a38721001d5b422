//! SQL module: compiles trees into WHERE-clause fragments for database layers.
//!
//! Identifiers and literals go through the schema's escaping hooks; spatial
//! predicates are left to the caller's query rectangle.

use crate::compiler::{
    bbox_sibling, dropped, feature_id_list, is_string_range, is_string_value, like_chars, property_of, Dialect,
    ExpressionCompiler,
};
use crate::expr::{ComparisonOp, LikeOptions, LogicalOp, PredicateNode};
use crate::schema::{ConnectionKind, SchemaOracle};
use crate::validate::top_bbox_node;
use crate::CompileError;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCompiler;

impl ExpressionCompiler for SqlCompiler {
    fn dialect(&self) -> Dialect {
        Dialect::Sql
    }

    fn compile(&self, tree: &PredicateNode, schema: &dyn SchemaOracle) -> Result<Option<String>, CompileError> {
        self.node(tree, schema, top_bbox_node(tree))
    }
}

impl SqlCompiler {
    fn node(
        &self,
        node: &PredicateNode,
        schema: &dyn SchemaOracle,
        lifted: Option<&PredicateNode>,
    ) -> Result<Option<String>, CompileError> {
        let text = match node {
            PredicateNode::Logical { op, left, right } => self.logical(*op, left, right.as_deref(), schema, lifted)?,
            PredicateNode::Comparison { op, left, right, like } => match (property_of(left), &**right) {
                (Some(property), PredicateNode::Boundary(lo, hi)) if *op == ComparisonOp::Between => {
                    Some(between(schema, property, lo, hi))
                }
                (Some(property), PredicateNode::Literal { value: Some(value), .. }) if *op == ComparisonOp::Like => {
                    match like.as_ref() {
                        Some(options) => like_expression(schema, property, value, options)?,
                        None => None,
                    }
                }
                (Some(property), PredicateNode::Literal { value, case_insensitive }) if op.is_binary() => {
                    Some(binary(schema, *op, property, value.as_deref(), *case_insensitive))
                }
                _ => None,
            },
            PredicateNode::FeatureId(tokens) => feature_id(schema, tokens),
            _ => None,
        };
        Ok(text.or_else(|| dropped(Dialect::Sql, node)))
    }

    fn logical(
        &self,
        op: LogicalOp,
        left: &PredicateNode,
        right: Option<&PredicateNode>,
        schema: &dyn SchemaOracle,
        lifted: Option<&PredicateNode>,
    ) -> Result<Option<String>, CompileError> {
        if let Some(other) = bbox_sibling(op, left, right, lifted) {
            return self.node(other, schema, lifted);
        }
        let l = match self.node(left, schema, lifted)? {
            Some(l) => l,
            None => return Ok(None),
        };
        Ok(match (op, right) {
            (LogicalOp::Not, _) => Some(format!(" (NOT {}) ", l)),
            (_, Some(right)) => self
                .node(right, schema, lifted)?
                .map(|r| format!(" ({} {} {}) ", l, op.keyword(), r)),
            (_, None) => None,
        })
    }
}

fn operator(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "<>",
        ComparisonOp::Lt => "<",
        ComparisonOp::Gt => ">",
        ComparisonOp::Le => "<=",
        ComparisonOp::Ge => ">=",
        ComparisonOp::Like | ComparisonOp::Between => "",
    }
}

fn binary(
    schema: &dyn SchemaOracle,
    op: ComparisonOp,
    property: &str,
    value: Option<&str>,
    case_insensitive: bool,
) -> String {
    let attribute = schema.escape_identifier(property);
    let string = is_string_value(Dialect::Sql, schema, property, value);
    match value {
        Some(v) if string && case_insensitive && op == ComparisonOp::Eq => {
            format!(" (lower({}) = lower('{}') ) ", attribute, schema.escape_sql_literal(v))
        }
        Some(v) if string => format!(" ({}{} '{}') ", attribute, operator(op), schema.escape_sql_literal(v)),
        Some(v) => format!(" ({}{} {}) ", attribute, operator(op), v),
        None => format!(" ({}{} '') ", attribute, operator(op)),
    }
}

fn between(schema: &dyn SchemaOracle, property: &str, lower: &str, upper: &str) -> String {
    let attribute = schema.escape_identifier(property);
    let quote = if is_string_range(Dialect::Sql, schema, property, lower, upper) { "'" } else { "" };
    format!(
        " ({a} >= {q}{}{q} AND {a} <= {q}{}{q})",
        schema.escape_sql_literal(lower),
        schema.escape_sql_literal(upper),
        a = attribute,
        q = quote
    )
}

fn like_expression(
    schema: &dyn SchemaOracle,
    property: &str,
    value: &str,
    like: &LikeOptions,
) -> Result<Option<String>, CompileError> {
    let (wild, single, escape) = match like_chars(Some(like)) {
        Some(chars) => chars,
        None => return Ok(None),
    };
    if escape == '\'' {
        warn!(property, "single quote rejected as PropertyIsLike escape character");
        return Err(CompileError::UnsafeEscapeChar(escape));
    }

    let connection = schema.connection();
    let mut out = format!(" ({}", schema.escape_identifier(property));
    if connection == ConnectionKind::PostGis {
        out.push_str(if like.case_insensitive { "::text ilike '" } else { "::text like '" });
    } else {
        out.push_str(" like '");
    }

    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == single {
            out.push('_');
        } else if c == wild {
            out.push('%');
        } else if c == escape {
            out.push(escape);
            match chars.next() {
                Some('\'') => out.push_str("''"),
                Some(next) => out.push(next),
                None => {}
            }
        } else if c == '\'' {
            out.push_str("''");
        } else if c == '\\' {
            out.push_str("\\\\");
        } else {
            out.push(c);
        }
    }
    out.push('\'');

    if connection != ConnectionKind::Ogr {
        if escape == '\\' {
            out.push_str(if connection == ConnectionKind::PostGis { " escape E'\\\\'" } else { " escape '\\\\'" });
        } else {
            out.push_str(" escape '");
            out.push(escape);
            out.push('\'');
        }
    }
    out.push_str(") ");
    Ok(Some(out))
}

fn feature_id(schema: &dyn SchemaOracle, tokens: &[String]) -> Option<String> {
    let attribute = schema.escape_identifier(schema.featureid_attribute()?);
    let (ids, string) = feature_id_list(Dialect::Sql, tokens)?;
    let cast = matches!(schema.connection(), ConnectionKind::Ogr | ConnectionKind::PostGis);
    let parts: Vec<String> = ids
        .iter()
        .map(|id| {
            let id = schema.escape_sql_literal(id);
            match (string, cast) {
                (true, true) => format!("(CAST({} AS CHARACTER(255)) = '{}')", attribute, id),
                (true, false) => format!("({} = '{}')", attribute, id),
                (false, _) => format!("({} = {})", attribute, id),
            }
        })
        .collect();
    Some(format!("({})", parts.join(" OR ")))
}
