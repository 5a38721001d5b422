//! Mapserver module: compiles trees into classic bracket-item expressions.
//!
//! Attributes are written `[NAME]`, string operands are double-quoted and
//! Like patterns become `/regex/` literals. Spatial predicates have no
//! expression here; the caller applies the BBOX as a query rectangle.

use crate::compiler::{
    bbox_sibling, dropped, feature_id_list, is_string_range, is_string_value, like_chars, property_of, Dialect,
    ExpressionCompiler,
};
use crate::expr::{ComparisonOp, LikeOptions, LogicalOp, PredicateNode};
use crate::schema::SchemaOracle;
use crate::validate::top_bbox_node;
use crate::CompileError;

#[derive(Debug, Clone, Copy, Default)]
pub struct MapserverCompiler;

impl ExpressionCompiler for MapserverCompiler {
    fn dialect(&self) -> Dialect {
        Dialect::Mapserver
    }

    fn compile(&self, tree: &PredicateNode, schema: &dyn SchemaOracle) -> Result<Option<String>, CompileError> {
        Ok(self.node(tree, schema, top_bbox_node(tree)))
    }
}

impl MapserverCompiler {
    fn node(
        &self,
        node: &PredicateNode,
        schema: &dyn SchemaOracle,
        lifted: Option<&PredicateNode>,
    ) -> Option<String> {
        let text = match node {
            PredicateNode::Logical { op, left, right } => self.logical(*op, left, right.as_deref(), schema, lifted),
            PredicateNode::Comparison { op, left, right, like } => {
                let property = property_of(left)?;
                match (op, &**right) {
                    (ComparisonOp::Between, PredicateNode::Boundary(lo, hi)) => {
                        Some(between(schema, property, lo, hi))
                    }
                    (ComparisonOp::Like, PredicateNode::Literal { value, .. }) => {
                        like_expression(property, value.as_deref()?, like.as_ref()?)
                    }
                    (op, PredicateNode::Literal { value, case_insensitive }) if op.is_binary() => {
                        Some(binary(schema, *op, property, value.as_deref(), *case_insensitive))
                    }
                    _ => None,
                }
            }
            PredicateNode::FeatureId(tokens) => feature_id(schema, tokens),
            _ => None,
        };
        text.or_else(|| dropped(Dialect::Mapserver, node))
    }

    fn logical(
        &self,
        op: LogicalOp,
        left: &PredicateNode,
        right: Option<&PredicateNode>,
        schema: &dyn SchemaOracle,
        lifted: Option<&PredicateNode>,
    ) -> Option<String> {
        if let Some(other) = bbox_sibling(op, left, right, lifted) {
            return Some(format!("({})", self.node(other, schema, lifted)?));
        }
        match (op, right) {
            (LogicalOp::Not, _) => Some(format!(" (NOT {}) ", self.node(left, schema, lifted)?)),
            (_, Some(right)) => {
                let l = self.node(left, schema, lifted)?;
                let r = self.node(right, schema, lifted)?;
                Some(format!(" ({} {} {}) ", l, op.keyword(), r))
            }
            (_, None) => None,
        }
    }
}

fn operator(op: ComparisonOp, case_insensitive: bool) -> &'static str {
    match op {
        ComparisonOp::Eq if case_insensitive => "IEQ",
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "!=",
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
    if is_string_value(Dialect::Mapserver, schema, property, value) {
        let value = value.map(|v| schema.escape_string(v)).unwrap_or_default();
        format!(" (\"[{}]\" {} \"{}\") ", property, operator(op, case_insensitive), value)
    } else {
        format!(" ([{}] {} {}) ", property, operator(op, false), value.unwrap_or_default())
    }
}

fn between(schema: &dyn SchemaOracle, property: &str, lower: &str, upper: &str) -> String {
    if is_string_range(Dialect::Mapserver, schema, property, lower, upper) {
        format!(
            " (\"[{p}]\"  >= \"{}\" AND  \"[{p}]\"  <= \"{}\")",
            schema.escape_string(lower),
            schema.escape_string(upper),
            p = property
        )
    } else {
        format!(" ([{p}]  >= {} AND  [{p}]  <= {})", lower, upper, p = property)
    }
}

fn like_expression(property: &str, value: &str, like: &LikeOptions) -> Option<String> {
    let (wild, single, escape) = like_chars(Some(like))?;
    let mut pattern = String::with_capacity(value.len() + 4);
    if !value.is_empty() {
        pattern.push('^');
    }
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            pattern.push('\\');
            if let Some(next) = chars.next() {
                pattern.push(next);
            }
        } else if c == single {
            pattern.push('.');
        } else if c == wild {
            pattern.push_str(".*");
        } else if c == '/' {
            pattern.push_str("\\/");
        } else {
            pattern.push(c);
        }
    }
    if !value.is_empty() {
        pattern.push('$');
    }
    let op = if like.case_insensitive { "~*" } else { "=~" };
    Some(format!("(\"[{}]\" {} /{}/)", property, op, pattern))
}

fn feature_id(schema: &dyn SchemaOracle, tokens: &[String]) -> Option<String> {
    let attribute = schema.featureid_attribute()?;
    let (ids, string) = feature_id_list(Dialect::Mapserver, tokens)?;
    let parts: Vec<String> = ids
        .iter()
        .map(|id| {
            if string {
                format!("(\"[{}]\" = \"{}\")", attribute, schema.escape_string(id))
            } else {
                format!("([{}] = {})", attribute, id)
            }
        })
        .collect();
    Some(format!("({})", parts.join(" OR ")))
}
