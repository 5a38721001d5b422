//! Dispatch module: picks a dialect for a layer and turns a tree into a query plan.

use crate::common::CommonCompiler;
use crate::compiler::{Dialect, ExpressionCompiler};
use crate::expr::PredicateNode;
use crate::filter::CompiledExpression;
use crate::geometry::{reprojected_rect, GeometryOps};
use crate::mapserver::MapserverCompiler;
use crate::parser::FilterXmlParser;
use crate::schema::SchemaOracle;
use crate::sql::SqlCompiler;
use crate::types::Rect;
use crate::validate::{
    check_feature_ids, check_invalid_operand, check_invalid_property, is_simple_filter, normalize_property_names,
    top_bbox,
};
use crate::{CompileError, FilterError};
use serde::{Serialize, Deserialize};
use tracing::debug;

/// How a layer query applies a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Plan {
    /// Rectangle query only.
    RectOnly(Rect),
    Expression(CompiledExpression),
    RectPlusExpression(Rect, CompiledExpression),
    /// Nothing could be compiled; the layer is queried without a filter.
    Unfiltered,
}

impl Plan {
    fn from_parts(rect: Option<Rect>, expression: Option<CompiledExpression>) -> Plan {
        match (rect, expression) {
            (Some(rect), Some(expr)) => Plan::RectPlusExpression(rect, expr),
            (Some(rect), None) => Plan::RectOnly(rect),
            (None, Some(expr)) => Plan::Expression(expr),
            (None, None) => Plan::Unfiltered,
        }
    }

    pub fn rect(&self) -> Option<&Rect> {
        match self {
            Plan::RectOnly(rect) | Plan::RectPlusExpression(rect, _) => Some(rect),
            _ => None,
        }
    }

    pub fn expression(&self) -> Option<&CompiledExpression> {
        match self {
            Plan::Expression(expr) | Plan::RectPlusExpression(_, expr) => Some(expr),
            _ => None,
        }
    }
}

pub struct Dispatcher<'g> {
    geometry: &'g dyn GeometryOps,
}

impl<'g> Dispatcher<'g> {
    pub fn new(geometry: &'g dyn GeometryOps) -> Self {
        Self { geometry }
    }

    /// SQL for database sources, Common for GEOS-capable sources, Mapserver
    /// for everything else.
    pub fn dialect_for(layer: &dyn SchemaOracle) -> Dialect {
        if layer.connection().is_sql_capable() {
            Dialect::Sql
        } else if layer.supports_geos() {
            Dialect::Common
        } else {
            Dialect::Mapserver
        }
    }

    pub fn compiler(&self, dialect: Dialect) -> Box<dyn ExpressionCompiler + 'g> {
        match dialect {
            Dialect::Mapserver => Box::new(MapserverCompiler),
            Dialect::Sql => Box::new(SqlCompiler),
            Dialect::Common => Box::new(CommonCompiler::new(self.geometry)),
        }
    }

    pub fn compile_for_layer(&self, tree: &PredicateNode, layer: &dyn SchemaOracle) -> Result<Plan, CompileError> {
        let dialect = Self::dialect_for(layer);
        let rect = self.query_rect(tree, layer);

        if dialect == Dialect::Sql && is_simple_filter(tree) {
            debug!(layer = %layer.layer_name(), "simple filter on SQL layer, using rectangle fast path");
            if tree.is_bbox() {
                return Ok(Plan::from_parts(rect, None));
            }
        } else {
            debug!(layer = %layer.layer_name(), dialect = ?dialect, "compiling full filter");
        }

        let expression = self.compiler(dialect).compile_expression(tree, layer)?;
        if expression.is_none() {
            debug!(layer = %layer.layer_name(), dialect = ?dialect, "filter produced no expression");
        }
        Ok(Plan::from_parts(rect, expression))
    }

    /// Parses a Filter document, checks it against the layer and dispatches it.
    pub fn apply(&self, xml: &str, layer: &dyn SchemaOracle) -> Result<Plan, FilterError> {
        let tree = FilterXmlParser::parse(xml)?;
        check_invalid_operand(&tree)?;
        let tree = normalize_property_names(&tree, layer);
        check_invalid_property(&tree, layer)?;
        check_feature_ids(&tree, layer.layer_name())?;
        Ok(self.compile_for_layer(&tree, layer)?)
    }

    /// The top-level BBOX in layer coordinates.
    fn query_rect(&self, tree: &PredicateNode, layer: &dyn SchemaOracle) -> Option<Rect> {
        let (rect, srs) = top_bbox(tree)?;
        let from = srs.or_else(|| layer.map_crs());
        Some(reprojected_rect(self.geometry, rect, from, layer.layer_crs()))
    }
}
