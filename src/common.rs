//! Common module: compiles trees into the spatial-function expression dialect.
//!
//! This is the dialect for sources without SQL that can still evaluate
//! geometry predicates. Spatial literals are reprojected into the layer CRS
//! and written as WKT through the geometry capability.

use crate::compiler::{
    bbox_sibling, dropped, feature_id_list, like_chars, property_of, value_kind, Dialect, ExpressionCompiler, ValueKind,
};
use crate::expr::{ComparisonOp, LikeOptions, LogicalOp, PredicateNode, SpatialOp};
use crate::geometry::{reprojected, reprojected_rect, GeometryOps};
use crate::schema::SchemaOracle;
use crate::types::{Distance, Rect, Shape};
use crate::validate::top_bbox_node;
use crate::CompileError;

/// Rectangles this far out came from projecting a world extent.
const WORLD_EXTENT_LIMIT: f64 = -1e14;

/// Characters with a regex meaning, plus `"` since patterns live in a string.
const REGEX_SPECIALS: &str = "\\^${[().*+?|\"";

pub struct CommonCompiler<'g> {
    geometry: &'g dyn GeometryOps,
}

impl<'g> CommonCompiler<'g> {
    pub fn new(geometry: &'g dyn GeometryOps) -> Self {
        Self { geometry }
    }
}

impl ExpressionCompiler for CommonCompiler<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Common
    }

    fn compile(&self, tree: &PredicateNode, schema: &dyn SchemaOracle) -> Result<Option<String>, CompileError> {
        Ok(self.node(tree, schema, top_bbox_node(tree)))
    }
}

impl CommonCompiler<'_> {
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
                    (ComparisonOp::Between, PredicateNode::Boundary(lo, hi)) => Some(between(schema, property, lo, hi)),
                    (ComparisonOp::Like, PredicateNode::Literal { value, .. }) => {
                        like_expression(property, value.as_deref()?, like.as_ref()?)
                    }
                    (op, PredicateNode::Literal { value, case_insensitive }) if op.is_binary() => {
                        Some(binary(schema, *op, property, value.as_deref(), *case_insensitive))
                    }
                    _ => None,
                }
            }
            PredicateNode::Spatial { op, right, .. } => self.spatial(*op, right, schema),
            PredicateNode::FeatureId(tokens) => feature_id(schema, tokens),
            _ => None,
        };
        text.or_else(|| dropped(Dialect::Common, node))
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
            return self.node(other, schema, lifted);
        }
        let l = self.node(left, schema, lifted)?;
        match (op, right) {
            (LogicalOp::Not, _) => Some(format!("(NOT {})", l)),
            (_, Some(right)) => Some(format!("({} {} {})", l, op.keyword(), self.node(right, schema, lifted)?)),
            (_, None) => None,
        }
    }

    fn spatial(&self, op: SpatialOp, literal: &PredicateNode, schema: &dyn SchemaOracle) -> Option<String> {
        match literal {
            PredicateNode::BBoxLiteral { rect, srs } => {
                let shape = self.bbox_shape(rect, srs.as_deref(), schema);
                Some(format!("(NOT (NOT ({})))", self.call("intersects", &shape, None)))
            }
            PredicateNode::GeometryLiteral { shape, srs, distance } => {
                let from = srs.as_deref().or_else(|| schema.map_crs());
                let mut shape = reprojected(self.geometry, shape, from, schema.layer_crs());
                let distance = if op.is_distance() {
                    let d = distance.as_ref().map_or(0.0, |d| self.layer_distance(d, schema));
                    if d > 0.0 {
                        if let Some(buffered) = self.geometry.buffer(&shape, d) {
                            shape = buffered;
                        }
                    }
                    Some(d)
                } else {
                    None
                };
                let name = match op {
                    SpatialOp::Bbox | SpatialOp::Intersects => "intersects".to_string(),
                    other => other.tag().to_ascii_lowercase(),
                };
                Some(self.call(&name, &shape, distance))
            }
            _ => None,
        }
    }

    /// The BBOX as a polygon in layer coordinates. A world extent whose
    /// projection blows up to the "everything" rectangle is used as-is.
    fn bbox_shape(&self, rect: &Rect, srs: Option<&str>, schema: &dyn SchemaOracle) -> Shape {
        let from = srs.or_else(|| schema.map_crs());
        let to = schema.layer_crs();
        if rect.is_world_extent() {
            let projected = reprojected_rect(self.geometry, rect, from, to);
            if projected.minx <= WORLD_EXTENT_LIMIT {
                return projected.to_polygon();
            }
        }
        reprojected(self.geometry, &rect.to_polygon(), from, to)
    }

    fn layer_distance(&self, distance: &Distance, schema: &dyn SchemaOracle) -> f64 {
        if distance.value <= 0.0 {
            return distance.value;
        }
        distance.in_units(schema.layer_units(), |unit| self.geometry.inches_per_unit(unit))
    }

    fn call(&self, function: &str, shape: &Shape, distance: Option<f64>) -> String {
        let mut out = format!("{}([shape], fromText('{}')", function, self.geometry.to_wkt(shape));
        if let Some(d) = distance {
            out.push_str(&format!(", {}", d));
        }
        out.push_str(") = TRUE");
        out
    }
}

fn operator(op: ComparisonOp, case_insensitive: bool) -> &'static str {
    match op {
        ComparisonOp::Eq if case_insensitive => "=*",
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "!=",
        ComparisonOp::Lt => "<",
        ComparisonOp::Gt => ">",
        ComparisonOp::Le => "<=",
        ComparisonOp::Ge => ">=",
        ComparisonOp::Like => "~",
        ComparisonOp::Between => "",
    }
}

fn attribute(kind: ValueKind, property: &str) -> String {
    match kind {
        ValueKind::String => format!("\"[{}]\"", property),
        _ => format!("[{}]", property),
    }
}

fn quoted(kind: ValueKind, value: &str) -> String {
    match kind {
        ValueKind::String => format!("\"{}\"", value),
        ValueKind::Date => format!("`{}`", value),
        ValueKind::Numeric => value.to_string(),
    }
}

fn binary(
    schema: &dyn SchemaOracle,
    op: ComparisonOp,
    property: &str,
    value: Option<&str>,
    case_insensitive: bool,
) -> String {
    let kind = value_kind(schema, property, &[value]);
    let value = value.map(|v| schema.escape_string(v)).unwrap_or_default();
    format!(
        "({} {} {})",
        attribute(kind, property),
        operator(op, case_insensitive),
        quoted(kind, &value)
    )
}

fn between(schema: &dyn SchemaOracle, property: &str, lower: &str, upper: &str) -> String {
    let kind = value_kind(schema, property, &[Some(lower), Some(upper)]);
    let attr = attribute(kind, property);
    format!(
        "({a}  >= {} AND  {a}  <= {})",
        quoted(kind, &schema.escape_string(lower)),
        quoted(kind, &schema.escape_string(upper)),
        a = attr
    )
}

fn like_expression(property: &str, value: &str, like: &LikeOptions) -> Option<String> {
    let (wild, single, escape) = like_chars(Some(like))?;
    let mut pattern = String::with_capacity(value.len() + 8);
    if !value.is_empty() {
        pattern.push('^');
    }
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == single {
            pattern.push('.');
        } else if c == escape && chars.peek().map_or(false, |n| *n == single || *n == wild || *n == escape) {
            if let Some(next) = chars.next() {
                push_literal(&mut pattern, next);
            }
        } else if c == wild {
            pattern.push_str(".*");
        } else {
            push_literal(&mut pattern, c);
        }
    }
    if !value.is_empty() {
        pattern.push('$');
    }
    let op = if like.case_insensitive { "~*" } else { "~" };
    Some(format!("(\"[{}]\" {} \"{}\")", property, op, pattern))
}

/// A character matched literally by the regex, inside a quoted string.
fn push_literal(pattern: &mut String, c: char) {
    if c == '\\' {
        pattern.push_str("\\\\\\\\");
    } else {
        if REGEX_SPECIALS.contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
}

fn feature_id(schema: &dyn SchemaOracle, tokens: &[String]) -> Option<String> {
    let attribute = schema.featureid_attribute()?;
    let (ids, string) = feature_id_list(Dialect::Common, tokens)?;
    let parts: Vec<String> = ids
        .iter()
        .map(|id| {
            if string {
                format!("(\"[{}]\" == \"{}\")", attribute, schema.escape_string(id))
            } else {
                format!("([{}] == {})", attribute, id)
            }
        })
        .collect();
    Some(format!("({})", parts.join(" OR ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NoGeometry;
    use crate::schema::{LayerSchema, LayerSchemaBuilder};
    use crate::types::{DistanceUnit, FieldType};
    use geo::Translate;
    use geo_types::Point;

    fn schema() -> LayerSchema {
        LayerSchemaBuilder::new("Cities")
            .geos(true)
            .field("NAME", FieldType::Character)
            .field("POP", FieldType::Numeric)
            .field("FOUNDED", FieldType::Date)
            .featureid("FID")
            .build()
    }

    fn compile(tree: &PredicateNode) -> Option<String> {
        CommonCompiler::new(&NoGeometry).compile(tree, &schema()).unwrap()
    }

    fn like(pattern: &str, escape: &str) -> PredicateNode {
        PredicateNode::Comparison {
            op: ComparisonOp::Like,
            left: Box::new(PredicateNode::PropertyName("NAME".into())),
            right: Box::new(PredicateNode::Literal { value: Some(pattern.into()), case_insensitive: false }),
            like: Some(LikeOptions {
                wildcard: "*".into(),
                single_char: "#".into(),
                escape: escape.into(),
                case_insensitive: false,
            }),
        }
    }

    /// Moves everything by a fixed offset and buffers by growing points into boxes.
    struct Offset;

    impl GeometryOps for Offset {
        fn reproject_shape(&self, shape: &Shape, _from: &str, _to: &str) -> Option<Shape> {
            Some(shape.translate(10.0, 0.0))
        }

        fn reproject_rect(&self, rect: &Rect, _from: &str, _to: &str) -> Option<Rect> {
            if rect.is_world_extent() {
                return Some(Rect::new(-1e15, -1e15, 1e15, 1e15));
            }
            Some(Rect::new(rect.minx + 10.0, rect.miny, rect.maxx + 10.0, rect.maxy))
        }

        fn buffer(&self, shape: &Shape, distance: f64) -> Option<Shape> {
            match shape {
                Shape::Point(p) => {
                    Some(Rect::new(p.x() - distance, p.y() - distance, p.x() + distance, p.y() + distance).to_polygon())
                }
                _ => None,
            }
        }
    }

    fn point_within(distance: Distance) -> PredicateNode {
        PredicateNode::Spatial {
            op: SpatialOp::DWithin,
            left: Box::new(PredicateNode::PropertyName("Geometry".into())),
            right: Box::new(PredicateNode::GeometryLiteral {
                shape: Shape::Point(Point::new(1.0, 2.0)),
                srs: None,
                distance: Some(distance),
            }),
        }
    }

    #[test]
    fn test_binary() {
        assert_eq!(compile(&PredicateNode::compare(ComparisonOp::Eq, "POP", Some("5"))).unwrap(), "([POP] = 5)");
        assert_eq!(compile(&PredicateNode::compare(ComparisonOp::Ne, "NAME", Some("5"))).unwrap(), "(\"[NAME]\" != \"5\")");
        assert_eq!(
            compile(&PredicateNode::compare(ComparisonOp::Lt, "FOUNDED", Some("2020-01-01"))).unwrap(),
            "([FOUNDED] < `2020-01-01`)"
        );
        assert_eq!(compile(&PredicateNode::compare(ComparisonOp::Eq, "FOUNDED", None)).unwrap(), "(\"[FOUNDED]\" = \"\")");
        let ci = PredicateNode::Comparison {
            op: ComparisonOp::Eq,
            left: Box::new(PredicateNode::PropertyName("NAME".into())),
            right: Box::new(PredicateNode::Literal { value: Some("say \"hi\"".into()), case_insensitive: true }),
            like: None,
        };
        assert_eq!(compile(&ci).unwrap(), "(\"[NAME]\" =* \"say \\\"hi\\\"\")");
    }

    #[test]
    fn test_between() {
        let between = |property: &str, lo: &str, hi: &str| PredicateNode::Comparison {
            op: ComparisonOp::Between,
            left: Box::new(PredicateNode::PropertyName(property.into())),
            right: Box::new(PredicateNode::Boundary(lo.into(), hi.into())),
            like: None,
        };
        assert_eq!(compile(&between("POP", "1", "2")).unwrap(), "([POP]  >= 1 AND  [POP]  <= 2)");
        assert_eq!(compile(&between("POP", "1", "x")).unwrap(), "(\"[POP]\"  >= \"1\" AND  \"[POP]\"  <= \"x\")");
        assert_eq!(
            compile(&between("FOUNDED", "1900", "2000")).unwrap(),
            "([FOUNDED]  >= `1900` AND  [FOUNDED]  <= `2000`)"
        );
    }

    #[test]
    fn test_like() {
        assert_eq!(compile(&like("AB*C#D", "!")).unwrap(), "(\"[NAME]\" ~ \"^AB.*C.D$\")");
        assert_eq!(compile(&like("a.b!*", "!")).unwrap(), "(\"[NAME]\" ~ \"^a\\.b\\*$\")");
        // the escape character only escapes metacharacters
        assert_eq!(compile(&like("!a", "!")).unwrap(), "(\"[NAME]\" ~ \"^!a$\")");
        assert_eq!(compile(&like("a\\b", "!")).unwrap(), "(\"[NAME]\" ~ \"^a\\\\\\\\b$\")");
    }

    #[test]
    fn test_logical_and_feature_id() {
        let a = PredicateNode::compare(ComparisonOp::Eq, "POP", Some("1"));
        let b = PredicateNode::compare(ComparisonOp::Eq, "POP", Some("2"));
        assert_eq!(compile(&PredicateNode::or(a.clone(), b)).unwrap(), "(([POP] = 1) OR ([POP] = 2))");
        assert_eq!(compile(&PredicateNode::not(a)).unwrap(), "(NOT ([POP] = 1))");
        let fids = PredicateNode::FeatureId(vec!["Cities.1".into(), "Cities.2".into()]);
        assert_eq!(compile(&fids).unwrap(), "(([FID] == 1) OR ([FID] == 2))");
        let fids = PredicateNode::FeatureId(vec!["Cities.a".into()]);
        assert_eq!(compile(&fids).unwrap(), "((\"[FID]\" == \"a\"))");
    }

    #[test]
    fn test_feature_ids_escaped_and_quoted_together() {
        let fids = PredicateNode::FeatureId(vec!["Cities.a\"b".into()]);
        assert_eq!(compile(&fids).unwrap(), "((\"[FID]\" == \"a\\\"b\"))");
        let fids = PredicateNode::FeatureId(vec!["Cities.1".into(), "Cities.2) OR (1=1".into()]);
        assert_eq!(
            compile(&fids).unwrap(),
            "((\"[FID]\" == \"1\") OR (\"[FID]\" == \"2) OR (1=1\"))"
        );
    }

    #[test]
    fn test_standalone_bbox() {
        let bbox = PredicateNode::bbox("Geometry", Rect::new(0.0, 0.0, 10.0, 5.0), None);
        assert_eq!(
            compile(&bbox).unwrap(),
            "(NOT (NOT (intersects([shape], fromText('POLYGON((0 0,0 5,10 5,10 0,0 0))')) = TRUE)))"
        );
    }

    #[test]
    fn test_bbox_under_and_compiles_sibling_only() {
        let bbox = PredicateNode::bbox("Geometry", Rect::new(0.0, 0.0, 10.0, 5.0), None);
        let eq = PredicateNode::compare(ComparisonOp::Eq, "POP", Some("1"));
        let text = compile(&PredicateNode::and(bbox, eq)).unwrap();
        assert_eq!(text, "([POP] = 1)");
        assert!(!text.contains("intersects"));
    }

    #[test]
    fn test_nested_bbox_compiles_as_intersects() {
        let bbox = PredicateNode::bbox("Geometry", Rect::new(0.0, 0.0, 1.0, 1.0), None);
        let a = PredicateNode::compare(ComparisonOp::Eq, "NAME", Some("x"));
        let b = PredicateNode::compare(ComparisonOp::Eq, "NAME", Some("y"));
        let spatial = "(NOT (NOT (intersects([shape], fromText('POLYGON((0 0,0 1,1 1,1 0,0 0))')) = TRUE)))";

        let or = PredicateNode::or(PredicateNode::and(bbox.clone(), a.clone()), b);
        assert_eq!(
            compile(&or).unwrap(),
            format!("(({} AND (\"[NAME]\" = \"x\")) OR (\"[NAME]\" = \"y\"))", spatial)
        );
        let not = PredicateNode::not(PredicateNode::and(bbox, a));
        assert_eq!(compile(&not).unwrap(), format!("(NOT ({} AND (\"[NAME]\" = \"x\")))", spatial));
    }

    #[test]
    fn test_reprojection_into_layer_crs() {
        let schema = LayerSchemaBuilder::new("Cities").layer_crs("EPSG:3857").build();
        let bbox = PredicateNode::bbox("Geometry", Rect::new(0.0, 0.0, 1.0, 1.0), Some("EPSG:4326"));
        let text = CommonCompiler::new(&Offset).compile(&bbox, &schema).unwrap().unwrap();
        assert!(text.contains("POLYGON((10 0,10 1,11 1,11 0,10 0))"), "{}", text);

        let world = PredicateNode::bbox("Geometry", Rect::new(-180.0, -90.0, 180.0, 90.0), Some("EPSG:4326"));
        let text = CommonCompiler::new(&Offset).compile(&world, &schema).unwrap().unwrap();
        assert!(text.contains("-1000000000000000"), "{}", text);

        // the tree keeps its original coordinates
        assert_eq!(bbox, PredicateNode::bbox("Geometry", Rect::new(0.0, 0.0, 1.0, 1.0), Some("EPSG:4326")));
    }

    #[test]
    fn test_dwithin_buffers_and_converts_units() {
        let schema = LayerSchemaBuilder::new("Cities").units(DistanceUnit::Feet).build();
        let node = point_within(Distance { value: 1.0, unit: Some(DistanceUnit::Inches) });
        let text = CommonCompiler::new(&Offset).compile(&node, &schema).unwrap().unwrap();
        let d = 1.0 / 12.0;
        assert!(text.starts_with("dwithin([shape], fromText('POLYGON(("), "{}", text);
        assert!(text.ends_with(&format!(", {}) = TRUE", d)), "{}", text);

        // without buffering support the point is used unchanged
        let node = point_within(Distance { value: 2.0, unit: None });
        assert_eq!(
            CommonCompiler::new(&NoGeometry).compile(&node, &schema).unwrap().unwrap(),
            "dwithin([shape], fromText('POINT(1 2)'), 2) = TRUE"
        );
    }

    #[test]
    fn test_other_spatial_ops() {
        let node = PredicateNode::Spatial {
            op: SpatialOp::Intersects,
            left: Box::new(PredicateNode::PropertyName("Geometry".into())),
            right: Box::new(PredicateNode::GeometryLiteral {
                shape: Shape::Point(Point::new(1.0, 2.0)),
                srs: None,
                distance: None,
            }),
        };
        assert_eq!(compile(&node).unwrap(), "intersects([shape], fromText('POINT(1 2)')) = TRUE");
        if let PredicateNode::Spatial { right, .. } = node {
            let within = PredicateNode::Spatial {
                op: SpatialOp::Within,
                left: Box::new(PredicateNode::PropertyName("Geometry".into())),
                right,
            };
            assert_eq!(compile(&within).unwrap(), "within([shape], fromText('POINT(1 2)')) = TRUE");
        }
    }
}
