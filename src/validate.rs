//! Validate module: structural classification and request-time checks of a tree.

use crate::expr::{LogicalOp, NodeVisitor, PredicateNode};
use crate::schema::SchemaOracle;
use crate::types::Rect;
use crate::FilterError;

/// Spatial operators that rule out the rectangle fast path.
const NON_SIMPLE_OPS: [&str; 10] = [
    "DWithin", "Intersects", "Equals", "Disjoint", "Touches", "Crosses", "Within", "Contains", "Overlaps", "Beyond",
];

/// Property names GML defines on every feature.
const GML_DEFAULT_PROPERTIES: [&str; 6] = [
    "gml:name",
    "gml:description",
    "gml:descriptionReference",
    "gml:identifier",
    "gml:boundedBy",
    "@gml:id",
];

struct TagCounter<'a> {
    name: &'a str,
    count: usize,
}

impl NodeVisitor for TagCounter<'_> {
    fn visit(&mut self, node: &PredicateNode) {
        if node.tag().eq_ignore_ascii_case(self.name) {
            self.count += 1;
        }
    }
}

/// Number of nodes whose tag matches `name`, ignoring case.
pub fn count_of(tree: &PredicateNode, name: &str) -> usize {
    let mut counter = TagCounter { name, count: 0 };
    tree.accept(&mut counter);
    counter.count
}

/// True when the tree's only BBOX can be lifted out as a plain rectangle.
pub fn is_bbox_eligible(tree: &PredicateNode) -> bool {
    match count_of(tree, "BBOX") {
        0 => true,
        1 => eligible_position(tree),
        _ => false,
    }
}

fn eligible_position(node: &PredicateNode) -> bool {
    match node {
        PredicateNode::Spatial { .. } if node.is_bbox() => true,
        PredicateNode::Logical { op: LogicalOp::And, left, right: Some(right) } => {
            is_bbox_eligible(left) && is_bbox_eligible(right)
        }
        _ => false,
    }
}

/// Attribute predicates plus at most one top-level BBOX.
pub fn is_simple_filter(tree: &PredicateNode) -> bool {
    is_bbox_eligible(tree) && NON_SIMPLE_OPS.iter().all(|op| count_of(tree, op) == 0)
}

pub fn has_spatial_predicate(tree: &PredicateNode) -> bool {
    match tree {
        PredicateNode::Spatial { .. } => tree.is_bbox() || tree.spatial_kind().is_some(),
        PredicateNode::Logical { left, right, .. } => {
            has_spatial_predicate(left) || right.as_deref().map(has_spatial_predicate).unwrap_or(false)
        }
        _ => false,
    }
}

fn bbox_parts(node: &PredicateNode) -> Option<(&Rect, Option<&str>)> {
    match node {
        PredicateNode::Spatial { right, .. } if node.is_bbox() => match right.as_ref() {
            PredicateNode::BBoxLiteral { rect, srs } => Some((rect, srs.as_deref())),
            _ => None,
        },
        _ => None,
    }
}

/// The BBOX node reachable through AND nodes only, when it is the only one
/// there. This is the node the dispatcher lifts out as the query rectangle.
pub fn top_bbox_node(tree: &PredicateNode) -> Option<&PredicateNode> {
    fn walk<'t>(node: &'t PredicateNode, found: &mut Vec<&'t PredicateNode>) {
        match node {
            PredicateNode::Spatial { .. } if node.is_bbox() => found.push(node),
            PredicateNode::Logical { op: LogicalOp::And, left, right: Some(right) } => {
                walk(left, found);
                walk(right, found);
            }
            _ => {}
        }
    }
    let mut found = Vec::new();
    walk(tree, &mut found);
    match found.as_slice() {
        [only] if bbox_parts(only).is_some() => Some(*only),
        _ => None,
    }
}

/// Rectangle and SRS of [`top_bbox_node`].
pub fn top_bbox(tree: &PredicateNode) -> Option<(&Rect, Option<&str>)> {
    top_bbox_node(tree).and_then(bbox_parts)
}

/// First BBOX in pre-order, wherever it sits.
pub fn first_bbox(tree: &PredicateNode) -> Option<(&Rect, Option<&str>)> {
    if let Some(parts) = bbox_parts(tree) {
        return Some(parts);
    }
    tree.left()
        .and_then(first_bbox)
        .or_else(|| tree.right().and_then(first_bbox))
}

fn comparison_property(node: &PredicateNode) -> Option<&str> {
    match node {
        PredicateNode::Comparison { left, .. } => match left.as_ref() {
            PredicateNode::PropertyName(name) => Some(name),
            _ => None,
        },
        _ => None,
    }
}

fn strip_namespace(node: PredicateNode) -> PredicateNode {
    // GML default properties keep their prefix inside comparisons
    if comparison_property(&node).map(|p| GML_DEFAULT_PROPERTIES.contains(&p)).unwrap_or(false) {
        return node;
    }
    match node {
        PredicateNode::PropertyName(name) => {
            let local = match name.split_once(':') {
                Some((_, local)) if !local.contains(':') => Some(local.to_string()),
                _ => None,
            };
            PredicateNode::PropertyName(local.unwrap_or(name))
        }
        PredicateNode::Logical { op, left, right } => PredicateNode::Logical {
            op,
            left: Box::new(strip_namespace(*left)),
            right: right.map(|r| Box::new(strip_namespace(*r))),
        },
        PredicateNode::Comparison { op, left, right, like } => PredicateNode::Comparison {
            op,
            left: Box::new(strip_namespace(*left)),
            right: Box::new(strip_namespace(*right)),
            like,
        },
        PredicateNode::Spatial { op, left, right } => PredicateNode::Spatial {
            op,
            left: Box::new(strip_namespace(*left)),
            right: Box::new(strip_namespace(*right)),
        },
        leaf => leaf,
    }
}

fn remove_group(name: &str, groups: &[String]) -> Option<String> {
    let slash = name.find('/')?;
    let mut rest = name;
    if let Some(colon) = name.find(':') {
        if colon < slash {
            rest = &name[colon + 1..];
        }
    }
    groups.iter().find_map(|group| {
        let prefix = rest.get(..group.len())?;
        if prefix.eq_ignore_ascii_case(group) && rest[group.len()..].starts_with('/') {
            let tail = &rest[group.len() + 1..];
            let tail = tail.split_once(':').map(|(_, t)| t).unwrap_or(tail);
            Some(tail.to_string())
        } else {
            None
        }
    })
}

/// Rewrites property names to the layer's attribute names: namespace
/// prefixes, `group/` prefixes and published aliases are resolved.
pub fn normalize_property_names(tree: &PredicateNode, schema: &dyn SchemaOracle) -> PredicateNode {
    let groups = schema.groups();
    strip_namespace(tree.clone()).map(&mut |node| match node {
        PredicateNode::PropertyName(name) => {
            let name = if groups.is_empty() { name } else { remove_group(&name, &groups).unwrap_or(name) };
            PredicateNode::PropertyName(schema.resolve_alias(&name).unwrap_or(name))
        }
        other => other,
    })
}

/// Rejects comparisons against `gml:boundedBy`.
pub fn check_invalid_operand(tree: &PredicateNode) -> Result<(), FilterError> {
    if let Some(name) = comparison_property(tree) {
        if name == "gml:boundedBy" {
            return Err(FilterError::InvalidOperand(name.to_string()));
        }
    }
    if let Some(left) = tree.left() {
        check_invalid_operand(left)?;
    }
    if let Some(right) = tree.right() {
        check_invalid_operand(right)?;
    }
    Ok(())
}

/// Every compared property must be a visible attribute of the layer.
pub fn check_invalid_property(tree: &PredicateNode, schema: &dyn SchemaOracle) -> Result<(), FilterError> {
    if let Some(name) = comparison_property(tree) {
        if !schema.has_attribute(name) {
            return Err(FilterError::UnknownProperty(name.to_string()));
        }
    }
    if let Some(left) = tree.left() {
        check_invalid_property(left, schema)?;
    }
    if let Some(right) = tree.right() {
        check_invalid_property(right, schema)?;
    }
    Ok(())
}

/// Prefixed feature ids must name `layer_name`.
pub fn check_feature_ids(tree: &PredicateNode, layer_name: &str) -> Result<(), FilterError> {
    if let PredicateNode::FeatureId(tokens) = tree {
        for token in tokens.iter().flat_map(|t| t.split(',')) {
            if let Some(dot) = token.rfind('.') {
                if !token[..dot].eq_ignore_ascii_case(layer_name) {
                    return Err(FilterError::InconsistentFeatureId {
                        id: token.to_string(),
                        layer: layer_name.to_string(),
                    });
                }
            }
        }
    }
    if let Some(left) = tree.left() {
        check_feature_ids(left, layer_name)?;
    }
    if let Some(right) = tree.right() {
        check_feature_ids(right, layer_name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ComparisonOp, SpatialOp};
    use crate::schema::LayerSchemaBuilder;
    use crate::types::{FieldType, Shape};
    use geo_types::Point;

    fn bbox() -> PredicateNode {
        PredicateNode::bbox("geom", Rect::new(0.0, 0.0, 10.0, 10.0), Some("EPSG:4326"))
    }

    fn eq(name: &str, value: &str) -> PredicateNode {
        PredicateNode::compare(ComparisonOp::Eq, name, Some(value))
    }

    fn intersects() -> PredicateNode {
        PredicateNode::Spatial {
            op: SpatialOp::Intersects,
            left: Box::new(PredicateNode::PropertyName("geom".into())),
            right: Box::new(PredicateNode::GeometryLiteral {
                shape: Shape::Point(Point::new(1.0, 1.0)),
                srs: None,
                distance: None,
            }),
        }
    }

    #[test]
    fn test_count_of_case_insensitive() {
        let tree = PredicateNode::and(bbox(), PredicateNode::or(eq("a", "1"), eq("b", "2")));
        assert_eq!(count_of(&tree, "bbox"), 1);
        assert_eq!(count_of(&tree, "PropertyIsEqualTo"), 2);
        assert_eq!(count_of(&tree, "or"), 1);
        assert_eq!(count_of(&tree, "Within"), 0);
    }

    #[test]
    fn test_bbox_eligibility() {
        assert!(is_bbox_eligible(&eq("a", "1")));
        assert!(is_bbox_eligible(&bbox()));
        assert!(is_bbox_eligible(&PredicateNode::and(eq("a", "1"), bbox())));
        // right-folded chain AND(a, AND(b, BBOX))
        assert!(is_bbox_eligible(&PredicateNode::and(eq("a", "1"), PredicateNode::and(eq("b", "2"), bbox()))));
        assert!(!is_bbox_eligible(&PredicateNode::or(eq("a", "1"), bbox())));
        assert!(!is_bbox_eligible(&PredicateNode::not(bbox())));
        assert!(!is_bbox_eligible(&PredicateNode::and(bbox(), bbox())));
    }

    #[test]
    fn test_simple_filter() {
        assert!(is_simple_filter(&PredicateNode::and(bbox(), eq("a", "1"))));
        assert!(!is_simple_filter(&PredicateNode::and(bbox(), intersects())));
        assert!(!is_simple_filter(&intersects()));
    }

    #[test]
    fn test_has_spatial_predicate() {
        assert!(has_spatial_predicate(&bbox()));
        assert!(has_spatial_predicate(&PredicateNode::or(eq("a", "1"), PredicateNode::not(intersects()))));
        assert!(!has_spatial_predicate(&PredicateNode::and(eq("a", "1"), eq("b", "2"))));
    }

    #[test]
    fn test_top_and_first_bbox() {
        let tree = PredicateNode::and(eq("a", "1"), bbox());
        let (rect, srs) = top_bbox(&tree).unwrap();
        assert_eq!(*rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(srs, Some("EPSG:4326"));

        let under_or = PredicateNode::or(eq("a", "1"), bbox());
        assert!(top_bbox(&under_or).is_none());
        assert!(first_bbox(&under_or).is_some());
        assert!(top_bbox(&PredicateNode::and(bbox(), bbox())).is_none());
    }

    #[test]
    fn test_normalize_property_names() {
        let schema = LayerSchemaBuilder::new("Roads")
            .field("NAME", FieldType::Character)
            .alias("NAME", "RoadName")
            .group("info")
            .build();
        let tree = PredicateNode::and(
            eq("ns:roadname", "x"),
            PredicateNode::or(eq("info/NAME", "y"), eq("gml:boundedBy", "z")),
        );
        let normalized = normalize_property_names(&tree, &schema);
        assert_eq!(
            normalized,
            PredicateNode::and(
                eq("NAME", "x"),
                PredicateNode::or(eq("NAME", "y"), eq("gml:boundedBy", "z")),
            )
        );
        // the input is untouched
        assert_eq!(count_of(&tree, "PropertyIsEqualTo"), 3);
        assert_eq!(tree.left(), Some(&eq("ns:roadname", "x")));
    }

    #[test]
    fn test_check_invalid_operand() {
        let tree = PredicateNode::and(eq("a", "1"), eq("gml:boundedBy", "x"));
        assert_eq!(check_invalid_operand(&tree), Err(FilterError::InvalidOperand("gml:boundedBy".into())));
        assert!(check_invalid_operand(&eq("a", "1")).is_ok());
    }

    #[test]
    fn test_check_invalid_property() {
        let schema = LayerSchemaBuilder::new("Roads").field("NAME", FieldType::Character).build();
        assert!(check_invalid_property(&eq("name", "x"), &schema).is_ok());
        assert_eq!(
            check_invalid_property(&PredicateNode::not(eq("COLOR", "x")), &schema),
            Err(FilterError::UnknownProperty("COLOR".into()))
        );
    }

    #[test]
    fn test_check_feature_ids() {
        let ok = PredicateNode::FeatureId(vec!["roads.1".into(), "2".into()]);
        assert!(check_feature_ids(&ok, "Roads").is_ok());
        let bad = PredicateNode::FeatureId(vec!["Roads.1".into(), "Lakes.5".into()]);
        assert_eq!(
            check_feature_ids(&bad, "Roads"),
            Err(FilterError::InconsistentFeatureId { id: "Lakes.5".into(), layer: "Roads".into() })
        );
    }
}
