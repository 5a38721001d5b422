//! Parser module: turns a `<Filter>` document into a [`PredicateNode`] tree.
//!
//! Namespace prefixes are removed textually before the document reaches the
//! XML parser, so `ogc:`, `fes:` and `gml:` (declared or not) all resolve to
//! the same local names.

use crate::expr::{ComparisonOp, LikeOptions, LogicalOp, PredicateNode, SpatialOp};
use crate::gml::{parse_gml_box, parse_gml_envelope, parse_gml_geometry};
use crate::types::Distance;
use crate::ParseError;
use roxmltree::{Document, Node};
use tracing::trace;

const FEATURE_ID_TAGS: [&str; 3] = ["FeatureId", "GmlObjectId", "ResourceId"];

/// Geometry elements accepted by non-BBOX spatial operators, in lookup order.
const GEOMETRY_TAGS: [&str; 13] = [
    "Point",
    "PointType",
    "Polygon",
    "MultiPolygon",
    "Surface",
    "MultiSurface",
    "Box",
    "Envelope",
    "LineString",
    "MultiLineString",
    "Curve",
    "MultiCurve",
    "MultiPoint",
];

pub struct FilterXmlParser;

impl FilterXmlParser {
    /// Parses and validates a filter document.
    pub fn parse(xml: &str) -> Result<PredicateNode, ParseError> {
        if xml.trim().is_empty() || !xml.contains("Filter") {
            return Err(ParseError::MissingFilter);
        }
        let stripped = strip_namespaces(xml);
        let doc = Document::parse(&stripped).map_err(|e| ParseError::Xml(e.to_string()))?;
        let root = doc.root_element();
        let filter = if root.tag_name().name() == "Filter" {
            root
        } else {
            root.descendants()
                .find(|n| n.is_element() && n.tag_name().name() == "Filter")
                .ok_or(ParseError::MissingFilter)?
        };

        let first = filter
            .children()
            .filter(|n| n.is_element())
            .find(|n| is_supported(n.tag_name().name()))
            .ok_or_else(|| {
                let name = filter
                    .children()
                    .find(|n| n.is_element())
                    .map(|n| n.tag_name().name().to_string())
                    .unwrap_or_else(|| "empty Filter".to_string());
                ParseError::Unsupported(name)
            })?;

        let tree = if is_feature_id(first.tag_name().name()) {
            build_feature_id(siblings_from(first))
        } else {
            build_node(first)
        };
        validate_tree(&tree)?;
        Ok(tree)
    }
}

fn is_feature_id(name: &str) -> bool {
    FEATURE_ID_TAGS.contains(&name)
}

fn is_logical(name: &str) -> bool {
    matches!(name, "And" | "Or" | "Not")
}

fn is_supported(name: &str) -> bool {
    is_logical(name)
        || is_feature_id(name)
        || SpatialOp::from_tag(name).is_some()
        || ComparisonOp::from_tag(name).is_some()
}

fn element_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    element_children(node).find(|n| n.tag_name().name() == name)
}

fn descendant<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants().skip(1).find(|n| n.is_element() && n.tag_name().name() == name)
}

/// `node` followed by its consecutive feature-id siblings.
fn siblings_from<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    std::iter::successors(Some(node), |n| n.next_sibling())
        .filter(|n| n.is_element())
        .take_while(|n| is_feature_id(n.tag_name().name()))
        .collect()
}

fn property_name(node: Node) -> Option<String> {
    child(node, "PropertyName")
        .or_else(|| child(node, "ValueReference"))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn match_case_off(node: Node) -> bool {
    node.attribute("matchCase")
        .map(|v| v.eq_ignore_ascii_case("false"))
        .unwrap_or(false)
}

fn literal(value: Option<&str>, case_insensitive: bool) -> PredicateNode {
    PredicateNode::Literal {
        value: value.filter(|v| !v.is_empty()).map(str::to_string),
        case_insensitive,
    }
}

fn undefined(node: Node) -> PredicateNode {
    let name = node.tag_name().name();
    trace!(element = name, "malformed element");
    PredicateNode::Undefined(name.to_string())
}

fn build_node(node: Node) -> PredicateNode {
    let name = node.tag_name().name();
    trace!(element = name, "building predicate node");
    if is_logical(name) {
        build_logical(node)
    } else if let Some(op) = SpatialOp::from_tag(name) {
        build_spatial(node, op)
    } else if let Some(op) = ComparisonOp::from_tag(name) {
        build_comparison(node, op)
    } else if is_feature_id(name) {
        build_feature_id(vec![node])
    } else {
        undefined(node)
    }
}

fn build_logical(node: Node) -> PredicateNode {
    let name = node.tag_name().name();
    if name == "Not" {
        return match element_children(node).next() {
            Some(inner) => PredicateNode::not(build_node(inner)),
            None => undefined(node),
        };
    }
    let op = if name == "And" { LogicalOp::And } else { LogicalOp::Or };
    let operands: Vec<PredicateNode> = element_children(node).map(build_node).collect();
    if operands.len() < 2 {
        return undefined(node);
    }
    // right fold: p1 op (p2 op (... op pn))
    let mut rev = operands.into_iter().rev();
    let mut acc = match rev.next() {
        Some(last) => last,
        None => return undefined(node),
    };
    for operand in rev {
        acc = PredicateNode::Logical { op, left: Box::new(operand), right: Some(Box::new(acc)) };
    }
    acc
}

fn build_spatial(node: Node, op: SpatialOp) -> PredicateNode {
    let Some(property) = property_name(node) else {
        return undefined(node);
    };
    let left = Box::new(PredicateNode::PropertyName(property));

    if op == SpatialOp::Bbox {
        let parsed = if let Some(b) = child(node, "Box").or_else(|| child(node, "BoxType")) {
            parse_gml_box(b)
        } else if let Some(env) = child(node, "Envelope") {
            parse_gml_envelope(env)
        } else {
            return undefined(node);
        };
        return match parsed {
            Ok((rect, srs)) => PredicateNode::Spatial {
                op,
                left,
                right: Box::new(PredicateNode::BBoxLiteral { rect, srs }),
            },
            Err(e) => {
                trace!(error = %e, "BBOX geometry rejected");
                undefined(node)
            }
        };
    }

    let Some(geometry) = GEOMETRY_TAGS.iter().find_map(|tag| child(node, tag)) else {
        return undefined(node);
    };
    let (shape, srs) = match parse_gml_geometry(geometry) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!(error = %e, "spatial geometry rejected");
            return undefined(node);
        }
    };
    let distance = if op.is_distance() {
        let Some(d) = child(node, "Distance") else {
            return undefined(node);
        };
        let units = d.attribute("units").or_else(|| d.attribute("uom"));
        Some(Distance::from_parts(d.text().unwrap_or(""), units))
    } else {
        None
    };
    PredicateNode::Spatial {
        op,
        left,
        right: Box::new(PredicateNode::GeometryLiteral { shape, srs, distance }),
    }
}

fn boundary_value(node: Node) -> Option<String> {
    let text = match descendant(node, "Literal") {
        Some(lit) => lit.text(),
        None => node.text(),
    };
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn build_comparison(node: Node, op: ComparisonOp) -> PredicateNode {
    let Some(property) = property_name(node) else {
        return undefined(node);
    };
    let left = Box::new(PredicateNode::PropertyName(property));
    let case_insensitive = match_case_off(node);

    match op {
        ComparisonOp::Between => {
            let lower = child(node, "LowerBoundary").and_then(boundary_value);
            let upper = child(node, "UpperBoundary").and_then(boundary_value);
            match (lower, upper) {
                (Some(lo), Some(hi)) => PredicateNode::Comparison {
                    op,
                    left,
                    right: Box::new(PredicateNode::Boundary(lo, hi)),
                    like: None,
                },
                _ => undefined(node),
            }
        }
        ComparisonOp::Like => {
            let Some(lit) = descendant(node, "Literal") else {
                return undefined(node);
            };
            let wildcard = node.attribute("wildCard");
            let single_char = node.attribute("singleChar");
            let escape = node.attribute("escape").or_else(|| node.attribute("escapeChar"));
            match (wildcard, single_char, escape) {
                (Some(w), Some(s), Some(e)) => PredicateNode::Comparison {
                    op,
                    left,
                    right: Box::new(literal(lit.text(), case_insensitive)),
                    like: Some(LikeOptions {
                        wildcard: w.to_string(),
                        single_char: s.to_string(),
                        escape: e.to_string(),
                        case_insensitive,
                    }),
                },
                _ => undefined(node),
            }
        }
        _ => match descendant(node, "Literal") {
            Some(lit) => PredicateNode::Comparison {
                op,
                left,
                right: Box::new(literal(lit.text(), case_insensitive)),
                like: None,
            },
            None => undefined(node),
        },
    }
}

fn build_feature_id(nodes: Vec<Node>) -> PredicateNode {
    let ids: Vec<String> = nodes
        .iter()
        .filter_map(|n| n.attribute("fid").or_else(|| n.attribute("id")).or_else(|| n.attribute("rid")))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    match (ids.is_empty(), nodes.first()) {
        (false, _) => PredicateNode::FeatureId(ids),
        (true, Some(first)) => undefined(*first),
        (true, None) => PredicateNode::Undefined("FeatureId".to_string()),
    }
}

/// Fails on the first `Undefined` node, left subtree first.
pub fn validate_tree(node: &PredicateNode) -> Result<(), ParseError> {
    if let PredicateNode::Undefined(name) = node {
        return Err(ParseError::Invalid(name.clone()));
    }
    if let Some(left) = node.left() {
        validate_tree(left)?;
    }
    if let Some(right) = node.right() {
        validate_tree(right)?;
    }
    Ok(())
}

/// Removes namespace prefixes from element and attribute names and drops
/// `xmlns` declarations. Attribute values and text are left as they are.
pub fn strip_namespaces(xml: &str) -> String {
    const VERBATIM: [(&str, &str); 4] = [("<!--", "-->"), ("<![CDATA[", "]]>"), ("<?", "?>"), ("<!", ">")];

    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        if let Some((_, close)) = VERBATIM.iter().find(|(open, _)| rest.starts_with(open)) {
            let end = rest.find(close).map(|i| i + close.len()).unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        let end = tag_end(rest);
        match rewrite_tag(&rest[..end]) {
            Some(tag) => out.push_str(&tag),
            None => out.push_str(&rest[..end]),
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Byte offset just past the `>` closing the tag at the start of `s`.
fn tag_end(s: &str) -> usize {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return i + 1,
            _ => {}
        }
    }
    s.len()
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn rewrite_tag(tag: &str) -> Option<String> {
    let body = tag.strip_prefix('<')?;
    let (closing, body) = match body.strip_prefix('/') {
        Some(b) => (true, b),
        None => (false, body),
    };
    let (body, terminated) = match body.strip_suffix('>') {
        Some(b) => (b, true),
        None => (body, false),
    };
    let (body, self_closing) = match body.strip_suffix('/') {
        Some(b) => (b, true),
        None => (body, false),
    };

    let name_end = body.find(|c: char| c.is_whitespace()).unwrap_or(body.len());
    let mut out = String::with_capacity(tag.len());
    out.push('<');
    if closing {
        out.push('/');
    }
    out.push_str(local_name(&body[..name_end]));

    let mut attrs = body[name_end..].trim_start();
    while !attrs.is_empty() {
        let eq = attrs.find('=')?;
        let attr_name = attrs[..eq].trim();
        let after = attrs[eq + 1..].trim_start();
        let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value_end = after[1..].find(quote)? + 1;
        let value = &after[1..value_end];
        if attr_name != "xmlns" && !attr_name.starts_with("xmlns:") {
            out.push(' ');
            out.push_str(local_name(attr_name));
            out.push('=');
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }
        attrs = after[value_end + 1..].trim_start();
    }

    if self_closing {
        out.push('/');
    }
    if terminated {
        out.push('>');
    }
    Some(out)
}

/// Splits a KVP `FILTER` value of the form `(<Filter>..</Filter>)(<Filter>..</Filter>)`
/// into one document per type name.
pub fn split_filters(value: &str) -> Vec<String> {
    let bytes = value.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Vec::new();
    }
    let mut filters = Vec::new();
    let mut token_start = 1;
    let mut quote: Option<u8> = None;
    let mut depth: i32 = 0;
    let mut in_tag = false;
    let mut i = 1;
    while i < bytes.len() {
        let c = bytes[i];
        let next = bytes.get(i + 1).copied();
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
        } else if in_tag && (c == b'\'' || c == b'"') {
            quote = Some(c);
        } else if c == b'<' {
            in_tag = true;
            match next {
                Some(b'/') => depth -= 1,
                Some(b'!') => {}
                _ => depth += 1,
            }
        } else if c == b'/' && next == Some(b'>') {
            in_tag = false;
            depth -= 1;
            i += 1;
        } else if c == b'>' {
            in_tag = false;
        } else if depth == 0 && c == b')' {
            filters.push(value[token_start..i].to_string());
            if next != Some(b'(') {
                break;
            }
            i += 1;
            token_start = i + 1;
        }
        i += 1;
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistanceUnit, Rect, Shape};
    use geo_types::Point;

    const OGC: &str = r#"xmlns:ogc="http://www.opengis.net/ogc" xmlns:gml="http://www.opengis.net/gml""#;

    fn parse(body: &str) -> Result<PredicateNode, ParseError> {
        FilterXmlParser::parse(&format!("<ogc:Filter {OGC}>{body}</ogc:Filter>"))
    }

    #[test]
    fn test_strip_namespaces() {
        let xml = r#"<?xml version="1.0"?><ogc:Filter xmlns:ogc="x" xmlns="y"><gml:Box srsName="EPSG:4326"/><!-- a:b --></ogc:Filter>"#;
        assert_eq!(
            strip_namespaces(xml),
            r#"<?xml version="1.0"?><Filter><Box srsName="EPSG:4326"/><!-- a:b --></Filter>"#
        );
        assert_eq!(strip_namespaces(r#"<a gml:id="r.1">t:x</a>"#), r#"<a id="r.1">t:x</a>"#);
    }

    #[test]
    fn test_missing_filter() {
        assert_eq!(FilterXmlParser::parse(""), Err(ParseError::MissingFilter));
        assert_eq!(FilterXmlParser::parse("<Query/>"), Err(ParseError::MissingFilter));
        assert_eq!(FilterXmlParser::parse("<Query><NoFilterHere/></Query>"), Err(ParseError::MissingFilter));
    }

    #[test]
    fn test_not_well_formed() {
        assert!(matches!(FilterXmlParser::parse("<Filter><And>"), Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_unsupported_child() {
        assert_eq!(
            parse("<ogc:PropertyIsNull><ogc:PropertyName>A</ogc:PropertyName></ogc:PropertyIsNull>"),
            Err(ParseError::Unsupported("PropertyIsNull".into()))
        );
        assert_eq!(FilterXmlParser::parse("<Filter/>"), Err(ParseError::Unsupported("empty Filter".into())));
    }

    #[test]
    fn test_undeclared_prefix() {
        let tree = FilterXmlParser::parse(
            "<ogc:Filter><ogc:PropertyIsEqualTo><ogc:PropertyName>NAME</ogc:PropertyName><ogc:Literal>x</ogc:Literal></ogc:PropertyIsEqualTo></ogc:Filter>",
        )
        .unwrap();
        assert_eq!(tree, PredicateNode::compare(ComparisonOp::Eq, "NAME", Some("x")));
    }

    #[test]
    fn test_filter_nested_in_query() {
        let tree = FilterXmlParser::parse(
            "<Query><Filter><PropertyIsLessThan><PropertyName>POP</PropertyName><Literal>10</Literal></PropertyIsLessThan></Filter></Query>",
        )
        .unwrap();
        assert_eq!(tree, PredicateNode::compare(ComparisonOp::Lt, "POP", Some("10")));
    }

    #[test]
    fn test_value_reference_and_match_case() {
        let tree = FilterXmlParser::parse(
            r#"<fes:Filter xmlns:fes="http://www.opengis.net/fes/2.0"><fes:PropertyIsEqualTo matchCase="false"><fes:ValueReference>NAME</fes:ValueReference><fes:Literal>Oslo</fes:Literal></fes:PropertyIsEqualTo></fes:Filter>"#,
        )
        .unwrap();
        match tree {
            PredicateNode::Comparison { right, .. } => assert_eq!(
                *right,
                PredicateNode::Literal { value: Some("Oslo".into()), case_insensitive: true }
            ),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_literal() {
        let tree = parse("<ogc:PropertyIsEqualTo><ogc:PropertyName>A</ogc:PropertyName><ogc:Literal/></ogc:PropertyIsEqualTo>").unwrap();
        assert_eq!(tree, PredicateNode::compare(ComparisonOp::Eq, "A", None));
    }

    #[test]
    fn test_missing_property_name_is_invalid() {
        assert_eq!(
            parse("<ogc:PropertyIsEqualTo><ogc:Literal>1</ogc:Literal></ogc:PropertyIsEqualTo>"),
            Err(ParseError::Invalid("PropertyIsEqualTo".into()))
        );
    }

    #[test]
    fn test_and_right_fold() {
        let tree = parse(
            "<ogc:And>\
               <ogc:PropertyIsEqualTo><ogc:PropertyName>a</ogc:PropertyName><ogc:Literal>1</ogc:Literal></ogc:PropertyIsEqualTo>\
               <ogc:PropertyIsEqualTo><ogc:PropertyName>b</ogc:PropertyName><ogc:Literal>2</ogc:Literal></ogc:PropertyIsEqualTo>\
               <ogc:PropertyIsEqualTo><ogc:PropertyName>c</ogc:PropertyName><ogc:Literal>3</ogc:Literal></ogc:PropertyIsEqualTo>\
             </ogc:And>",
        )
        .unwrap();
        assert_eq!(
            tree,
            PredicateNode::and(
                PredicateNode::compare(ComparisonOp::Eq, "a", Some("1")),
                PredicateNode::and(
                    PredicateNode::compare(ComparisonOp::Eq, "b", Some("2")),
                    PredicateNode::compare(ComparisonOp::Eq, "c", Some("3")),
                ),
            )
        );
    }

    #[test]
    fn test_single_operand_and_is_invalid() {
        let err = parse(
            "<ogc:Or><ogc:PropertyIsEqualTo><ogc:PropertyName>a</ogc:PropertyName><ogc:Literal>1</ogc:Literal></ogc:PropertyIsEqualTo></ogc:Or>",
        );
        assert_eq!(err, Err(ParseError::Invalid("Or".into())));
        assert_eq!(parse("<ogc:Not/>"), Err(ParseError::Invalid("Not".into())));
    }

    #[test]
    fn test_between() {
        let tree = parse(
            "<ogc:PropertyIsBetween><ogc:PropertyName>POP</ogc:PropertyName>\
               <ogc:LowerBoundary><ogc:Literal>10</ogc:Literal></ogc:LowerBoundary>\
               <ogc:UpperBoundary>20</ogc:UpperBoundary></ogc:PropertyIsBetween>",
        )
        .unwrap();
        match tree {
            PredicateNode::Comparison { op: ComparisonOp::Between, right, .. } => {
                assert_eq!(*right, PredicateNode::Boundary("10".into(), "20".into()))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_like_attributes() {
        let tree = parse(
            r##"<ogc:PropertyIsLike wildCard="*" singleChar="#" escapeChar="!"><ogc:PropertyName>NAME</ogc:PropertyName><ogc:Literal>AB*</ogc:Literal></ogc:PropertyIsLike>"##,
        )
        .unwrap();
        match tree {
            PredicateNode::Comparison { like: Some(like), .. } => {
                assert_eq!(like.escape, "!");
                assert!(!like.case_insensitive);
            }
            other => panic!("unexpected {other:?}"),
        }
        let missing = parse(
            r##"<ogc:PropertyIsLike wildCard="*" singleChar="#"><ogc:PropertyName>NAME</ogc:PropertyName><ogc:Literal>AB*</ogc:Literal></ogc:PropertyIsLike>"##,
        );
        assert_eq!(missing, Err(ParseError::Invalid("PropertyIsLike".into())));
    }

    #[test]
    fn test_bbox_box_and_envelope() {
        let tree = parse(
            r#"<ogc:BBOX><ogc:PropertyName>Geometry</ogc:PropertyName><gml:Box srsName="EPSG:4326"><gml:coordinates>0,0 10,10</gml:coordinates></gml:Box></ogc:BBOX>"#,
        )
        .unwrap();
        assert_eq!(tree, PredicateNode::bbox("Geometry", Rect::new(0.0, 0.0, 10.0, 10.0), Some("EPSG:4326")));

        let tree = parse(
            r#"<ogc:BBOX><ogc:PropertyName>Geometry</ogc:PropertyName><gml:Envelope srsName="urn:ogc:def:crs:EPSG::4326"><gml:lowerCorner>1 2</gml:lowerCorner><gml:upperCorner>3 4</gml:upperCorner></gml:Envelope></ogc:BBOX>"#,
        )
        .unwrap();
        assert_eq!(
            tree,
            PredicateNode::bbox("Geometry", Rect::new(2.0, 1.0, 4.0, 3.0), Some("urn:ogc:def:crs:EPSG::4326"))
        );
    }

    #[test]
    fn test_bbox_bad_coordinates() {
        let err = parse(
            "<ogc:BBOX><ogc:PropertyName>G</ogc:PropertyName><gml:Box><gml:coordinates>0,0</gml:coordinates></gml:Box></ogc:BBOX>",
        );
        assert_eq!(err, Err(ParseError::Invalid("BBOX".into())));
    }

    #[test]
    fn test_dwithin_distance() {
        let tree = parse(
            r#"<ogc:DWithin><ogc:PropertyName>G</ogc:PropertyName><gml:Point><gml:coordinates>1,2</gml:coordinates></gml:Point><ogc:Distance units="http://www.opengis.net/gml/uom#km">5</ogc:Distance></ogc:DWithin>"#,
        )
        .unwrap();
        match tree {
            PredicateNode::Spatial { op: SpatialOp::DWithin, right, .. } => match *right {
                PredicateNode::GeometryLiteral { shape, distance: Some(d), .. } => {
                    assert_eq!(shape, Shape::Point(Point::new(1.0, 2.0)));
                    assert_eq!(d.value, 5.0);
                    assert_eq!(d.unit, Some(DistanceUnit::Kilometers));
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }

        let tree = parse(
            r#"<ogc:Beyond><ogc:PropertyName>G</ogc:PropertyName><gml:Point><gml:pos>1 2</gml:pos></gml:Point><ogc:Distance uom="m">abc</ogc:Distance></ogc:Beyond>"#,
        )
        .unwrap();
        match tree {
            PredicateNode::Spatial { right, .. } => match *right {
                PredicateNode::GeometryLiteral { distance: Some(d), .. } => {
                    assert_eq!(d.value, 0.0);
                    assert_eq!(d.unit, Some(DistanceUnit::Meters));
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dwithin_without_distance_is_invalid() {
        let err = parse("<ogc:DWithin><ogc:PropertyName>G</ogc:PropertyName><gml:Point><gml:pos>1 2</gml:pos></gml:Point></ogc:DWithin>");
        assert_eq!(err, Err(ParseError::Invalid("DWithin".into())));
    }

    #[test]
    fn test_intersect_fe10_spelling() {
        let tree = parse(
            "<ogc:Intersect><ogc:PropertyName>G</ogc:PropertyName><gml:LineString><gml:coordinates>0,0 1,1</gml:coordinates></gml:LineString></ogc:Intersect>",
        )
        .unwrap();
        assert_eq!(tree.tag(), "Intersects");
    }

    #[test]
    fn test_feature_id_siblings() {
        let tree = parse(r#"<ogc:FeatureId fid="Roads.12"/><ogc:FeatureId fid="Roads.13"/><ogc:GmlObjectId gml:id="Roads.14"/>"#).unwrap();
        assert_eq!(tree, PredicateNode::FeatureId(vec!["Roads.12".into(), "Roads.13".into(), "Roads.14".into()]));
        let tree = parse(r#"<fes:ResourceId xmlns:fes="f" rid="r.1"/>"#).unwrap();
        assert_eq!(tree, PredicateNode::FeatureId(vec!["r.1".into()]));
        assert_eq!(parse("<ogc:FeatureId/>"), Err(ParseError::Invalid("FeatureId".into())));
    }

    #[test]
    fn test_first_supported_child_wins() {
        let tree = parse(
            "<ogc:Foo/><ogc:PropertyIsEqualTo><ogc:PropertyName>a</ogc:PropertyName><ogc:Literal>1</ogc:Literal></ogc:PropertyIsEqualTo>\
             <ogc:PropertyIsEqualTo><ogc:PropertyName>b</ogc:PropertyName><ogc:Literal>2</ogc:Literal></ogc:PropertyIsEqualTo>",
        )
        .unwrap();
        assert_eq!(tree, PredicateNode::compare(ComparisonOp::Eq, "a", Some("1")));
    }

    #[test]
    fn test_split_filters() {
        let parts = split_filters("(<Filter><A x=\")\"/></Filter>)(<Filter>b)</Filter>)");
        assert_eq!(parts, vec!["<Filter><A x=\")\"/></Filter>".to_string(), "<Filter>b)</Filter>".to_string()]);
        assert!(split_filters("<Filter/>").is_empty());
        assert_eq!(split_filters("(<Filter/>)"), vec!["<Filter/>".to_string()]);
    }
}
