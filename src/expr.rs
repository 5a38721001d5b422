//! Expression (AST) module: the parsed representation of a Filter Encoding document.
//!
//! This module provides the PredicateNode tree and its operator taxonomy.

use crate::types::{shape_kind, Distance, Rect, Shape, ShapeKind};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PredicateNode {
    /// `Not` has no right child, `And`/`Or` always have one.
    Logical {
        op: LogicalOp,
        left: Box<PredicateNode>,
        right: Option<Box<PredicateNode>>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<PredicateNode>,
        right: Box<PredicateNode>,
        like: Option<LikeOptions>,
    },
    Spatial {
        op: SpatialOp,
        left: Box<PredicateNode>,
        right: Box<PredicateNode>,
    },
    PropertyName(String),
    Literal {
        value: Option<String>,
        case_insensitive: bool,
    },
    Boundary(String, String),
    BBoxLiteral {
        rect: Rect,
        srs: Option<String>,
    },
    GeometryLiteral {
        shape: Shape,
        srs: Option<String>,
        distance: Option<Distance>,
    },
    /// Raw `typename.id` tokens.
    FeatureId(Vec<String>),
    /// A recognized element that could not be built; names the element.
    Undefined(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpatialOp {
    Bbox,
    Intersects,
    Equals,
    Disjoint,
    Touches,
    Crosses,
    Within,
    Contains,
    Overlaps,
    Beyond,
    DWithin,
}

/// `PropertyIsLike` pattern metacharacters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeOptions {
    pub wildcard: String,
    pub single_char: String,
    pub escape: String,
    pub case_insensitive: bool,
}

impl LikeOptions {
    /// First character of each metacharacter, `None` when any is empty.
    pub fn chars(&self) -> Option<(char, char, char)> {
        Some((
            self.wildcard.chars().next()?,
            self.single_char.chars().next()?,
            self.escape.chars().next()?,
        ))
    }

    /// Compiles `pattern` into an anchored regex for in-process matching.
    #[cfg(feature = "regex")]
    pub fn to_regex(&self, pattern: &str) -> Result<regex::Regex, regex::Error> {
        let (wild, single, escape) = self
            .chars()
            .ok_or_else(|| regex::Error::Syntax("empty like metacharacter".into()))?;
        let mut re = String::from(if self.case_insensitive { "(?i)^" } else { "^" });
        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c == escape {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            } else if c == wild {
                re.push_str(".*");
            } else if c == single {
                re.push('.');
            } else {
                re.push_str(&regex::escape(&c.to_string()));
            }
        }
        re.push('$');
        regex::Regex::new(&re)
    }
}

impl LogicalOp {
    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
            LogicalOp::Not => "NOT",
        }
    }
}

impl ComparisonOp {
    pub fn from_tag(tag: &str) -> Option<ComparisonOp> {
        Some(match tag {
            "PropertyIsEqualTo" => ComparisonOp::Eq,
            "PropertyIsNotEqualTo" => ComparisonOp::Ne,
            "PropertyIsLessThan" => ComparisonOp::Lt,
            "PropertyIsGreaterThan" => ComparisonOp::Gt,
            "PropertyIsLessThanOrEqualTo" => ComparisonOp::Le,
            "PropertyIsGreaterThanOrEqualTo" => ComparisonOp::Ge,
            "PropertyIsLike" => ComparisonOp::Like,
            "PropertyIsBetween" => ComparisonOp::Between,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "PropertyIsEqualTo",
            ComparisonOp::Ne => "PropertyIsNotEqualTo",
            ComparisonOp::Lt => "PropertyIsLessThan",
            ComparisonOp::Gt => "PropertyIsGreaterThan",
            ComparisonOp::Le => "PropertyIsLessThanOrEqualTo",
            ComparisonOp::Ge => "PropertyIsGreaterThanOrEqualTo",
            ComparisonOp::Like => "PropertyIsLike",
            ComparisonOp::Between => "PropertyIsBetween",
        }
    }

    pub fn is_binary(self) -> bool {
        !matches!(self, ComparisonOp::Like | ComparisonOp::Between)
    }
}

impl SpatialOp {
    pub fn from_tag(tag: &str) -> Option<SpatialOp> {
        Some(match tag {
            "BBOX" => SpatialOp::Bbox,
            "Intersects" | "Intersect" => SpatialOp::Intersects,
            "Equals" => SpatialOp::Equals,
            "Disjoint" => SpatialOp::Disjoint,
            "Touches" => SpatialOp::Touches,
            "Crosses" => SpatialOp::Crosses,
            "Within" => SpatialOp::Within,
            "Contains" => SpatialOp::Contains,
            "Overlaps" => SpatialOp::Overlaps,
            "Beyond" => SpatialOp::Beyond,
            "DWithin" => SpatialOp::DWithin,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            SpatialOp::Bbox => "BBOX",
            SpatialOp::Intersects => "Intersects",
            SpatialOp::Equals => "Equals",
            SpatialOp::Disjoint => "Disjoint",
            SpatialOp::Touches => "Touches",
            SpatialOp::Crosses => "Crosses",
            SpatialOp::Within => "Within",
            SpatialOp::Contains => "Contains",
            SpatialOp::Overlaps => "Overlaps",
            SpatialOp::Beyond => "Beyond",
            SpatialOp::DWithin => "DWithin",
        }
    }

    pub fn is_distance(self) -> bool {
        matches!(self, SpatialOp::Beyond | SpatialOp::DWithin)
    }
}

impl PredicateNode {
    pub fn and(left: PredicateNode, right: PredicateNode) -> PredicateNode {
        PredicateNode::Logical { op: LogicalOp::And, left: Box::new(left), right: Some(Box::new(right)) }
    }

    pub fn or(left: PredicateNode, right: PredicateNode) -> PredicateNode {
        PredicateNode::Logical { op: LogicalOp::Or, left: Box::new(left), right: Some(Box::new(right)) }
    }

    pub fn not(inner: PredicateNode) -> PredicateNode {
        PredicateNode::Logical { op: LogicalOp::Not, left: Box::new(inner), right: None }
    }

    /// A binary comparison between a property and a literal value.
    pub fn compare(op: ComparisonOp, property: impl Into<String>, value: Option<&str>) -> PredicateNode {
        PredicateNode::Comparison {
            op,
            left: Box::new(PredicateNode::PropertyName(property.into())),
            right: Box::new(PredicateNode::Literal { value: value.map(str::to_string), case_insensitive: false }),
            like: None,
        }
    }

    pub fn bbox(property: impl Into<String>, rect: Rect, srs: Option<&str>) -> PredicateNode {
        PredicateNode::Spatial {
            op: SpatialOp::Bbox,
            left: Box::new(PredicateNode::PropertyName(property.into())),
            right: Box::new(PredicateNode::BBoxLiteral { rect, srs: srs.map(str::to_string) }),
        }
    }

    /// Filter Encoding element name of this node.
    pub fn tag(&self) -> &str {
        match self {
            PredicateNode::Logical { op, .. } => op.keyword(),
            PredicateNode::Comparison { op, .. } => op.tag(),
            PredicateNode::Spatial { op, .. } => op.tag(),
            PredicateNode::PropertyName(_) => "PropertyName",
            PredicateNode::Literal { .. } => "Literal",
            PredicateNode::Boundary(..) => "Boundary",
            PredicateNode::BBoxLiteral { .. } => "Box",
            PredicateNode::GeometryLiteral { .. } => "Geometry",
            PredicateNode::FeatureId(_) => "FeatureId",
            PredicateNode::Undefined(name) => name,
        }
    }

    pub fn left(&self) -> Option<&PredicateNode> {
        match self {
            PredicateNode::Logical { left, .. }
            | PredicateNode::Comparison { left, .. }
            | PredicateNode::Spatial { left, .. } => Some(left),
            _ => None,
        }
    }

    pub fn right(&self) -> Option<&PredicateNode> {
        match self {
            PredicateNode::Logical { right, .. } => right.as_deref(),
            PredicateNode::Comparison { right, .. } | PredicateNode::Spatial { right, .. } => Some(right),
            _ => None,
        }
    }

    pub fn is_bbox(&self) -> bool {
        matches!(self, PredicateNode::Spatial { op: SpatialOp::Bbox, .. })
    }

    /// Geometry class of a spatial node's literal.
    pub fn spatial_kind(&self) -> Option<ShapeKind> {
        match self {
            PredicateNode::Spatial { right, .. } => match right.as_ref() {
                PredicateNode::GeometryLiteral { shape, .. } => shape_kind(shape),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn accept<V: NodeVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit(self);
        if let Some(left) = self.left() {
            left.accept(visitor);
        }
        if let Some(right) = self.right() {
            right.accept(visitor);
        }
    }

    /// Rebuilds the tree bottom-up, letting `f` replace each node.
    pub fn map(self, f: &mut impl FnMut(PredicateNode) -> PredicateNode) -> PredicateNode {
        let node = match self {
            PredicateNode::Logical { op, left, right } => PredicateNode::Logical {
                op,
                left: Box::new(left.map(f)),
                right: right.map(|r| Box::new(r.map(f))),
            },
            PredicateNode::Comparison { op, left, right, like } => PredicateNode::Comparison {
                op,
                left: Box::new(left.map(f)),
                right: Box::new(right.map(f)),
                like,
            },
            PredicateNode::Spatial { op, left, right } => PredicateNode::Spatial {
                op,
                left: Box::new(left.map(f)),
                right: Box::new(right.map(f)),
            },
            leaf => leaf,
        };
        f(node)
    }
}

// Pre-order traversal hook over the tree
pub trait NodeVisitor {
    fn visit(&mut self, node: &PredicateNode);
}

/// Strips a `typename.` prefix from a feature id token.
pub fn strip_feature_type(token: &str) -> &str {
    match token.rfind('.') {
        Some(pos) => &token[pos + 1..],
        None => token,
    }
}
