//! ogcfilter: OGC Filter Encoding parsing and multi-dialect compilation.
//!
//! A `<Filter>` document arriving with a WFS request is parsed into a
//! [`PredicateNode`] tree, checked, and compiled into the expression language
//! of whatever backend stores the target layer.
//!
//! # Architecture
//! - Predicate tree (AST) and leaf value types
//! - XML front end with GML geometry and CRS resolution
//! - Tree classification (BBOX fast path, simple filters)
//! - Three compiler backends: Mapserver, SQL and Common dialects
//! - Feature id resolution
//! - Dispatch of a tree to a layer, producing a query [`Plan`]
//!
//! Schema lookups and geometry math are capabilities supplied by the caller
//! through [`SchemaOracle`] and [`GeometryOps`].

mod types;
mod expr;
mod gml;
mod parser;
mod validate;
mod schema;
mod geometry;
mod compiler;
mod mapserver;
mod sql;
mod common;
mod featureid;
mod filter;
mod dispatch;

pub use types::*;
pub use expr::*;
pub use gml::*;
pub use parser::*;
pub use validate::*;
pub use schema::*;
pub use geometry::*;
pub use compiler::*;
pub use mapserver::*;
pub use sql::*;
pub use common::*;
pub use featureid::*;
pub use filter::*;
pub use dispatch::*;

use thiserror::Error;

/// Rejection of a filter document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(String),
    #[error("no Filter element found")]
    MissingFilter,
    #[error("unsupported filter: {0}")]
    Unsupported(String),
    #[error("invalid filter: {0}")]
    Invalid(String),
    #[error("GML error: {0}")]
    Gml(String),
    #[error("unrecognized CRS reference: {0}")]
    Crs(String),
}

/// Unrecoverable compilation failure.
///
/// A predicate a dialect cannot express is not an error; compilers return
/// `Ok(None)` for it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("character {0:?} is not allowed as an escape character")]
    UnsafeEscapeChar(char),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("geometry error: {0}")]
    Geometry(String),
}

/// Unified error type for ogcfilter operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("feature id error: {0}")]
    FeatureId(String),
    #[error("operand '{0}' is invalid in comparison")]
    InvalidOperand(String),
    #[error("property '{0}' is unknown")]
    UnknownProperty(String),
    #[error("feature id {id} not consistent with feature type name {layer}")]
    InconsistentFeatureId { id: String, layer: String },
}
