//! Schema module: what the compilers may ask about a target layer.
//!
//! This module provides the SchemaOracle capability and LayerSchema, a
//! metadata-backed implementation assembled with LayerSchemaBuilder.

use crate::types::{DistanceUnit, FieldType};
use std::collections::HashMap;
use serde::{Serialize, Deserialize};

/// Storage behind a layer; picks the compiler dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConnectionKind {
    Local,
    PostGis,
    OracleSpatial,
    Ogr,
    /// Plugin source that accepts SQL (e.g. MSSQL).
    SqlPlugin,
    Plugin,
    Wfs,
    Other,
}

impl ConnectionKind {
    pub fn is_sql_capable(self) -> bool {
        matches!(
            self,
            ConnectionKind::PostGis | ConnectionKind::OracleSpatial | ConnectionKind::Ogr | ConnectionKind::SqlPlugin
        )
    }
}

/// Read-only view of a layer's schema and storage conventions.
pub trait SchemaOracle {
    fn layer_name(&self) -> &str;
    fn connection(&self) -> ConnectionKind;

    /// Declared type of an attribute, `None` when undeclared.
    fn attribute_type(&self, name: &str) -> Option<FieldType>;
    /// Whether `name` is a visible attribute (case-insensitive).
    fn has_attribute(&self, name: &str) -> bool;
    fn featureid_attribute(&self) -> Option<&str>;

    /// Quotes an attribute name for SQL, doubling embedded `"`.
    fn escape_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Escapes a value for use inside a single-quoted SQL literal.
    fn escape_sql_literal(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// Escapes a value for use inside a quoted expression string.
    fn escape_string(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            if matches!(c, '\\' | '"' | '\'') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn supports_geos(&self) -> bool {
        false
    }
    fn layer_crs(&self) -> Option<&str> {
        None
    }
    fn map_crs(&self) -> Option<&str> {
        None
    }
    fn layer_units(&self) -> Option<DistanceUnit> {
        None
    }

    /// Attribute name behind a published alias (case-insensitive).
    fn resolve_alias(&self, _alias: &str) -> Option<String> {
        None
    }
    fn groups(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Layer metadata as published to OGC clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct LayerSchema {
    name: String,
    connection: ConnectionKind,
    geos: bool,
    fields: HashMap<String, FieldType>,
    items: Vec<String>, // visible attributes, declaration order
    aliases: HashMap<String, String>, // alias -> attribute
    groups: Vec<String>,
    featureid: Option<String>,
    layer_crs: Option<String>,
    map_crs: Option<String>,
    units: Option<DistanceUnit>,
}

impl LayerSchema {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn items(&self) -> &[String] {
        &self.items
    }
    pub fn fields(&self) -> &HashMap<String, FieldType> {
        &self.fields
    }
}

impl SchemaOracle for LayerSchema {
    fn layer_name(&self) -> &str {
        &self.name
    }

    fn connection(&self) -> ConnectionKind {
        self.connection
    }

    fn attribute_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).cloned().or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        })
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.items.iter().any(|i| i.eq_ignore_ascii_case(name))
    }

    fn featureid_attribute(&self) -> Option<&str> {
        self.featureid.as_deref()
    }

    fn supports_geos(&self) -> bool {
        self.geos
    }

    fn layer_crs(&self) -> Option<&str> {
        self.layer_crs.as_deref()
    }

    fn map_crs(&self) -> Option<&str> {
        self.map_crs.as_deref()
    }

    fn layer_units(&self) -> Option<DistanceUnit> {
        self.units
    }

    fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.aliases
            .iter()
            .find(|(a, _)| a.eq_ignore_ascii_case(alias))
            .map(|(_, item)| item.clone())
    }

    fn groups(&self) -> Vec<String> {
        self.groups.clone()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LayerSchemaBuilder {
    name: String,
    connection: ConnectionKind,
    geos: bool,
    fields: HashMap<String, FieldType>,
    items: Vec<String>,
    aliases: HashMap<String, String>,
    groups: Vec<String>,
    featureid: Option<String>,
    layer_crs: Option<String>,
    map_crs: Option<String>,
    units: Option<DistanceUnit>,
}

impl LayerSchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection: ConnectionKind::Local,
            geos: false,
            fields: HashMap::new(),
            items: Vec::new(),
            aliases: HashMap::new(),
            groups: Vec::new(),
            featureid: None,
            layer_crs: None,
            map_crs: None,
            units: None,
        }
    }

    pub fn connection(mut self, kind: ConnectionKind) -> Self {
        self.connection = kind;
        self
    }

    pub fn geos(mut self, enabled: bool) -> Self {
        self.geos = enabled;
        self
    }

    /// Declares a visible attribute with its published type.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        if !self.items.contains(&name) {
            self.items.push(name.clone());
        }
        self.fields.insert(name, ty);
        self
    }

    /// Declares a visible attribute without a published type.
    pub fn item(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.items.contains(&name) {
            self.items.push(name);
        }
        self
    }

    pub fn alias(mut self, item: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), item.into());
        self
    }

    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.groups.push(name.into());
        self
    }

    pub fn featureid(mut self, attribute: impl Into<String>) -> Self {
        self.featureid = Some(attribute.into());
        self
    }

    pub fn layer_crs(mut self, crs: impl Into<String>) -> Self {
        self.layer_crs = Some(crs.into());
        self
    }

    pub fn map_crs(mut self, crs: impl Into<String>) -> Self {
        self.map_crs = Some(crs.into());
        self
    }

    pub fn units(mut self, units: DistanceUnit) -> Self {
        self.units = Some(units);
        self
    }

    pub fn build(self) -> LayerSchema {
        LayerSchema {
            name: self.name,
            connection: self.connection,
            geos: self.geos,
            fields: self.fields,
            items: self.items,
            aliases: self.aliases,
            groups: self.groups,
            featureid: self.featureid,
            layer_crs: self.layer_crs,
            map_crs: self.map_crs,
            units: self.units,
        }
    }
}
