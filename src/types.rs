//! Types module: leaf value types shared by the parser and the compilers.
//!
//! This module provides declared attribute types, rectangles, 2D shapes,
//! distance units and the numeric inference rule used by every dialect.

use geo::{BoundingRect, MapCoordsInPlace};
use geo_types::{Geometry, LineString, Polygon};
use serde::{Serialize, Deserialize};
use wkt::ToWkt;

/// Declared type of a layer attribute, as published in layer metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FieldType {
    Character,
    Date,
    Numeric,
    Other(String),
}

impl FieldType {
    /// Maps a metadata type name (`Character`, `Integer`, `Date`, ...) to a type.
    pub fn from_metadata(name: &str) -> FieldType {
        match name.to_ascii_lowercase().as_str() {
            "character" | "string" => FieldType::Character,
            "date" | "datetime" | "time" => FieldType::Date,
            "integer" | "long" | "real" | "double" | "float" | "numeric" => FieldType::Numeric,
            _ => FieldType::Other(name.to_string()),
        }
    }

    pub fn is_character(&self) -> bool {
        matches!(self, FieldType::Character)
    }
}

/// True when `value` is a complete number in the `strtod` sense: non-empty,
/// no leading whitespace, and fully consumed.
pub fn is_numeric(value: &str) -> bool {
    let first = match value.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if first.is_whitespace() {
        return false;
    }
    if value.parse::<f64>().is_ok() {
        return true;
    }
    // strtod also reads hexadecimal integers
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    match unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// True when `value` is a plain decimal number (`12`, `-3.5`, `.5`, `1e3`).
///
/// Stricter than [`is_numeric`]: `inf`, `nan` and hexadecimal forms are not
/// accepted.
pub fn is_decimal(value: &str) -> bool {
    !value.is_empty() && decimal_prefix_len(value) == value.len()
}

/// Byte length of the longest decimal number at the start of `text`.
fn decimal_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i = 1;
    }
    let int_end = digits_from(i);
    let mut end = int_end;
    let mut seen_digit = int_end > i;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if seen_digit || frac_end > end + 1 {
            seen_digit = true;
            end = frac_end;
        }
    }
    if !seen_digit {
        return 0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    end
}

/// Parses the longest numeric prefix of `text`, `0.0` when there is none.
pub(crate) fn leading_f64(text: &str) -> f64 {
    let trimmed = text.trim_start();
    trimmed[..decimal_prefix_len(trimmed)].parse().unwrap_or(0.0)
}

/// Planar position.
pub type Coord = geo_types::Coord<f64>;

/// Two dimensional geometry carried by a spatial predicate.
pub type Shape = Geometry<f64>;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Rect {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self { minx, miny, maxx, maxy }
    }

    /// Closed five point ring, clockwise from the lower left corner.
    pub fn to_polygon(&self) -> Shape {
        let ring = LineString::from(vec![
            (self.minx, self.miny),
            (self.minx, self.maxy),
            (self.maxx, self.maxy),
            (self.maxx, self.miny),
            (self.minx, self.miny),
        ]);
        Shape::Polygon(Polygon::new(ring, Vec::new()))
    }

    /// True for the -180,-90,180,90 longitude/latitude extent.
    pub fn is_world_extent(&self) -> bool {
        (self.minx + 180.0).abs() < 1e-5
            && (self.miny + 90.0).abs() < 1e-5
            && (self.maxx - 180.0).abs() < 1e-5
            && (self.maxy - 90.0).abs() < 1e-5
    }

    pub fn swap_axes(&mut self) {
        std::mem::swap(&mut self.minx, &mut self.miny);
        std::mem::swap(&mut self.maxx, &mut self.maxy);
    }
}

impl From<geo_types::Rect<f64>> for Rect {
    fn from(rect: geo_types::Rect<f64>) -> Self {
        Rect::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Coarse geometry class of a spatial literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Point,
    Line,
    Polygon,
}

/// Multi geometries report the kind of their members; an empty collection
/// has none.
pub fn shape_kind(shape: &Shape) -> Option<ShapeKind> {
    match shape {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Some(ShapeKind::Point),
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(ShapeKind::Line),
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
            Some(ShapeKind::Polygon)
        }
        Geometry::GeometryCollection(members) => members.0.first().and_then(shape_kind),
    }
}

/// Exchanges x and y of every position, for latitude-first CRS axes.
pub fn swap_shape_axes(shape: &mut Shape) {
    shape.map_coords_in_place(|c| Coord { x: c.y, y: c.x });
}

pub fn shape_bounds(shape: &Shape) -> Option<Rect> {
    shape.bounding_rect().map(Rect::from)
}

/// Well-known text, e.g. `POLYGON((0 0,0 1,1 1,1 0,0 0))`.
pub fn shape_to_wkt(shape: &Shape) -> String {
    shape.wkt_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    NauticalMiles,
    Miles,
    Inches,
    Feet,
    DecimalDegrees,
    Pixels,
}

impl DistanceUnit {
    /// Resolves a `Distance` unit token, either bare (`m`) or `URI#m`.
    pub fn from_token(token: &str) -> Option<DistanceUnit> {
        let unit = token.rsplit('#').next().unwrap_or(token);
        match unit.to_ascii_lowercase().as_str() {
            "m" | "meters" => Some(DistanceUnit::Meters),
            "km" | "kilometers" => Some(DistanceUnit::Kilometers),
            "nm" | "nauticalmiles" => Some(DistanceUnit::NauticalMiles),
            "mi" | "miles" => Some(DistanceUnit::Miles),
            "in" | "inches" => Some(DistanceUnit::Inches),
            "ft" | "feet" => Some(DistanceUnit::Feet),
            "deg" | "dd" => Some(DistanceUnit::DecimalDegrees),
            "px" => Some(DistanceUnit::Pixels),
            _ => None,
        }
    }

    /// Conversion factor to inches; degrees are measured at the equator.
    pub fn inches_per_unit(self) -> f64 {
        match self {
            DistanceUnit::Inches => 1.0,
            DistanceUnit::Feet => 12.0,
            DistanceUnit::Miles => 63360.0,
            DistanceUnit::Meters => 39.3701,
            DistanceUnit::Kilometers => 39370.1,
            DistanceUnit::DecimalDegrees => 4374754.0,
            DistanceUnit::Pixels => 1.0,
            DistanceUnit::NauticalMiles => 72913.3858,
        }
    }
}

/// Buffer distance of a `DWithin`/`Beyond` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub value: f64,
    pub unit: Option<DistanceUnit>,
}

impl Distance {
    /// Builds a distance from the element text and its `units`/`uom` attribute.
    pub fn from_parts(text: &str, units: Option<&str>) -> Distance {
        Distance {
            value: leading_f64(text),
            unit: units.and_then(DistanceUnit::from_token),
        }
    }

    /// Distance expressed in `target` units; unchanged when either unit is unknown.
    pub fn in_units(&self, target: Option<DistanceUnit>, inches_per_unit: impl Fn(DistanceUnit) -> f64) -> f64 {
        match (self.unit, target) {
            (Some(from), Some(to)) if from != to => {
                self.value * inches_per_unit(from) / inches_per_unit(to)
            }
            _ => self.value,
        }
    }
}
