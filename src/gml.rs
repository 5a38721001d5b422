//! GML module: geometry literals and CRS references inside filter documents.
//!
//! Functions here take namespace-stripped `roxmltree` nodes, so element
//! names are matched on their local part only.

use crate::types::{leading_f64, swap_shape_axes, Coord, Rect, Shape};
use geo_types::{coord, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use crate::ParseError;
use roxmltree::Node;
use serde::{Serialize, Deserialize};

/// Spelling of a CRS reference; decides the axis order of geographic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrsForm {
    /// `EPSG:4326`
    Short,
    /// `urn:ogc:def:crs:EPSG:[version]:4326`
    Urn,
    /// `urn:EPSG:geographicCRS:4326`
    UrnGeographic,
    /// `http://www.opengis.net/gml/srs/epsg.xml#4326`
    EpsgXml,
    /// `http://www.opengis.net/def/crs/EPSG/0/4326`
    DefCrs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    pub code: u32,
    pub form: CrsForm,
}

impl Crs {
    /// Geographic codes in URN or `def/crs` form are latitude first.
    pub fn is_lat_first(&self) -> bool {
        matches!(self.form, CrsForm::Urn | CrsForm::UrnGeographic | CrsForm::DefCrs)
            && (4000..=4999).contains(&self.code)
    }

    pub fn epsg(&self) -> String {
        format!("EPSG:{}", self.code)
    }
}

/// Parses an `srsName` value.
pub fn parse_crs_reference(text: &str) -> Result<Crs, ParseError> {
    let trimmed = text.trim();
    let lower = trimmed.to_ascii_lowercase();
    let (form, code) = if let Some(rest) = lower.strip_prefix("epsg:") {
        (CrsForm::Short, rest)
    } else if let Some(rest) = lower.strip_prefix("urn:ogc:def:crs:epsg:") {
        // optional version segment before the code
        (CrsForm::Urn, rest.rsplit(':').next().unwrap_or(rest))
    } else if let Some(rest) = lower.strip_prefix("urn:epsg:geographiccrs:") {
        (CrsForm::UrnGeographic, rest)
    } else if let Some(rest) = lower.strip_prefix("http://www.opengis.net/gml/srs/epsg.xml#") {
        (CrsForm::EpsgXml, rest)
    } else if let Some(rest) = lower.strip_prefix("http://www.opengis.net/def/crs/epsg/0/") {
        (CrsForm::DefCrs, rest)
    } else if lower.ends_with("crs84") {
        (CrsForm::Short, "4326")
    } else {
        return Err(ParseError::Crs(trimmed.to_string()));
    };
    let code = code
        .parse::<u32>()
        .map_err(|_| ParseError::Crs(trimmed.to_string()))?;
    Ok(Crs { code, form })
}

fn srs_of(node: Node) -> Option<String> {
    node.attribute("srsName").map(str::to_string)
}

fn lat_first(srs: Option<&str>) -> bool {
    srs.and_then(|s| parse_crs_reference(s).ok())
        .map(|crs| crs.is_lat_first())
        .unwrap_or(false)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.is_element() && n.tag_name().name() == name)
}

fn descendant<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.descendants().skip(1).find(|n| n.is_element() && n.tag_name().name() == name)
}

fn descendants_named<'a, 'input>(node: Node<'a, 'input>, names: &'static [&'static str]) -> Vec<Node<'a, 'input>> {
    node.descendants()
        .skip(1)
        .filter(|n| n.is_element() && names.contains(&n.tag_name().name()))
        .collect()
}

fn text_of<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("").trim()
}

fn gml_err(msg: impl Into<String>) -> ParseError {
    ParseError::Gml(msg.into())
}

/// Tuples of a `coordinates` element, honoring its `ts` and `cs` separators.
fn parse_coordinates(node: Node) -> Result<Vec<Coord>, ParseError> {
    let ts = node.attribute("ts").filter(|s| !s.is_empty()).unwrap_or(" ");
    let cs = node.attribute("cs").filter(|s| !s.is_empty()).unwrap_or(",");
    let text = text_of(node);
    let mut coords = Vec::new();
    let tuples: Vec<&str> = if ts.trim().is_empty() {
        text.split_whitespace().collect()
    } else {
        text.split(ts).map(str::trim).filter(|t| !t.is_empty()).collect()
    };
    for tuple in tuples {
        let values: Vec<&str> = tuple.split(cs).map(str::trim).collect();
        if values.len() < 2 {
            return Err(gml_err(format!("bad coordinate tuple '{tuple}'")));
        }
        coords.push(coord! { x: leading_f64(values[0]), y: leading_f64(values[1]) });
    }
    if coords.is_empty() {
        return Err(gml_err("empty coordinates"));
    }
    Ok(coords)
}

/// A `coord` element with `X` and `Y` children.
fn parse_coord(node: Node) -> Result<Coord, ParseError> {
    let x = child(node, "X").ok_or_else(|| gml_err("coord without X"))?;
    let y = child(node, "Y").ok_or_else(|| gml_err("coord without Y"))?;
    Ok(coord! { x: leading_f64(text_of(x)), y: leading_f64(text_of(y)) })
}

fn parse_numbers(text: &str) -> Vec<f64> {
    text.split_whitespace().map(leading_f64).collect()
}

fn chunk_coords(values: &[f64], dimension: usize) -> Result<Vec<Coord>, ParseError> {
    if values.is_empty() || values.len() % dimension != 0 {
        return Err(gml_err(format!("{} values do not form {}D positions", values.len(), dimension)));
    }
    Ok(values.chunks(dimension).map(|c| coord! { x: c[0], y: c[1] }).collect())
}

/// Coordinates of a point, line or ring element from whichever encoding it uses.
fn collect_coords(node: Node, dimension: usize) -> Result<Vec<Coord>, ParseError> {
    if let Some(pos_list) = descendant(node, "posList") {
        let dim = pos_list
            .attribute("srsDimension")
            .and_then(|d| d.parse::<usize>().ok())
            .unwrap_or(dimension)
            .max(2);
        return chunk_coords(&parse_numbers(text_of(pos_list)), dim);
    }
    let positions = descendants_named(node, &["pos"]);
    if !positions.is_empty() {
        return positions
            .into_iter()
            .map(|pos| {
                let values = parse_numbers(text_of(pos));
                if values.len() < 2 {
                    return Err(gml_err("pos needs two values"));
                }
                Ok(coord! { x: values[0], y: values[1] })
            })
            .collect();
    }
    if let Some(coordinates) = descendant(node, "coordinates") {
        return parse_coordinates(coordinates);
    }
    let coords = descendants_named(node, &["coord"]);
    if !coords.is_empty() {
        return coords.into_iter().map(parse_coord).collect();
    }
    Err(gml_err(format!("{} has no coordinates", node.tag_name().name())))
}

/// Exterior ring first, then holes.
fn collect_polygon(node: Node, dimension: usize) -> Result<Polygon<f64>, ParseError> {
    let mut rings = descendants_named(node, &["LinearRing"])
        .into_iter()
        .map(|r| collect_coords(r, dimension).map(LineString::new))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| gml_err(format!("{} has no LinearRing", node.tag_name().name())))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Parses an FE 1.0 `gml:Box`.
pub fn parse_gml_box(node: Node) -> Result<(Rect, Option<String>), ParseError> {
    let srs = srs_of(node);
    let corners = if let Some(coordinates) = child(node, "coordinates") {
        let ts = coordinates.attribute("ts").filter(|s| !s.is_empty()).unwrap_or(" ");
        let cs = coordinates.attribute("cs").filter(|s| !s.is_empty()).unwrap_or(",");
        let text = text_of(coordinates);
        let tuples: Vec<&str> = if ts.trim().is_empty() {
            text.split_whitespace().collect()
        } else {
            text.split(ts).map(str::trim).filter(|t| !t.is_empty()).collect()
        };
        if tuples.len() != 2 {
            return Err(gml_err("Box coordinates need exactly two tuples"));
        }
        let mut corners = Vec::with_capacity(2);
        for tuple in tuples {
            let values: Vec<&str> = tuple.split(cs).collect();
            if values.len() != 2 {
                return Err(gml_err(format!("bad Box tuple '{tuple}'")));
            }
            corners.push(coord! { x: leading_f64(values[0]), y: leading_f64(values[1]) });
        }
        corners
    } else {
        let coords: Vec<Node> = node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "coord")
            .collect();
        if coords.len() != 2 {
            return Err(gml_err("Box needs coordinates or two coord elements"));
        }
        coords.into_iter().map(parse_coord).collect::<Result<Vec<_>, _>>()?
    };
    let rect = Rect::new(corners[0].x, corners[0].y, corners[1].x, corners[1].y);
    Ok((rect, srs))
}

/// Parses a GML 3 `Envelope`, normalizing latitude-first axis order.
pub fn parse_gml_envelope(node: Node) -> Result<(Rect, Option<String>), ParseError> {
    let srs = srs_of(node);
    let lower = descendant(node, "lowerCorner").ok_or_else(|| gml_err("Envelope without lowerCorner"))?;
    let upper = descendant(node, "upperCorner").ok_or_else(|| gml_err("Envelope without upperCorner"))?;
    let lo = parse_numbers(text_of(lower));
    let hi = parse_numbers(text_of(upper));
    if lo.len() < 2 || hi.len() < 2 {
        return Err(gml_err("Envelope corners need two values"));
    }
    let mut rect = Rect::new(lo[0], lo[1], hi[0], hi[1]);
    if lat_first(srs.as_deref()) {
        rect.swap_axes();
    }
    Ok((rect, srs))
}

/// Parses a GML geometry element into a 2D shape.
pub fn parse_gml_geometry(node: Node) -> Result<(Shape, Option<String>), ParseError> {
    let mut srs = srs_of(node);
    let dimension = node
        .attribute("srsDimension")
        .and_then(|d| d.parse::<usize>().ok())
        .unwrap_or(2)
        .max(2);
    let name = node.tag_name().name();
    let mut shape = match name {
        "Point" | "PointType" => {
            let coords = collect_coords(node, dimension)?;
            Shape::Point(Point::from(coords[0]))
        }
        "LineString" | "Curve" => Shape::LineString(LineString::new(collect_coords(node, dimension)?)),
        "Polygon" | "Surface" => Shape::Polygon(collect_polygon(node, dimension)?),
        "MultiPoint" => {
            let points = descendants_named(node, &["Point"]);
            if points.is_empty() {
                return Err(gml_err("MultiPoint without members"));
            }
            let coords = points
                .into_iter()
                .map(|p| collect_coords(p, dimension).map(|c| Point::from(c[0])))
                .collect::<Result<Vec<_>, _>>()?;
            Shape::MultiPoint(MultiPoint::new(coords))
        }
        "MultiLineString" | "MultiCurve" => {
            let lines = descendants_named(node, &["LineString", "LineStringSegment"]);
            if lines.is_empty() {
                return Err(gml_err(format!("{name} without members")));
            }
            let lines = lines
                .into_iter()
                .map(|l| collect_coords(l, dimension).map(LineString::new))
                .collect::<Result<Vec<_>, _>>()?;
            Shape::MultiLineString(MultiLineString::new(lines))
        }
        "MultiPolygon" | "MultiSurface" => {
            let polygons = descendants_named(node, &["Polygon", "PolygonPatch"]);
            if polygons.is_empty() {
                return Err(gml_err(format!("{name} without members")));
            }
            let polygons = polygons
                .into_iter()
                .map(|p| collect_polygon(p, dimension))
                .collect::<Result<Vec<_>, _>>()?;
            Shape::MultiPolygon(MultiPolygon::new(polygons))
        }
        "Box" => {
            let (rect, box_srs) = parse_gml_box(node)?;
            return Ok((rect.to_polygon(), box_srs));
        }
        "Envelope" => {
            let (rect, env_srs) = parse_gml_envelope(node)?;
            return Ok((rect.to_polygon(), env_srs));
        }
        other => return Err(gml_err(format!("unsupported geometry {other}"))),
    };
    if srs.is_none() {
        // members may carry the srsName instead of the collection
        srs = node
            .descendants()
            .find_map(|n| n.attribute("srsName"))
            .map(str::to_string);
    }
    if lat_first(srs.as_deref()) {
        swap_shape_axes(&mut shape);
    }
    Ok((shape, srs))
}
