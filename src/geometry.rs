//! # Geometry
//! Coverage polygons for point observations, date-stripped locations for
//! polygon observations, and the spatial region used by the event filter.
//!
//! Coordinates are GeoJSON order throughout: `[lon, lat]`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{GeometryError, RegionError};
use crate::feed::types::Geometry;

/// Sphere radius used by the destination-point formula.
pub const EARTH_RADIUS: f64 = 6378.1;
/// Radius of the synthesized coverage circle, same unit as [`EARTH_RADIUS`].
pub const COVERAGE_RADIUS: f64 = 2.0;
const BEARING_STEP_DEG: usize = 20;

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

/// Spatial envelope of a dataset: a geometry without its date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `(lon, lat)` of a point geometry. Exactly two finite numbers required.
pub fn point_coordinates(geometry: &Geometry) -> Result<Coord, GeometryError> {
    let arr = geometry
        .coordinates
        .as_array()
        .ok_or_else(|| GeometryError::malformed(&geometry.kind, "coordinates are not an array"))?;
    let [lon, lat] = arr.as_slice() else {
        return Err(GeometryError::malformed(
            &geometry.kind,
            format!("expected [lon, lat], got {} values", arr.len()),
        ));
    };
    match (lon.as_f64(), lat.as_f64()) {
        (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Ok(Coord { lon, lat }),
        _ => Err(GeometryError::malformed(
            &geometry.kind,
            "coordinates are not numbers",
        )),
    }
}

/// Destination reached from `origin` along `bearing_deg` after `distance`.
fn shift(origin: Coord, bearing_deg: f64, distance: f64) -> Coord {
    let bearing = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let d = distance / EARTH_RADIUS;

    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

    Coord {
        lon: lon2.to_degrees(),
        lat: lat2.to_degrees(),
    }
}

/// 19 vertices, bearings 0..=360 in 20° steps; first and last coincide.
pub fn coverage_ring(origin: Coord) -> Vec<Coord> {
    (0..=360u32)
        .step_by(BEARING_STEP_DEG)
        .map(|b| shift(origin, f64::from(b), COVERAGE_RADIUS))
        .collect()
}

/// Approximate circular coverage polygon around a point observation.
pub fn build_polygon(geometry: &Geometry) -> Result<Location, GeometryError> {
    let origin = point_coordinates(geometry)?;
    let ring: Vec<Value> = coverage_ring(origin)
        .into_iter()
        .map(|c| json!([c.lon, c.lat]))
        .collect();
    Ok(Location {
        kind: "polygon".to_string(),
        coordinates: json!([ring]),
        extra: Map::new(),
    })
}

/// The geometry minus its `date`, which only matters for transport.
pub fn normalize_polygon(geometry: &Geometry) -> Location {
    Location {
        kind: geometry.kind.clone(),
        coordinates: geometry.coordinates.clone(),
        extra: geometry.extra.clone(),
    }
}

pub fn location_for(geometry: &Geometry) -> Result<Location, GeometryError> {
    if geometry.is_point() {
        build_polygon(geometry)
    } else {
        Ok(normalize_polygon(geometry))
    }
}

// ---- shapes -----------------------------------------------------------------

/// Polygon as rings: exterior first, then holes. Every ring is closed.
type Rings = Vec<Vec<Coord>>;

enum Shape {
    Point(Coord),
    Polygons(Vec<Rings>),
}

fn parse_position(v: &Value) -> Option<Coord> {
    let arr = v.as_array()?;
    // GeoJSON positions may carry an altitude; only lon/lat matter here.
    let lon = arr.first()?.as_f64()?;
    let lat = arr.get(1)?.as_f64()?;
    (lon.is_finite() && lat.is_finite()).then_some(Coord { lon, lat })
}

fn parse_ring(v: &Value) -> Option<Vec<Coord>> {
    let mut ring = v
        .as_array()?
        .iter()
        .map(parse_position)
        .collect::<Option<Vec<_>>>()?;
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    Some(ring)
}

fn parse_rings(v: &Value) -> Option<Rings> {
    v.as_array()?.iter().map(parse_ring).collect()
}

fn shape_of(geometry: &Geometry) -> Result<Shape, GeometryError> {
    let kind = geometry.kind.to_ascii_lowercase();
    match kind.as_str() {
        "point" => point_coordinates(geometry).map(Shape::Point),
        "polygon" => parse_rings(&geometry.coordinates)
            .filter(|rings| !rings.is_empty())
            .map(|rings| Shape::Polygons(vec![rings]))
            .ok_or_else(|| GeometryError::malformed(&geometry.kind, "bad polygon rings")),
        "multipolygon" => geometry
            .coordinates
            .as_array()
            .and_then(|polys| polys.iter().map(parse_rings).collect::<Option<Vec<_>>>())
            .map(Shape::Polygons)
            .ok_or_else(|| GeometryError::malformed(&geometry.kind, "bad multipolygon rings")),
        _ => Err(GeometryError::Unsupported(geometry.kind.clone())),
    }
}

fn cross(o: Coord, a: Coord, b: Coord) -> f64 {
    (a.lon - o.lon) * (b.lat - o.lat) - (a.lat - o.lat) * (b.lon - o.lon)
}

fn within_box(p: Coord, a: Coord, b: Coord) -> bool {
    p.lon >= a.lon.min(b.lon) - EPS
        && p.lon <= a.lon.max(b.lon) + EPS
        && p.lat >= a.lat.min(b.lat) - EPS
        && p.lat <= a.lat.max(b.lat) + EPS
}

fn on_segment(p: Coord, a: Coord, b: Coord) -> bool {
    cross(a, b, p).abs() <= EPS && within_box(p, a, b)
}

fn segments_intersect(a1: Coord, a2: Coord, b1: Coord, b2: Coord) -> bool {
    let d1 = cross(b1, b2, a1);
    let d2 = cross(b1, b2, a2);
    let d3 = cross(a1, a2, b1);
    let d4 = cross(a1, a2, b2);

    if ((d1 > EPS && d2 < -EPS) || (d1 < -EPS && d2 > EPS))
        && ((d3 > EPS && d4 < -EPS) || (d3 < -EPS && d4 > EPS))
    {
        return true;
    }
    on_segment(a1, b1, b2)
        || on_segment(a2, b1, b2)
        || on_segment(b1, a1, a2)
        || on_segment(b2, a1, a2)
}

fn edges(ring: &[Coord]) -> impl Iterator<Item = (Coord, Coord)> + '_ {
    ring.windows(2).filter_map(|w| match w {
        [a, b] => Some((*a, *b)),
        _ => None,
    })
}

fn on_ring(ring: &[Coord], p: Coord) -> bool {
    edges(ring).any(|(a, b)| on_segment(p, a, b))
}

/// Even-odd ray cast; boundary points are handled by the caller.
fn inside_ring(ring: &[Coord], p: Coord) -> bool {
    let mut inside = false;
    for (a, b) in edges(ring) {
        if (a.lat > p.lat) != (b.lat > p.lat) {
            let x = a.lon + (p.lat - a.lat) * (b.lon - a.lon) / (b.lat - a.lat);
            if p.lon < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Interior or boundary of a polygon with holes.
fn polygon_covers(rings: &[Vec<Coord>], p: Coord) -> bool {
    let Some((exterior, holes)) = rings.split_first() else {
        return false;
    };
    if on_ring(exterior, p) {
        return true;
    }
    if !inside_ring(exterior, p) {
        return false;
    }
    holes
        .iter()
        .all(|hole| on_ring(hole, p) || !inside_ring(hole, p))
}

fn polygons_intersect(a: &[Vec<Coord>], b: &[Vec<Coord>]) -> bool {
    let edges_cross = a.iter().flat_map(|r| edges(r)).any(|(a1, a2)| {
        b.iter()
            .flat_map(|r| edges(r))
            .any(|(b1, b2)| segments_intersect(a1, a2, b1, b2))
    });
    edges_cross
        || a.iter().flatten().any(|&p| polygon_covers(b, p))
        || b.iter().flatten().any(|&p| polygon_covers(a, p))
}

// ---- region -----------------------------------------------------------------

/// Polygon used to spatially filter observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    rings: Rings,
}

impl Region {
    /// Accepts a bare ring `[[lon, lat], ...]`, polygon coordinates
    /// `[[[lon, lat], ...], ...]`, or a GeoJSON `Polygon` object.
    pub fn parse(raw: &str) -> Result<Self, RegionError> {
        let value: Value = serde_json::from_str(raw)?;

        let coordinates = match &value {
            Value::Object(obj) => {
                let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
                if !kind.eq_ignore_ascii_case("polygon") {
                    return Err(RegionError::Shape(format!(
                        "expected a Polygon object, got type `{kind}`"
                    )));
                }
                obj.get("coordinates")
                    .cloned()
                    .ok_or_else(|| RegionError::Shape("missing coordinates".into()))?
            }
            Value::Array(_) => value.clone(),
            _ => return Err(RegionError::Shape("expected an array or object".into())),
        };

        // A bare ring has numbers one level down; wrap it as a polygon.
        let is_bare_ring = coordinates
            .get(0)
            .and_then(|first| first.get(0))
            .is_some_and(Value::is_number);
        let rings = if is_bare_ring {
            parse_ring(&coordinates).map(|r| vec![r])
        } else {
            parse_rings(&coordinates)
        }
        .ok_or_else(|| RegionError::Shape("coordinates must be [lon, lat] numbers".into()))?;

        Self::from_rings(rings)
    }

    fn from_rings(rings: Rings) -> Result<Self, RegionError> {
        let Some(exterior) = rings.first() else {
            return Err(RegionError::Shape("no rings".into()));
        };
        let mut distinct: Vec<Coord> = Vec::with_capacity(exterior.len());
        for c in exterior {
            if !distinct.contains(c) {
                distinct.push(*c);
            }
        }
        if distinct.len() < 3 {
            return Err(RegionError::Shape(format!(
                "exterior ring needs at least 3 distinct vertices, got {}",
                distinct.len()
            )));
        }
        Ok(Self { rings })
    }

    /// Intersection, not containment: touching the boundary counts.
    pub fn intersects(&self, geometry: &Geometry) -> Result<bool, GeometryError> {
        Ok(match shape_of(geometry)? {
            Shape::Point(p) => polygon_covers(&self.rings, p),
            Shape::Polygons(polys) => polys.iter().any(|p| polygons_intersect(&self.rings, p)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(kind: &str, coordinates: Value) -> Geometry {
        Geometry {
            date: Some("2024-01-01T00:00:00Z".into()),
            kind: kind.into(),
            coordinates,
            extra: Map::new(),
        }
    }

    #[test]
    fn shift_due_north_moves_latitude_only() {
        let c = shift(Coord { lon: 10.0, lat: 0.0 }, 0.0, COVERAGE_RADIUS);
        assert!((c.lon - 10.0).abs() < 1e-12);
        let expected = (COVERAGE_RADIUS / EARTH_RADIUS).to_degrees();
        assert!((c.lat - expected).abs() < 1e-12);
    }

    #[test]
    fn point_with_altitude_is_malformed() {
        let g = geom("Point", json!([1.0, 2.0, 3.0]));
        assert!(matches!(
            point_coordinates(&g),
            Err(GeometryError::Malformed { .. })
        ));
        let g = geom("Point", json!(["1", 2.0]));
        assert!(point_coordinates(&g).is_err());
    }

    #[test]
    fn crossing_segments_and_touching_ends() {
        let c = |lon, lat| Coord { lon, lat };
        assert!(segments_intersect(c(0., 0.), c(2., 2.), c(0., 2.), c(2., 0.)));
        assert!(segments_intersect(c(0., 0.), c(1., 1.), c(1., 1.), c(2., 0.)));
        assert!(!segments_intersect(c(0., 0.), c(1., 0.), c(0., 1.), c(1., 1.)));
    }

    #[test]
    fn holes_are_outside() {
        let region = Region::parse(
            "[[[0,0],[10,0],[10,10],[0,10],[0,0]],[[4,4],[6,4],[6,6],[4,6],[4,4]]]",
        )
        .unwrap();
        assert!(!region.intersects(&geom("Point", json!([5.0, 5.0]))).unwrap());
        assert!(region.intersects(&geom("Point", json!([2.0, 2.0]))).unwrap());
        assert!(region.intersects(&geom("Point", json!([4.0, 5.0]))).unwrap());
    }

    #[test]
    fn unsupported_kind_is_reported() {
        let region = Region::parse("[[0,0],[1,0],[1,1]]").unwrap();
        let err = region
            .intersects(&geom("LineString", json!([[0, 0], [1, 1]])))
            .unwrap_err();
        assert!(matches!(err, GeometryError::Unsupported(k) if k == "LineString"));
    }
}
