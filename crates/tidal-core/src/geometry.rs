use tidal_codec::Value;

use crate::error::CoreError;
use crate::tags::{
    TAG_GEOMETRY_COLLECTION, TAG_GEOMETRY_LINE, TAG_GEOMETRY_MULTILINE,
    TAG_GEOMETRY_MULTIPOINT, TAG_GEOMETRY_MULTIPOLYGON, TAG_GEOMETRY_POINT,
    TAG_GEOMETRY_POLYGON,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub type Line = Vec<Point>;
/// Exterior ring first, then holes.
pub type Polygon = Vec<Line>;

/// Geospatial values; every nested member is itself tagged on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Line(Line),
    Polygon(Polygon),
    MultiPoint(Vec<Point>),
    MultiLine(Vec<Line>),
    MultiPolygon(Vec<Polygon>),
    Collection(Vec<Geometry>),
}

fn point_value(p: Point) -> Value {
    Value::tagged(
        TAG_GEOMETRY_POINT,
        Value::Array(vec![Value::Float(p.x), Value::Float(p.y)]),
    )
}

fn line_value(line: Line) -> Value {
    Value::tagged(
        TAG_GEOMETRY_LINE,
        Value::Array(line.into_iter().map(point_value).collect()),
    )
}

fn polygon_value(polygon: Polygon) -> Value {
    Value::tagged(
        TAG_GEOMETRY_POLYGON,
        Value::Array(polygon.into_iter().map(line_value).collect()),
    )
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Self {
        match geometry {
            Geometry::Point(p) => point_value(p),
            Geometry::Line(line) => line_value(line),
            Geometry::Polygon(polygon) => polygon_value(polygon),
            Geometry::MultiPoint(points) => Value::tagged(
                TAG_GEOMETRY_MULTIPOINT,
                Value::Array(points.into_iter().map(point_value).collect()),
            ),
            Geometry::MultiLine(lines) => Value::tagged(
                TAG_GEOMETRY_MULTILINE,
                Value::Array(lines.into_iter().map(line_value).collect()),
            ),
            Geometry::MultiPolygon(polygons) => Value::tagged(
                TAG_GEOMETRY_MULTIPOLYGON,
                Value::Array(polygons.into_iter().map(polygon_value).collect()),
            ),
            Geometry::Collection(items) => Value::tagged(
                TAG_GEOMETRY_COLLECTION,
                Value::Array(items.into_iter().map(Value::from).collect()),
            ),
        }
    }
}

fn members(value: &Value, tag: u64) -> Result<&[Value], CoreError> {
    match value.as_tagged() {
        Some((found, inner)) if found == tag => {
            inner.as_array().ok_or(CoreError::Shape("geometry member array"))
        }
        Some((found, _)) => Err(CoreError::UnexpectedTag {
            expected: tag,
            found,
        }),
        None => Err(CoreError::Shape("tagged geometry")),
    }
}

fn point_from(value: &Value) -> Result<Point, CoreError> {
    match members(value, TAG_GEOMETRY_POINT)? {
        [x, y] => Ok(Point {
            x: x.as_f64().ok_or(CoreError::Shape("numeric coordinate"))?,
            y: y.as_f64().ok_or(CoreError::Shape("numeric coordinate"))?,
        }),
        _ => Err(CoreError::Shape("[x, y] coordinate pair")),
    }
}

fn line_from(value: &Value) -> Result<Line, CoreError> {
    members(value, TAG_GEOMETRY_LINE)?
        .iter()
        .map(point_from)
        .collect()
}

fn polygon_from(value: &Value) -> Result<Polygon, CoreError> {
    members(value, TAG_GEOMETRY_POLYGON)?
        .iter()
        .map(line_from)
        .collect()
}

impl TryFrom<&Value> for Geometry {
    type Error = CoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let tag = value
            .as_tagged()
            .map(|(tag, _)| tag)
            .ok_or(CoreError::Shape("tagged geometry"))?;
        Ok(match tag {
            TAG_GEOMETRY_POINT => Self::Point(point_from(value)?),
            TAG_GEOMETRY_LINE => Self::Line(line_from(value)?),
            TAG_GEOMETRY_POLYGON => Self::Polygon(polygon_from(value)?),
            TAG_GEOMETRY_MULTIPOINT => Self::MultiPoint(
                members(value, tag)?
                    .iter()
                    .map(point_from)
                    .collect::<Result<_, _>>()?,
            ),
            TAG_GEOMETRY_MULTILINE => Self::MultiLine(
                members(value, tag)?
                    .iter()
                    .map(line_from)
                    .collect::<Result<_, _>>()?,
            ),
            TAG_GEOMETRY_MULTIPOLYGON => Self::MultiPolygon(
                members(value, tag)?
                    .iter()
                    .map(polygon_from)
                    .collect::<Result<_, _>>()?,
            ),
            TAG_GEOMETRY_COLLECTION => Self::Collection(
                members(value, tag)?
                    .iter()
                    .map(Geometry::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            found => {
                return Err(CoreError::UnexpectedTag {
                    expected: TAG_GEOMETRY_POINT,
                    found,
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Geometry, Point};
    use tidal_codec::Value;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ]
    }

    #[test]
    fn point_is_a_tagged_float_pair() {
        let value = Value::from(Geometry::Point(Point::new(1.5, -2.0)));
        assert_eq!(
            value,
            Value::tagged(88, Value::Array(vec![Value::Float(1.5), Value::Float(-2.0)]))
        );
    }

    #[test]
    fn nested_geometries_round_trip() {
        let collection = Geometry::Collection(vec![
            Geometry::Polygon(vec![square()]),
            Geometry::MultiPoint(vec![Point::new(3.0, 4.0)]),
            Geometry::MultiPolygon(vec![vec![square()], vec![square()]]),
        ]);
        let value = Value::from(collection.clone());
        assert_eq!(Geometry::try_from(&value), Ok(collection));
    }

    #[test]
    fn integer_coordinates_are_widened() {
        let value = Value::tagged(88, Value::Array(vec![Value::from(1_u8), Value::from(2_u8)]));
        assert_eq!(
            Geometry::try_from(&value),
            Ok(Geometry::Point(Point::new(1.0, 2.0)))
        );
    }
}
