use serde_json::{json, Map, Value};

/// Property mapping of a feature. Keys keep their insertion order.
pub type FeatureMap = Map<String, Value>;

/// Geometry of a decoded feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// A value decoded as-is from a serialized geometry blob.
    Deserialized(Value),
    /// Geometry type tag and coordinates taken from a native geometry field.
    Structured { geom_type: String, coordinates: Value },
}

impl FeatureGeometry {
    pub fn from_geojson(value: &geojson::Value) -> Self {
        let (geom_type, coordinates) = type_and_coordinates(value);
        FeatureGeometry::Structured {
            geom_type: geom_type.to_string(),
            coordinates,
        }
    }

    /// JSON representation: the blob value itself, or `{"type": ..., "coordinates": ...}`.
    pub fn to_value(&self) -> Value {
        match self {
            FeatureGeometry::Deserialized(value) => value.clone(),
            FeatureGeometry::Structured {
                geom_type,
                coordinates,
            } => json!({ "type": geom_type, "coordinates": coordinates }),
        }
    }
}

// A GeometryCollection has no coordinates of its own, it lists those of its members.
fn type_and_coordinates(value: &geojson::Value) -> (&'static str, Value) {
    match value {
        geojson::Value::Point(position) => ("Point", json!(position)),
        geojson::Value::MultiPoint(positions) => ("MultiPoint", json!(positions)),
        geojson::Value::LineString(positions) => ("LineString", json!(positions)),
        geojson::Value::MultiLineString(lines) => ("MultiLineString", json!(lines)),
        geojson::Value::Polygon(rings) => ("Polygon", json!(rings)),
        geojson::Value::MultiPolygon(polygons) => ("MultiPolygon", json!(polygons)),
        geojson::Value::GeometryCollection(geometries) => (
            "GeometryCollection",
            Value::Array(
                geometries
                    .iter()
                    .map(|geometry| type_and_coordinates(&geometry.value).1)
                    .collect(),
            ),
        ),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Value,
    pub geometry: Option<FeatureGeometry>,
    pub properties: FeatureMap,
}

impl Feature {
    /// Create a feature with no geometry and empty properties.
    pub fn new(id: Value) -> Self {
        Self {
            id,
            geometry: None,
            properties: FeatureMap::new(),
        }
    }
}
