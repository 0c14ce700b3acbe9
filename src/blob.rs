use serde_json::Value;

use crate::{error::BoxError, geofile::feature::FeatureMap};

/// Format of serialized geometry and property blobs stored in model columns.
pub trait BlobFormat {
    /// Decode a geometry blob into a structured value.
    fn decode_geometry(&self, blob: &[u8]) -> Result<Value, BoxError>;

    /// Decode a properties blob into a mapping.
    fn decode_properties(&self, blob: &str) -> Result<FeatureMap, BoxError>;
}

/// Blobs holding JSON text, e.g. a GeoJSON geometry and a JSON object of properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonBlobFormat;

impl BlobFormat for JsonBlobFormat {
    fn decode_geometry(&self, blob: &[u8]) -> Result<Value, BoxError> {
        Ok(serde_json::from_slice(blob)?)
    }

    fn decode_properties(&self, blob: &str) -> Result<FeatureMap, BoxError> {
        match serde_json::from_str::<Value>(blob)? {
            Value::Object(properties) => Ok(properties),
            other => Err(format!("Expected a mapping of properties, got {}", other).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::{BlobFormat, JsonBlobFormat};

    #[test]
    fn test_decode_geometry() {
        let blob = br#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        let geometry = JsonBlobFormat.decode_geometry(blob).unwrap();
        assert_eq!(geometry, json!({"type": "Point", "coordinates": [1.0, 2.0]}));
    }

    #[test]
    fn test_decode_properties_keeps_key_order() {
        let properties = JsonBlobFormat
            .decode_properties(r#"{"zeta": 1, "alpha": "two"}"#)
            .unwrap();
        let keys: Vec<&String> = properties.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[rstest]
    #[case("[1, 2, 3]")]
    #[case("\"text\"")]
    #[case("{broken")]
    fn test_decode_properties_rejects_non_mappings(#[case] blob: &str) {
        assert!(JsonBlobFormat.decode_properties(blob).is_err());
    }
}
