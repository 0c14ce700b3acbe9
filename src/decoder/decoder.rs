use serde::Deserialize;

use crate::{
    blob::{BlobFormat, JsonBlobFormat},
    decoder::{query::RelationshipQuery, traversal::resolve},
    error::DecodeError,
    geofile::feature::{Feature, FeatureGeometry},
    model::model::{Attribute, Model},
};

fn default_pickled_geometry_field() -> String {
    "geometry".to_string()
}

/// How geometry and properties are pulled out of each row.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DecoderConfig {
    /// Name of a native geometry attribute.
    #[serde(default)]
    pub geometry_field: Option<String>,
    /// Whether geometry is stored as a serialized blob. Takes precedence over `geometry_field`.
    #[serde(default)]
    pub pickled_geometry: bool,
    /// Attribute holding the serialized geometry blob.
    #[serde(default = "default_pickled_geometry_field")]
    pub pickled_geometry_field: String,
    /// Attribute holding a serialized mapping of properties.
    #[serde(default)]
    pub pickled_properties: Option<String>,
    /// Attribute chains copied into the properties, keyed by the chain itself.
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub queries: Vec<RelationshipQuery>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            geometry_field: None,
            pickled_geometry: false,
            pickled_geometry_field: default_pickled_geometry_field(),
            pickled_properties: None,
            properties: Vec::new(),
            queries: Vec::new(),
        }
    }
}

/// Decodes model rows into features according to a fixed configuration.
pub struct FeatureDecoder {
    config: DecoderConfig,
    blob_format: Box<dyn BlobFormat>,
}

impl FeatureDecoder {
    /// Create a decoder reading serialized blobs as JSON.
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_blob_format(config, Box::new(JsonBlobFormat))
    }

    pub fn with_blob_format(config: DecoderConfig, blob_format: Box<dyn BlobFormat>) -> Self {
        if config.pickled_geometry && config.geometry_field.is_some() {
            log::warn!(
                "Both pickled geometry and geometry field '{}' are configured, using pickled geometry",
                config.geometry_field.as_deref().unwrap_or_default()
            );
        }
        Self {
            config,
            blob_format,
        }
    }

    /// Decode all rows, in order. The first failing row aborts the whole call.
    pub fn decode<M, I>(&self, rows: I) -> Result<Vec<Feature>, DecodeError>
    where
        M: Model,
        I: IntoIterator<Item = M>,
    {
        let features = self.decode_iter(rows).collect::<Result<Vec<Feature>, _>>()?;
        log::debug!("Decoded {} features", features.len());
        Ok(features)
    }

    /// Lazily decode rows one at a time, in order.
    pub fn decode_iter<M, I>(&self, rows: I) -> FeatureIter<'_, I::IntoIter>
    where
        M: Model,
        I: IntoIterator<Item = M>,
    {
        FeatureIter {
            decoder: self,
            rows: rows.into_iter(),
        }
    }

    pub fn decode_row(&self, row: &dyn Model) -> Result<Feature, DecodeError> {
        let id = resolve(row, "id")?.into_property_value();
        let mut feature = Feature::new(id);
        feature.geometry = self.decode_geometry(row)?;

        if let Some(field) = &self.config.pickled_properties {
            let blob = read_text(row, field)?;
            let properties = self
                .blob_format
                .decode_properties(&blob)
                .map_err(|err| DecodeError::deserialization(field, err))?;
            feature.properties.extend(properties);
        }

        for path in &self.config.properties {
            let value = resolve(row, path)?.into_property_value();
            feature.properties.insert(path.clone(), value);
        }

        for query in &self.config.queries {
            let items = query.resolve(row)?;
            feature.properties.insert(
                query.accessor.clone(),
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::Object).collect()),
            );
        }

        Ok(feature)
    }

    fn decode_geometry(&self, row: &dyn Model) -> Result<Option<FeatureGeometry>, DecodeError> {
        if self.config.pickled_geometry {
            let field = &self.config.pickled_geometry_field;
            let blob = read_bytes(row, field)?;
            let geometry = self
                .blob_format
                .decode_geometry(&blob)
                .map_err(|err| DecodeError::deserialization(field, err))?;
            Ok(Some(FeatureGeometry::Deserialized(geometry)))
        } else if let Some(field) = &self.config.geometry_field {
            match resolve(row, field)? {
                Attribute::Geometry(geometry) => Ok(Some(FeatureGeometry::from_geojson(&geometry))),
                _ => Err(DecodeError::NotAGeometry {
                    attribute: field.clone(),
                }),
            }
        } else {
            Ok(None)
        }
    }
}

/// Iterator decoding one row per step. See [`FeatureDecoder::decode_iter`].
pub struct FeatureIter<'a, R> {
    decoder: &'a FeatureDecoder,
    rows: R,
}

impl<'a, R> Iterator for FeatureIter<'a, R>
where
    R: Iterator,
    R::Item: Model,
{
    type Item = Result<Feature, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.decoder.decode_row(&row))
    }
}

fn read_bytes(row: &dyn Model, field: &str) -> Result<Vec<u8>, DecodeError> {
    match resolve(row, field)? {
        Attribute::Bytes(bytes) => Ok(bytes),
        Attribute::Value(serde_json::Value::String(text)) => Ok(text.into_bytes()),
        other => Err(DecodeError::deserialization(
            field,
            format!("Expected a binary or text blob, got a {}", other.kind()),
        )),
    }
}

fn read_text(row: &dyn Model, field: &str) -> Result<String, DecodeError> {
    match resolve(row, field)? {
        Attribute::Value(serde_json::Value::String(text)) => Ok(text),
        Attribute::Bytes(bytes) => {
            String::from_utf8(bytes).map_err(|err| DecodeError::deserialization(field, err))
        }
        other => Err(DecodeError::deserialization(
            field,
            format!("Expected a text blob, got a {}", other.kind()),
        )),
    }
}
