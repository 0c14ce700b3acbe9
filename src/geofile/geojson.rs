use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use serde_json::Value;

use super::feature::Feature;

pub fn feature_to_geojson(feature: &Feature) -> anyhow::Result<geojson::Feature> {
    let id = match &feature.id {
        Value::Number(number) => Some(geojson::feature::Id::Number(number.clone())),
        Value::String(text) => Some(geojson::feature::Id::String(text.clone())),
        Value::Null => None,
        other => return Err(anyhow!("Cannot use {} as a GeoJSON feature id", other)),
    };
    let geometry = match &feature.geometry {
        Some(geometry) => Some(
            geojson::Geometry::try_from(geometry.to_value())
                .with_context(|| format!("Geometry of feature {}", feature.id))?,
        ),
        None => None,
    };
    Ok(geojson::Feature {
        bbox: None,
        geometry,
        id,
        properties: Some(feature.properties.clone()),
        foreign_members: None,
    })
}

pub fn features_to_geojson_string(features: &[Feature]) -> anyhow::Result<String> {
    let feature_collection: geojson::FeatureCollection = features
        .iter()
        .map(feature_to_geojson)
        .collect::<anyhow::Result<Vec<geojson::Feature>>>()?
        .into_iter()
        .collect();
    let geojson_contents: geojson::GeoJson = geojson::GeoJson::from(feature_collection);
    Ok(geojson_contents.to_string())
}

pub fn write_features_to_geojson(features: &[Feature], output_filepath: &Path) -> anyhow::Result<()> {
    log::info!(
        "Writing {} features to {:?}",
        features.len(),
        output_filepath
    );
    fs::write(output_filepath, features_to_geojson_string(features)?)
        .with_context(|| format!("Writing GeoJSON to {:?}", output_filepath))
}
