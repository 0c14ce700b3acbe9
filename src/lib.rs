//! Decode model rows, e.g. ORM query results, into features made of an id, a geometry and a
//! mapping of properties, ready to be written out as GeoJSON.
//!
//! ```
//! use feature_decoder::decoder::decoder::{DecoderConfig, FeatureDecoder};
//! use feature_decoder::model::json_model::JsonModel;
//!
//! let row = JsonModel::try_from(serde_json::json!({
//!     "id": 1,
//!     "location": {"type": "Point", "coordinates": [1.0, 2.0]},
//!     "city": "Cambridge",
//! }))
//! .unwrap();
//! let decoder = FeatureDecoder::new(DecoderConfig {
//!     geometry_field: Some("location".to_string()),
//!     properties: vec!["city".to_string()],
//!     ..Default::default()
//! });
//! let features = decoder.decode(vec![row]).unwrap();
//! assert_eq!(features[0].properties["city"], "Cambridge");
//! ```
pub mod blob;
pub mod decoder;
pub mod error;
pub mod geofile;
pub mod model;
