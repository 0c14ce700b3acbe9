use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Rejection of a filter or exclude step by a queryset.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct FilterError(pub String);

impl FilterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised while decoding rows into features. None of them are recovered from: the first
/// error aborts the decode call.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// An attribute chain hit a missing attribute, or tried to step through a plain value.
    #[error("Could not resolve '{segment}' in attribute chain '{path}'")]
    AttributeResolution { path: String, segment: String },

    #[error("Attribute '{attribute}' does not hold a geometry")]
    NotAGeometry { attribute: String },

    #[error("Could not deserialize attribute '{attribute}': {source}")]
    Deserialization {
        attribute: String,
        #[source]
        source: BoxError,
    },

    #[error("Queryset filter failed: {0}")]
    Filter(#[from] FilterError),
}

impl DecodeError {
    pub fn attribute_resolution(path: &str, segment: &str) -> Self {
        DecodeError::AttributeResolution {
            path: path.to_string(),
            segment: segment.to_string(),
        }
    }

    pub fn deserialization(attribute: &str, source: impl Into<BoxError>) -> Self {
        DecodeError::Deserialization {
            attribute: attribute.to_string(),
            source: source.into(),
        }
    }
}
