use serde_json::Value;

use crate::{error::FilterError, geofile::feature::FeatureGeometry};

/// Value returned by an attribute lookup on a model.
pub enum Attribute {
    /// A plain value: number, string, bool, null, or structured JSON.
    Value(Value),
    /// Raw binary column content.
    Bytes(Vec<u8>),
    /// A native geometry column. Positions keep every ordinate, including Z.
    Geometry(geojson::Value),
    /// A related object, e.g. the target of a foreign key or a related manager.
    Related(Box<dyn Model>),
}

impl Attribute {
    /// Convert the attribute into a value that can be stored in feature properties.
    pub fn into_property_value(self) -> Value {
        match self {
            Attribute::Value(value) => value,
            Attribute::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            Attribute::Geometry(geometry) => FeatureGeometry::from_geojson(&geometry).to_value(),
            Attribute::Related(model) => model.to_value(),
        }
    }

    /// Short name of the attribute kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Attribute::Value(_) => "value",
            Attribute::Bytes(_) => "bytes",
            Attribute::Geometry(_) => "geometry",
            Attribute::Related(_) => "related object",
        }
    }
}

impl From<geo::Geometry> for Attribute {
    fn from(geometry: geo::Geometry) -> Self {
        Attribute::Geometry(geojson::Value::from(&geometry))
    }
}

/// A model instance, e.g. a row of an ORM query result.
///
/// Implementors expose attributes by name and zero-argument accessors that yield a related
/// collection, like `event_set.all()` on a Django model instance.
pub trait Model {
    /// Look up an attribute by name. Returns `None` if the attribute does not exist.
    fn attribute(&self, name: &str) -> Option<Attribute>;

    /// Invoke a named zero-argument accessor that materializes a collection. Returns `None` if
    /// there is no such accessor.
    fn invoke(&self, name: &str) -> Option<Box<dyn QuerySet>>;

    /// Representation of this object when it ends up as a property value.
    fn to_value(&self) -> Value {
        match self.attribute("id") {
            Some(Attribute::Value(id)) => id,
            _ => Value::Null,
        }
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        (**self).attribute(name)
    }

    fn invoke(&self, name: &str) -> Option<Box<dyn QuerySet>> {
        (**self).invoke(name)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<M: Model + ?Sized> Model for &M {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        (**self).attribute(name)
    }

    fn invoke(&self, name: &str) -> Option<Box<dyn QuerySet>> {
        (**self).invoke(name)
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

/// A collection of related model instances which can be narrowed with lookup expressions.
pub trait QuerySet {
    /// Keep the objects matching `lookup == criteria`.
    fn filter(&self, lookup: &str, criteria: &Value) -> Result<Box<dyn QuerySet>, FilterError>;

    /// Drop the objects matching `lookup == criteria`.
    fn exclude(&self, lookup: &str, criteria: &Value) -> Result<Box<dyn QuerySet>, FilterError>;

    /// Materialize the objects in the collection, in collection order.
    fn objects(&self) -> Vec<Box<dyn Model>>;
}
