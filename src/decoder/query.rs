use serde::Deserialize;
use serde_json::Value;

use crate::{
    decoder::traversal::{resolve, resolve_collection},
    error::DecodeError,
    geofile::feature::FeatureMap,
    model::model::{Model, QuerySet},
};

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Filter,
    Exclude,
}

/// One filter or exclude step applied to a related collection, e.g.
/// `lookup: "eventdate__date__exact", criteria: "2012-01-01"` narrows the collection like
/// `.filter(eventdate__date__exact="2012-01-01")` would.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct QuerysetFilter {
    #[serde(default)]
    pub mode: FilterMode,
    pub lookup: String,
    pub criteria: Value,
}

impl QuerysetFilter {
    pub fn filter(lookup: &str, criteria: impl Into<Value>) -> Self {
        Self {
            mode: FilterMode::Filter,
            lookup: lookup.to_string(),
            criteria: criteria.into(),
        }
    }

    pub fn exclude(lookup: &str, criteria: impl Into<Value>) -> Self {
        Self {
            mode: FilterMode::Exclude,
            lookup: lookup.to_string(),
            criteria: criteria.into(),
        }
    }

    pub fn apply(&self, queryset: &dyn QuerySet) -> Result<Box<dyn QuerySet>, DecodeError> {
        let narrowed = match self.mode {
            FilterMode::Filter => queryset.filter(&self.lookup, &self.criteria)?,
            FilterMode::Exclude => queryset.exclude(&self.lookup, &self.criteria)?,
        };
        Ok(narrowed)
    }
}

/// Extraction of a one-to-many relationship into a list of flat mappings.
///
/// `accessor` is an attribute chain whose last segment is invoked to get the collection, e.g.
/// `event_set__all`. The collection is narrowed by `filters` in order, then every object in it
/// becomes a mapping from each of `return_fields` to its resolved value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RelationshipQuery {
    pub accessor: String,
    #[serde(default)]
    pub filters: Vec<QuerysetFilter>,
    pub return_fields: Vec<String>,
}

impl RelationshipQuery {
    pub fn new(accessor: &str, filters: Vec<QuerysetFilter>, return_fields: &[&str]) -> Self {
        Self {
            accessor: accessor.to_string(),
            filters,
            return_fields: return_fields.iter().map(|field| field.to_string()).collect(),
        }
    }

    pub fn resolve(&self, model: &dyn Model) -> Result<Vec<FeatureMap>, DecodeError> {
        let mut queryset = resolve_collection(model, &self.accessor)?;
        for queryset_filter in &self.filters {
            queryset = queryset_filter.apply(queryset.as_ref())?;
        }

        let mut items = Vec::new();
        for object in queryset.objects() {
            let mut item = FeatureMap::new();
            for field in &self.return_fields {
                let value = resolve(object.as_ref(), field)?.into_property_value();
                item.insert(field.clone(), value);
            }
            items.push(item);
        }
        Ok(items)
    }
}
