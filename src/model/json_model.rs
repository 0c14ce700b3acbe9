use std::{cmp::Ordering, fs::read_to_string, path::Path};

use anyhow::{anyhow, Context};
use serde_json::{Number, Value};

use crate::{
    decoder::traversal::CHAIN_SEPARATOR,
    error::FilterError,
    geofile::feature::FeatureMap,
    model::model::{Attribute, Model, QuerySet},
};

const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// A model instance backed by a JSON object.
///
/// Attributes map onto the object's members:
/// - objects shaped like a GeoJSON geometry are native geometries,
/// - other objects are related objects,
/// - arrays of objects are related managers exposing `all()` and `none()`,
/// - everything else is a plain value.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonModel {
    fields: FeatureMap,
}

impl JsonModel {
    pub fn new(fields: FeatureMap) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for JsonModel {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> anyhow::Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(fields)),
            other => Err(anyhow!("Expected a JSON object for a row, got {}", other)),
        }
    }
}

impl Model for JsonModel {
    fn attribute(&self, name: &str) -> Option<Attribute> {
        let value = self.fields.get(name)?;
        let attribute = match value {
            Value::Object(fields) => match parse_geometry(fields) {
                Some(geometry) => Attribute::Geometry(geometry),
                None => Attribute::Related(Box::new(JsonModel::new(fields.clone()))),
            },
            Value::Array(items) => match related_objects(items) {
                Some(objects) => Attribute::Related(Box::new(JsonManager { objects })),
                None => Attribute::Value(value.clone()),
            },
            _ => Attribute::Value(value.clone()),
        };
        Some(attribute)
    }

    fn invoke(&self, _name: &str) -> Option<Box<dyn QuerySet>> {
        None
    }

    fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn parse_geometry(fields: &FeatureMap) -> Option<geojson::Value> {
    let geom_type = fields.get("type")?.as_str()?;
    if !GEOMETRY_TYPES.contains(&geom_type)
        || !(fields.contains_key("coordinates") || fields.contains_key("geometries"))
    {
        return None;
    }
    let geometry = geojson::Geometry::try_from(fields.clone()).ok()?;
    Some(geometry.value)
}

fn related_objects(items: &[Value]) -> Option<Vec<FeatureMap>> {
    items
        .iter()
        .map(|item| match item {
            Value::Object(fields) => Some(fields.clone()),
            _ => None,
        })
        .collect()
}

/// The related manager of a one-to-many relationship stored as an array of objects.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonManager {
    objects: Vec<FeatureMap>,
}

impl Model for JsonManager {
    fn attribute(&self, _name: &str) -> Option<Attribute> {
        None
    }

    fn invoke(&self, name: &str) -> Option<Box<dyn QuerySet>> {
        let objects = match name {
            "all" => self.objects.clone(),
            "none" => Vec::new(),
            _ => return None,
        };
        Some(Box::new(JsonQuerySet { objects }))
    }

    fn to_value(&self) -> Value {
        Value::Array(self.objects.iter().cloned().map(Value::Object).collect())
    }
}

/// A materialized collection of JSON objects, narrowed with Django-style lookups such as
/// `category__name__iexact` or `date__lte`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonQuerySet {
    objects: Vec<FeatureMap>,
}

impl JsonQuerySet {
    pub fn new(objects: Vec<FeatureMap>) -> Self {
        Self { objects }
    }

    fn narrow(
        &self,
        lookup: &str,
        criteria: &Value,
        keep_matching: bool,
    ) -> Result<Box<dyn QuerySet>, FilterError> {
        let lookup = Lookup::parse(lookup, criteria)?;
        let mut objects = Vec::new();
        for object in &self.objects {
            if lookup.matches(object)? == keep_matching {
                objects.push(object.clone());
            }
        }
        Ok(Box::new(JsonQuerySet { objects }))
    }
}

impl QuerySet for JsonQuerySet {
    fn filter(&self, lookup: &str, criteria: &Value) -> Result<Box<dyn QuerySet>, FilterError> {
        self.narrow(lookup, criteria, true)
    }

    fn exclude(&self, lookup: &str, criteria: &Value) -> Result<Box<dyn QuerySet>, FilterError> {
        self.narrow(lookup, criteria, false)
    }

    fn objects(&self) -> Vec<Box<dyn Model>> {
        self.objects
            .iter()
            .map(|fields| Box::new(JsonModel::new(fields.clone())) as Box<dyn Model>)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LookupOperator {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl LookupOperator {
    fn from_name(name: &str) -> Option<Self> {
        use LookupOperator::*;
        let operator = match name {
            "exact" => Exact,
            "iexact" => IExact,
            "contains" => Contains,
            "icontains" => IContains,
            "startswith" => StartsWith,
            "endswith" => EndsWith,
            "gt" => Gt,
            "gte" => Gte,
            "lt" => Lt,
            "lte" => Lte,
            "in" => In,
            "isnull" => IsNull,
            _ => return None,
        };
        Some(operator)
    }
}

/// A parsed lookup expression: the field chain, the operator and the criteria it compares with.
struct Lookup<'a> {
    expression: &'a str,
    fields: Vec<&'a str>,
    operator: LookupOperator,
    criteria: &'a Value,
}

impl<'a> Lookup<'a> {
    fn parse(expression: &'a str, criteria: &'a Value) -> Result<Self, FilterError> {
        use LookupOperator::*;
        let mut fields: Vec<&str> = expression.split(CHAIN_SEPARATOR).collect();
        let operator = match fields.last().and_then(|name| LookupOperator::from_name(name)) {
            Some(operator) if fields.len() > 1 => {
                fields.pop();
                operator
            }
            _ => Exact,
        };
        if fields.iter().any(|field| field.is_empty()) {
            return Err(FilterError::new(format!(
                "Invalid lookup expression '{}'",
                expression
            )));
        }

        let criteria_ok = match operator {
            Exact | IExact => true,
            Contains | IContains | StartsWith | EndsWith => criteria.is_string(),
            Gt | Gte | Lt | Lte => criteria.is_number() || criteria.is_string(),
            In => criteria.is_array(),
            IsNull => criteria.is_boolean(),
        };
        if !criteria_ok {
            return Err(FilterError::new(format!(
                "Invalid criteria {} for lookup '{}'",
                criteria, expression
            )));
        }

        Ok(Self {
            expression,
            fields,
            operator,
            criteria,
        })
    }

    /// An object matches if any value reachable through the field chain matches. Chains spanning a
    /// to-many relationship fan out over its objects.
    fn matches(&self, object: &FeatureMap) -> Result<bool, FilterError> {
        let mut values = Vec::new();
        let (first, rest) = self
            .fields
            .split_first()
            .ok_or_else(|| FilterError::new("Empty lookup expression"))?;
        let value = object.get(*first).ok_or_else(|| self.unknown_field(first))?;
        self.collect_values(value, rest, &mut values)?;

        for value in values {
            if self.matches_value(value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn collect_values<'v>(
        &self,
        value: &'v Value,
        fields: &[&str],
        values: &mut Vec<&'v Value>,
    ) -> Result<(), FilterError> {
        let Some((field, rest)) = fields.split_first() else {
            values.push(value);
            return Ok(());
        };
        match value {
            Value::Object(object) => {
                let next = object.get(*field).ok_or_else(|| self.unknown_field(field))?;
                self.collect_values(next, rest, values)
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_values(item, fields, values)?;
                }
                Ok(())
            }
            // Following an empty relation yields null for the rest of the chain.
            Value::Null => {
                values.push(value);
                Ok(())
            }
            _ => Err(FilterError::new(format!(
                "Cannot follow '{}' through a plain value in lookup '{}'",
                field, self.expression
            ))),
        }
    }

    fn matches_value(&self, value: &Value) -> Result<bool, FilterError> {
        use LookupOperator::*;
        let text = self.criteria.as_str().unwrap_or_default();
        let matched = match self.operator {
            Exact => values_equal(value, self.criteria),
            IExact => match (value.as_str(), self.criteria.as_str()) {
                (Some(value), Some(criteria)) => value.to_lowercase() == criteria.to_lowercase(),
                _ => values_equal(value, self.criteria),
            },
            Contains => value.as_str().map_or(false, |value| value.contains(text)),
            IContains => value.as_str().map_or(false, |value| {
                value.to_lowercase().contains(&text.to_lowercase())
            }),
            StartsWith => value.as_str().map_or(false, |value| value.starts_with(text)),
            EndsWith => value.as_str().map_or(false, |value| value.ends_with(text)),
            Gt => self.compare(value)? == Some(Ordering::Greater),
            Gte => matches!(
                self.compare(value)?,
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Lt => self.compare(value)? == Some(Ordering::Less),
            Lte => matches!(self.compare(value)?, Some(Ordering::Less | Ordering::Equal)),
            In => self.criteria.as_array().map_or(false, |candidates| {
                candidates
                    .iter()
                    .any(|candidate| values_equal(value, candidate))
            }),
            IsNull => value.is_null() == self.criteria.as_bool().unwrap_or_default(),
        };
        Ok(matched)
    }

    // Null never compares.
    fn compare(&self, value: &Value) -> Result<Option<Ordering>, FilterError> {
        match (value, self.criteria) {
            (Value::Null, _) => Ok(None),
            (Value::Number(value), Value::Number(criteria)) => {
                Ok(compare_numbers(value, criteria))
            }
            (Value::String(value), Value::String(criteria)) => Ok(Some(value.cmp(criteria))),
            _ => Err(FilterError::new(format!(
                "Cannot compare {} with {} in lookup '{}'",
                value, self.criteria, self.expression
            ))),
        }
    }

    fn unknown_field(&self, field: &str) -> FilterError {
        FilterError::new(format!(
            "Cannot resolve keyword '{}' in lookup '{}'",
            field, self.expression
        ))
    }
}

fn values_equal(value: &Value, other: &Value) -> bool {
    match (value, other) {
        (Value::Number(value), Value::Number(other)) => {
            compare_numbers(value, other) == Some(Ordering::Equal)
        }
        _ => value == other,
    }
}

/// Integers compare exactly; floats are only involved when either side is one.
fn compare_numbers(value: &Number, other: &Number) -> Option<Ordering> {
    if let (Some(value), Some(other)) = (value.as_i64(), other.as_i64()) {
        return Some(value.cmp(&other));
    }
    if let (Some(value), Some(other)) = (value.as_u64(), other.as_u64()) {
        return Some(value.cmp(&other));
    }
    if value.is_f64() || other.is_f64() {
        return value.as_f64()?.partial_cmp(&other.as_f64()?);
    }
    // A negative integer against one above i64::MAX.
    if value.is_i64() {
        Some(Ordering::Less)
    } else {
        Some(Ordering::Greater)
    }
}

/// Load rows from a file holding a JSON array of objects.
pub fn load_rows_from_file(filepath: &Path) -> anyhow::Result<Vec<JsonModel>> {
    let contents = read_to_string(filepath)
        .with_context(|| format!("Reading rows from {:?}", filepath))?;
    let values: Vec<Value> = serde_json::from_str(&contents)
        .with_context(|| format!("Parsing rows from {:?}", filepath))?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            JsonModel::try_from(value).with_context(|| format!("Row {} in {:?}", index, filepath))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::{json, Value};
    use testdir::testdir;

    use crate::model::model::{Attribute, Model, QuerySet};

    use super::{load_rows_from_file, JsonModel, JsonQuerySet};

    fn events() -> JsonQuerySet {
        let objects = json!([
            {"title": "Opening", "attendees": 40, "date": "2012-01-01", "category": {"name": "Music"}, "tags": [{"name": "free"}]},
            {"title": "Lecture", "attendees": 12, "date": "2012-03-15", "category": {"name": "Science"}, "tags": []},
            {"title": "Closing", "attendees": null, "date": "2012-06-30", "category": null, "tags": [{"name": "paid"}, {"name": "late"}]},
        ]);
        let objects = match objects {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(fields) => fields,
                    _ => unreachable!(),
                })
                .collect(),
            _ => unreachable!(),
        };
        JsonQuerySet::new(objects)
    }

    fn titles(queryset: &dyn QuerySet) -> Vec<Value> {
        queryset
            .objects()
            .iter()
            .map(|object| match object.attribute("title") {
                Some(Attribute::Value(title)) => title,
                _ => Value::Null,
            })
            .collect()
    }

    #[rstest]
    #[case("title", json!("Lecture"), vec!["Lecture"])]
    #[case("title__exact", json!("Lecture"), vec!["Lecture"])]
    #[case("title__iexact", json!("opening"), vec!["Opening"])]
    #[case("title__contains", json!("ing"), vec!["Opening", "Closing"])]
    #[case("title__icontains", json!("LEC"), vec!["Lecture"])]
    #[case("title__startswith", json!("Clo"), vec!["Closing"])]
    #[case("title__endswith", json!("ure"), vec!["Lecture"])]
    #[case("attendees__gt", json!(12), vec!["Opening"])]
    #[case("attendees__gte", json!(12), vec!["Opening", "Lecture"])]
    #[case("attendees__lt", json!(40.0), vec!["Lecture"])]
    #[case("date__lte", json!("2012-03-15"), vec!["Opening", "Lecture"])]
    #[case("attendees__in", json!([12, 99]), vec!["Lecture"])]
    #[case("attendees__isnull", json!(true), vec!["Closing"])]
    #[case("category__name", json!("Music"), vec!["Opening"])]
    #[case("category__name__isnull", json!(true), vec!["Closing"])]
    #[case("tags__name", json!("late"), vec!["Closing"])]
    fn test_filter(
        #[case] lookup: &str,
        #[case] criteria: Value,
        #[case] expected_titles: Vec<&str>,
    ) {
        let filtered = events().filter(lookup, &criteria).unwrap();
        let expected: Vec<Value> = expected_titles.into_iter().map(Value::from).collect();
        assert_eq!(titles(filtered.as_ref()), expected);
    }

    #[rstest]
    #[case("pk", json!(9007199254740993u64), vec![json!(9007199254740993u64)])]
    #[case("pk__in", json!([9007199254740992u64]), vec![json!(9007199254740992u64)])]
    #[case("pk__gt", json!(9007199254740992u64), vec![json!(9007199254740993u64)])]
    #[case("pk__lt", json!(-1), vec![])]
    #[case("pk__gte", json!(9.0e15), vec![json!(9007199254740992u64), json!(9007199254740993u64)])]
    fn test_filter_large_integers(
        #[case] lookup: &str,
        #[case] criteria: Value,
        #[case] expected_pks: Vec<Value>,
    ) {
        let items = JsonQuerySet::new(vec![
            json!({"pk": 9007199254740992u64}).as_object().unwrap().clone(),
            json!({"pk": 9007199254740993u64}).as_object().unwrap().clone(),
        ]);
        let pks: Vec<Value> = items
            .filter(lookup, &criteria)
            .unwrap()
            .objects()
            .iter()
            .map(|object| object.attribute("pk").unwrap().into_property_value())
            .collect();
        assert_eq!(pks, expected_pks);
    }

    #[test]
    fn test_exclude() {
        let excluded = events().exclude("attendees__gte", &json!(12)).unwrap();
        assert_eq!(titles(excluded.as_ref()), vec![json!("Closing")]);
    }

    #[rstest]
    #[case("missing", json!(1))]
    #[case("category__missing", json!(1))]
    #[case("title__name", json!("x"))]
    #[case("attendees__in", json!(12))]
    #[case("attendees__isnull", json!("yes"))]
    #[case("title__contains", json!(5))]
    #[case("title__gt", json!(5))]
    #[case("title____exact", json!("x"))]
    fn test_filter_errors(#[case] lookup: &str, #[case] criteria: Value) {
        assert!(events().filter(lookup, &criteria).is_err());
    }

    #[test]
    fn test_invalid_criteria_fails_on_empty_queryset() {
        let empty = JsonQuerySet::new(vec![]);
        assert!(empty.filter("date__in", &json!("2012")).is_err());
        assert!(empty.filter("date__in", &json!(["2012"])).is_ok());
    }

    #[test]
    fn test_attribute_kinds() {
        let model = JsonModel::try_from(json!({
            "id": 7,
            "location": {"type": "Point", "coordinates": [1.0, 2.0]},
            "owner": {"type": "person", "name": "Ada"},
            "events": [{"title": "a"}],
            "scores": [1, 2],
        }))
        .unwrap();

        assert!(matches!(model.attribute("id"), Some(Attribute::Value(_))));
        assert!(matches!(model.attribute("location"), Some(Attribute::Geometry(_))));
        assert!(matches!(model.attribute("owner"), Some(Attribute::Related(_))));
        assert!(matches!(model.attribute("scores"), Some(Attribute::Value(_))));
        assert!(model.attribute("missing").is_none());

        match model.attribute("events") {
            Some(Attribute::Related(manager)) => {
                assert_eq!(manager.invoke("all").unwrap().objects().len(), 1);
                assert_eq!(manager.invoke("none").unwrap().objects().len(), 0);
                assert!(manager.invoke("delete").is_none());
            }
            _ => panic!("Expected a related manager"),
        }
    }

    #[test]
    fn test_row_must_be_an_object() {
        assert!(JsonModel::try_from(json!([1, 2])).is_err());
    }

    #[test]
    fn test_load_rows_from_file() {
        let test_dir = testdir!();
        let rows_filepath = test_dir.join("rows.json");
        std::fs::write(&rows_filepath, r#"[{"id": 1}, {"id": 2, "name": "b"}]"#).unwrap();

        let rows = load_rows_from_file(&rows_filepath).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].to_value(), json!({"id": 2, "name": "b"}));

        std::fs::write(&rows_filepath, r#"[{"id": 1}, 3]"#).unwrap();
        assert!(load_rows_from_file(&rows_filepath).is_err());
    }
}
