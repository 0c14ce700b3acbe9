use crate::{
    error::DecodeError,
    model::model::{Attribute, Model, QuerySet},
};

/// Separator between the segments of an attribute chain, e.g. `neighborhood__city__name`.
pub const CHAIN_SEPARATOR: &str = "__";

/// Split an attribute chain into its segments. Dots are accepted as separators too.
pub fn split_chain(path: &str) -> Vec<&str> {
    path.split(CHAIN_SEPARATOR)
        .flat_map(|segment| segment.split('.'))
        .collect()
}

/// Resolve an attribute chain starting at `model`, strictly left to right.
///
/// Every segment but the last must resolve to a related object. A missing attribute anywhere
/// along the chain fails the whole resolution.
pub fn resolve(model: &dyn Model, path: &str) -> Result<Attribute, DecodeError> {
    resolve_segments(model, path, &split_chain(path))
}

/// Resolve an accessor chain whose last segment is invoked to materialize a collection, e.g.
/// `event_set__all`.
pub fn resolve_collection(
    model: &dyn Model,
    accessor: &str,
) -> Result<Box<dyn QuerySet>, DecodeError> {
    let segments = split_chain(accessor);
    let (method, owner_path) = segments
        .split_last()
        .ok_or_else(|| DecodeError::attribute_resolution(accessor, accessor))?;

    let collection = match owner_path.last() {
        None => model.invoke(method),
        Some(owner_segment) => match resolve_segments(model, accessor, owner_path)? {
            Attribute::Related(owner) => owner.invoke(method),
            // Plain values have no accessors.
            _ => return Err(DecodeError::attribute_resolution(accessor, owner_segment)),
        },
    };
    collection.ok_or_else(|| DecodeError::attribute_resolution(accessor, method))
}

fn resolve_segments(
    model: &dyn Model,
    path: &str,
    segments: &[&str],
) -> Result<Attribute, DecodeError> {
    let (first, rest) = segments
        .split_first()
        .ok_or_else(|| DecodeError::attribute_resolution(path, path))?;
    let mut current = model
        .attribute(first)
        .ok_or_else(|| DecodeError::attribute_resolution(path, first))?;
    for segment in rest {
        current = match current {
            Attribute::Related(related) => related
                .attribute(segment)
                .ok_or_else(|| DecodeError::attribute_resolution(path, segment))?,
            _ => return Err(DecodeError::attribute_resolution(path, segment)),
        };
    }
    Ok(current)
}
