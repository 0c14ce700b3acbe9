pub mod decoder;
pub mod query;
pub mod traversal;
