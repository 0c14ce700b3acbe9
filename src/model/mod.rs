pub mod json_model;
pub mod model;
