pub mod consistency;
pub mod loaders;
pub mod matrix;

pub use consistency::{ConsistencyIssue, ConsistencyLevel, has_errors, validate_catalogs};
pub use loaders::{
    load_checks, load_controls, load_custom_checks, load_data_context, load_requirements,
    load_template_columns,
};
pub use matrix::{MatrixInput, build_matrix};
