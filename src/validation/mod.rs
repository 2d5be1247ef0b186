//! Pre-flight validation of files before upload.

pub mod csv_validator;

pub use csv_validator::{
    validate, CsvValidationError, CsvValidationResult, REQUIRED_COLUMNS, VALIDATION_SAMPLE_SIZE,
};
