use crate::models::role::Role;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("Could not read resources file: {0}")]
    CouldNotReadResources(std::io::Error),
    #[error("Resources file is not valid: {0}")]
    InvalidResources(serde_json::Error),
    #[error("Resources file has no bundle for {0}")]
    MissingBundle(Role),
}
