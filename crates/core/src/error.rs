use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntelError {
    #[error("Invalid item: {0}")]
    InvalidItem(String),
}
