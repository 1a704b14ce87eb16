use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Invalid tick range [{lower}, {upper})")]
    InvalidRange { lower: i32, upper: i32 },
}
