use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, LibraryError>;
