use bookshelf_http::AppError;
use mongodb::bson::oid::ObjectId;
use thiserror::Error;

/// Caller input the books operations refuse before touching the store.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("id required")]
    IdRequired,

    #[error("invalid id")]
    InvalidId,

    #[error("invalid body")]
    InvalidBody,
}

/// The store call failed or its result could not be used.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    #[error("no book found with id {0}")]
    NotFound(ObjectId),

    #[error("insert acknowledged without an ObjectId")]
    MissingInsertedId,
}

/// Failure of a books operation.
#[derive(Debug, Error)]
pub enum BookError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookError {
    /// Render for HTTP. `context` names the failed write; `expose` controls
    /// whether store text reaches the client.
    pub fn into_app_error(self, context: Option<&'static str>, expose: bool) -> AppError {
        match self {
            BookError::Validation(err) => AppError::validation(err.to_string()),
            BookError::Store(err) => {
                let mut app_error = AppError::store(err.to_string());
                if let Some(context) = context {
                    app_error = app_error.with_context(context);
                }
                if expose {
                    app_error
                } else {
                    app_error.redacted()
                }
            }
        }
    }
}
