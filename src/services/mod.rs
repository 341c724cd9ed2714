//! Application services.
//!
//! Services own the business rules: who may do what, which order checks
//! run in, and which events leave the system. They hold `Arc` handles to
//! stores and the dispatcher, so one set of services is shared by every
//! request.
//!
//! Error discipline: existence is checked before ownership, so a caller
//! probing someone else's resource learns whether it exists only when it
//! does. Event publication never fails a request that already committed;
//! a full dispatch queue is logged and the response returned as success.

pub mod auth;
pub mod catalog;
pub mod gallery;

pub use auth::AuthService;
pub use catalog::{CatalogService, NewProductInput};
pub use gallery::GalleryService;

use crate::auth::GuardError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors returned to transport layers.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Forbidden(#[from] GuardError),

    #[error("picture {picture} is not attached to product {product}")]
    NotAttached { product: i64, picture: i64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    BadCredentials,

    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserNotFound(_) | StorageError::EmailNotFound(_) => Self::NotFound("user"),
            StorageError::ProductNotFound(_) => Self::NotFound("product"),
            StorageError::PictureNotFound(_) => Self::NotFound("picture"),
            StorageError::DuplicateEmail(_) => Self::EmailTaken,
            StorageError::NotAttached { product, picture } => {
                Self::NotAttached { product, picture }
            }
            other => Self::Storage(other),
        }
    }
}
