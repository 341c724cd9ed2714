//! Persistence interfaces and their backends.
//!
//! Services depend on the `UserStore`, `ProductStore` and `PictureStore`
//! traits only; which backend sits behind them is a deployment choice
//! made in configuration. SQLite backs the standalone binary, PostgreSQL
//! the shared deployment, and the in-memory mock backs unit tests.
//!
//! Gallery consistency is a storage concern: `attach`, `detach` and
//! `set_cover` are specified here as single atomic steps so no caller
//! can observe a half-applied gallery.

pub mod mock;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::config::StorageConfig;
use crate::domain::{Picture, Product, Role, User};

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors surfaced by the storage layer.
///
/// Not-found and conflict conditions are typed so the service layer can
/// translate them without string matching; everything else is a backend
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error("no user with email: {0}")]
    EmailNotFound(String),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("product not found: {0}")]
    ProductNotFound(i64),

    #[error("picture not found: {0}")]
    PictureNotFound(i64),

    #[error("picture {picture} is not attached to product {product}")]
    NotAttached { product: i64, picture: i64 },

    #[error("invalid timestamp in row: {0}")]
    InvalidTimestamp(String),

    #[error("invalid role in row: {0}")]
    InvalidRole(String),

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Payload for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub seller_id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
}

/// Partial product update. Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i64>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price_cents.is_none()
            && self.stock.is_none()
    }
}

/// Listing filter with keyset-free pagination.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub seller_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            seller_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new account. Fails with `DuplicateEmail` when the email
    /// is already taken.
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> Result<User>;

    async fn get(&self, id: i64) -> Result<User>;

    async fn get_by_email(&self, email: &str) -> Result<User>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, new: NewProduct) -> Result<Product>;

    async fn get(&self, id: i64) -> Result<Product>;

    /// List products, newest first.
    async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>>;

    /// Apply a partial update and return the stored row.
    async fn update(&self, id: i64, patch: ProductPatch) -> Result<Product>;

    /// Delete a product. Attachment rows go with it; picture blobs stay.
    async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait PictureStore: Send + Sync {
    /// Persist picture bytes. The picture starts out unattached.
    async fn create(&self, mime_type: &str, data: &[u8]) -> Result<Picture>;

    /// Attach a picture to a product at the next free gallery position
    /// and return that position. Atomic: two racing attachers never
    /// observe the same position.
    async fn attach(&self, product_id: i64, picture_id: i64) -> Result<i64>;

    /// Pictures attached to a product, ordered by ascending position.
    async fn list_for_product(&self, product_id: i64) -> Result<Vec<Picture>>;

    /// Raw bytes and MIME type of a stored picture.
    async fn data(&self, picture_id: i64) -> Result<(String, Vec<u8>)>;

    /// Remove an attachment. Clears the product cover in the same step
    /// when it pointed at this picture. Fails with `NotAttached` when no
    /// attachment row exists; positions of other attachments are never
    /// renumbered.
    async fn detach(&self, product_id: i64, picture_id: i64) -> Result<()>;

    /// Delete picture bytes. Idempotent.
    async fn delete(&self, picture_id: i64) -> Result<()>;

    /// Mark an attached picture as the product cover. Fails with
    /// `NotAttached` when the picture is not in the product gallery.
    async fn set_cover(&self, product_id: i64, picture_id: i64) -> Result<()>;
}

/// Handles to every store, cloned freely across services.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub pictures: Arc<dyn PictureStore>,
}

/// Build the storage stack selected by configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Stores, Box<dyn std::error::Error>> {
    match config.storage_type.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            info!("Storage: SQLite at {}", config.path);
            let pool = sqlite::connect(&config.path, config.max_connections).await?;
            let users = sqlite::SqliteUserStore::new(pool.clone());
            users.init().await?;
            let products = sqlite::SqliteProductStore::new(pool.clone());
            products.init().await?;
            let pictures = sqlite::SqlitePictureStore::new(pool);
            pictures.init().await?;
            Ok(Stores {
                users: Arc::new(users),
                products: Arc::new(products),
                pictures: Arc::new(pictures),
            })
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => {
            error!("Storage type 'sqlite' requested but the sqlite feature is not compiled in");
            Err("sqlite support not compiled in".into())
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config
                .url
                .as_deref()
                .ok_or("storage.url is required for the postgres backend")?;
            info!("Storage: PostgreSQL");
            let pool = postgres::connect(url, config.max_connections).await?;
            let users = postgres::PgUserStore::new(pool.clone());
            users.init().await?;
            let products = postgres::PgProductStore::new(pool.clone());
            products.init().await?;
            let pictures = postgres::PgPictureStore::new(pool);
            pictures.init().await?;
            Ok(Stores {
                users: Arc::new(users),
                products: Arc::new(products),
                pictures: Arc::new(pictures),
            })
        }
        #[cfg(not(feature = "postgres"))]
        "postgres" => {
            error!("Storage type 'postgres' requested but the postgres feature is not compiled in");
            Err("postgres support not compiled in".into())
        }
        other => {
            error!("Unknown storage type: {}", other);
            Err(format!("unknown storage type: {}", other).into())
        }
    }
}

/// Parse an RFC 3339 timestamp column.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

/// Parse a role column.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn parse_role(value: &str) -> Result<Role> {
    value
        .parse()
        .map_err(|_| StorageError::InvalidRole(value.to_string()))
}

/// Whether a database error is a unique constraint violation, in either
/// dialect. SQLite reports by message, PostgreSQL by SQLSTATE 23505.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.message().contains("UNIQUE constraint failed")
                || db.code().as_deref() == Some("23505")
        }
        _ => false,
    }
}
