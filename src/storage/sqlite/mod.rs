//! SQLite-backed stores for the standalone deployment.
//!
//! One file on disk, WAL mode, foreign keys on. SQLite serialises
//! writers, so the gallery statements below are atomic without any
//! application-side locking: `attach` computes and claims the next
//! position inside a single INSERT, `detach` removes the attachment and
//! clears a matching cover inside one transaction.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::schema::{
    Pictures, ProductPictures, Products, Users, CREATE_PICTURES_SQLITE, CREATE_PRODUCTS_SQLITE,
    CREATE_USERS_SQLITE,
};
use super::{
    is_unique_violation, parse_role, parse_timestamp, NewProduct, PictureStore, ProductFilter,
    ProductPatch, ProductStore, Result, StorageError, UserStore,
};
use crate::domain::{Picture, Product, Role, User};

/// Open (creating if needed) the database file and its parent directory.
pub async fn connect(path: &str, max_connections: u32) -> Result<SqlitePool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    debug!(path, "SQLite pool ready");
    Ok(pool)
}

pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_USERS_SQLITE {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> Result<User> {
        let created_at = Utc::now();
        let (sql, values) = Query::insert()
            .into_table(Users::Table)
            .columns([Users::Email, Users::PasswordHash, Users::Role, Users::CreatedAt])
            .values_panic([
                email.into(),
                password_hash.into(),
                role.as_str().into(),
                created_at.to_rfc3339().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::DuplicateEmail(email.to_string())
                } else {
                    StorageError::Database(e)
                }
            })?;
        Ok(User {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at,
        })
    }

    async fn get(&self, id: i64) -> Result<User> {
        let (sql, values) = Query::select()
            .columns([
                Users::Id,
                Users::Email,
                Users::PasswordHash,
                Users::Role,
                Users::CreatedAt,
            ])
            .from(Users::Table)
            .and_where(Expr::col(Users::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::UserNotFound(id))?;
        user_from_row(&row)
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let (sql, values) = Query::select()
            .columns([
                Users::Id,
                Users::Email,
                Users::PasswordHash,
                Users::Role,
                Users::CreatedAt,
            ])
            .from(Users::Table)
            .and_where(Expr::col(Users::Email).eq(email))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::EmailNotFound(email.to_string()))?;
        user_from_row(&row)
    }
}

pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_PRODUCTS_SQLITE {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn create(&self, new: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let (sql, values) = Query::insert()
            .into_table(Products::Table)
            .columns([
                Products::SellerId,
                Products::Name,
                Products::Description,
                Products::PriceCents,
                Products::Stock,
                Products::CreatedAt,
                Products::UpdatedAt,
            ])
            .values_panic([
                new.seller_id.into(),
                new.name.clone().into(),
                new.description.clone().into(),
                new.price_cents.into(),
                new.stock.into(),
                now.to_rfc3339().into(),
                now.to_rfc3339().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(Product {
            id: result.last_insert_rowid(),
            seller_id: new.seller_id,
            name: new.name,
            description: new.description,
            price_cents: new.price_cents,
            stock: new.stock,
            cover_picture_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get(&self, id: i64) -> Result<Product> {
        let (sql, values) = product_select()
            .and_where(Expr::col(Products::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::ProductNotFound(id))?;
        product_from_row(&row)
    }

    async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        let mut statement = product_select();
        if let Some(seller_id) = filter.seller_id {
            statement.and_where(Expr::col(Products::SellerId).eq(seller_id));
        }
        let (sql, values) = statement
            .order_by(Products::CreatedAt, Order::Desc)
            .order_by(Products::Id, Order::Desc)
            .limit(filter.limit.max(0) as u64)
            .offset(filter.offset.max(0) as u64)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn update(&self, id: i64, patch: ProductPatch) -> Result<Product> {
        let mut statement = Query::update();
        statement
            .table(Products::Table)
            .value(Products::UpdatedAt, Utc::now().to_rfc3339())
            .and_where(Expr::col(Products::Id).eq(id));
        if let Some(name) = patch.name {
            statement.value(Products::Name, name);
        }
        if let Some(description) = patch.description {
            statement.value(Products::Description, description);
        }
        if let Some(price_cents) = patch.price_cents {
            statement.value(Products::PriceCents, price_cents);
        }
        if let Some(stock) = patch.stock {
            statement.value(Products::Stock, stock);
        }
        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::ProductNotFound(id));
        }
        self.get(id).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let (sql, values) = Query::delete()
            .from_table(Products::Table)
            .and_where(Expr::col(Products::Id).eq(id))
            .build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::ProductNotFound(id));
        }
        Ok(())
    }
}

pub struct SqlitePictureStore {
    pool: SqlitePool,
}

impl SqlitePictureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_PICTURES_SQLITE {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PictureStore for SqlitePictureStore {
    async fn create(&self, mime_type: &str, data: &[u8]) -> Result<Picture> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO pictures (mime_type, size_bytes, data, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(mime_type)
        .bind(data.len() as i64)
        .bind(data)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(Picture {
            id: result.last_insert_rowid(),
            mime_type: mime_type.to_string(),
            size_bytes: data.len() as i64,
            position: 0,
            created_at,
        })
    }

    async fn attach(&self, product_id: i64, picture_id: i64) -> Result<i64> {
        // One INSERT computes and claims MAX(position) + 1. The unique
        // index on (product_id, position) backstops the atomicity.
        let row = sqlx::query(
            "INSERT INTO product_pictures (product_id, picture_id, position) \
             SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1 \
             FROM product_pictures WHERE product_id = ?1 \
             RETURNING position",
        )
        .bind(product_id)
        .bind(picture_id)
        .fetch_one(&self.pool)
        .await?;
        let position: i64 = row.try_get(0)?;
        debug!(product_id, picture_id, position, "picture attached");
        Ok(position)
    }

    async fn list_for_product(&self, product_id: i64) -> Result<Vec<Picture>> {
        let (sql, values) = Query::select()
            .columns([
                (Pictures::Table, Pictures::Id),
                (Pictures::Table, Pictures::MimeType),
                (Pictures::Table, Pictures::SizeBytes),
                (Pictures::Table, Pictures::CreatedAt),
            ])
            .column((ProductPictures::Table, ProductPictures::Position))
            .from(Pictures::Table)
            .inner_join(
                ProductPictures::Table,
                Expr::col((ProductPictures::Table, ProductPictures::PictureId))
                    .equals((Pictures::Table, Pictures::Id)),
            )
            .and_where(
                Expr::col((ProductPictures::Table, ProductPictures::ProductId)).eq(product_id),
            )
            .order_by((ProductPictures::Table, ProductPictures::Position), Order::Asc)
            .build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(picture_from_row).collect()
    }

    async fn data(&self, picture_id: i64) -> Result<(String, Vec<u8>)> {
        let row = sqlx::query("SELECT mime_type, data FROM pictures WHERE id = ?1")
            .bind(picture_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::PictureNotFound(picture_id))?;
        Ok((row.try_get(0)?, row.try_get(1)?))
    }

    async fn detach(&self, product_id: i64, picture_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query(
            "DELETE FROM product_pictures WHERE product_id = ?1 AND picture_id = ?2",
        )
        .bind(product_id)
        .bind(picture_id)
        .execute(&mut *tx)
        .await?;
        if removed.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(StorageError::NotAttached {
                product: product_id,
                picture: picture_id,
            });
        }
        sqlx::query(
            "UPDATE products SET cover_picture_id = NULL \
             WHERE id = ?1 AND cover_picture_id = ?2",
        )
        .bind(product_id)
        .bind(picture_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        debug!(product_id, picture_id, "picture detached");
        Ok(())
    }

    async fn delete(&self, picture_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pictures WHERE id = ?1")
            .bind(picture_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_cover(&self, product_id: i64, picture_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET cover_picture_id = ?2, updated_at = ?3 \
             WHERE id = ?1 AND EXISTS (SELECT 1 FROM product_pictures \
             WHERE product_id = ?1 AND picture_id = ?2)",
        )
        .bind(product_id)
        .bind(picture_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotAttached {
                product: product_id,
                picture: picture_id,
            });
        }
        Ok(())
    }
}

fn product_select() -> sea_query::SelectStatement {
    let mut statement = Query::select();
    statement
        .columns([
            Products::Id,
            Products::SellerId,
            Products::Name,
            Products::Description,
            Products::PriceCents,
            Products::Stock,
            Products::CoverPictureId,
            Products::CreatedAt,
            Products::UpdatedAt,
        ])
        .from(Products::Table);
    statement
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: parse_role(&role)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<Product> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Product {
        id: row.try_get("id")?,
        seller_id: row.try_get("seller_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price_cents: row.try_get("price_cents")?,
        stock: row.try_get("stock")?,
        cover_picture_id: row.try_get("cover_picture_id")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn picture_from_row(row: &SqliteRow) -> Result<Picture> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Picture {
        id: row.try_get("id")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        position: row.try_get("position")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
