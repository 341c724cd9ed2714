//! PostgreSQL-backed stores for shared deployments.
//!
//! Mirrors the SQLite backend with one difference worth noting: Postgres
//! runs writers concurrently, so two attachers can compute the same
//! MAX(position) + 1. The named unique constraint turns the loser into a
//! conflict error, and `attach` retries it with a short backoff.

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use sea_query::{Expr, Order, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use super::schema::{
    Pictures, ProductPictures, Products, Users, CREATE_PICTURES_POSTGRES,
    CREATE_PRODUCTS_POSTGRES, CREATE_USERS_POSTGRES,
};
use super::{
    is_unique_violation, parse_role, parse_timestamp, NewProduct, PictureStore, ProductFilter,
    ProductPatch, ProductStore, Result, StorageError, UserStore,
};
use crate::domain::{Picture, Product, Role, User};

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    debug!("PostgreSQL pool ready");
    Ok(pool)
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_USERS_POSTGRES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgUserStore {
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
            .returning_col(Users::Id)
            .build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StorageError::DuplicateEmail(email.to_string())
                } else {
                    StorageError::Database(e)
                }
            })?;
        Ok(User {
            id: row.try_get(0)?,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at,
        })
    }

    async fn get(&self, id: i64) -> Result<User> {
        let (sql, values) = user_select()
            .and_where(Expr::col(Users::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::UserNotFound(id))?;
        user_from_row(&row)
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let (sql, values) = user_select()
            .and_where(Expr::col(Users::Email).eq(email))
            .build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::EmailNotFound(email.to_string()))?;
        user_from_row(&row)
    }
}

pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_PRODUCTS_POSTGRES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
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
            .returning_col(Products::Id)
            .build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(&sql, values).fetch_one(&self.pool).await?;
        Ok(Product {
            id: row.try_get(0)?,
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
            .build_sqlx(PostgresQueryBuilder);
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
            .build_sqlx(PostgresQueryBuilder);
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
        let (sql, values) = statement.build_sqlx(PostgresQueryBuilder);
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
            .build_sqlx(PostgresQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::ProductNotFound(id));
        }
        Ok(())
    }
}

pub struct PgPictureStore {
    pool: PgPool,
}

impl PgPictureStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        for statement in CREATE_PICTURES_POSTGRES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn try_attach(&self, product_id: i64, picture_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO product_pictures (product_id, picture_id, position) \
             SELECT $1, $2, COALESCE(MAX(position), 0) + 1 \
             FROM product_pictures WHERE product_id = $1 \
             RETURNING position",
        )
        .bind(product_id)
        .bind(picture_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get(0)?)
    }
}

#[async_trait]
impl PictureStore for PgPictureStore {
    async fn create(&self, mime_type: &str, data: &[u8]) -> Result<Picture> {
        let created_at = Utc::now();
        let row = sqlx::query(
            "INSERT INTO pictures (mime_type, size_bytes, data, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(mime_type)
        .bind(data.len() as i64)
        .bind(data)
        .bind(created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(Picture {
            id: row.try_get(0)?,
            mime_type: mime_type.to_string(),
            size_bytes: data.len() as i64,
            position: 0,
            created_at,
        })
    }

    async fn attach(&self, product_id: i64, picture_id: i64) -> Result<i64> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(250))
            .with_max_times(5)
            .with_jitter();
        let position = (|| self.try_attach(product_id, picture_id))
            .retry(backoff)
            .when(is_position_conflict)
            .notify(|_, delay| {
                warn!(product_id, picture_id, ?delay, "gallery position conflict, retrying attach");
            })
            .await?;
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
            .build_sqlx(PostgresQueryBuilder);
        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;
        rows.iter().map(picture_from_row).collect()
    }

    async fn data(&self, picture_id: i64) -> Result<(String, Vec<u8>)> {
        let row = sqlx::query("SELECT mime_type, data FROM pictures WHERE id = $1")
            .bind(picture_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::PictureNotFound(picture_id))?;
        Ok((row.try_get(0)?, row.try_get(1)?))
    }

    async fn detach(&self, product_id: i64, picture_id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query(
            "DELETE FROM product_pictures WHERE product_id = $1 AND picture_id = $2",
        )
        .bind(product_id)
        .bind(picture_id)
        .execute(&mut *tx)
        .await?;
        if removed.rows_affected() == 0 {
            return Err(StorageError::NotAttached {
                product: product_id,
                picture: picture_id,
            });
        }
        sqlx::query(
            "UPDATE products SET cover_picture_id = NULL \
             WHERE id = $1 AND cover_picture_id = $2",
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
        sqlx::query("DELETE FROM pictures WHERE id = $1")
            .bind(picture_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_cover(&self, product_id: i64, picture_id: i64) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET cover_picture_id = $2, updated_at = $3 \
             WHERE id = $1 AND EXISTS (SELECT 1 FROM product_pictures \
             WHERE product_id = $1 AND picture_id = $2)",
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

/// Whether the error is the losing side of a position race.
fn is_position_conflict(err: &StorageError) -> bool {
    match err {
        StorageError::Database(sqlx::Error::Database(db)) => {
            db.code().as_deref() == Some("23505")
                && db.message().contains("uq_product_pictures_position")
        }
        _ => false,
    }
}

fn user_select() -> sea_query::SelectStatement {
    let mut statement = Query::select();
    statement
        .columns([
            Users::Id,
            Users::Email,
            Users::PasswordHash,
            Users::Role,
            Users::CreatedAt,
        ])
        .from(Users::Table);
    statement
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

fn user_from_row(row: &PgRow) -> Result<User> {
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

fn product_from_row(row: &PgRow) -> Result<Product> {
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

fn picture_from_row(row: &PgRow) -> Result<Picture> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Picture {
        id: row.try_get("id")?,
        mime_type: row.try_get("mime_type")?,
        size_bytes: row.try_get("size_bytes")?,
        position: row.try_get("position")?,
        created_at: parse_timestamp(&created_at)?,
    })
}
