//! Table definitions shared by the SQL backends.
//!
//! Identifiers are declared once as `sea_query::Iden` enums so query
//! builders in the sqlite and postgres modules cannot drift from the
//! DDL below. Timestamps are stored as RFC 3339 text in both dialects,
//! which keeps the row mapping identical across backends.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Role,
    CreatedAt,
}

#[derive(Iden)]
pub enum Products {
    Table,
    Id,
    SellerId,
    Name,
    Description,
    PriceCents,
    Stock,
    CoverPictureId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Pictures {
    Table,
    Id,
    MimeType,
    SizeBytes,
    Data,
    CreatedAt,
}

#[derive(Iden)]
pub enum ProductPictures {
    Table,
    ProductId,
    PictureId,
    Position,
}

/// Users table, SQLite dialect.
pub const CREATE_USERS_SQLITE: &[&str] = &["CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
)"];

/// Products table, SQLite dialect. The cover column carries no foreign
/// key on purpose: it may only name an attached picture, and that
/// invariant is kept by the picture store, not by the schema.
pub const CREATE_PRODUCTS_SQLITE: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    seller_id INTEGER NOT NULL REFERENCES users (id),
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    price_cents INTEGER NOT NULL,
    stock INTEGER NOT NULL,
    cover_picture_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)",
    "CREATE INDEX IF NOT EXISTS idx_products_seller ON products (seller_id)",
];

/// Picture blobs and the attachment join table, SQLite dialect.
/// The unique index on (product_id, position) backs the gallery
/// ordering guarantee; attachment rows die with their product.
pub const CREATE_PICTURES_SQLITE: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pictures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mime_type TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    data BLOB NOT NULL,
    created_at TEXT NOT NULL
)",
    "CREATE TABLE IF NOT EXISTS product_pictures (
    product_id INTEGER NOT NULL REFERENCES products (id) ON DELETE CASCADE,
    picture_id INTEGER NOT NULL REFERENCES pictures (id),
    position INTEGER NOT NULL,
    PRIMARY KEY (product_id, picture_id),
    UNIQUE (product_id, position)
)"];

/// Users table, PostgreSQL dialect.
pub const CREATE_USERS_POSTGRES: &[&str] = &["CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL
)"];

/// Products table, PostgreSQL dialect.
pub const CREATE_PRODUCTS_POSTGRES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS products (
    id BIGSERIAL PRIMARY KEY,
    seller_id BIGINT NOT NULL REFERENCES users (id),
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    price_cents BIGINT NOT NULL,
    stock BIGINT NOT NULL,
    cover_picture_id BIGINT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)",
    "CREATE INDEX IF NOT EXISTS idx_products_seller ON products (seller_id)",
];

/// Picture blobs and attachments, PostgreSQL dialect. The position
/// constraint carries a stable name so conflict retries can recognise
/// it by message.
pub const CREATE_PICTURES_POSTGRES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pictures (
    id BIGSERIAL PRIMARY KEY,
    mime_type TEXT NOT NULL,
    size_bytes BIGINT NOT NULL,
    data BYTEA NOT NULL,
    created_at TEXT NOT NULL
)",
    "CREATE TABLE IF NOT EXISTS product_pictures (
    product_id BIGINT NOT NULL REFERENCES products (id) ON DELETE CASCADE,
    picture_id BIGINT NOT NULL REFERENCES pictures (id),
    position BIGINT NOT NULL,
    PRIMARY KEY (product_id, picture_id),
    CONSTRAINT uq_product_pictures_position UNIQUE (product_id, position)
)"];
