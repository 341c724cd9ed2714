//! Gallery consistency tests against the real SQLite backend.
//!
//! Run with: cargo test --test gallery_sqlite
//!
//! These exercise the invariants the SQL statements are written for:
//! atomic position assignment, gaps that never close, cover clearing,
//! and cascade on product delete.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use bazaar::domain::Role;
use bazaar::storage::sqlite::{connect, SqlitePictureStore, SqliteProductStore, SqliteUserStore};
use bazaar::storage::{
    NewProduct, PictureStore, ProductFilter, ProductPatch, ProductStore, StorageError, UserStore,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    users: SqliteUserStore,
    products: SqliteProductStore,
    pictures: Arc<SqlitePictureStore>,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gallery.db");
    let pool = connect(path.to_str().expect("utf-8 path"), 5)
        .await
        .expect("connect");

    let users = SqliteUserStore::new(pool.clone());
    users.init().await.expect("users schema");
    let products = SqliteProductStore::new(pool.clone());
    products.init().await.expect("products schema");
    let pictures = Arc::new(SqlitePictureStore::new(pool));
    pictures.init().await.expect("pictures schema");

    Fixture {
        _dir: dir,
        users,
        products,
        pictures,
    }
}

impl Fixture {
    async fn seeded_product(&self) -> i64 {
        let seller = self
            .users
            .create("seller@example.com", "hash", Role::Seller)
            .await
            .expect("seller");
        self.product_for(seller.id).await
    }

    async fn product_for(&self, seller_id: i64) -> i64 {
        self.products
            .create(NewProduct {
                seller_id,
                name: "Rug".to_string(),
                description: "Wool rug".to_string(),
                price_cents: 12900,
                stock: 1,
            })
            .await
            .expect("product")
            .id
    }

    async fn picture(&self) -> i64 {
        self.pictures
            .create("image/png", b"png-bytes")
            .await
            .expect("picture")
            .id
    }
}

#[tokio::test]
async fn positions_form_a_strictly_increasing_sequence() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;

    let mut positions = Vec::new();
    for _ in 0..3 {
        let picture = fx.picture().await;
        positions.push(fx.pictures.attach(product, picture).await.unwrap());
    }
    assert_eq!(positions, vec![1, 2, 3]);

    let listed = fx.pictures.list_for_product(product).await.unwrap();
    assert_eq!(
        listed.iter().map(|p| p.position).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn detach_leaves_a_gap_and_the_next_attach_extends_past_it() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;

    let a = fx.picture().await;
    let b = fx.picture().await;
    let c = fx.picture().await;
    fx.pictures.attach(product, a).await.unwrap();
    fx.pictures.attach(product, b).await.unwrap();
    fx.pictures.attach(product, c).await.unwrap();

    fx.pictures.detach(product, b).await.unwrap();
    let listed = fx.pictures.list_for_product(product).await.unwrap();
    assert_eq!(
        listed.iter().map(|p| p.position).collect::<Vec<_>>(),
        vec![1, 3]
    );

    // MAX + 1, not gap filling.
    let d = fx.picture().await;
    assert_eq!(fx.pictures.attach(product, d).await.unwrap(), 4);
}

#[tokio::test]
async fn positions_restart_once_the_gallery_is_emptied() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;

    let a = fx.picture().await;
    let b = fx.picture().await;
    fx.pictures.attach(product, a).await.unwrap();
    fx.pictures.attach(product, b).await.unwrap();
    fx.pictures.detach(product, a).await.unwrap();
    fx.pictures.detach(product, b).await.unwrap();

    let c = fx.picture().await;
    assert_eq!(fx.pictures.attach(product, c).await.unwrap(), 1);
}

#[tokio::test]
async fn detach_of_unattached_picture_is_typed() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;
    let loose = fx.picture().await;

    let err = fx.pictures.detach(product, loose).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::NotAttached { product: p, picture: q } if p == product && q == loose
    ));
}

#[tokio::test]
async fn cover_is_cleared_only_when_its_picture_is_detached() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;

    let cover = fx.picture().await;
    let other = fx.picture().await;
    fx.pictures.attach(product, cover).await.unwrap();
    fx.pictures.attach(product, other).await.unwrap();
    fx.pictures.set_cover(product, cover).await.unwrap();

    // Detaching a different picture leaves the cover alone.
    fx.pictures.detach(product, other).await.unwrap();
    let stored = fx.products.get(product).await.unwrap();
    assert_eq!(stored.cover_picture_id, Some(cover));

    // Detaching the cover clears it in the same step.
    fx.pictures.detach(product, cover).await.unwrap();
    let stored = fx.products.get(product).await.unwrap();
    assert_eq!(stored.cover_picture_id, None);
}

#[tokio::test]
async fn set_cover_requires_attachment() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;
    let loose = fx.picture().await;

    let err = fx.pictures.set_cover(product, loose).await.unwrap_err();
    assert!(matches!(err, StorageError::NotAttached { .. }));
}

#[tokio::test]
async fn picture_delete_removes_bytes_and_is_idempotent() {
    let fx = fixture().await;
    let picture = fx.picture().await;

    let (mime, data) = fx.pictures.data(picture).await.unwrap();
    assert_eq!(mime, "image/png");
    assert_eq!(data, b"png-bytes");

    fx.pictures.delete(picture).await.unwrap();
    let err = fx.pictures.data(picture).await.unwrap_err();
    assert!(matches!(err, StorageError::PictureNotFound(_)));

    // A second delete is a no-op, not an error.
    fx.pictures.delete(picture).await.unwrap();
}

#[tokio::test]
async fn product_delete_cascades_attachments_but_keeps_blobs() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;
    let picture = fx.picture().await;
    fx.pictures.attach(product, picture).await.unwrap();

    fx.products.delete(product).await.unwrap();

    let listed = fx.pictures.list_for_product(product).await.unwrap();
    assert!(listed.is_empty());
    // Blob survives; only the attachment row was cascade-deleted.
    assert!(fx.pictures.data(picture).await.is_ok());
}

#[tokio::test]
async fn concurrent_attaches_get_distinct_positions() {
    let fx = fixture().await;
    let product = fx.seeded_product().await;

    let mut picture_ids = Vec::new();
    for _ in 0..8 {
        picture_ids.push(fx.picture().await);
    }

    let mut handles = Vec::new();
    for picture in picture_ids {
        let pictures = fx.pictures.clone();
        handles.push(tokio::spawn(async move {
            pictures.attach(product, picture).await
        }));
    }
    let mut positions = Vec::new();
    for handle in handles {
        positions.push(handle.await.expect("join").expect("attach"));
    }

    positions.sort_unstable();
    assert_eq!(positions, (1..=8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn missing_product_updates_and_deletes_are_typed() {
    let fx = fixture().await;

    let err = fx
        .products
        .update(
            424242,
            ProductPatch {
                stock: Some(7),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::ProductNotFound(424242)));

    let err = fx.products.delete(424242).await.unwrap_err();
    assert!(matches!(err, StorageError::ProductNotFound(424242)));
}

#[tokio::test]
async fn listing_is_newest_first_with_offset_paging() {
    let fx = fixture().await;
    let seller = fx
        .users
        .create("pager@example.com", "hash", Role::Seller)
        .await
        .unwrap();

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(fx.product_for(seller.id).await);
    }

    let page = fx
        .products
        .list(ProductFilter {
            seller_id: Some(seller.id),
            limit: 2,
            offset: 1,
        })
        .await
        .unwrap();
    // Newest first: ids descend, and the offset skips the newest.
    assert_eq!(
        page.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![ids[3], ids[2]]
    );
}
