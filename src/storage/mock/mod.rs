//! In-memory stores for unit tests.
//!
//! One `MockStores` value implements all three store traits over plain
//! maps, with switches that force failures so callers can exercise their
//! error paths. Gallery semantics track the SQL backends: positions are
//! max + 1 and never renumbered, detach clears a matching cover.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    NewProduct, PictureStore, ProductFilter, ProductPatch, ProductStore, Result, StorageError,
    Stores, UserStore,
};
use crate::domain::{Picture, Product, Role, User};

#[derive(Default)]
pub struct MockStores {
    users: RwLock<HashMap<i64, User>>,
    products: RwLock<HashMap<i64, Product>>,
    pictures: RwLock<HashMap<i64, (Picture, Vec<u8>)>>,
    // product id -> (picture id, position), in attachment order
    attachments: RwLock<HashMap<i64, Vec<(i64, i64)>>>,
    next_user_id: AtomicI64,
    next_product_id: AtomicI64,
    next_picture_id: AtomicI64,
    fail: RwLock<bool>,
    fail_attach: RwLock<bool>,
}

impl MockStores {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bundle this mock as every store.
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            users: self.clone(),
            products: self.clone(),
            pictures: self.clone(),
        }
    }

    /// When set, every operation fails with a backend error.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// When set, only `attach` fails. Lets callers exercise their
    /// cleanup of a stored-but-unattached picture.
    pub async fn set_fail_attach(&self, fail: bool) {
        *self.fail_attach.write().await = fail;
    }

    async fn check_fail(&self) -> Result<()> {
        if *self.fail.read().await {
            return Err(StorageError::Backend("mock storage failure".to_string()));
        }
        Ok(())
    }

    /// Attachment positions for a product, in attachment order.
    pub async fn positions(&self, product_id: i64) -> Vec<i64> {
        self.attachments
            .read()
            .await
            .get(&product_id)
            .map(|list| list.iter().map(|(_, position)| *position).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserStore for MockStores {
    async fn create(&self, email: &str, password_hash: &str, role: Role) -> Result<User> {
        self.check_fail().await?;
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(StorageError::DuplicateEmail(email.to_string()));
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = User {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: Utc::now(),
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn get(&self, id: i64) -> Result<User> {
        self.check_fail().await?;
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::UserNotFound(id))
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        self.check_fail().await?;
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| StorageError::EmailNotFound(email.to_string()))
    }
}

#[async_trait]
impl ProductStore for MockStores {
    async fn create(&self, new: NewProduct) -> Result<Product> {
        self.check_fail().await?;
        let id = self.next_product_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let product = Product {
            id,
            seller_id: new.seller_id,
            name: new.name,
            description: new.description,
            price_cents: new.price_cents,
            stock: new.stock,
            cover_picture_id: None,
            created_at: now,
            updated_at: now,
        };
        self.products.write().await.insert(id, product.clone());
        Ok(product)
    }

    async fn get(&self, id: i64) -> Result<Product> {
        self.check_fail().await?;
        self.products
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StorageError::ProductNotFound(id))
    }

    async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        self.check_fail().await?;
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products
            .values()
            .filter(|p| filter.seller_id.map_or(true, |s| p.seller_id == s))
            .cloned()
            .collect();
        // Ids are monotonic, so newest first is highest id first.
        listed.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(listed
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update(&self, id: i64, patch: ProductPatch) -> Result<Product> {
        self.check_fail().await?;
        let mut products = self.products.write().await;
        let product = products.get_mut(&id).ok_or(StorageError::ProductNotFound(id))?;
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price_cents) = patch.price_cents {
            product.price_cents = price_cents;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.check_fail().await?;
        if self.products.write().await.remove(&id).is_none() {
            return Err(StorageError::ProductNotFound(id));
        }
        self.attachments.write().await.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl PictureStore for MockStores {
    async fn create(&self, mime_type: &str, data: &[u8]) -> Result<Picture> {
        self.check_fail().await?;
        let id = self.next_picture_id.fetch_add(1, Ordering::SeqCst) + 1;
        let picture = Picture {
            id,
            mime_type: mime_type.to_string(),
            size_bytes: data.len() as i64,
            position: 0,
            created_at: Utc::now(),
        };
        self.pictures
            .write()
            .await
            .insert(id, (picture.clone(), data.to_vec()));
        Ok(picture)
    }

    async fn attach(&self, product_id: i64, picture_id: i64) -> Result<i64> {
        self.check_fail().await?;
        if *self.fail_attach.read().await {
            return Err(StorageError::Backend("mock attach failure".to_string()));
        }
        if !self.products.read().await.contains_key(&product_id) {
            return Err(StorageError::ProductNotFound(product_id));
        }
        if !self.pictures.read().await.contains_key(&picture_id) {
            return Err(StorageError::PictureNotFound(picture_id));
        }
        let mut attachments = self.attachments.write().await;
        let list = attachments.entry(product_id).or_default();
        let position = list.iter().map(|(_, p)| *p).max().unwrap_or(0) + 1;
        list.push((picture_id, position));
        Ok(position)
    }

    async fn list_for_product(&self, product_id: i64) -> Result<Vec<Picture>> {
        self.check_fail().await?;
        let attachments = self.attachments.read().await;
        let pictures = self.pictures.read().await;
        let mut listed: Vec<Picture> = attachments
            .get(&product_id)
            .map(|list| {
                list.iter()
                    .filter_map(|(picture_id, position)| {
                        pictures.get(picture_id).map(|(picture, _)| {
                            let mut picture = picture.clone();
                            picture.position = *position;
                            picture
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        listed.sort_by_key(|p| p.position);
        Ok(listed)
    }

    async fn data(&self, picture_id: i64) -> Result<(String, Vec<u8>)> {
        self.check_fail().await?;
        self.pictures
            .read()
            .await
            .get(&picture_id)
            .map(|(picture, data)| (picture.mime_type.clone(), data.clone()))
            .ok_or(StorageError::PictureNotFound(picture_id))
    }

    async fn detach(&self, product_id: i64, picture_id: i64) -> Result<()> {
        self.check_fail().await?;
        let mut attachments = self.attachments.write().await;
        let list = attachments
            .get_mut(&product_id)
            .ok_or(StorageError::NotAttached {
                product: product_id,
                picture: picture_id,
            })?;
        let before = list.len();
        list.retain(|(id, _)| *id != picture_id);
        if list.len() == before {
            return Err(StorageError::NotAttached {
                product: product_id,
                picture: picture_id,
            });
        }
        let mut products = self.products.write().await;
        if let Some(product) = products.get_mut(&product_id) {
            if product.cover_picture_id == Some(picture_id) {
                product.cover_picture_id = None;
            }
        }
        Ok(())
    }

    async fn delete(&self, picture_id: i64) -> Result<()> {
        self.check_fail().await?;
        self.pictures.write().await.remove(&picture_id);
        Ok(())
    }

    async fn set_cover(&self, product_id: i64, picture_id: i64) -> Result<()> {
        self.check_fail().await?;
        let attached = self
            .attachments
            .read()
            .await
            .get(&product_id)
            .is_some_and(|list| list.iter().any(|(id, _)| *id == picture_id));
        if !attached {
            return Err(StorageError::NotAttached {
                product: product_id,
                picture: picture_id,
            });
        }
        let mut products = self.products.write().await;
        let product = products
            .get_mut(&product_id)
            .ok_or(StorageError::ProductNotFound(product_id))?;
        product.cover_picture_id = Some(picture_id);
        product.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (Arc<MockStores>, Product) {
        let mock = MockStores::new();
        let seller = UserStore::create(mock.as_ref(), "s@example.com", "h", Role::Seller)
            .await
            .unwrap();
        let product = ProductStore::create(
            mock.as_ref(),
            NewProduct {
                seller_id: seller.id,
                name: "Chair".into(),
                description: "Oak chair".into(),
                price_cents: 4500,
                stock: 2,
            },
        )
        .await
        .unwrap();
        (mock, product)
    }

    #[tokio::test]
    async fn attach_assigns_increasing_positions() {
        let (mock, product) = seeded().await;
        let a = PictureStore::create(mock.as_ref(), "image/png", b"a")
            .await
            .unwrap();
        let b = PictureStore::create(mock.as_ref(), "image/png", b"b")
            .await
            .unwrap();

        assert_eq!(mock.attach(product.id, a.id).await.unwrap(), 1);
        assert_eq!(mock.attach(product.id, b.id).await.unwrap(), 2);

        let listed = mock.list_for_product(product.id).await.unwrap();
        assert_eq!(
            listed.iter().map(|p| (p.id, p.position)).collect::<Vec<_>>(),
            vec![(a.id, 1), (b.id, 2)]
        );
    }

    #[tokio::test]
    async fn detach_clears_matching_cover() {
        let (mock, product) = seeded().await;
        let picture = PictureStore::create(mock.as_ref(), "image/png", b"a")
            .await
            .unwrap();
        mock.attach(product.id, picture.id).await.unwrap();
        mock.set_cover(product.id, picture.id).await.unwrap();

        mock.detach(product.id, picture.id).await.unwrap();

        let stored = ProductStore::get(mock.as_ref(), product.id).await.unwrap();
        assert_eq!(stored.cover_picture_id, None);
        assert!(matches!(
            mock.detach(product.id, picture.id).await.unwrap_err(),
            StorageError::NotAttached { .. }
        ));
    }

    #[tokio::test]
    async fn fail_switch_fails_every_store() {
        let (mock, product) = seeded().await;
        mock.set_fail(true).await;
        assert!(matches!(
            ProductStore::get(mock.as_ref(), product.id).await.unwrap_err(),
            StorageError::Backend(_)
        ));
        mock.set_fail(false).await;
        assert!(ProductStore::get(mock.as_ref(), product.id).await.is_ok());
    }
}
