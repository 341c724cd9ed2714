//! Picture uploads, galleries and covers.

use std::sync::Arc;

use tracing::{info, warn};

use super::{Result, ServiceError};
use crate::auth::ensure_owner;
use crate::dispatch::Dispatcher;
use crate::domain::{Actor, CatalogEvent, Picture};
use crate::storage::{PictureStore, ProductStore};

pub struct GalleryService {
    products: Arc<dyn ProductStore>,
    pictures: Arc<dyn PictureStore>,
    dispatcher: Arc<Dispatcher>,
    max_upload_bytes: usize,
}

impl GalleryService {
    pub fn new(
        products: Arc<dyn ProductStore>,
        pictures: Arc<dyn PictureStore>,
        dispatcher: Arc<Dispatcher>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            products,
            pictures,
            dispatcher,
            max_upload_bytes,
        }
    }

    /// Store picture bytes and attach them to the product at the tail of
    /// its gallery. The returned picture carries the assigned position.
    pub async fn upload(
        &self,
        actor: &Actor,
        product_id: i64,
        mime_type: &str,
        data: &[u8],
    ) -> Result<Picture> {
        if !mime_type.starts_with("image/") {
            return Err(ServiceError::InvalidInput(format!(
                "unsupported content type: {}",
                mime_type
            )));
        }
        if data.is_empty() {
            return Err(ServiceError::InvalidInput("picture data is empty".to_string()));
        }
        if data.len() > self.max_upload_bytes {
            return Err(ServiceError::InvalidInput(format!(
                "picture exceeds {} bytes",
                self.max_upload_bytes
            )));
        }
        let product = self.products.get(product_id).await?;
        ensure_owner(actor, product.seller_id)?;

        let mut picture = self.pictures.create(mime_type, data).await?;
        match self.pictures.attach(product_id, picture.id).await {
            Ok(position) => {
                picture.position = position;
                info!(
                    product_id,
                    picture_id = picture.id,
                    position,
                    size_bytes = picture.size_bytes,
                    "picture uploaded"
                );
                self.publish(CatalogEvent::PictureAttached {
                    product_id,
                    picture_id: picture.id,
                    position,
                })
                .await;
                Ok(picture)
            }
            Err(err) => {
                // The blob row must not outlive a failed attach.
                if let Err(cleanup) = self.pictures.delete(picture.id).await {
                    warn!(
                        picture_id = picture.id,
                        error = %cleanup,
                        "orphan picture cleanup failed"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Pictures attached to a product, ordered by position.
    pub async fn list(&self, product_id: i64) -> Result<Vec<Picture>> {
        self.products.get(product_id).await?;
        Ok(self.pictures.list_for_product(product_id).await?)
    }

    /// Raw picture bytes with their MIME type.
    pub async fn picture_data(&self, picture_id: i64) -> Result<(String, Vec<u8>)> {
        Ok(self.pictures.data(picture_id).await?)
    }

    /// Remove a picture from a product gallery. With `hard` set the
    /// bytes are deleted as well; a failed delete surfaces even though
    /// the detach already committed.
    pub async fn detach(
        &self,
        actor: &Actor,
        product_id: i64,
        picture_id: i64,
        hard: bool,
    ) -> Result<()> {
        let product = self.products.get(product_id).await?;
        ensure_owner(actor, product.seller_id)?;

        self.pictures.detach(product_id, picture_id).await?;
        if hard {
            self.pictures.delete(picture_id).await?;
        }
        info!(product_id, picture_id, hard, "picture detached");
        self.publish(CatalogEvent::PictureDetached {
            product_id,
            picture_id,
            deleted: hard,
        })
        .await;
        Ok(())
    }

    /// Mark an attached picture as the product cover.
    pub async fn set_cover(&self, actor: &Actor, product_id: i64, picture_id: i64) -> Result<()> {
        let product = self.products.get(product_id).await?;
        ensure_owner(actor, product.seller_id)?;

        self.pictures.set_cover(product_id, picture_id).await?;
        info!(product_id, picture_id, "cover changed");
        self.publish(CatalogEvent::CoverChanged {
            product_id,
            picture_id,
        })
        .await;
        Ok(())
    }

    async fn publish(&self, event: CatalogEvent) {
        if let Err(err) = self.dispatcher.publish_event(&event).await {
            warn!(error = %err, "event publish failed, continuing");
        }
    }
}
