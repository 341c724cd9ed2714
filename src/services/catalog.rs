//! Product CRUD with seller ownership checks.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::{Result, ServiceError};
use crate::auth::{ensure_owner, ensure_seller};
use crate::dispatch::Dispatcher;
use crate::domain::{Actor, CatalogEvent, Product};
use crate::storage::{NewProduct, ProductFilter, ProductPatch, ProductStore};

/// Payload for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
}

pub struct CatalogService {
    products: Arc<dyn ProductStore>,
    dispatcher: Arc<Dispatcher>,
}

impl CatalogService {
    pub fn new(products: Arc<dyn ProductStore>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            products,
            dispatcher,
        }
    }

    /// Create a product owned by the acting seller.
    pub async fn create(&self, actor: &Actor, input: NewProductInput) -> Result<Product> {
        ensure_seller(actor)?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name must not be empty".to_string()));
        }
        if input.price_cents < 0 {
            return Err(ServiceError::InvalidInput(
                "price_cents must not be negative".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::InvalidInput(
                "stock must not be negative".to_string(),
            ));
        }
        let product = self
            .products
            .create(NewProduct {
                seller_id: actor.user_id,
                name,
                description: input.description,
                price_cents: input.price_cents,
                stock: input.stock,
            })
            .await?;
        info!(product_id = product.id, seller_id = actor.user_id, "product created");
        self.publish(CatalogEvent::ProductCreated {
            product_id: product.id,
            seller_id: product.seller_id,
            name: product.name.clone(),
            price_cents: product.price_cents,
        })
        .await;
        Ok(product)
    }

    pub async fn get(&self, id: i64) -> Result<Product> {
        Ok(self.products.get(id).await?)
    }

    pub async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>> {
        Ok(self.products.list(filter).await?)
    }

    /// Apply a partial update. Existence is checked before ownership so
    /// only the owner distinction leaks through the error.
    pub async fn update(&self, actor: &Actor, id: i64, patch: ProductPatch) -> Result<Product> {
        let current = self.products.get(id).await?;
        ensure_owner(actor, current.seller_id)?;
        let product = self.products.update(id, patch).await?;
        self.publish(CatalogEvent::ProductUpdated {
            product_id: product.id,
            seller_id: product.seller_id,
        })
        .await;
        Ok(product)
    }

    /// Delete a product and its gallery attachments.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<()> {
        let current = self.products.get(id).await?;
        ensure_owner(actor, current.seller_id)?;
        self.products.delete(id).await?;
        info!(product_id = id, seller_id = actor.user_id, "product deleted");
        self.publish(CatalogEvent::ProductDeleted {
            product_id: id,
            seller_id: current.seller_id,
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
