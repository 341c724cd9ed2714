//! Business events emitted by catalog and gallery mutations.
//!
//! Events are serialized to JSON and dispatched to the configured broker
//! sink on topic `{topic_prefix}.events.{domain}`. The partition key is the
//! product id so keyed brokers preserve per-product ordering.

use serde::{Deserialize, Serialize};

/// Everything the catalog announces to the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CatalogEvent {
    ProductCreated {
        product_id: i64,
        seller_id: i64,
        name: String,
        price_cents: i64,
    },
    ProductUpdated {
        product_id: i64,
        seller_id: i64,
    },
    ProductDeleted {
        product_id: i64,
        seller_id: i64,
    },
    PictureAttached {
        product_id: i64,
        picture_id: i64,
        position: i64,
    },
    PictureDetached {
        product_id: i64,
        picture_id: i64,
        /// True when the binary payload was hard-deleted as well.
        deleted: bool,
    },
    CoverChanged {
        product_id: i64,
        picture_id: i64,
    },
}

impl CatalogEvent {
    /// Event domain, used to build the broker topic name.
    pub fn domain(&self) -> &'static str {
        "product"
    }

    /// Partition key: the product this event belongs to.
    pub fn key(&self) -> String {
        let id = match self {
            CatalogEvent::ProductCreated { product_id, .. }
            | CatalogEvent::ProductUpdated { product_id, .. }
            | CatalogEvent::ProductDeleted { product_id, .. }
            | CatalogEvent::PictureAttached { product_id, .. }
            | CatalogEvent::PictureDetached { product_id, .. }
            | CatalogEvent::CoverChanged { product_id, .. } => product_id,
        };
        id.to_string()
    }
}
