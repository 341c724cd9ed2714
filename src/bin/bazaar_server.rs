//! Marketplace server: REST API, storage, and event dispatch in one
//! process.

use std::sync::Arc;

use bazaar::auth::TokenSigner;
use bazaar::config::Config;
use bazaar::dispatch::{init_sink, Dispatcher};
use bazaar::rest::{self, AppState};
use bazaar::services::{AuthService, CatalogService, GalleryService};
use bazaar::storage::init_storage;
use bazaar::utils::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("bazaar-server");
    let config = Config::load(None)?;

    let stores = init_storage(&config.storage).await?;
    let sink = init_sink(&config.dispatch)?;
    let dispatcher = Arc::new(Dispatcher::start(sink, &config.dispatch));

    let signer = TokenSigner::new(config.auth.secret.clone(), config.auth.token_ttl_secs);
    let state = AppState {
        auth: Arc::new(AuthService::new(stores.users.clone(), signer)),
        catalog: Arc::new(CatalogService::new(
            stores.products.clone(),
            dispatcher.clone(),
        )),
        gallery: Arc::new(GalleryService::new(
            stores.products.clone(),
            stores.pictures.clone(),
            dispatcher.clone(),
            config.uploads.max_bytes,
        )),
    };

    rest::serve(&config.server, state, config.uploads.max_bytes).await?;

    // The server has stopped accepting requests; flush pending events.
    dispatcher.close().await;
    Ok(())
}
