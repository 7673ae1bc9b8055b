mod handlers;
mod router;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::core::clients::Clients;
use crate::core::queue::TaskQueue;
use crate::core::store::RecordStore;
use crate::core::vault::CredentialVault;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<RecordStore>,
    pub(crate) vault: Arc<CredentialVault>,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) clients: Arc<Clients>,
    pub(crate) config: Arc<Config>,
}

pub async fn serve(
    store: Arc<RecordStore>,
    vault: Arc<CredentialVault>,
    queue: Arc<TaskQueue>,
    clients: Arc<Clients>,
    config: Arc<Config>,
) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        store,
        vault,
        queue,
        clients,
        config,
    };
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("API server listening on {}", bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
