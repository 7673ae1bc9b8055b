mod config;
mod core;
mod interfaces;
mod logging;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::core::clients::Clients;
use crate::core::pipeline::PipelineContext;
use crate::core::queue::{RateLimit, RetryPolicy, TaskQueue, TaskRunner};
use crate::core::store::RecordStore;
use crate::core::vault::CredentialVault;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let config = Arc::new(Config::from_env()?);
    info!(
        "Starting postforge for {} platforms",
        config.platforms.len()
    );

    let store = Arc::new(RecordStore::open(&config.database_path)?);
    store.initialize().await?;
    let vault = Arc::new(CredentialVault::new(&config.vault_secret));
    let clients = Arc::new(Clients::from_config(&config));

    let queue = Arc::new(TaskQueue::new(
        store.clone(),
        RetryPolicy::default(),
        RateLimit::default(),
    ));
    let runner: Arc<dyn TaskRunner> = Arc::new(PipelineContext {
        store: store.clone(),
        vault: vault.clone(),
        clients: clients.clone(),
        config: config.clone(),
    });
    tokio::spawn(queue.clone().run_worker(runner));

    interfaces::web::serve(store, vault, queue, clients, config).await
}
