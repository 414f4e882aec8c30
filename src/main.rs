use std::sync::Arc;

use popq::broker::Broker;
use popq::config::{Settings, load_config};
use popq::store::{MemoryEngine, QueueStore, Store};
use popq::transport::websocket::start_websocket_server;
use popq::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            return;
        }
    };
    logging::init(&config.logging.level);

    if let Err(e) = run_server(config).await {
        error!("Server failed: {e}");
    }
}

fn open_store(config: &Settings) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    if config.storage.in_memory {
        info!("Using in-memory store; messages will not survive a restart");
        return Ok(Arc::new(QueueStore::new(MemoryEngine::new())));
    }

    info!("Opening store at {}", config.storage.path);
    Ok(Arc::new(QueueStore::open(&config.storage.path)?))
}

async fn run_server(config: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = Arc::new(Broker::new(open_store(&config)?));

    tokio::select! {
        res = start_websocket_server(&addr, broker.clone(), config.clone()) => {
            if let Err(e) = res {
                error!("WebSocket server exited: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.close()?;
    Ok(())
}
