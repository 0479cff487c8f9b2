use std::sync::Arc;

use popstream::broker::Broker;
use popstream::config::load_config;
use popstream::transport::start_websocket_server;
use popstream::upstream::WebSocketEndpoint;
use popstream::utils::logging;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run_server().await {
        logging::init("info");
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config()?;
    logging::init(&settings.log.level);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let endpoint = Arc::new(WebSocketEndpoint::new(&settings.upstream.base_url));
    let broker = Broker::spawn(endpoint, settings.broker.to_broker_config());

    info!("upstream base url is {}", settings.upstream.base_url);

    tokio::select! {
        result = start_websocket_server(&addr, broker.clone()) => {
            if let Err(e) = result {
                error!("Gateway exited: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.shutdown();
    Ok(())
}
