use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cortex::core::agent::NewsAgent;
use cortex::core::ark::ArkClient;
use cortex::core::baike::BaikeClient;
use cortex::core::config::{load_config, Config};
use cortex::core::deepsearch::DeepSearchClient;
use cortex::core::llm::{ChatModel, LlmClient};

mod routes;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: Arc<NewsAgent>,
    pub deepseek: Arc<dyn ChatModel>,
    pub ark: Option<Arc<dyn ChatModel>>,
    pub baike: Arc<BaikeClient>,
    pub deepsearch: Arc<DeepSearchClient>,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        let ark: Option<Arc<dyn ChatModel>> = if config.ark_enabled() {
            Some(Arc::new(ArkClient::new(config.ark.clone())))
        } else {
            None
        };

        Self {
            agent: Arc::new(NewsAgent::from_config(&config)),
            deepseek: Arc::new(LlmClient::new(config.deepseek.clone())),
            ark,
            baike: Arc::new(BaikeClient::new(&config.baidu)),
            deepsearch: Arc::new(DeepSearchClient::new(&config.baidu)),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "nexus=debug,cortex=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = load_config(&config_path)?;
    config.validate()?;

    let port = config.server.port;
    tracing::info!(
        ark = config.ark_enabled(),
        static_dir = %config.server.static_dir,
        "configuration loaded from {}",
        config_path
    );

    let app = routes::app(AppState::from_config(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
