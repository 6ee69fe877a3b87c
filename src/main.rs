use signalpost::{
    api, config::Config, db::init_db, Correlator, DispatchGateway, HttpPostClient, Pipeline,
    PostClient, Repository, ReservoirLimiter, RetryScheduler,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let correlator = Arc::new(Correlator::new(repo.clone()));
    let limiter = Arc::new(ReservoirLimiter::new(
        config.rate_limit_capacity,
        Duration::from_secs(config.rate_limit_window_secs),
        Duration::from_millis(config.rate_limit_spacing_ms),
    ));
    let client: Arc<dyn PostClient> = Arc::new(HttpPostClient::new(
        config.post_api_url.clone(),
        config.post_api_token.clone(),
        Duration::from_secs(config.post_timeout_secs),
    ));
    let gateway = Arc::new(DispatchGateway::new(client, limiter, repo.clone()));
    let scheduler = Arc::new(RetryScheduler::new(
        gateway.clone(),
        repo.clone(),
        Duration::from_secs(config.retry_interval_secs),
    ));
    let pipeline = Arc::new(Pipeline::new(repo, correlator, gateway));

    // Create router
    let app = api::create_router(api::AppState {
        pipeline,
        scheduler,
    });

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
