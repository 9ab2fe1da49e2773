use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::prelude::*;

use pagebot::bot::{
    ContentStore, CustomRuleStore, GraphClient, HttpNewsSource, HttpStatsSource, Responder,
};
use pagebot::config::Config;
use pagebot::webhook::{self, AppState};

/// Ceiling for every outbound platform and data-source call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging: stdout plus a non-blocking file under the data dir.
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("pagebot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("starting pagebot");
    if let Some(admin) = &config.admin_sender_id {
        info!("admin sender: {admin}");
    } else {
        info!("no admin sender configured; stop/start and relay are disabled");
    }

    let http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client");

    let transport = Arc::new(GraphClient::new(http.clone(), config.page_access_token.clone()));
    let stats = Arc::new(HttpStatsSource::new(http.clone()));
    let news = Arc::new(HttpNewsSource::new(http));
    let content = ContentStore::load(&config.content_dir);
    let custom = CustomRuleStore::load(config.custom_dir.clone());

    let responder = Arc::new(Responder::new(
        config.admin_sender_id.clone(),
        transport,
        stats,
        news,
        content,
        custom,
    ));

    let state = Arc::new(AppState {
        responder,
        app_secret: config.app_secret.clone(),
        verify_token: config.verify_token.clone(),
    });
    let app = webhook::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind webhook port");
    info!("listening on port {}", config.port);
    axum::serve(listener, app).await.expect("server error");
}
