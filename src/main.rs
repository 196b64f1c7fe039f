use tracing_subscriber::EnvFilter;
use video_compositor::Config;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().expect("Failed to load configuration");
    video_compositor::run(config).await;
}
