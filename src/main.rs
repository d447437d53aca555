use tokio::net::TcpListener;
use workshop_api::{app, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("workshop_api=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let (router, _pool) = app::build(&settings).await?;
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("workshop-api listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
