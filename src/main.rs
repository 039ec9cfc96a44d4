use certforge::issue::Issuer;
use certforge::pdf::PdfRenderer;
use certforge::{config, routes, startup, state, storage};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certforge=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    storage::ensure_dirs(&config.output_directory)?;

    let renderer = PdfRenderer::from_config(&config)?;
    let issuer = Arc::new(Issuer::from_config(&config, renderer));

    let (ready_tx, ready_rx) = watch::channel(false);
    let state = Arc::new(state::AppState {
        issuer: issuer.clone(),
        config: config.clone(),
        ready: ready_rx,
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Certforge listening on http://{}", addr);

    // Serve the loading page right away; the form unlocks once loading resumes here.
    let resume = startup::begin_loading(config.startup_delay);
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    resume.await?;
    issuer.store().initialize().await?;
    ready_tx.send_replace(true);
    tracing::info!(
        "Ready: database {}, documents in {}",
        issuer.store().path().display(),
        config.output_directory.display()
    );

    server.await??;
    Ok(())
}
