use imagepair::{create_router, init, load_analyzer, AppState, Config};

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize the application
    init()?;

    let config = Config::from_env().context("reading configuration")?;

    // Models are loaded once, before any request is served
    let analyzer = load_analyzer(&config).context("loading models")?;
    let addr = config.bind_addr();
    let state = AppState::new(config, analyzer);

    let app = create_router(state);

    // Set up the server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
