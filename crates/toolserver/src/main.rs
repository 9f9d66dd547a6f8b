use anyhow::Context;
use galleryjob_toolserver::{router, AppState, Config, JobRunner, WorkspaceRoot};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let root = WorkspaceRoot::ensure(&config.base_temp)?;

    for profile in config.sites.profiles() {
        if let Some(path) = profile.credentials.as_deref().filter(|p| !p.is_file()) {
            tracing::warn!(
                site = %profile.host,
                path = %path.display(),
                "credential file not found; requests for this site will run without credentials"
            );
        }
    }

    let state = AppState {
        jobs: JobRunner::from_config(&config, root),
        default_mode: config.default_mode,
    };
    let app = router(state);

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(
        extractor = %config.extractor_bin,
        workspace_root = %config.base_temp.display(),
        mode = %config.default_mode,
        "toolserver listening on http://{addr}"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await.context("toolserver failed")?;
    Ok(())
}
