use anyhow::Context;

use gymhub_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env().context("invalid configuration")?;
    gymhub_observability::init(config.log_format);

    let services = gymhub_api::app::services::build_services(&config)
        .await
        .context("failed to initialise services")?;
    let app = gymhub_api::app::build_app(&config.jwt_secret, services);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
