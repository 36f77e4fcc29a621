use anyhow::Context;

use almacen_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    almacen_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = almacen_api::app::services::build_services(&config)
        .await
        .context("failed to initialise the store")?;

    let app = almacen_api::app::build_app(services, &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        stock_policy = %config.stock_policy,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
