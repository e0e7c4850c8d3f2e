use dotenvy::dotenv;
use tracing::info;

use cloud_subscription::infra::{
    app::create_app,
    error::InfraError,
    run_recovery::run_recovery_loop,
    setup::{Services, init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let Services { app_state, runner } = init_app_state().await?;

    // Read config values before moving app_state
    let bind_addr = app_state.config.bind_addr;
    let recovery_interval = app_state.config.run_recovery_interval;

    tokio::spawn(run_recovery_loop(runner, recovery_interval));

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(InfraError::TcpBind)?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
