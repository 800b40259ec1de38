use std::sync::Arc;
use std::time::Duration;

use aria_config::AriaConfig;
use aria_core::Result;
use aria_device::{AdbUiSource, AutomationServer, CommandDispatcher, UiSourceHandle, android};
use aria_server::ApiServer;
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::chat::build_orchestrator;
use super::device::android_bridge;

/// Cancel the returned token on Ctrl+C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shutdown.cancel();
        }
    });
    cancel
}

pub(super) async fn cmd_serve(config: AriaConfig, listen: Option<String>) -> Result<()> {
    let listen = listen.unwrap_or_else(|| config.automation.listen.clone());

    println!("Aria automation server v{}", env!("CARGO_PKG_VERSION"));
    println!("   Listen: {listen}");
    println!("   Service: {}", config.automation.service_name);
    println!();

    if !android::check_adb_available(&config.device.adb_path).await {
        warn!(adb = %config.device.adb_path, "adb not found; commands will fail until it is installed");
    }

    let bridge = Arc::new(android_bridge(&config));
    let source = UiSourceHandle::bound(Arc::new(AdbUiSource::new(bridge)));

    let dispatcher = CommandDispatcher::new(source)
        .with_service_name(config.automation.service_name.clone())
        .with_command_timeout(Duration::from_millis(config.automation.command_timeout_ms));

    let server = AutomationServer::bind(&listen, Arc::new(dispatcher))
        .await
        .with_context(|| format!("cannot start automation server on {listen}"))?;

    server.serve(shutdown_on_ctrl_c()).await?;
    println!("Automation server stopped.");
    Ok(())
}

pub(super) async fn cmd_serve_api(mut config: AriaConfig, listen: Option<String>) -> Result<()> {
    if let Some(listen) = listen {
        config.api.listen = listen;
    }

    println!("Aria HTTP API v{}", env!("CARGO_PKG_VERSION"));
    println!("   Listen: {}", config.api.listen);
    println!("   Model: {}", config.agent.model);
    println!();

    let orchestrator = Arc::new(build_orchestrator(&config).await?);
    let server = ApiServer::bind(&config.api, orchestrator)
        .await
        .with_context(|| format!("cannot start HTTP API on {}", config.api.listen))?;

    server.serve(shutdown_on_ctrl_c()).await?;
    println!("HTTP API stopped.");
    Ok(())
}
