use std::time::Duration;

use aria_config::AriaConfig;
use aria_core::Result;
use aria_device::{AndroidBridge, AutomationClient, tools::format_elements};
use tracing::warn;

pub(super) fn android_bridge(config: &AriaConfig) -> AndroidBridge {
    AndroidBridge::new()
        .with_adb_path(config.device.adb_path.clone())
        .with_serial(config.device.serial.clone())
        .with_timeout(Duration::from_secs(config.device.command_timeout_secs))
}

/// Client for the configured bridge address. Sets up `adb forward` first
/// when `bridge.adb_forward` is on; a failed forward is only logged since the
/// server may be reachable another way.
pub(super) async fn automation_client(config: &AriaConfig, android: &AndroidBridge) -> AutomationClient {
    if config.bridge.adb_forward
        && let Err(e) = android.forward(config.bridge.port).await
    {
        warn!(port = config.bridge.port, error = %e, "adb forward failed");
    }
    AutomationClient::new(config.bridge.address()).with_timeouts(
        Duration::from_millis(config.bridge.connect_timeout_ms),
        Duration::from_millis(config.bridge.read_timeout_ms),
    )
}

pub(super) async fn cmd_ping(config: AriaConfig) -> Result<()> {
    let android = android_bridge(&config);
    let client = automation_client(&config, &android).await;

    let started = std::time::Instant::now();
    let pong = client.ping().await?;
    println!(
        "{} answered in {}ms: {}",
        client.addr(),
        started.elapsed().as_millis(),
        pong
    );
    Ok(())
}

pub(super) async fn cmd_screen(config: AriaConfig, json: bool) -> Result<()> {
    let android = android_bridge(&config);
    let client = automation_client(&config, &android).await;

    let app = client.focused_app().await?;
    let elements = client.screen_elements().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&elements)?);
    } else {
        println!("Foreground: {app}");
        println!("{}", format_elements(&elements));
    }
    Ok(())
}

pub(super) async fn cmd_devices(config: AriaConfig) -> Result<()> {
    let android = android_bridge(&config);
    let devices = android.list_devices().await?;

    if devices.is_empty() {
        println!("No devices attached.");
        return Ok(());
    }

    for d in &devices {
        let model = d.model.as_deref().unwrap_or("unknown model");
        match &d.android_version {
            Some(v) => println!("{}  {}  {model}  Android {v}", d.serial, d.state),
            None => println!("{}  {}  {model}", d.serial, d.state),
        }
    }
    Ok(())
}
