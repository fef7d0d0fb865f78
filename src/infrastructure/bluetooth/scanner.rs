//! BLE Scanner Module
//!
//! Discovers nearby peripherals on the first Bluetooth adapter.

use crate::domain::models::ScannedDevice;
use anyhow::{Context, Result};
use btleplug::api::{BDAddr, Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// How often the peripheral list is polled while waiting for a device
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Open the first Bluetooth adapter on the system
pub async fn first_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .context("Failed to initialize Bluetooth manager")?;
    let adapters = manager.adapters().await?;
    let adapter = adapters
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No Bluetooth adapter found"))?;

    if let Ok(info) = adapter.adapter_info().await {
        debug!("Using adapter: {}", info);
    }
    Ok(adapter)
}

/// Scan for `duration` and return every peripheral seen
pub async fn scan_devices(adapter: &Adapter, duration: Duration) -> Result<Vec<ScannedDevice>> {
    info!("Starting BLE scan for {:?}", duration);
    adapter.start_scan(ScanFilter::default()).await?;
    sleep(duration).await;
    adapter.stop_scan().await?;

    let mut devices = Vec::new();
    for peripheral in adapter.peripherals().await? {
        let properties = peripheral.properties().await?;
        let device = match properties {
            Some(props) => ScannedDevice {
                name: props.local_name,
                address: props.address.to_string(),
                signal_strength: props.rssi,
            },
            None => ScannedDevice {
                name: None,
                address: peripheral.address().to_string(),
                signal_strength: None,
            },
        };
        devices.push(device);
    }

    info!("Scan finished, {} devices seen", devices.len());
    Ok(devices)
}

/// Scan until a peripheral with `address` shows up or `timeout` elapses
pub async fn find_peripheral(
    adapter: &Adapter,
    address: BDAddr,
    timeout: Duration,
) -> Result<Option<Peripheral>> {
    info!("Looking for {} ({:?} timeout)", address, timeout);
    adapter.start_scan(ScanFilter::default()).await?;

    let deadline = Instant::now() + timeout;
    let found = loop {
        let peripherals = adapter.peripherals().await?;
        if let Some(peripheral) = peripherals.into_iter().find(|p| p.address() == address) {
            break Some(peripheral);
        }
        if Instant::now() >= deadline {
            break None;
        }
        sleep(POLL_INTERVAL).await;
    };

    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }
    Ok(found)
}
