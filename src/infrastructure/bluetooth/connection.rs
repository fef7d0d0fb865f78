//! BLE Connection Module
//!
//! Connects to the configured peripheral and exposes its GATT table.

use crate::infrastructure::bluetooth::scanner;
use anyhow::{Context, Result};
use btleplug::api::{BDAddr, Characteristic, Peripheral as _, Service};
use btleplug::platform::Peripheral;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for connection behavior
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Target peripheral address, `XX:XX:XX:XX:XX:XX`
    pub address: String,
    /// How long to scan for the target before giving up
    pub timeout: Duration,
}

/// An open connection with services already discovered
pub struct BleConnection {
    peripheral: Peripheral,
    name: Option<String>,
    address: BDAddr,
}

impl BleConnection {
    /// Find the configured peripheral, connect and discover its services
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        let address: BDAddr = config
            .address
            .parse()
            .with_context(|| format!("Invalid device address {:?}", config.address))?;

        let adapter = scanner::first_adapter().await?;
        let peripheral = scanner::find_peripheral(&adapter, address, config.timeout)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Device {} not found", address))?;

        info!("Connecting to {}", address);
        peripheral.connect().await.context("Connection failed")?;

        let ready = Self::discover(&peripheral, address).await;
        disconnect_on_error(ready, peripheral.disconnect()).await?;

        let name = peripheral
            .properties()
            .await?
            .and_then(|props| props.local_name);
        debug!(
            "Discovered {} services on {}",
            peripheral.services().len(),
            address
        );

        Ok(Self {
            peripheral,
            name,
            address,
        })
    }

    async fn discover(peripheral: &Peripheral, address: BDAddr) -> Result<()> {
        if !peripheral.is_connected().await? {
            anyhow::bail!("Device {} did not report a connection", address);
        }

        peripheral
            .discover_services()
            .await
            .context("Service discovery failed")
    }

    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Device name if it advertised one, otherwise its address
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }

    pub fn services(&self) -> Vec<Service> {
        self.peripheral.services().into_iter().collect()
    }

    pub fn find_service(&self, uuid: &Uuid) -> Option<Service> {
        self.peripheral
            .services()
            .into_iter()
            .find(|service| service.uuid == *uuid)
    }

    pub fn find_characteristic(&self, uuid: &Uuid) -> Option<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid == *uuid)
    }

    pub async fn disconnect(self) {
        match self.peripheral.disconnect().await {
            Ok(()) => info!("Disconnected from {}", self.address),
            Err(e) => warn!("Disconnect from {} failed: {}", self.address, e),
        }
    }
}

/// Pass `result` through, running `disconnect` first when it is an error.
async fn disconnect_on_error<T, D, E>(result: Result<T>, disconnect: D) -> Result<T>
where
    D: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    if result.is_err() {
        if let Err(e) = disconnect.await {
            warn!("Disconnect after failed setup failed: {}", e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_failed_setup_disconnects() {
        let disconnected = Cell::new(false);
        let disconnect = async {
            disconnected.set(true);
            Ok::<(), String>(())
        };

        let result: Result<()> =
            disconnect_on_error(Err(anyhow::anyhow!("discovery failed")), disconnect).await;

        assert!(result.is_err());
        assert!(disconnected.get());
    }

    #[tokio::test]
    async fn test_successful_setup_stays_connected() {
        let disconnected = Cell::new(false);
        let disconnect = async {
            disconnected.set(true);
            Ok::<(), String>(())
        };

        let result = disconnect_on_error(Ok(7), disconnect).await;

        assert_eq!(result.unwrap(), 7);
        assert!(!disconnected.get());
    }

    #[tokio::test]
    async fn test_disconnect_failure_keeps_original_error() {
        let disconnect = async { Err::<(), String>("adapter gone".to_string()) };

        let result: Result<()> =
            disconnect_on_error(Err(anyhow::anyhow!("not connected")), disconnect).await;

        assert_eq!(result.unwrap_err().to_string(), "not connected");
    }
}
