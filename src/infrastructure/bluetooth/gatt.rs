//! GATT operations
//!
//! Mapping the attribute table, reading every value of a service and writing
//! a single characteristic. Report text goes to the writer passed in.

use crate::infrastructure::bluetooth::connection::BleConnection;
use crate::infrastructure::bluetooth::protocol;
use anyhow::Result;
use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, Service, WriteType};
use std::io::Write;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SEPARATOR: &str = "--------------------";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorInfo {
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub properties: CharPropFlags,
    pub descriptors: Vec<DescriptorInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<CharacteristicInfo>,
}

impl From<&Characteristic> for CharacteristicInfo {
    fn from(characteristic: &Characteristic) -> Self {
        Self {
            uuid: characteristic.uuid,
            properties: characteristic.properties,
            descriptors: characteristic
                .descriptors
                .iter()
                .map(|d| DescriptorInfo { uuid: d.uuid })
                .collect(),
        }
    }
}

impl From<&Service> for ServiceInfo {
    fn from(service: &Service) -> Self {
        Self {
            uuid: service.uuid,
            primary: service.primary,
            characteristics: service
                .characteristics
                .iter()
                .map(CharacteristicInfo::from)
                .collect(),
        }
    }
}

/// Print one service with its characteristics, descriptors and properties
pub fn render_service(service: &ServiceInfo, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "UUID: {}", service.uuid)?;
    writeln!(out, "Primary: {}", service.primary)?;
    writeln!(out, "Description: {}", protocol::describe(&service.uuid))?;
    writeln!(out, "    Characteristics:")?;

    for characteristic in &service.characteristics {
        writeln!(out, "        UUID: {}", characteristic.uuid)?;
        writeln!(
            out,
            "        Description: {}",
            protocol::describe(&characteristic.uuid)
        )?;
        writeln!(out, "        Descriptors:")?;
        for descriptor in &characteristic.descriptors {
            writeln!(out, "            UUID: {}", descriptor.uuid)?;
            writeln!(
                out,
                "            Description: {}",
                protocol::describe(&descriptor.uuid)
            )?;
            writeln!(out)?;
        }
        writeln!(out, "        Properties:")?;
        for name in protocol::property_names(characteristic.properties) {
            writeln!(out, "            {}", name)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "{}", SEPARATOR)
}

/// Print the whole attribute table of the connected device
pub fn map_services(connection: &BleConnection, out: &mut dyn Write) -> Result<()> {
    let services = connection.services();
    info!("Mapping {} services", services.len());

    writeln!(out, "Services")?;
    for service in &services {
        render_service(&ServiceInfo::from(service), out)?;
    }
    Ok(())
}

/// Read every descriptor and readable characteristic of one service.
///
/// A failed read is reported and the next characteristic is tried.
pub async fn read_service_values(
    connection: &BleConnection,
    service_uuid: &Uuid,
    out: &mut dyn Write,
) -> Result<()> {
    let Some(service) = connection.find_service(service_uuid) else {
        writeln!(out, "Could not find service: {}", service_uuid)?;
        return Ok(());
    };
    writeln!(out, "Found service: {}\n", service_uuid)?;

    let peripheral = connection.peripheral();
    for characteristic in &service.characteristics {
        writeln!(out, "{}", SEPARATOR)?;
        writeln!(out, "Characteristic: {}", characteristic.uuid)?;
        writeln!(
            out,
            "Description: {}",
            protocol::describe(&characteristic.uuid)
        )?;

        if !characteristic.descriptors.is_empty() {
            writeln!(out, "\nDescriptors")?;
        }
        for descriptor in &characteristic.descriptors {
            writeln!(out, "Descriptor: {}", descriptor.uuid)?;
            match peripheral.read_descriptor(descriptor).await {
                Ok(value) => writeln!(out, "value: {}\n", protocol::format_value(&value))?,
                Err(e) => {
                    warn!("Descriptor read failed for {}: {}", descriptor.uuid, e);
                    writeln!(out, "Error Reading: {}\n", e)?;
                }
            }
        }

        writeln!(out, "Base characteristic")?;
        if !characteristic.properties.contains(CharPropFlags::READ) {
            writeln!(out, "Does not support read\n")?;
            continue;
        }

        match peripheral.read(characteristic).await {
            Ok(value) => {
                debug!("Read {} bytes from {}", value.len(), characteristic.uuid);
                writeln!(out, "value: {}", protocol::format_value(&value))?;
            }
            Err(e) => {
                warn!("Read failed for {}: {}", characteristic.uuid, e);
                writeln!(out, "Error Reading: {}", e)?;
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Write `value` to a characteristic, waiting for the peripheral's response
pub async fn write_characteristic(
    connection: &BleConnection,
    uuid: &Uuid,
    value: &[u8],
) -> Result<()> {
    let characteristic = connection
        .find_characteristic(uuid)
        .ok_or_else(|| anyhow::anyhow!("Characteristic {} not found", uuid))?;

    info!("Writing {} bytes to {}", value.len(), uuid);
    connection
        .peripheral()
        .write(&characteristic, value, WriteType::WithResponse)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::parse_uuid;

    #[test]
    fn test_render_service() {
        let service = ServiceInfo {
            uuid: parse_uuid("180f").unwrap(),
            primary: true,
            characteristics: vec![CharacteristicInfo {
                uuid: parse_uuid("2a19").unwrap(),
                properties: CharPropFlags::READ | CharPropFlags::NOTIFY,
                descriptors: vec![DescriptorInfo {
                    uuid: parse_uuid("2902").unwrap(),
                }],
            }],
        };

        let mut out = Vec::new();
        render_service(&service, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("UUID: 0000180f-0000-1000-8000-00805f9b34fb\n"));
        assert!(text.contains("Description: Battery Service"));
        assert!(text.contains("        Description: Battery Level"));
        assert!(text.contains("            Description: Client Characteristic Configuration"));
        assert!(text.contains("            read\n            notify\n"));
        assert!(text.trim_end().ends_with(SEPARATOR));
    }

    #[test]
    fn test_render_service_without_characteristics() {
        let service = ServiceInfo {
            uuid: parse_uuid("1801").unwrap(),
            primary: false,
            characteristics: Vec::new(),
        };
        let mut out = Vec::new();
        render_service(&service, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Primary: false"));
        assert!(!text.contains("Properties:"));
    }
}
