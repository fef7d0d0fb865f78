//! GATT helpers
//!
//! UUID parsing, human-readable names for common assigned numbers, and
//! value formatting for the report output.

use anyhow::Result;
use btleplug::api::CharPropFlags;
use uuid::Uuid;

/// Bluetooth Base UUID, `0000xxxx-0000-1000-8000-00805f9b34fb`
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Values longer than this are truncated in the report
const MAX_DISPLAY_BYTES: usize = 64;

/// Parse a UUID given in full 128-bit form or as a 16/32-bit short form
/// (`180f`, `0x180F`).
pub fn parse_uuid(input: &str) -> Result<Uuid> {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if matches!(hex.len(), 4 | 8) {
        let short = u32::from_str_radix(hex, 16)
            .map_err(|_| anyhow::anyhow!("Invalid short UUID: {}", input))?;
        return Ok(Uuid::from_u128(BASE_UUID | (u128::from(short) << 96)));
    }

    Uuid::parse_str(hex).map_err(|e| anyhow::anyhow!("Invalid UUID {:?}: {}", input, e))
}

/// The 16-bit assigned number, if `uuid` is built on the base UUID
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let mask = (1u128 << 96) - 1;
    if value & mask == BASE_UUID & mask && value >> 112 == 0 {
        Some((value >> 96) as u16)
    } else {
        None
    }
}

/// Name of a well-known service, characteristic or descriptor
pub fn describe(uuid: &Uuid) -> &'static str {
    let Some(short) = short_uuid(uuid) else {
        return "Vendor specific";
    };

    match short {
        // Services
        0x1800 => "Generic Access Profile",
        0x1801 => "Generic Attribute Profile",
        0x180A => "Device Information",
        0x180D => "Heart Rate",
        0x180F => "Battery Service",
        0x1812 => "Human Interface Device",
        0x181A => "Environmental Sensing",
        // Characteristics
        0x2A00 => "Device Name",
        0x2A01 => "Appearance",
        0x2A04 => "Peripheral Preferred Connection Parameters",
        0x2A05 => "Service Changed",
        0x2A19 => "Battery Level",
        0x2A24 => "Model Number String",
        0x2A25 => "Serial Number String",
        0x2A26 => "Firmware Revision String",
        0x2A27 => "Hardware Revision String",
        0x2A28 => "Software Revision String",
        0x2A29 => "Manufacturer Name String",
        0x2A37 => "Heart Rate Measurement",
        0x2AA6 => "Central Address Resolution",
        // Descriptors
        0x2900 => "Characteristic Extended Properties",
        0x2901 => "Characteristic User Description",
        0x2902 => "Client Characteristic Configuration",
        0x2903 => "Server Characteristic Configuration",
        0x2904 => "Characteristic Presentation Format",
        _ => "Unknown",
    }
}

/// Property names in bit order
pub fn property_names(properties: CharPropFlags) -> Vec<&'static str> {
    const NAMES: [(CharPropFlags, &str); 8] = [
        (CharPropFlags::BROADCAST, "broadcast"),
        (CharPropFlags::READ, "read"),
        (CharPropFlags::WRITE_WITHOUT_RESPONSE, "write-without-response"),
        (CharPropFlags::WRITE, "write"),
        (CharPropFlags::NOTIFY, "notify"),
        (CharPropFlags::INDICATE, "indicate"),
        (
            CharPropFlags::AUTHENTICATED_SIGNED_WRITES,
            "authenticated-signed-writes",
        ),
        (CharPropFlags::EXTENDED_PROPERTIES, "extended-properties"),
    ];

    NAMES
        .iter()
        .filter(|(flag, _)| properties.contains(*flag))
        .map(|(_, name)| *name)
        .collect()
}

/// Render a value as hex, plus the text when it is printable UTF-8.
pub fn format_value(value: &[u8]) -> String {
    if value.is_empty() {
        return "(empty)".to_string();
    }

    let shown = &value[..value.len().min(MAX_DISPLAY_BYTES)];
    let mut out = shown
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    if value.len() > MAX_DISPLAY_BYTES {
        out.push_str(&format!(" ... ({} bytes)", value.len()));
    }

    if let Ok(text) = std::str::from_utf8(value) {
        let text = text.trim_end_matches('\0');
        if !text.is_empty() && text.chars().all(|c| !c.is_control()) {
            out.push_str(&format!(" \"{}\"", text));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_uuid() {
        let uuid = parse_uuid("180f").unwrap();
        assert_eq!(uuid.to_string(), "0000180f-0000-1000-8000-00805f9b34fb");
        assert_eq!(parse_uuid("0x2A00").unwrap(), parse_uuid("2a00").unwrap());
    }

    #[test]
    fn test_parse_full_uuid() {
        let uuid = parse_uuid(" c8c51726-81bc-483b-a052-f7a14ea3d281 ").unwrap();
        assert_eq!(uuid.to_string(), "c8c51726-81bc-483b-a052-f7a14ea3d281");
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(parse_uuid("zzzz").is_err());
    }

    #[test]
    fn test_short_uuid_and_describe() {
        let battery = parse_uuid("2a19").unwrap();
        assert_eq!(short_uuid(&battery), Some(0x2A19));
        assert_eq!(describe(&battery), "Battery Level");

        let vendor = parse_uuid("c8c51726-81bc-483b-a052-f7a14ea3d281").unwrap();
        assert_eq!(short_uuid(&vendor), None);
        assert_eq!(describe(&vendor), "Vendor specific");

        assert_eq!(describe(&parse_uuid("2bff").unwrap()), "Unknown");
    }

    #[test]
    fn test_property_names() {
        let names = property_names(CharPropFlags::READ | CharPropFlags::NOTIFY);
        assert_eq!(names, vec!["read", "notify"]);
        assert!(property_names(CharPropFlags::empty()).is_empty());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&[]), "(empty)");
        assert_eq!(format_value(&[0x01, 0xFF]), "01 FF");
        assert_eq!(format_value(b"Hi"), "48 69 \"Hi\"");
        assert!(format_value(&[0u8; 100]).ends_with("... (100 bytes)"));
    }
}
