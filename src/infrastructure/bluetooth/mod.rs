//! Bluetooth Module
//!
//! BLE access to a single peripheral through `btleplug`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌────────────┐   ┌───────────────┐
//! │  Scanner  │──▶│ Connection │──▶│    GATT    │   │ Notifications │
//! │           │   │            │   │            │   │               │
//! │ - adapter │   │ - address  │   │ - map      │   │ - subscribe   │
//! │ - scan    │   │ - services │   │ - read     │   │ - frames ──▶  │
//! │           │   │            │   │ - write    │   │   pipeline    │
//! └───────────┘   └────────────┘   └────────────┘   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUID parsing, assigned-number names, value formatting
//! - [`scanner`] - adapter selection and device discovery
//! - [`connection`] - connecting to the configured device
//! - [`gatt`] - attribute table, reads and writes
//! - [`notifications`] - motion stream into the pointer pipeline

pub mod connection;
pub mod gatt;
pub mod notifications;
pub mod protocol;
pub mod scanner;

pub use connection::{BleConnection, ConnectionConfig};
