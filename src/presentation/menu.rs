//! Text menu
//!
//! A blocking, line-based command loop. Every BLE command opens its own
//! connection to the configured device and closes it when done.

use crate::domain::driver::MotionPipeline;
use crate::domain::settings::{Settings, SettingsService};
use crate::infrastructure::bluetooth::notifications::{self, StreamEnd};
use crate::infrastructure::bluetooth::{gatt, protocol, scanner, BleConnection, ConnectionConfig};
use crate::infrastructure::input_simulator;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Scan,
    Map,
    Read,
    Write,
    Pointer,
    Address,
    Quit,
}

impl MenuCommand {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "s" => Some(Self::Scan),
            "m" => Some(Self::Map),
            "r" => Some(Self::Read),
            "w" => Some(Self::Write),
            "p" => Some(Self::Pointer),
            "a" => Some(Self::Address),
            "q" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Characteristics offered by the write submenu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    DeviceName,
    Unknown,
    KeepAlive,
    Brightness,
}

impl WriteTarget {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "n" => Some(Self::DeviceName),
            "u" => Some(Self::Unknown),
            "k" => Some(Self::KeepAlive),
            "g" => Some(Self::Brightness),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DeviceName => "device name",
            Self::Unknown => "unknown characteristic",
            Self::KeepAlive => "keep alive",
            Self::Brightness => "global brightness",
        }
    }

    fn setting_key(self) -> &'static str {
        match self {
            Self::DeviceName => "device_name_char_uuid",
            Self::Unknown => "unknown_char_uuid",
            Self::KeepAlive => "keep_alive_char_uuid",
            Self::Brightness => "brightness_char_uuid",
        }
    }

    /// Configured characteristic UUID for this target
    pub fn uuid_setting(self, settings: &Settings) -> Option<&str> {
        match self {
            Self::DeviceName => settings.device_name_char_uuid.as_deref(),
            Self::Unknown => settings.unknown_char_uuid.as_deref(),
            Self::KeepAlive => settings.keep_alive_char_uuid.as_deref(),
            Self::Brightness => settings.brightness_char_uuid.as_deref(),
        }
    }
}

pub fn parse_keep_alive(input: &str) -> Option<u8> {
    match input.trim().parse::<i64>() {
        Ok(value @ 0..=1) => Some(value as u8),
        _ => None,
    }
}

pub fn parse_brightness(input: &str) -> Option<u8> {
    input.trim().parse::<i64>().ok().and_then(|v| u8::try_from(v).ok())
}

/// Line-based prompt over any reader and writer.
pub struct Console<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    pub fn say(&mut self, text: &str) -> std::io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    /// Read one trimmed line; `None` once input is closed
    pub fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    pub fn prompt(&mut self, text: &str) -> std::io::Result<Option<String>> {
        self.say(text)?;
        self.read_line()
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }
}

pub struct App<R, W> {
    settings: SettingsService,
    console: Console<R, W>,
}

/// Outcome of one menu round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

impl<R: BufRead, W: Write> App<R, W> {
    pub fn new(settings: SettingsService, input: R, out: W) -> Self {
        Self {
            settings,
            console: Console::new(input, out),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            match self.round().await? {
                Flow::Continue => {}
                Flow::Exit => return Ok(()),
            }
        }
    }

    async fn round(&mut self) -> Result<Flow> {
        self.console.say("")?;
        self.console.say(&format!(
            "Select an option (device {}):",
            self.settings.get().device_address
        ))?;
        self.console.say("(S)can for bluetooth devices")?;
        self.console.say("(M)ap out all services and characteristics of the device")?;
        self.console.say("(R)ead all the characteristic values of a service")?;
        self.console.say("(W)rite a new value to a characteristic")?;
        self.console.say("(P)ointer control from the motion sensor")?;
        self.console.say("(A)ddress of the target device")?;
        self.console.say("(Q)uit")?;

        let Some(choice) = self.console.read_line()? else {
            return self.input_closed();
        };

        let Some(command) = MenuCommand::parse(&choice) else {
            self.console.say("unknown option")?;
            return Ok(Flow::Continue);
        };
        info!("Menu command: {:?}", command);

        match command {
            MenuCommand::Scan => self.scan().await,
            MenuCommand::Map => self.map().await,
            MenuCommand::Read => self.read_service().await,
            MenuCommand::Write => self.write().await,
            MenuCommand::Pointer => self.pointer().await,
            MenuCommand::Address => self.change_address(),
            MenuCommand::Quit => Ok(Flow::Exit),
        }
    }

    fn input_closed(&mut self) -> Result<Flow> {
        self.console.say("Input closed; exiting.")?;
        Ok(Flow::Exit)
    }

    fn connection_config(&self) -> ConnectionConfig {
        let settings = self.settings.get();
        ConnectionConfig {
            address: settings.device_address.clone(),
            timeout: Duration::from_secs(settings.connect_timeout_secs),
        }
    }

    async fn connect(&mut self) -> Result<Option<BleConnection>> {
        match BleConnection::open(&self.connection_config()).await {
            Ok(connection) => {
                self.console.say(&format!("Connected to {}", connection.label()))?;
                Ok(Some(connection))
            }
            Err(e) => {
                error!("Connection failed: {:#}", e);
                self.console.say("Failed to connect")?;
                Ok(None)
            }
        }
    }

    async fn scan(&mut self) -> Result<Flow> {
        self.console.say("Scanning...")?;
        let duration = Duration::from_secs(self.settings.get().scan_duration_secs);

        let scanned = match scanner::first_adapter().await {
            Ok(adapter) => scanner::scan_devices(&adapter, duration).await,
            Err(e) => Err(e),
        };
        let devices = match scanned {
            Ok(devices) => devices,
            Err(e) => {
                error!("Scan failed: {:#}", e);
                self.console.say(&format!("Scan failed: {}", e))?;
                return Ok(Flow::Continue);
            }
        };

        if devices.is_empty() {
            self.console.say("No BLE devices found")?;
            return Ok(Flow::Continue);
        }

        self.console.say(&format!("Found {} devices", devices.len()))?;
        for device in &devices {
            let mut line = format!(
                "  Name: {}, Address: {}",
                device.display_name(),
                device.address
            );
            if let Some(rssi) = device.signal_strength {
                line.push_str(&format!(", RSSI: {} dBm", rssi));
            }
            self.console.say(&line)?;
        }
        Ok(Flow::Continue)
    }

    async fn map(&mut self) -> Result<Flow> {
        let Some(connection) = self.connect().await? else {
            return Ok(Flow::Continue);
        };
        let result = gatt::map_services(&connection, self.console.out());
        connection.disconnect().await;
        result?;
        Ok(Flow::Continue)
    }

    async fn read_service(&mut self) -> Result<Flow> {
        let Some(input) = self
            .console
            .prompt("which service (input service UUID): ")?
        else {
            return self.input_closed();
        };
        let service_uuid = match protocol::parse_uuid(&input) {
            Ok(uuid) => uuid,
            Err(e) => {
                self.console.say(&e.to_string())?;
                return Ok(Flow::Continue);
            }
        };

        let Some(connection) = self.connect().await? else {
            return Ok(Flow::Continue);
        };
        let result =
            gatt::read_service_values(&connection, &service_uuid, self.console.out()).await;
        connection.disconnect().await;
        result?;
        Ok(Flow::Continue)
    }

    /// Ask which characteristic to write and what to write into it
    fn read_write_request(&mut self) -> Result<Option<(WriteTarget, Vec<u8>)>> {
        self.console.say("Which characteristic do you want to write to:")?;
        self.console.say("(N)ame of the device")?;
        self.console.say("(U)nknown characteristic")?;
        self.console.say("(K)eep alive")?;
        self.console.say("(G)lobal brightness")?;

        let Some(choice) = self.console.read_line()? else {
            return Ok(None);
        };
        let Some(target) = WriteTarget::parse(&choice) else {
            self.console.say("unknown option")?;
            return Ok(None);
        };

        if target.uuid_setting(self.settings.get()).is_none() {
            self.console.say(&format!(
                "No characteristic configured for {}; set `{}` in {}",
                target.label(),
                target.setting_key(),
                self.settings.path().display()
            ))?;
            return Ok(None);
        }

        let value = match target {
            WriteTarget::DeviceName => match self.console.prompt("Enter the new name")? {
                Some(name) => name.into_bytes(),
                None => return Ok(None),
            },
            WriteTarget::Unknown => match self.console.prompt("?")? {
                Some(text) => text.to_lowercase().into_bytes(),
                None => return Ok(None),
            },
            WriteTarget::KeepAlive => loop {
                let Some(text) = self.console.prompt("0 or 1")? else {
                    return Ok(None);
                };
                match parse_keep_alive(&text) {
                    Some(value) => break value.to_string().into_bytes(),
                    None => self.console.say("It must be a one or zero")?,
                }
            },
            WriteTarget::Brightness => loop {
                let Some(text) = self.console.prompt("0 to 255")? else {
                    return Ok(None);
                };
                match parse_brightness(&text) {
                    Some(value) => break value.to_string().into_bytes(),
                    None => self.console.say("It must be between 0 and 255")?,
                }
            },
        };

        Ok(Some((target, value)))
    }

    async fn write(&mut self) -> Result<Flow> {
        let Some((target, value)) = self.read_write_request()? else {
            return Ok(Flow::Continue);
        };
        let uuid_text = target
            .uuid_setting(self.settings.get())
            .unwrap_or_default()
            .to_string();
        let uuid = match protocol::parse_uuid(&uuid_text) {
            Ok(uuid) => uuid,
            Err(e) => {
                self.console.say(&format!("Bad `{}` setting: {}", target.setting_key(), e))?;
                return Ok(Flow::Continue);
            }
        };

        let Some(connection) = self.connect().await? else {
            return Ok(Flow::Continue);
        };
        if let Err(e) = gatt::write_characteristic(&connection, &uuid, &value).await {
            warn!("Write to {} failed: {:#}", uuid, e);
            self.console.say(&format!("Error Writing: {}", e))?;
        }
        connection.disconnect().await;
        Ok(Flow::Continue)
    }

    async fn pointer(&mut self) -> Result<Flow> {
        let settings = self.settings.get().clone();
        let Some(uuid_text) = settings.motion_char_uuid.as_deref() else {
            self.console.say(&format!(
                "No motion characteristic configured; set `motion_char_uuid` in {}",
                self.settings.path().display()
            ))?;
            return Ok(Flow::Continue);
        };
        let motion_uuid = match protocol::parse_uuid(uuid_text) {
            Ok(uuid) => uuid,
            Err(e) => {
                self.console.say(&format!("Bad `motion_char_uuid` setting: {}", e))?;
                return Ok(Flow::Continue);
            }
        };

        let sink = match input_simulator::platform_pointer(settings.dry_run) {
            Ok(sink) => sink,
            Err(e) => {
                error!("Pointer backend unavailable: {}", e);
                self.console.say(&format!("Pointer control unavailable: {}", e))?;
                return Ok(Flow::Continue);
            }
        };
        let mut pipeline = MotionPipeline::new(settings.decoder_config(), sink);

        let Some(connection) = self.connect().await? else {
            return Ok(Flow::Continue);
        };
        self.console.say("Pointer control running; press Ctrl+C to stop")?;

        let result = notifications::run_pointer_control(
            &connection,
            &motion_uuid,
            &mut pipeline,
            self.console.out(),
        )
        .await;
        connection.disconnect().await;

        match result {
            Ok((end, stats)) => {
                let reason = match end {
                    StreamEnd::Interrupted => "stopped",
                    StreamEnd::Closed => "device stopped sending",
                };
                self.console.say(&format!(
                    "Pointer control {} after {} frames",
                    reason, stats.frames
                ))?;
            }
            Err(e) => {
                error!("Pointer control failed: {:#}", e);
                self.console.say(&format!("Pointer control failed: {}", e))?;
            }
        }
        Ok(Flow::Continue)
    }

    fn change_address(&mut self) -> Result<Flow> {
        let Some(address) = self.console.prompt("New device address (XX:XX:XX:XX:XX:XX):")? else {
            return self.input_closed();
        };
        if address.parse::<btleplug::api::BDAddr>().is_err() {
            self.console.say("That is not a Bluetooth address")?;
            return Ok(Flow::Continue);
        }

        let address = address.to_uppercase();
        match self.settings.set_device_address(address.clone()) {
            Ok(()) => self.console.say(&format!("Target set to {}", address))?,
            Err(e) => {
                warn!("Failed to save settings: {:#}", e);
                self.console.say(&format!("Target set to {} (not saved: {})", address, e))?;
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn temp_settings(name: &str) -> (SettingsService, PathBuf) {
        let dir = std::env::temp_dir()
            .join(format!("gatt_mouse_menu_{}_{}", name, std::process::id()));
        let service = SettingsService::load(dir.join("settings.json"));
        (service, dir)
    }

    fn make_app(name: &str, script: &str) -> (App<Cursor<Vec<u8>>, Vec<u8>>, PathBuf) {
        let (settings, dir) = temp_settings(name);
        (
            App::new(settings, Cursor::new(script.as_bytes().to_vec()), Vec::new()),
            dir,
        )
    }

    fn output(app: &App<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(app.console.out.clone()).unwrap()
    }

    #[test]
    fn test_menu_command_parse() {
        assert_eq!(MenuCommand::parse(" S "), Some(MenuCommand::Scan));
        assert_eq!(MenuCommand::parse("m"), Some(MenuCommand::Map));
        assert_eq!(MenuCommand::parse("R"), Some(MenuCommand::Read));
        assert_eq!(MenuCommand::parse("w"), Some(MenuCommand::Write));
        assert_eq!(MenuCommand::parse("p"), Some(MenuCommand::Pointer));
        assert_eq!(MenuCommand::parse("q"), Some(MenuCommand::Quit));
        assert_eq!(MenuCommand::parse("scan"), None);
        assert_eq!(MenuCommand::parse(""), None);
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_keep_alive("0"), Some(0));
        assert_eq!(parse_keep_alive(" 1 "), Some(1));
        assert_eq!(parse_keep_alive("2"), None);
        assert_eq!(parse_keep_alive("yes"), None);

        assert_eq!(parse_brightness("0"), Some(0));
        assert_eq!(parse_brightness("255"), Some(255));
        assert_eq!(parse_brightness("256"), None);
        assert_eq!(parse_brightness("-1"), None);
    }

    #[tokio::test]
    async fn test_unknown_option_then_quit() {
        let (mut app, _) = make_app("unknown", "x\nq\n");
        app.run().await.unwrap();
        let text = output(&app);
        assert!(text.contains("unknown option"));
        assert!(text.contains("(S)can for bluetooth devices"));
    }

    #[tokio::test]
    async fn test_eof_exits_cleanly() {
        let (mut app, _) = make_app("eof", "");
        app.run().await.unwrap();
        assert!(output(&app).contains("Input closed; exiting."));
    }

    #[tokio::test]
    async fn test_change_address_is_saved() {
        let (mut app, dir) = make_app("address", "a\naa:bb:cc:dd:ee:ff\nq\n");
        app.run().await.unwrap();
        assert!(output(&app).contains("Target set to AA:BB:CC:DD:EE:FF"));

        let reloaded = SettingsService::load(dir.join("settings.json"));
        assert_eq!(reloaded.get().device_address, "AA:BB:CC:DD:EE:FF");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_change_address_rejects_garbage() {
        let (mut app, _) = make_app("bad_address", "a\nnot an address\nq\n");
        app.run().await.unwrap();
        assert!(output(&app).contains("That is not a Bluetooth address"));
        assert_eq!(app.settings.get().device_address, "FD:D3:9D:E7:40:E0");
    }

    #[tokio::test]
    async fn test_pointer_requires_motion_characteristic() {
        let (mut app, _) = make_app("pointer", "p\nq\n");
        app.run().await.unwrap();
        assert!(output(&app).contains("No motion characteristic configured"));
    }

    #[test]
    fn test_keep_alive_prompt_repeats_until_valid() {
        let (mut app, _) = make_app("keep_alive", "k\n5\nabc\n1\n");
        app.settings.get_mut().keep_alive_char_uuid = Some("2a99".to_string());

        let request = app.read_write_request().unwrap();
        assert_eq!(request, Some((WriteTarget::KeepAlive, b"1".to_vec())));
        let text = output(&app);
        assert_eq!(text.matches("It must be a one or zero").count(), 2);
    }

    #[test]
    fn test_brightness_written_as_decimal_text() {
        let (mut app, _) = make_app("brightness", "G\n300\n128\n");
        app.settings.get_mut().brightness_char_uuid = Some("2a98".to_string());

        let request = app.read_write_request().unwrap();
        assert_eq!(request, Some((WriteTarget::Brightness, b"128".to_vec())));
        assert!(output(&app).contains("It must be between 0 and 255"));
    }

    #[test]
    fn test_name_and_unknown_values() {
        let (mut app, _) = make_app("name", "n\n  My Sensor \n");
        assert_eq!(
            app.read_write_request().unwrap(),
            Some((WriteTarget::DeviceName, b"My Sensor".to_vec()))
        );

        let (mut app, _) = make_app("unknown_char", "u\nHeLLo\n");
        app.settings.get_mut().unknown_char_uuid = Some("2a97".to_string());
        assert_eq!(
            app.read_write_request().unwrap(),
            Some((WriteTarget::Unknown, b"hello".to_vec()))
        );
    }

    #[test]
    fn test_unconfigured_write_target() {
        let (mut app, _) = make_app("unconfigured", "k\n");
        assert_eq!(app.read_write_request().unwrap(), None);
        assert!(output(&app).contains("set `keep_alive_char_uuid`"));
    }
}
