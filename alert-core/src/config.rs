use serde::{Deserialize, Serialize};

/// Longest value the persisted record can hold for any text field.
pub const MAX_FIELD_LEN: usize = 31;

/// Well-known UDP port the alert server listens on for discovery queries.
pub const DISCOVERY_PORT: u16 = 12345;
/// Fixed ASCII token broadcast to locate the server.
pub const DISCOVERY_REQUEST: &[u8] = b"WHERE_IS_SERVER";
/// HTTP port of the alert endpoint on the discovered server.
pub const ALERT_PORT: u16 = 5000;
pub const ALERT_PATH: &str = "/alert";

/// Credentials and identity captured during provisioning.
///
/// The persistence collaborator owns this record. The device keeps a working
/// copy loaded at boot and only ever changes `is_provisioned`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub network_name: String,
    pub network_secret: String,
    pub device_label: String,
    pub is_provisioned: bool,
}

impl DeviceConfig {
    pub fn new(network_name: &str, network_secret: &str, device_label: &str) -> Self {
        Self {
            network_name: network_name.to_string(),
            network_secret: network_secret.to_string(),
            device_label: device_label.to_string(),
            is_provisioned: true,
        }
    }

    /// Check the fields a provisioner collected before they are saved.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.network_name.trim().is_empty() {
            return Err("network name cannot be empty");
        }
        if self.device_label.trim().is_empty() {
            return Err("device name cannot be empty");
        }
        if self.network_name.len() > MAX_FIELD_LEN
            || self.network_secret.len() > MAX_FIELD_LEN
            || self.device_label.len() > MAX_FIELD_LEN
        {
            return Err("fields are limited to 31 bytes");
        }
        Ok(())
    }

    /// Build a provisioned config from a submitted setup form
    /// (`ssid`, `password`, `deviceName`, form-urlencoded).
    pub fn from_form(body: &str) -> Result<Self, &'static str> {
        let mut network_name = String::new();
        let mut network_secret = String::new();
        let mut device_label = String::new();

        for pair in body.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = urlencoding::decode(&value.replace('+', " "))
                .map_err(|_| "form is not valid UTF-8")?
                .into_owned();
            match key {
                "ssid" => network_name = value,
                "password" => network_secret = value,
                "deviceName" => device_label = value,
                _ => {}
            }
        }

        let config = Self::new(network_name.trim(), &network_secret, device_label.trim());
        config.validate()?;
        Ok(config)
    }
}

/// Every delay, window and retry count the state machine uses.
///
/// All values are milliseconds unless the name says otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timings {
    pub association_attempts: u32,
    pub reconnect_attempts: u32,
    /// Wait between association status polls
    pub association_poll_ms: u64,
    pub discovery_attempts: u32,
    pub discovery_timeout_ms: u64,
    pub discovery_poll_ms: u64,
    pub server_check_interval_ms: u64,
    pub debounce_ms: u64,
    pub reset_hold_ms: u64,
    pub fast_blink_ms: u64,
    pub slow_blink_ms: u64,
    pub reset_flash_ms: u64,
    /// Sleep between scheduling loop iterations
    pub tick_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            association_attempts: 20,
            reconnect_attempts: 5,
            association_poll_ms: 500,
            discovery_attempts: 3,
            discovery_timeout_ms: 1000,
            discovery_poll_ms: 50,
            server_check_interval_ms: 10_000,
            debounce_ms: 500,
            reset_hold_ms: 3000,
            fast_blink_ms: 300,
            slow_blink_ms: 1000,
            reset_flash_ms: 1000,
            tick_ms: 10,
        }
    }
}
