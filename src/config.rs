use std::{
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use alert_core::config::{Timings, DISCOVERY_PORT};
use anyhow::{Context, Error};
use log::info;
use pi_pinout::{GpioPin, PhysicalPin, WiringPiPin};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "alert-button.ron";

/// Host runner settings, read from a RON file.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub discovery_port: u16,
    pub broadcast_address: Ipv4Addr,
    pub http_timeout_ms: u64,
    /// Where the provisioned device configuration is persisted
    pub store_path: PathBuf,
    pub timings: Timings,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Pins {
    pub button: Pin,
    pub boot_button: Pin,
    pub indicator: Pin,
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub enum Pin {
    Physical(PhysicalPin),
    Gpio(GpioPin),
    WiringPi(WiringPiPin),
}

impl Pin {
    /// BCM numbering, as the GPIO driver wants it.
    pub fn gpio(&self) -> GpioPin {
        match *self {
            Pin::Physical(pin) => pin.into(),
            Pin::Gpio(pin) => pin,
            Pin::WiringPi(pin) => pin.into(),
        }
    }
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            button: Pin::Gpio(GpioPin(25)),
            boot_button: Pin::Gpio(GpioPin(17)),
            indicator: Pin::Gpio(GpioPin(18)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pins: Pins::default(),
            discovery_port: DISCOVERY_PORT,
            broadcast_address: Ipv4Addr::BROADCAST,
            http_timeout_ms: 5000,
            store_path: PathBuf::from("device-config.ron"),
            timings: Timings::default(),
        }
    }
}

impl Config {
    /// Load settings from `path`, or defaults when there is no such file.
    pub fn load(path: &Path) -> Result<Config, Error> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let config = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = ron::from_str(&config)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}
