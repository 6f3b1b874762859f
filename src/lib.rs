//! Host runner for the alert button.
//!
//! Boots the shared state machine from `alert-core` on a Linux host, using
//! real GPIO on a Raspberry Pi (`pi` feature) or stdin and the log otherwise.

use alert_core::{
    hardware::{Board, Platform},
    udp::UdpDiscovery,
};
use anyhow::Error;

use crate::{
    config::Config,
    console::Console,
    net::HttpSender,
    provisioning::TerminalProvisioner,
    radio::HostRadio,
    store::RonStore,
    system::{HostRestart, SystemClock},
};

pub mod config;
pub mod console;
pub mod gpio;
pub mod net;
pub mod provisioning;
pub mod radio;
pub mod store;
pub mod system;

pub mod prelude {
    pub use crate::{
        config::*, console::*, gpio::*, net::*, provisioning::*, radio::*, store::*, system::*,
    };
}

pub struct HostPlatform;

impl Platform for HostPlatform {
    type Clock = SystemClock;
    type Radio = HostRadio;
    type Discovery = UdpDiscovery;
    type Sender = HttpSender;
    type Store = RonStore;
    type Provisioner = TerminalProvisioner;
    type System = HostRestart;
    type Button = gpio::HostButton;
    type BootButton = gpio::HostBootButton;
    type Indicator = gpio::HostIndicator;
}

/// Acquire every host resource for one boot of the device.
pub fn board(config: &Config, console: &Console) -> Result<Board<HostPlatform>, Error> {
    Ok(Board {
        clock: SystemClock::new(),
        radio: HostRadio::new(),
        discovery: UdpDiscovery::new(config.broadcast_address, config.discovery_port)?,
        sender: HttpSender::new(config.http_timeout_ms)?,
        store: RonStore::new(&config.store_path),
        provisioner: TerminalProvisioner::new(console, RonStore::new(&config.store_path)),
        system: HostRestart,
        button: gpio::button(&config.pins.button, console)?,
        boot_button: gpio::boot_button(&config.pins.boot_button)?,
        indicator: gpio::indicator(&config.pins.indicator)?,
    })
}
