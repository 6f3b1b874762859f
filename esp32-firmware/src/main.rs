#[macro_use]
mod logging;

mod hardware;
mod net;
mod portal;
mod storage;
mod wifi;

use std::{cell::RefCell, net::Ipv4Addr, rc::Rc, time::Duration};

use alert_core::{
    config::{Timings, DISCOVERY_PORT},
    device::Device,
    hardware::{Board, Platform, Restart},
    udp::UdpDiscovery,
};
use anyhow::Result;
use esp_idf_hal::{
    gpio::{IOPin, OutputPin},
    peripherals::Peripherals,
};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition, wifi::EspWifi};

use crate::{
    hardware::{Button, EspClock, EspSystem, Led},
    net::HttpSender,
    portal::CaptivePortal,
    storage::NvsStore,
    wifi::WifiRadio,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

struct Esp32;

impl Platform for Esp32 {
    type Clock = EspClock;
    type Radio = WifiRadio;
    type Discovery = UdpDiscovery;
    type Sender = HttpSender;
    type Store = NvsStore;
    type Provisioner = CaptivePortal;
    type System = EspSystem;
    type Button = Button;
    type BootButton = Button;
    type Indicator = Led;
}

fn main() -> Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("Alert button firmware v{}", env!("CARGO_PKG_VERSION"));

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let wifi = Rc::new(RefCell::new(EspWifi::new(
        peripherals.modem,
        sys_loop,
        Some(nvs.clone()),
    )?));

    let board: Board<Esp32> = Board {
        clock: EspClock::new(),
        radio: WifiRadio::new(wifi.clone()),
        discovery: UdpDiscovery::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT)?,
        sender: HttpSender::new(HTTP_TIMEOUT),
        store: NvsStore::new(nvs.clone()),
        provisioner: CaptivePortal::new(wifi, nvs),
        system: EspSystem,
        button: Button::new(peripherals.pins.gpio25.downgrade())?,
        boot_button: Button::new(peripherals.pins.gpio0.downgrade())?,
        indicator: Led::new(peripherals.pins.gpio18.downgrade_output())?,
    };

    let halt = Device::new(board, Timings::default()).run();

    // Every halt ends in a restart; provisioning only gets here if the
    // portal failed to start
    warn!("Device halted ({:?})", halt);
    EspSystem.restart();
    Ok(())
}
