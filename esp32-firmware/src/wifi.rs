use std::{cell::RefCell, rc::Rc};

use alert_core::{config::DeviceConfig, hardware::Radio};
use anyhow::{anyhow, Result};
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::wifi::EspWifi;

/// The one WiFi driver, shared by the station radio and the setup portal.
pub type SharedWifi = Rc<RefCell<EspWifi<'static>>>;

/// Station-mode association driven through the non-blocking driver API.
pub struct WifiRadio {
    wifi: SharedWifi,
}

impl WifiRadio {
    pub fn new(wifi: SharedWifi) -> Self {
        Self { wifi }
    }
}

impl Radio for WifiRadio {
    fn begin(&mut self, config: &DeviceConfig) -> Result<()> {
        let mut wifi = self.wifi.borrow_mut();
        if wifi.is_started()? {
            let _ = wifi.disconnect();
        }

        let auth_method = if config.network_secret.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config
                .network_name
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("wifi ssid too long"))?,
            password: config
                .network_secret
                .as_str()
                .try_into()
                .map_err(|_| anyhow!("wifi password too long"))?,
            auth_method,
            ..Default::default()
        }))?;

        wifi.start()?;
        wifi.connect()?;
        Ok(())
    }

    fn reassociate(&mut self) -> Result<()> {
        let mut wifi = self.wifi.borrow_mut();
        let _ = wifi.disconnect();
        wifi.connect()?;
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        let wifi = self.wifi.borrow();
        wifi.is_connected().unwrap_or(false) && wifi.sta_netif().is_up().unwrap_or(false)
    }

    fn describe(&mut self) -> String {
        let wifi = self.wifi.borrow();
        match wifi.sta_netif().get_ip_info() {
            Ok(ip_info) => format!(
                "ip {}, gateway {}, dns {:?}",
                ip_info.ip, ip_info.subnet.gateway, ip_info.dns
            ),
            Err(e) => format!("no ip info ({})", e),
        }
    }
}
