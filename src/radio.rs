use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use alert_core::{config::DeviceConfig, hardware::Radio};
use anyhow::Result;
use log::info;

/// The host's own network connection.
///
/// Association is managed by the operating system; the radio only reports
/// whether a routable IPv4 address is available.
pub struct HostRadio {
    probe: Ipv4Addr,
}

impl HostRadio {
    pub fn new() -> Self {
        Self {
            probe: Ipv4Addr::new(192, 0, 2, 1),
        }
    }

    /// Local address the kernel would use for off-host traffic. Connecting a
    /// UDP socket sends nothing.
    fn local_address(&self) -> Option<Ipv4Addr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect((self.probe, 9)).ok()?;
        match socket.local_addr().ok()?.ip() {
            IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
            _ => None,
        }
    }
}

impl Default for HostRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for HostRadio {
    fn begin(&mut self, config: &DeviceConfig) -> Result<()> {
        info!(
            "Network '{}' is managed by the host, waiting for a route",
            config.network_name
        );
        Ok(())
    }

    fn reassociate(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        self.local_address().is_some()
    }

    fn describe(&mut self) -> String {
        match self.local_address() {
            Some(ip) => format!("host network, local address {}", ip),
            None => "host network, no route".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_matches_association() {
        let mut radio = HostRadio::new();
        let associated = radio.is_associated();
        assert_eq!(radio.describe().contains("local address"), associated);
    }
}
