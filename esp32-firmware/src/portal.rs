//! Captive setup portal: an open access point, a DNS responder that points
//! every name at the device, and a form that saves the network credentials.

use std::{
    io::ErrorKind,
    net::{Ipv4Addr, UdpSocket},
    thread,
    time::Duration,
};

use alert_core::{
    config::DeviceConfig,
    hardware::{ConfigStore, Provisioner},
};
use anyhow::{anyhow, Context, Result};
use embedded_svc::{
    http::{Headers, Method},
    io::{Read, Write},
    wifi::{AccessPointConfiguration, AuthMethod, Configuration},
};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::{
    http::server::{Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request},
    nvs::EspDefaultNvsPartition,
};

use crate::{storage::NvsStore, wifi::SharedWifi};

const PORTAL_SSID: &str = "EMERGENCY ALERT SETUP";
const MAX_FORM_BODY: usize = 1024;
const RESTART_DELAY: Duration = Duration::from_secs(2);
const DNS_PORT: u16 = 53;
const POLL_MS: u32 = 10;

const SETUP_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Device Setup</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <style>
    body { font-family: Arial, sans-serif; max-width: 400px; margin: 0 auto; padding: 20px; }
    h1 { color: #444; text-align: center; }
    form { background: #f9f9f9; padding: 20px; border-radius: 5px; }
    input { width: 100%; padding: 10px; margin: 8px 0; box-sizing: border-box; }
    input[type=submit] { background: #4CAF50; color: white; border: none; }
  </style>
</head>
<body>
  <h1>Emergency Alert Setup</h1>
  <form action="/save" method="post">
    <label for="ssid">WiFi Network:</label>
    <input type="text" id="ssid" name="ssid" required maxlength="31" placeholder="Your WiFi name">
    <label for="password">WiFi Password:</label>
    <input type="password" id="password" name="password" maxlength="31" placeholder="Your WiFi password">
    <label for="deviceName">Device Name:</label>
    <input type="text" id="deviceName" name="deviceName" required maxlength="31" placeholder="e.g., John's Device">
    <input type="submit" value="Save Configuration">
  </form>
</body>
</html>
"#;

const SAVED_PAGE: &str =
    "<h1>Configuration Saved!</h1><p>Device will restart and connect to your network.</p>";

/// Paths operating systems probe to detect a captive portal.
const PROBE_PATHS: [&str; 8] = [
    "/",
    "/generate_204",
    "/gen_204",
    "/favicon.ico",
    "/hotspot-detect.html",
    "/ncsi.txt",
    "/connecttest.txt",
    "/fwlink",
];

pub struct CaptivePortal {
    wifi: SharedWifi,
    partition: EspDefaultNvsPartition,
}

impl CaptivePortal {
    pub fn new(wifi: SharedWifi, partition: EspDefaultNvsPartition) -> Self {
        Self { wifi, partition }
    }

    /// Switch the radio to an open access point and return its address.
    fn start_access_point(&mut self) -> Result<Ipv4Addr> {
        let mut wifi = self.wifi.borrow_mut();
        if wifi.is_started()? {
            let _ = wifi.disconnect();
            wifi.stop()?;
        }

        wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
            ssid: PORTAL_SSID
                .try_into()
                .map_err(|_| anyhow!("portal SSID too long"))?,
            auth_method: AuthMethod::None,
            channel: 1,
            ..Default::default()
        }))?;
        wifi.start()?;

        Ok(wifi.ap_netif().get_ip_info()?.ip)
    }
}

impl Provisioner for CaptivePortal {
    /// Never returns on success: a saved form restarts the device.
    fn start_provisioning(&mut self, idle: &mut dyn FnMut()) -> Result<()> {
        let portal_ip = self.start_access_point()?;
        let _server = create_portal_server(self.partition.clone(), portal_ip)?;
        let dns = CaptiveDns::bind(portal_ip)?;

        info!("Setup portal '{}' ready at http://{}/", PORTAL_SSID, portal_ip);

        loop {
            dns.serve_pending();
            idle();
            FreeRtos::delay_ms(POLL_MS);
        }
    }
}

fn create_portal_server(
    partition: EspDefaultNvsPartition,
    portal_ip: Ipv4Addr,
) -> Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: 16 * 1024,
        uri_match_wildcard: true,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    for path in PROBE_PATHS {
        server.fn_handler::<anyhow::Error, _>(path, Method::Get, move |req| {
            req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
                .write_all(SETUP_PAGE.as_bytes())?;
            Ok(())
        })?;
    }

    server.fn_handler::<anyhow::Error, _>("/save", Method::Post, move |mut req| {
        let body = read_request_body(&mut req)?;
        let config = match DeviceConfig::from_form(&String::from_utf8_lossy(&body)) {
            Ok(config) => config,
            Err(reason) => {
                warn!("Rejected setup form: {}", reason);
                req.into_response(
                    400,
                    Some("Bad Request"),
                    &[("Content-Type", "text/html; charset=utf-8")],
                )?
                .write_all(format!("<h1>Invalid settings</h1><p>{}</p>", reason).as_bytes())?;
                return Ok(());
            }
        };

        NvsStore::new(partition.clone())
            .save(&config)
            .context("Failed to save configuration")?;
        info!("Configuration saved for device '{}'", config.device_label);

        req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
            .write_all(SAVED_PAGE.as_bytes())?;

        thread::Builder::new()
            .name("portal-restart".into())
            .spawn(|| {
                thread::sleep(RESTART_DELAY);
                unsafe { esp_idf_svc::sys::esp_restart() };
            })?;
        Ok(())
    })?;

    // Registered last so the exact paths above win
    let location = format!("http://{}/", portal_ip);
    server.fn_handler::<anyhow::Error, _>("/*", Method::Get, move |req| {
        req.into_response(302, Some("Found"), &[("Location", location.as_str())])?;
        Ok(())
    })?;

    Ok(server)
}

fn read_request_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Vec<u8>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_FORM_BODY {
        return Err(anyhow!("request body too large"));
    }

    let mut body = vec![0_u8; len];
    if len > 0 {
        req.read_exact(&mut body)?;
    }
    Ok(body)
}

/// Answers every A query with the portal's own address.
struct CaptiveDns {
    socket: UdpSocket,
    answer: Ipv4Addr,
}

impl CaptiveDns {
    fn bind(answer: Ipv4Addr) -> Result<Self> {
        let socket =
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, DNS_PORT)).context("Failed to bind DNS")?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, answer })
    }

    fn serve_pending(&self) {
        let mut buf = [0_u8; 512];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!("DNS receive failed: {}", e);
                    return;
                }
            };

            if let Some(reply) = dns_answer(&buf[..len], self.answer) {
                if let Err(e) = self.socket.send_to(&reply, from) {
                    warn!("DNS reply to {} failed: {}", from, e);
                }
            }
        }
    }
}

/// Build a reply to the first question in `query` pointing at `ip`.
fn dns_answer(query: &[u8], ip: Ipv4Addr) -> Option<Vec<u8>> {
    const HEADER_LEN: usize = 12;

    // Queries only, with at least one question
    if query.len() < HEADER_LEN || query[2] & 0x80 != 0 {
        return None;
    }
    if u16::from_be_bytes([query[4], query[5]]) == 0 {
        return None;
    }

    let mut pos = HEADER_LEN;
    loop {
        let label = *query.get(pos)? as usize;
        pos += 1;
        if label == 0 {
            break;
        }
        if label & 0xC0 != 0 {
            return None;
        }
        pos += label;
    }
    // QTYPE and QCLASS
    let question_end = pos + 4;
    if query.len() < question_end {
        return None;
    }

    let mut reply = Vec::with_capacity(question_end + 16);
    reply.extend_from_slice(&query[..2]);
    reply.extend_from_slice(&[0x81, 0x80, 0, 1, 0, 1, 0, 0, 0, 0]);
    reply.extend_from_slice(&query[HEADER_LEN..question_end]);
    // Name pointer to the question, type A, class IN, TTL 60s, 4 bytes
    reply.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4]);
    reply.extend_from_slice(&ip.octets());
    Some(reply)
}
