use std::time::Duration;

use alert_core::{
    alert::AlertRequest,
    hardware::{AlertResponse, AlertTransport},
};
use anyhow::{anyhow, Result};
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    io::{Read, Write},
};
use esp_idf_svc::http::client::{Configuration as HttpClientConfiguration, EspHttpConnection};

/// Longest response body kept for the log.
const MAX_RESPONSE_LOG: usize = 256;

/// Alert delivery over the ESP-IDF HTTP client, one connection per alert.
pub struct HttpSender {
    timeout: Duration,
}

impl HttpSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl AlertTransport for HttpSender {
    fn post(&mut self, request: &AlertRequest) -> Result<AlertResponse> {
        let http_conf = HttpClientConfiguration {
            timeout: Some(self.timeout),
            ..Default::default()
        };
        let mut client = HttpClient::wrap(EspHttpConnection::new(&http_conf)?);

        let content_length = request.body.len().to_string();
        let headers = [
            ("Content-Type", AlertRequest::CONTENT_TYPE),
            ("Content-Length", content_length.as_str()),
        ];
        let mut outgoing = client.request(Method::Post, &request.url, &headers)?;
        outgoing
            .write_all(request.body.as_bytes())
            .map_err(|e| anyhow!("{e:?}"))?;
        outgoing.flush().map_err(|e| anyhow!("{e:?}"))?;

        let mut response = outgoing.submit().map_err(|e| anyhow!("{e:?}"))?;
        let status = response.status();

        let mut chunk = [0_u8; MAX_RESPONSE_LOG];
        let read = response.read(&mut chunk).unwrap_or(0);
        let body = String::from_utf8_lossy(&chunk[..read]).into_owned();

        Ok(AlertResponse { status, body })
    }
}
