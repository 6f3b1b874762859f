use std::time::Duration;

use alert_core::{
    alert::AlertRequest,
    hardware::{AlertResponse, AlertTransport},
};
use anyhow::{Context, Result};
use reqwest::{blocking::Client, header::CONTENT_TYPE};

/// Alert delivery with a blocking HTTP client.
pub struct HttpSender {
    client: Client,
}

impl HttpSender {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl AlertTransport for HttpSender {
    fn post(&mut self, request: &AlertRequest) -> Result<AlertResponse> {
        let response = self
            .client
            .post(&request.url)
            .header(CONTENT_TYPE, AlertRequest::CONTENT_TYPE)
            .body(request.body.clone())
            .send()
            .with_context(|| format!("No response from {}", request.url))?;

        let status = response.status().as_u16();
        // The body is only ever logged
        let body = response.text().unwrap_or_default();
        Ok(AlertResponse { status, body })
    }
}
