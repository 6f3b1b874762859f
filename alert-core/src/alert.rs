use log::{info, warn};

use crate::{
    config::{DeviceConfig, ALERT_PATH, ALERT_PORT},
    connectivity::{ConnectivityManager, ConnectivityState},
    discovery::ServerAddress,
    error::AlertError,
    hardware::{AlertTransport, Clock, DiscoveryTransport, OutputPin, Radio},
    indicator::{Indicator, IndicatorState},
};

/// One POST to the alert endpoint of a resolved server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertRequest {
    pub url: String,
    pub body: String,
    /// State being requested; the server toggles on every request, so this
    /// is carried for logging only.
    pub active: bool,
}

impl AlertRequest {
    pub const CONTENT_TYPE: &'static str = "application/x-www-form-urlencoded";

    pub fn new(server: ServerAddress, device_label: &str, active: bool) -> Self {
        Self {
            url: format!("http://{}:{}{}", server, ALERT_PORT, ALERT_PATH),
            body: format!("name={}", urlencoding::encode(device_label)),
            active,
        }
    }
}

/// Owns the alert on/off state and runs each toggle as a revertible
/// transaction against the server.
pub struct AlertController<S> {
    transport: S,
    active: bool,
}

impl<S: AlertTransport> AlertController<S> {
    pub fn new(transport: S) -> Self {
        Self {
            transport,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flip the alert and report it to the server.
    ///
    /// The flip is shown on the indicator straight away. If there is no
    /// link, no server, or the request gets no response, the flip is undone
    /// and the state is exactly what it was before the call. Any response,
    /// whatever its status, commits the new state.
    pub fn toggle<R, T, C, O>(
        &mut self,
        link: &mut ConnectivityManager<R, T>,
        indicator: &mut Indicator<O>,
        config: &DeviceConfig,
        clock: &C,
    ) -> Result<bool, AlertError>
    where
        R: Radio,
        T: DiscoveryTransport,
        C: Clock,
        O: OutputPin,
    {
        let previous = self.active;
        let requested = !previous;

        self.active = requested;
        indicator.show(
            IndicatorState::derive(link.state(), requested),
            clock.now_ms(),
        );
        info!("Alert state toggled to: {}", on_off(requested));

        match self.deliver(requested, link, config, clock) {
            Ok(()) => Ok(requested),
            Err(err) => {
                self.active = previous;
                indicator.show(
                    IndicatorState::derive(link.state(), previous),
                    clock.now_ms(),
                );
                warn!("{}, alert state reverted to {}", err, on_off(previous));
                Err(err)
            }
        }
    }

    fn deliver<R, T, C>(
        &mut self,
        requested: bool,
        link: &mut ConnectivityManager<R, T>,
        config: &DeviceConfig,
        clock: &C,
    ) -> Result<(), AlertError>
    where
        R: Radio,
        T: DiscoveryTransport,
        C: Clock,
    {
        if link.state() != ConnectivityState::WifiUpServerUp {
            warn!("Not connected to the server, reconnecting before sending alert");
            link.reconnect(clock)
                .map_err(|_| AlertError::NoConnectivity)?;
        }

        // A cached address is never trusted for a send
        let server = link.resolve_server(clock)?;

        let request = AlertRequest::new(server, &config.device_label, requested);
        info!("Sending alert to: {}", request.url);

        match self.transport.post(&request) {
            Ok(response) => {
                info!(
                    "Alert {} with HTTP code: {} - Response: {}",
                    if requested { "activated" } else { "deactivated" },
                    response.status,
                    response.body
                );
                Ok(())
            }
            Err(e) => {
                warn!("HTTP error: {:#}", e);
                Err(AlertError::SendFailed)
            }
        }
    }
}

fn on_off(active: bool) -> &'static str {
    if active {
        "ON"
    } else {
        "OFF"
    }
}
