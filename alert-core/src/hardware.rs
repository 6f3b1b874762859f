//! Hardware and collaborator seams.
//!
//! Everything outside the state machine's own memory is reached through one
//! of these traits: pins, the WiFi radio, the discovery socket, the HTTP
//! client, persistent storage, provisioning and the restart primitive. The
//! ESP32 firmware and the host runner each provide one [`Platform`].

use anyhow::Result;

use crate::{alert::AlertRequest, config::DeviceConfig};

/// Monotonic millisecond clock. `sleep_ms` blocks the single control flow.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn sleep_ms(&self, ms: u64);
}

/// A digital input wired with a pull-up, so a pressed button reads low.
pub trait InputPin {
    fn is_low(&mut self) -> bool;
}

pub trait OutputPin {
    fn set_level(&mut self, high: bool);
}

/// Station-mode WiFi radio.
pub trait Radio {
    /// Drop any current association and start joining the configured network.
    /// Returns once the attempt is under way; completion is observed through
    /// [`Radio::is_associated`].
    fn begin(&mut self, config: &DeviceConfig) -> Result<()>;

    /// Retry joining the network given to the last `begin`.
    fn reassociate(&mut self) -> Result<()>;

    fn is_associated(&mut self) -> bool;

    /// Short human readable link report for diagnostics.
    fn describe(&mut self) -> String;
}

/// Broadcast datagram socket used to locate the alert server.
pub trait DiscoveryTransport {
    /// Send one query. Replies still queued from earlier queries are
    /// discarded first, so a later [`DiscoveryTransport::poll_reply`] only
    /// sees answers to this one.
    fn broadcast(&mut self, payload: &[u8]) -> Result<()>;

    /// Read one pending reply into `buf` without blocking.
    fn poll_reply(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;
}

/// Whatever came back from the alert server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertResponse {
    pub status: u16,
    pub body: String,
}

pub trait AlertTransport {
    /// Deliver one alert request. `Err` means no response arrived at all;
    /// any HTTP status, including errors, is returned as `Ok`.
    fn post(&mut self, request: &AlertRequest) -> Result<AlertResponse>;
}

/// Durable storage for the [`DeviceConfig`]. `save` must have committed by the
/// time it returns.
pub trait ConfigStore {
    fn load(&mut self) -> Result<DeviceConfig>;
    fn save(&mut self, config: &DeviceConfig) -> Result<()>;
}

/// First-time setup flow.
pub trait Provisioner {
    /// Take over until a new configuration has been saved. `idle` must be
    /// called regularly from the provisioner's own loop so the indicator
    /// keeps blinking.
    fn start_provisioning(&mut self, idle: &mut dyn FnMut()) -> Result<()>;
}

pub trait Restart {
    fn restart(&mut self);
}

/// Bundle of concrete types one target provides.
pub trait Platform {
    type Clock: Clock;
    type Radio: Radio;
    type Discovery: DiscoveryTransport;
    type Sender: AlertTransport;
    type Store: ConfigStore;
    type Provisioner: Provisioner;
    type System: Restart;
    type Button: InputPin;
    type BootButton: InputPin;
    type Indicator: OutputPin;
}

/// The parts of one platform, handed to [`crate::device::Device::new`].
pub struct Board<P: Platform> {
    pub clock: P::Clock,
    pub radio: P::Radio,
    pub discovery: P::Discovery,
    pub sender: P::Sender,
    pub store: P::Store,
    pub provisioner: P::Provisioner,
    pub system: P::System,
    pub button: P::Button,
    pub boot_button: P::BootButton,
    pub indicator: P::Indicator,
}
