//! Connectivity and alert state machine for the alert button.
//!
//! The crate owns every piece of real state on the device: WiFi and server
//! connectivity, the alert toggle, button debouncing and the status
//! indicator. All I/O goes through the traits in [`hardware`], which are
//! implemented once for the ESP32 firmware and once for the host runner.
//! The one shared transport is [`udp`], since both targets have std sockets.

pub mod alert;
pub mod config;
pub mod connectivity;
pub mod device;
pub mod discovery;
pub mod error;
pub mod hardware;
pub mod indicator;
pub mod input;
pub mod udp;

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude {
    pub use crate::{
        alert::*, config::*, connectivity::*, device::*, discovery::*, error::*, hardware::*,
        indicator::*, input::*, udp::*,
    };
}
