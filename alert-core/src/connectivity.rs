use log::{info, warn};

use crate::{
    config::{DeviceConfig, Timings},
    discovery::{DiscoveryClient, ServerAddress},
    error::LinkError,
    hardware::{Clock, DiscoveryTransport, Radio},
};

/// WiFi and server reachability as seen by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectivityState {
    Unprovisioned,
    Connecting,
    WifiUpNoServer,
    WifiUpServerUp,
    WifiDown,
}

impl ConnectivityState {
    pub fn is_wifi_up(self) -> bool {
        matches!(
            self,
            ConnectivityState::WifiUpNoServer | ConnectivityState::WifiUpServerUp
        )
    }
}

/// Detectable transitions reported by [`ConnectivityManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// WifiUpServerUp -> WifiUpNoServer
    ServerLost,
    /// WifiUpNoServer -> WifiUpServerUp
    ServerRecovered,
    /// The radio dropped its association
    LinkLost,
    /// A reconnect from WifiDown succeeded
    LinkRestored,
}

/// Owns [`ConnectivityState`] and the last resolved [`ServerAddress`].
///
/// The address is only kept while the state is `WifiUpServerUp` and is
/// cleared on every failed discovery.
pub struct ConnectivityManager<R, T> {
    radio: R,
    discovery: DiscoveryClient<T>,
    state: ConnectivityState,
    server: Option<ServerAddress>,
    timings: Timings,
    last_check_ms: u64,
}

impl<R: Radio, T: DiscoveryTransport> ConnectivityManager<R, T> {
    pub fn new(radio: R, discovery: DiscoveryClient<T>, timings: &Timings) -> Self {
        Self {
            radio,
            discovery,
            state: ConnectivityState::Unprovisioned,
            server: None,
            timings: *timings,
            last_check_ms: 0,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn server(&self) -> Option<ServerAddress> {
        self.server
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn mark_unprovisioned(&mut self) {
        self.set_state(ConnectivityState::Unprovisioned, None);
    }

    /// Join the configured network, then look for the server.
    ///
    /// Lands on `WifiUpServerUp` or `WifiUpNoServer`. When association never
    /// completes the state becomes `Unprovisioned`: an unreachable network is
    /// handled exactly like a missing configuration, and the caller is
    /// expected to persist that and start provisioning.
    pub fn connect<C: Clock>(
        &mut self,
        config: &DeviceConfig,
        clock: &C,
    ) -> Result<ConnectivityState, LinkError> {
        info!("Connecting to WiFi: {}", config.network_name);
        self.set_state(ConnectivityState::Connecting, None);

        if let Err(e) = self.radio.begin(config) {
            warn!("Failed to start WiFi association: {:#}", e);
        }

        let attempts = self.timings.association_attempts;
        if !self.wait_for_association(clock, attempts) {
            warn!("WiFi connection failed after {} attempts", attempts);
            self.set_state(ConnectivityState::Unprovisioned, None);
            return Err(LinkError::AssociationFailed { attempts });
        }

        info!("Connected to WiFi: {}", self.radio.describe());
        Ok(self.discover_after_association(clock))
    }

    /// Shorter retry for a link lost mid-operation.
    ///
    /// On failure the state is left at `WifiDown`; the stored configuration
    /// is never touched here.
    pub fn reconnect<C: Clock>(&mut self, clock: &C) -> Result<ConnectivityState, LinkError> {
        info!("Reconnecting to WiFi...");
        self.set_state(ConnectivityState::Connecting, None);

        if let Err(e) = self.radio.reassociate() {
            warn!("Failed to restart WiFi association: {:#}", e);
        }

        let attempts = self.timings.reconnect_attempts;
        if !self.wait_for_association(clock, attempts) {
            warn!("WiFi reconnection failed after {} attempts", attempts);
            self.set_state(ConnectivityState::WifiDown, None);
            self.last_check_ms = clock.now_ms();
            return Err(LinkError::AssociationFailed { attempts });
        }

        info!("Reconnected to WiFi: {}", self.radio.describe());
        Ok(self.discover_after_association(clock))
    }

    /// Re-resolve the server address right before it is used.
    pub fn resolve_server<C: Clock>(&mut self, clock: &C) -> Result<ServerAddress, LinkError> {
        match self.discovery.discover(clock) {
            Some(address) => {
                self.set_state(ConnectivityState::WifiUpServerUp, Some(address));
                Ok(address)
            }
            None => {
                self.set_state(ConnectivityState::WifiUpNoServer, None);
                Err(LinkError::DiscoveryTimeout {
                    attempts: self.discovery.attempts(),
                })
            }
        }
    }

    /// Re-run discovery once per check interval while WiFi is up.
    pub fn periodic_check<C: Clock>(&mut self, clock: &C) -> Option<LinkEvent> {
        if !self.state.is_wifi_up() || !self.check_due(clock) {
            return None;
        }

        info!("Performing periodic server check...");
        let before = self.state;
        let after = match self.resolve_server(clock) {
            Ok(_) => ConnectivityState::WifiUpServerUp,
            Err(_) => ConnectivityState::WifiUpNoServer,
        };
        self.last_check_ms = clock.now_ms();

        match (before, after) {
            (ConnectivityState::WifiUpServerUp, ConnectivityState::WifiUpNoServer) => {
                warn!("Server disconnected/unavailable");
                Some(LinkEvent::ServerLost)
            }
            (ConnectivityState::WifiUpNoServer, ConnectivityState::WifiUpServerUp) => {
                info!("Server connected");
                Some(LinkEvent::ServerRecovered)
            }
            _ => None,
        }
    }

    /// Notice a dropped association, and retry from `WifiDown` once per
    /// check interval.
    pub fn supervise<C: Clock>(&mut self, clock: &C) -> Option<LinkEvent> {
        if self.state.is_wifi_up() {
            if self.radio.is_associated() {
                return None;
            }
            warn!("WiFi connection lost");
            self.set_state(ConnectivityState::WifiDown, None);
            self.last_check_ms = clock.now_ms();
            return Some(LinkEvent::LinkLost);
        }

        if self.state == ConnectivityState::WifiDown && self.check_due(clock) {
            warn!("WiFi disconnected, attempting to reconnect...");
            return self.reconnect(clock).ok().map(|_| LinkEvent::LinkRestored);
        }

        None
    }

    fn check_due<C: Clock>(&self, clock: &C) -> bool {
        clock.now_ms().saturating_sub(self.last_check_ms) >= self.timings.server_check_interval_ms
    }

    fn wait_for_association<C: Clock>(&mut self, clock: &C, attempts: u32) -> bool {
        let mut attempt = 0;
        while !self.radio.is_associated() && attempt < attempts {
            clock.sleep_ms(self.timings.association_poll_ms);
            attempt += 1;
        }
        self.radio.is_associated()
    }

    fn discover_after_association<C: Clock>(&mut self, clock: &C) -> ConnectivityState {
        if self.resolve_server(clock).is_err() {
            warn!("Server unavailable after WiFi connect");
        }
        self.last_check_ms = clock.now_ms();
        self.state
    }

    fn set_state(&mut self, state: ConnectivityState, server: Option<ServerAddress>) {
        debug_assert_eq!(
            state == ConnectivityState::WifiUpServerUp,
            server.is_some(),
            "server address must be present exactly when the server is up"
        );
        if state != self.state {
            info!("Connectivity: {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.server = server;
    }
}
