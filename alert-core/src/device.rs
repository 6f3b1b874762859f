use log::{debug, error, info, warn};

use crate::{
    alert::AlertController,
    config::{DeviceConfig, Timings},
    connectivity::{ConnectivityManager, ConnectivityState},
    discovery::DiscoveryClient,
    hardware::{Board, Clock, ConfigStore, InputPin, Platform, Provisioner, Radio, Restart},
    indicator::{Indicator, IndicatorState},
    input::{Debouncer, Edge, HoldDetector},
};

/// Settle time before the boot pin is trusted at power-up.
const BOOT_SETTLE_MS: u64 = 100;

/// Why the scheduling loop stopped. The runner restarts the device after
/// either.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// Control was handed to the provisioning flow
    Provisioning,
    /// Configuration was wiped and a restart requested
    FactoryReset,
}

/// The orchestrator: owns every piece of device state and runs the single
/// cooperative scheduling loop.
pub struct Device<P: Platform> {
    clock: P::Clock,
    store: P::Store,
    provisioner: P::Provisioner,
    system: P::System,
    button: P::Button,
    boot_button: P::BootButton,
    link: ConnectivityManager<P::Radio, P::Discovery>,
    alert: AlertController<P::Sender>,
    indicator: Indicator<P::Indicator>,
    debouncer: Debouncer,
    reset_hold: HoldDetector,
    config: DeviceConfig,
    timings: Timings,
}

impl<P: Platform> Device<P> {
    pub fn new(board: Board<P>, timings: Timings) -> Self {
        Self {
            link: ConnectivityManager::new(
                board.radio,
                DiscoveryClient::new(board.discovery, &timings),
                &timings,
            ),
            alert: AlertController::new(board.sender),
            indicator: Indicator::new(board.indicator, &timings),
            debouncer: Debouncer::new(timings.debounce_ms),
            reset_hold: HoldDetector::new(timings.reset_hold_ms),
            clock: board.clock,
            store: board.store,
            provisioner: board.provisioner,
            system: board.system,
            button: board.button,
            boot_button: board.boot_button,
            config: DeviceConfig::default(),
            timings,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.link.state()
    }

    pub fn alert_active(&self) -> bool {
        self.alert.is_active()
    }

    pub fn indicator(&self) -> Option<IndicatorState> {
        self.indicator.shown()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Boot, then tick until something stops the loop.
    pub fn run(mut self) -> Halt {
        if let Some(halt) = self.boot() {
            return halt;
        }
        loop {
            if let Some(halt) = self.tick() {
                return halt;
            }
            self.clock.sleep_ms(self.timings.tick_ms);
        }
    }

    /// Load the configuration and bring the link up.
    ///
    /// Returns `Some` when boot ended in provisioning or a factory reset
    /// instead of a running device.
    pub fn boot(&mut self) -> Option<Halt> {
        info!("Alert button starting up");

        self.config = match self.store.load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load configuration, using defaults: {:#}", e);
                DeviceConfig::default()
            }
        };

        if self.boot_reset_requested() {
            return Some(self.factory_reset());
        }

        if !self.config.is_provisioned {
            info!("Device not configured, starting provisioning");
            self.link.mark_unprovisioned();
            return Some(self.provision());
        }
        if let Err(reason) = self.config.validate() {
            warn!("Stored configuration is unusable ({}), starting provisioning", reason);
            self.link.mark_unprovisioned();
            return Some(self.provision());
        }

        if let Err(e) = self.link.connect(&self.config, &self.clock) {
            warn!("{}, falling back to provisioning", e);
            self.config.is_provisioned = false;
            if let Err(e) = self.store.save(&self.config) {
                error!("Failed to persist unprovisioned state: {:#}", e);
            }
            return Some(self.provision());
        }

        self.report_diagnostics();
        self.refresh_indicator();
        None
    }

    /// One pass of the scheduling loop.
    pub fn tick(&mut self) -> Option<Halt> {
        if self
            .reset_hold
            .sample(self.boot_button.is_low(), self.clock.now_ms())
        {
            return Some(self.factory_reset());
        }

        self.link.supervise(&self.clock);
        self.link.periodic_check(&self.clock);

        let edge = self
            .debouncer
            .sample(self.button.is_low(), self.clock.now_ms());
        if edge == Some(Edge::Falling) {
            if self.link.state() == ConnectivityState::WifiUpServerUp {
                info!("Button pressed");
                if let Err(e) = self.alert.toggle(
                    &mut self.link,
                    &mut self.indicator,
                    &self.config,
                    &self.clock,
                ) {
                    // Already reverted by the controller
                    debug!("Toggle rolled back: {}", e);
                }
            } else {
                info!("Button press ignored: not connected to server");
            }
        }

        self.refresh_indicator();
        None
    }

    /// Wipe the stored configuration and restart into provisioning.
    pub fn factory_reset(&mut self) -> Halt {
        warn!("Factory reset triggered");
        self.indicator.force(true);

        self.config = DeviceConfig::default();
        if let Err(e) = self.store.save(&self.config) {
            error!("Failed to clear configuration: {:#}", e);
        }

        self.clock.sleep_ms(self.timings.reset_flash_ms);
        self.indicator.force(false);

        info!("Configuration cleared, restarting");
        self.system.restart();
        Halt::FactoryReset
    }

    fn provision(&mut self) -> Halt {
        let Self {
            provisioner,
            indicator,
            clock,
            link,
            alert,
            ..
        } = self;
        let state = IndicatorState::derive(link.state(), alert.is_active());
        let mut idle = || indicator.show(state, clock.now_ms());

        if let Err(e) = provisioner.start_provisioning(&mut idle) {
            error!("Provisioning failed: {:#}", e);
        }
        Halt::Provisioning
    }

    /// The boot pin held low through power-up asks for a factory reset.
    fn boot_reset_requested(&mut self) -> bool {
        if !self.boot_button.is_low() {
            return false;
        }

        self.clock.sleep_ms(BOOT_SETTLE_MS);
        let mut hold = HoldDetector::new(self.timings.reset_hold_ms);
        loop {
            let low = self.boot_button.is_low();
            if hold.sample(low, self.clock.now_ms()) {
                return true;
            }
            if !low {
                info!("Boot button released before reset threshold");
                return false;
            }
            self.clock.sleep_ms(self.timings.tick_ms.max(1));
        }
    }

    fn refresh_indicator(&mut self) {
        self.indicator.show(
            IndicatorState::derive(self.link.state(), self.alert.is_active()),
            self.clock.now_ms(),
        );
    }

    fn report_diagnostics(&mut self) {
        info!("=== Network Diagnostics ===");
        info!(
            "Device: {}",
            if self.config.device_label.is_empty() {
                "not configured"
            } else {
                self.config.device_label.as_str()
            }
        );
        info!("Provisioned: {}", self.config.is_provisioned);
        info!("Network: {}", self.config.network_name);
        info!("Link: {}", self.link.radio_mut().describe());
        match self.link.server() {
            Some(server) => info!("Server: connected at {}", server),
            None => info!("Server: not connected"),
        }
        info!("State: {:?}", self.link.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDiscovery, FakeRadio, MemoryStore, Parts, TestPlatform};

    fn device(parts: &Parts) -> Device<TestPlatform> {
        Device::new(parts.board(), Timings::default())
    }

    fn run_for(device: &mut Device<TestPlatform>, parts: &Parts, ms: u64) -> Option<Halt> {
        let end = parts.clock.now_ms() + ms;
        while parts.clock.now_ms() < end {
            if let Some(halt) = device.tick() {
                return Some(halt);
            }
            parts.clock.advance(10);
        }
        None
    }

    #[test]
    fn test_boot_connects() {
        let parts = Parts::new();
        let mut device = device(&parts);

        assert_eq!(device.boot(), None);
        assert_eq!(device.state(), ConnectivityState::WifiUpServerUp);
        assert_eq!(device.indicator(), Some(IndicatorState::Solid(false)));
        assert_eq!(device.config().device_label, "kitchen");
        assert_eq!(parts.radio.begins(), 1);
    }

    #[test]
    fn test_unprovisioned_boot_provisions() {
        let mut parts = Parts::new();
        parts.store = MemoryStore::holding(DeviceConfig::default());
        parts.button.hold(0..60_000);
        let mut device = device(&parts);

        assert_eq!(device.boot(), Some(Halt::Provisioning));
        assert_eq!(parts.provisioner.starts(), 1);
        assert_eq!(device.state(), ConnectivityState::Unprovisioned);
        assert_eq!(device.indicator(), Some(IndicatorState::FastBlink));
        assert_eq!(parts.radio.begins(), 0);
        assert!(parts.sender.requests().is_empty());
    }

    #[test]
    fn test_boot_without_server_slow_blinks() {
        let mut parts = Parts::new();
        parts.discovery = FakeDiscovery::silent();
        let mut device = device(&parts);

        assert_eq!(device.boot(), None);
        assert_eq!(device.state(), ConnectivityState::WifiUpNoServer);
        assert_eq!(device.indicator(), Some(IndicatorState::SlowBlink));
        assert_eq!(parts.discovery.broadcasts(), 3);
    }

    #[test]
    fn test_association_failure_unprovisions() {
        let mut parts = Parts::new();
        parts.radio = FakeRadio::unreachable();
        let mut device = device(&parts);

        assert_eq!(device.boot(), Some(Halt::Provisioning));
        assert_eq!(device.state(), ConnectivityState::Unprovisioned);

        let saves = parts.store.saves();
        assert_eq!(saves.len(), 1);
        assert!(!saves[0].is_provisioned);
        assert_eq!(saves[0].network_name, "home");
        assert_eq!(parts.provisioner.starts(), 1);
    }

    #[test]
    fn test_press_toggles_alert() {
        let parts = Parts::new();
        let mut device = device(&parts);
        device.boot();

        let t = parts.clock.now_ms();
        parts.button.hold(t + 50..t + 300);
        assert_eq!(run_for(&mut device, &parts, 1000), None);

        assert!(device.alert_active());
        assert_eq!(device.indicator(), Some(IndicatorState::Solid(true)));
        assert!(parts.indicator.level());

        let requests = parts.sender.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, "name=kitchen");
    }

    #[test]
    fn test_bouncy_press_toggles_once() {
        let parts = Parts::new();
        let mut device = device(&parts);
        device.boot();

        let t = parts.clock.now_ms();
        parts.button.hold(t + 10..t + 20);
        parts.button.hold(t + 30..t + 50);
        parts.button.hold(t + 70..t + 400);
        run_for(&mut device, &parts, 1000);

        assert_eq!(parts.sender.requests().len(), 1);
        assert!(device.alert_active());
    }

    #[test]
    fn test_button_held_through_boot_does_not_toggle() {
        let parts = Parts::new();
        parts.button.hold(0..3000);
        let mut device = device(&parts);
        device.boot();

        assert!(parts.clock.now_ms() < 3000);
        run_for(&mut device, &parts, 3000);

        assert!(!device.alert_active());
        assert!(parts.sender.requests().is_empty());
    }

    #[test]
    fn test_send_failure_shows_prior_level() {
        let parts = Parts::new();
        let mut device = device(&parts);
        device.boot();

        parts.sender.fail_next();
        let t = parts.clock.now_ms();
        parts.button.hold(t + 50..t + 300);
        run_for(&mut device, &parts, 1000);

        assert!(!device.alert_active());
        assert_eq!(device.indicator(), Some(IndicatorState::Solid(false)));
        assert!(!parts.indicator.level());
        assert_eq!(device.state(), ConnectivityState::WifiUpServerUp);
    }

    #[test]
    fn test_press_dropped_without_server() {
        let mut parts = Parts::new();
        parts.discovery = FakeDiscovery::silent();
        let mut device = device(&parts);
        device.boot();

        let t = parts.clock.now_ms();
        parts.button.hold(t + 50..t + 300);
        run_for(&mut device, &parts, 1000);

        assert!(!device.alert_active());
        assert!(parts.sender.requests().is_empty());

        // Not queued: the server returning later does not replay the press
        parts.discovery.set_server(Some("192.168.1.20"));
        run_for(&mut device, &parts, 10_000);
        assert_eq!(device.state(), ConnectivityState::WifiUpServerUp);
        assert!(parts.sender.requests().is_empty());
    }

    #[test]
    fn test_link_loss_recovers() {
        let parts = Parts::new();
        let mut device = device(&parts);
        device.boot();

        parts.radio.drop_link();
        device.tick();
        assert_eq!(device.state(), ConnectivityState::WifiDown);
        assert_eq!(device.indicator(), Some(IndicatorState::FastBlink));

        run_for(&mut device, &parts, 10_100);
        assert_eq!(device.state(), ConnectivityState::WifiUpServerUp);
        assert_eq!(parts.radio.reassociations(), 1);
        assert!(parts.store.saves().is_empty());
    }

    #[test]
    fn test_held_boot_pin_resets_once() {
        let parts = Parts::new();
        parts.boot_button.hold(20_000..40_000);

        assert_eq!(device(&parts).run(), Halt::FactoryReset);
        assert_eq!(parts.system.restarts(), 1);
        assert_eq!(parts.store.saves().last(), Some(&DeviceConfig::default()));

        let writes = parts.indicator.writes();
        assert_eq!(&writes[writes.len() - 2..], &[true, false]);
    }

    #[test]
    fn test_boot_hold_resets_before_connecting() {
        let parts = Parts::new();
        parts.boot_button.hold(0..5000);
        let mut device = device(&parts);

        assert_eq!(device.boot(), Some(Halt::FactoryReset));
        assert_eq!(parts.system.restarts(), 1);
        assert_eq!(parts.radio.begins(), 0);
        assert!(parts.clock.now_ms() >= BOOT_SETTLE_MS + 3000);
    }

    #[test]
    fn test_short_boot_hold_continues() {
        let parts = Parts::new();
        parts.boot_button.hold(0..1500);
        let mut device = device(&parts);

        assert_eq!(device.boot(), None);
        assert_eq!(parts.system.restarts(), 0);
        assert_eq!(device.state(), ConnectivityState::WifiUpServerUp);
    }
}
