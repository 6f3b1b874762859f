//! Deterministic doubles for the hardware traits.
//!
//! Every double is a cheap handle around shared state, so a test can keep a
//! clone for inspection after moving the original into the device.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    ops::Range,
    rc::Rc,
};

use anyhow::{anyhow, Result};

use crate::{
    alert::AlertRequest,
    config::DeviceConfig,
    hardware::{
        AlertResponse, AlertTransport, Board, Clock, ConfigStore, DiscoveryTransport, InputPin,
        OutputPin, Platform, Provisioner, Radio, Restart,
    },
};

/// Clock that only moves when slept on or advanced.
#[derive(Clone, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

#[derive(Default)]
struct RadioScript {
    reachable: bool,
    delay_polls: u32,
    associated: bool,
    pending: Option<u32>,
    begins: u32,
    reassociations: u32,
}

impl RadioScript {
    fn start(&mut self) {
        self.associated = false;
        self.pending = self.reachable.then_some(self.delay_polls);
    }
}

/// Radio that associates a fixed number of status polls after each attempt,
/// or never when unreachable.
#[derive(Clone, Default)]
pub struct FakeRadio(Rc<RefCell<RadioScript>>);

impl FakeRadio {
    pub fn reachable_after(polls: u32) -> Self {
        let radio = Self::default();
        {
            let mut script = radio.0.borrow_mut();
            script.reachable = true;
            script.delay_polls = polls;
        }
        radio
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.0.borrow_mut().reachable = reachable;
    }

    pub fn drop_link(&self) {
        let mut script = self.0.borrow_mut();
        script.associated = false;
        script.pending = None;
    }

    pub fn begins(&self) -> u32 {
        self.0.borrow().begins
    }

    pub fn reassociations(&self) -> u32 {
        self.0.borrow().reassociations
    }
}

impl Radio for FakeRadio {
    fn begin(&mut self, _config: &DeviceConfig) -> Result<()> {
        let mut script = self.0.borrow_mut();
        script.begins += 1;
        script.start();
        Ok(())
    }

    fn reassociate(&mut self) -> Result<()> {
        let mut script = self.0.borrow_mut();
        script.reassociations += 1;
        script.start();
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        let mut script = self.0.borrow_mut();
        if script.associated {
            return true;
        }
        match script.pending {
            Some(0) => {
                script.associated = true;
                script.pending = None;
                true
            }
            Some(n) => {
                script.pending = Some(n - 1);
                false
            }
            None => false,
        }
    }

    fn describe(&mut self) -> String {
        "fake radio".to_string()
    }
}

#[derive(Default)]
struct DiscoveryScript {
    server: Option<String>,
    scripted: VecDeque<Option<String>>,
    pending: Option<Vec<u8>>,
    broadcasts: u32,
}

/// Discovery socket where each broadcast gets the next scripted reply, or the
/// standing server reply once the script runs out.
#[derive(Clone, Default)]
pub struct FakeDiscovery(Rc<RefCell<DiscoveryScript>>);

impl FakeDiscovery {
    pub fn answering(reply: &str) -> Self {
        let discovery = Self::default();
        discovery.set_server(Some(reply));
        discovery
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn set_server(&self, reply: Option<&str>) {
        self.0.borrow_mut().server = reply.map(str::to_string);
    }

    pub fn script(&self, replies: Vec<Option<&str>>) {
        self.0
            .borrow_mut()
            .scripted
            .extend(replies.into_iter().map(|r| r.map(str::to_string)));
    }

    pub fn broadcasts(&self) -> u32 {
        self.0.borrow().broadcasts
    }
}

impl DiscoveryTransport for FakeDiscovery {
    fn broadcast(&mut self, _payload: &[u8]) -> Result<()> {
        let mut script = self.0.borrow_mut();
        script.broadcasts += 1;
        let reply = match script.scripted.pop_front() {
            Some(reply) => reply,
            None => script.server.clone(),
        };
        script.pending = reply.map(String::into_bytes);
        Ok(())
    }

    fn poll_reply(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        Ok(self.0.borrow_mut().pending.take().map(|reply| {
            let len = reply.len().min(buf.len());
            buf[..len].copy_from_slice(&reply[..len]);
            len
        }))
    }
}

#[derive(Default)]
struct SenderScript {
    status: u16,
    fail_next: bool,
    requests: Vec<AlertRequest>,
}

/// HTTP client that answers with a fixed status unless told to drop the
/// next request.
#[derive(Clone, Default)]
pub struct FakeSender(Rc<RefCell<SenderScript>>);

impl FakeSender {
    pub fn responding(status: u16) -> Self {
        let sender = Self::default();
        sender.respond_with(status);
        sender
    }

    pub fn respond_with(&self, status: u16) {
        self.0.borrow_mut().status = status;
    }

    pub fn fail_next(&self) {
        self.0.borrow_mut().fail_next = true;
    }

    pub fn requests(&self) -> Vec<AlertRequest> {
        self.0.borrow().requests.clone()
    }
}

impl AlertTransport for FakeSender {
    fn post(&mut self, request: &AlertRequest) -> Result<AlertResponse> {
        let mut script = self.0.borrow_mut();
        if std::mem::take(&mut script.fail_next) {
            return Err(anyhow!("connection refused"));
        }
        script.requests.push(request.clone());
        Ok(AlertResponse {
            status: script.status,
            body: "ok".to_string(),
        })
    }
}

#[derive(Default)]
struct StoreState {
    config: DeviceConfig,
    saves: Vec<DeviceConfig>,
}

#[derive(Clone, Default)]
pub struct MemoryStore(Rc<RefCell<StoreState>>);

impl MemoryStore {
    pub fn holding(config: DeviceConfig) -> Self {
        let store = Self::default();
        store.0.borrow_mut().config = config;
        store
    }

    pub fn saves(&self) -> Vec<DeviceConfig> {
        self.0.borrow().saves.clone()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&mut self) -> Result<DeviceConfig> {
        Ok(self.0.borrow().config.clone())
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.config = config.clone();
        state.saves.push(config.clone());
        Ok(())
    }
}

/// Provisioner that idles a few rounds and returns without saving anything.
#[derive(Clone, Default)]
pub struct CountingProvisioner(Rc<Cell<u32>>);

impl CountingProvisioner {
    pub fn starts(&self) -> u32 {
        self.0.get()
    }
}

impl Provisioner for CountingProvisioner {
    fn start_provisioning(&mut self, idle: &mut dyn FnMut()) -> Result<()> {
        self.0.set(self.0.get() + 1);
        for _ in 0..3 {
            idle();
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct CountingRestart(Rc<Cell<u32>>);

impl CountingRestart {
    pub fn restarts(&self) -> u32 {
        self.0.get()
    }
}

impl Restart for CountingRestart {
    fn restart(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Input that reads low during any of its scheduled windows.
#[derive(Clone)]
pub struct ScriptedPin {
    clock: ManualClock,
    low: Rc<RefCell<Vec<Range<u64>>>>,
}

impl ScriptedPin {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            low: Rc::default(),
        }
    }

    pub fn hold(&self, window: Range<u64>) {
        self.low.borrow_mut().push(window);
    }
}

impl InputPin for ScriptedPin {
    fn is_low(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.low.borrow().iter().any(|window| window.contains(&now))
    }
}

#[derive(Clone, Default)]
pub struct RecordingPin(Rc<RefCell<Vec<bool>>>);

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<bool> {
        self.0.borrow().clone()
    }

    pub fn level(&self) -> bool {
        self.0.borrow().last().copied().unwrap_or(false)
    }
}

impl OutputPin for RecordingPin {
    fn set_level(&mut self, high: bool) {
        self.0.borrow_mut().push(high);
    }
}

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Clock = ManualClock;
    type Radio = FakeRadio;
    type Discovery = FakeDiscovery;
    type Sender = FakeSender;
    type Store = MemoryStore;
    type Provisioner = CountingProvisioner;
    type System = CountingRestart;
    type Button = ScriptedPin;
    type BootButton = ScriptedPin;
    type Indicator = RecordingPin;
}

/// Handles onto every part of a test board.
pub struct Parts {
    pub clock: ManualClock,
    pub radio: FakeRadio,
    pub discovery: FakeDiscovery,
    pub sender: FakeSender,
    pub store: MemoryStore,
    pub provisioner: CountingProvisioner,
    pub system: CountingRestart,
    pub button: ScriptedPin,
    pub boot_button: ScriptedPin,
    pub indicator: RecordingPin,
}

impl Parts {
    /// A provisioned device on a reachable network with a live server.
    pub fn new() -> Self {
        let clock = ManualClock::new();
        Self {
            radio: FakeRadio::reachable_after(2),
            discovery: FakeDiscovery::answering("192.168.1.20"),
            sender: FakeSender::responding(200),
            store: MemoryStore::holding(DeviceConfig::new("home", "secret", "kitchen")),
            provisioner: CountingProvisioner::default(),
            system: CountingRestart::default(),
            button: ScriptedPin::new(&clock),
            boot_button: ScriptedPin::new(&clock),
            indicator: RecordingPin::new(),
            clock,
        }
    }

    pub fn board(&self) -> Board<TestPlatform> {
        Board {
            clock: self.clock.clone(),
            radio: self.radio.clone(),
            discovery: self.discovery.clone(),
            sender: self.sender.clone(),
            store: self.store.clone(),
            provisioner: self.provisioner.clone(),
            system: self.system.clone(),
            button: self.button.clone(),
            boot_button: self.boot_button.clone(),
            indicator: self.indicator.clone(),
        }
    }
}
