use std::{
    io::{self, Write},
    time::Duration,
};

use alert_core::{
    config::DeviceConfig,
    hardware::{ConfigStore, Provisioner},
};
use anyhow::{Context, Result};
use log::{info, warn};

use crate::{console::Console, store::RonStore};

/// How often the indicator is serviced while waiting for input.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// First-time setup over the terminal.
pub struct TerminalProvisioner {
    console: Console,
    store: RonStore,
}

impl TerminalProvisioner {
    pub fn new(console: &Console, store: RonStore) -> Self {
        Self {
            console: console.clone(),
            store,
        }
    }

    fn prompt(&self, label: &str, idle: &mut dyn FnMut()) -> Result<String> {
        print!("{}: ", label);
        io::stdout().flush()?;

        loop {
            if let Some(line) = self.console.read_line(IDLE_POLL)? {
                return Ok(line.trim().to_string());
            }
            idle();
        }
    }
}

impl Provisioner for TerminalProvisioner {
    fn start_provisioning(&mut self, idle: &mut dyn FnMut()) -> Result<()> {
        info!("Starting terminal setup");
        println!("=== EMERGENCY ALERT SETUP ===");

        loop {
            let network_name = self.prompt("WiFi network", idle)?;
            let network_secret = self.prompt("WiFi password", idle)?;
            let device_label = self.prompt("Device name", idle)?;

            let config = DeviceConfig::new(&network_name, &network_secret, &device_label);
            if let Err(reason) = config.validate() {
                warn!("Rejected setup: {}", reason);
                println!("Invalid settings: {}. Please try again.", reason);
                continue;
            }

            self.store
                .save(&config)
                .context("Failed to save configuration")?;
            info!("Configuration saved for device '{}'", config.device_label);
            println!("Configuration saved! Restarting...");
            return Ok(());
        }
    }
}
