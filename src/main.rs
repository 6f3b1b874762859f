use std::path::PathBuf;

use alert_button::prelude::*;
use alert_core::{
    device::{Device, Halt},
    hardware::ConfigStore,
};
use anyhow::{bail, Error};
use env_logger::Env;
use log::info;

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Load the config file
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    info!("Starting config from {}...", path.display());
    let config = Config::load(&path)?;

    let console = Console::spawn();

    loop {
        let board = alert_button::board(&config, &console)?;
        match Device::new(board, config.timings).run() {
            Halt::FactoryReset => info!("Rebooting after factory reset"),
            Halt::Provisioning => {
                if !RonStore::new(&config.store_path).load()?.is_provisioned {
                    bail!("Provisioning ended without a saved configuration");
                }
                info!("Rebooting with new configuration");
            }
        }
    }
}
