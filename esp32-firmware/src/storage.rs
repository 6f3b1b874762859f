use alert_core::{config::DeviceConfig, hardware::ConfigStore};
use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};

const NVS_NAMESPACE: &str = "alert";
const NVS_CONFIG_KEY: &str = "config_json";

/// [`DeviceConfig`] as JSON in NVS. Every write is committed before
/// returning.
#[derive(Clone)]
pub struct NvsStore {
    partition: EspDefaultNvsPartition,
}

impl NvsStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }
}

impl ConfigStore for NvsStore {
    fn load(&mut self) -> Result<DeviceConfig> {
        let nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let mut buffer = vec![0_u8; 512];

        match nvs.get_str(NVS_CONFIG_KEY, &mut buffer)? {
            Some(value) => Ok(serde_json::from_str::<DeviceConfig>(value)?),
            None => Ok(DeviceConfig::default()),
        }
    }

    fn save(&mut self, config: &DeviceConfig) -> Result<()> {
        let mut nvs = EspNvs::new(self.partition.clone(), NVS_NAMESPACE, true)?;
        let payload = serde_json::to_string(config)?;
        nvs.set_str(NVS_CONFIG_KEY, &payload)?;
        Ok(())
    }
}
