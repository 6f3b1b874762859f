use std::time::Instant;

use alert_core::hardware::{Clock, InputPin, OutputPin, Restart};
use anyhow::Result;
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver, Pull},
};

/// Milliseconds since boot, sleeping through FreeRTOS so other tasks run.
pub struct EspClock {
    start: Instant,
}

impl EspClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        FreeRtos::delay_ms(ms.min(u32::MAX as u64) as u32);
    }
}

/// Push button to ground on a pulled-up GPIO.
pub struct Button(PinDriver<'static, AnyIOPin, Input>);

impl Button {
    pub fn new(pin: AnyIOPin) -> Result<Self> {
        let mut driver = PinDriver::input(pin)?;
        driver.set_pull(Pull::Up)?;
        Ok(Self(driver))
    }
}

impl InputPin for Button {
    fn is_low(&mut self) -> bool {
        self.0.is_low()
    }
}

/// Status LED, active high.
pub struct Led(PinDriver<'static, AnyOutputPin, Output>);

impl Led {
    pub fn new(pin: AnyOutputPin) -> Result<Self> {
        let mut driver = PinDriver::output(pin)?;
        driver.set_low()?;
        Ok(Self(driver))
    }
}

impl OutputPin for Led {
    fn set_level(&mut self, high: bool) {
        let _ = if high {
            self.0.set_high()
        } else {
            self.0.set_low()
        };
    }
}

pub struct EspSystem;

impl Restart for EspSystem {
    fn restart(&mut self) {
        info!("Restarting");
        unsafe { esp_idf_svc::sys::esp_restart() };
    }
}
