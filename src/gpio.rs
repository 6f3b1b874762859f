use alert_core::hardware::{InputPin, OutputPin};
use anyhow::Error;
use log::info;

#[cfg(feature = "pi")]
use rppal::gpio::Gpio;

#[cfg(not(feature = "pi"))]
use std::time::{Duration, Instant};

#[cfg(not(feature = "pi"))]
use log::debug;

use crate::{config::Pin, console::Console};

#[cfg(feature = "pi")]
pub type HostButton = GpioInput;
#[cfg(feature = "pi")]
pub type HostBootButton = GpioInput;
#[cfg(feature = "pi")]
pub type HostIndicator = GpioOutput;

#[cfg(not(feature = "pi"))]
pub type HostButton = ConsoleButton;
#[cfg(not(feature = "pi"))]
pub type HostBootButton = ReleasedButton;
#[cfg(not(feature = "pi"))]
pub type HostIndicator = LogIndicator;

/// Pulled-up input on a real GPIO pin.
#[cfg(feature = "pi")]
pub struct GpioInput(rppal::gpio::InputPin);

#[cfg(feature = "pi")]
impl GpioInput {
    pub fn init(name: &str, pin: &Pin) -> Result<Self, Error> {
        let pin = pin.gpio();
        info!("{}: initializing on pin {}", name, pin.0);
        Ok(Self(Gpio::new()?.get(pin.0)?.into_input_pullup()))
    }
}

#[cfg(feature = "pi")]
impl InputPin for GpioInput {
    fn is_low(&mut self) -> bool {
        self.0.is_low()
    }
}

#[cfg(feature = "pi")]
pub struct GpioOutput(rppal::gpio::OutputPin);

#[cfg(feature = "pi")]
impl GpioOutput {
    pub fn init(name: &str, pin: &Pin) -> Result<Self, Error> {
        let pin = pin.gpio();
        info!("{}: initializing on pin {}", name, pin.0);
        let mut pin = Gpio::new()?.get(pin.0)?.into_output();
        pin.set_low();
        Ok(Self(pin))
    }
}

#[cfg(feature = "pi")]
impl OutputPin for GpioOutput {
    fn set_level(&mut self, high: bool) {
        match high {
            true => self.0.set_high(),
            false => self.0.set_low(),
        }
    }
}

/// How long a simulated press holds the line low.
#[cfg(not(feature = "pi"))]
const PRESS_MS: u64 = 100;

/// Simulated alert button: every line entered on stdin is one press.
#[cfg(not(feature = "pi"))]
pub struct ConsoleButton {
    console: Console,
    released_at: Option<Instant>,
}

#[cfg(not(feature = "pi"))]
impl ConsoleButton {
    pub fn new(console: &Console) -> Self {
        info!("Alert button: simulated, press Enter to toggle the alert");
        Self {
            console: console.clone(),
            released_at: None,
        }
    }
}

#[cfg(not(feature = "pi"))]
impl InputPin for ConsoleButton {
    fn is_low(&mut self) -> bool {
        if let Some(release) = self.released_at {
            if Instant::now() < release {
                return true;
            }
            self.released_at = None;
            return false;
        }

        if self.console.try_line().is_some() {
            self.released_at = Some(Instant::now() + Duration::from_millis(PRESS_MS));
            return true;
        }
        false
    }
}

/// Simulated boot pin that is never held.
#[cfg(not(feature = "pi"))]
pub struct ReleasedButton;

#[cfg(not(feature = "pi"))]
impl InputPin for ReleasedButton {
    fn is_low(&mut self) -> bool {
        false
    }
}

/// Simulated indicator that logs level changes.
#[cfg(not(feature = "pi"))]
pub struct LogIndicator {
    level: Option<bool>,
}

#[cfg(not(feature = "pi"))]
impl OutputPin for LogIndicator {
    fn set_level(&mut self, high: bool) {
        if self.level != Some(high) {
            debug!("Indicator {}", if high { "ON" } else { "off" });
        }
        self.level = Some(high);
    }
}

pub fn button(pin: &Pin, console: &Console) -> Result<HostButton, Error> {
    #[cfg(feature = "pi")]
    {
        let _ = console;
        GpioInput::init("Alert button", pin)
    }

    #[cfg(not(feature = "pi"))]
    {
        let _ = pin;
        Ok(ConsoleButton::new(console))
    }
}

pub fn boot_button(pin: &Pin) -> Result<HostBootButton, Error> {
    #[cfg(feature = "pi")]
    {
        GpioInput::init("Boot button", pin)
    }

    #[cfg(not(feature = "pi"))]
    {
        info!("Boot button: simulated on pin {}, never held", pin.gpio().0);
        Ok(ReleasedButton)
    }
}

pub fn indicator(pin: &Pin) -> Result<HostIndicator, Error> {
    #[cfg(feature = "pi")]
    {
        GpioOutput::init("Indicator", pin)
    }

    #[cfg(not(feature = "pi"))]
    {
        info!("Indicator: simulated on pin {}", pin.gpio().0);
        Ok(LogIndicator { level: None })
    }
}
