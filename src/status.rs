//! Acquisition status indicator.
use std::{
    fs,
    io::{self, ErrorKind},
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{debug, trace};

/// Binary output showing that the acquisition loop is alive.
pub trait StatusIndicator: Send {
    fn set(&mut self, on: bool) -> io::Result<()>;

    fn is_on(&self) -> bool;

    fn toggle(&mut self) -> io::Result<()> {
        let on = !self.is_on();
        self.set(on)
    }
}

/// Linux sysfs GPIO output line.
pub struct SysfsGpio {
    value: PathBuf,
    on: bool,
}

impl SysfsGpio {
    const ROOT: &'static str = "/sys/class/gpio";

    /// Exports `pin` and configures it as an output, initially off.
    pub fn new(pin: u32) -> io::Result<Self> {
        let root = PathBuf::from(Self::ROOT);
        let line = root.join(format!("gpio{}", pin));

        if !line.exists() {
            match fs::write(root.join("export"), pin.to_string()) {
                Ok(()) => debug!("gpio{} exported", pin),
                // already exported
                Err(e) if e.kind() == ErrorKind::ResourceBusy => {},
                Err(e) => return Err(e),
            }
        }

        fs::write(line.join("direction"), "out")?;

        let mut gpio = Self {
            value: line.join("value"),
            on: false,
        };
        gpio.set(false)?;
        Ok(gpio)
    }
}

impl StatusIndicator for SysfsGpio {
    fn set(&mut self, on: bool) -> io::Result<()> {
        fs::write(&self.value, if on { "1" } else { "0" })?;
        self.on = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Indicator that only traces its state, when no output line is available.
#[derive(Debug, Default)]
pub struct LogIndicator {
    on: bool,
}

impl StatusIndicator for LogIndicator {
    fn set(&mut self, on: bool) -> io::Result<()> {
        trace!("status: {}", if on { "on" } else { "off" });
        self.on = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Toggles a [StatusIndicator] at most once per period.
pub struct Blinker {
    indicator: Box<dyn StatusIndicator>,
    period: Duration,
    last: Instant,
}

impl Blinker {
    pub fn new(indicator: Box<dyn StatusIndicator>, period: Duration) -> Self {
        Self {
            indicator,
            period,
            last: Instant::now(),
        }
    }

    /// Toggles the indicator if the period elapsed.
    pub fn tick(&mut self) -> io::Result<()> {
        if self.last.elapsed() >= self.period {
            self.last = Instant::now();
            self.indicator.toggle()?;
        }
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.indicator.is_on()
    }

    pub fn switch_off(&mut self) -> io::Result<()> {
        self.indicator.set(false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn toggling() {
        let mut indicator = LogIndicator::default();
        assert!(!indicator.is_on());
        indicator.toggle().unwrap();
        assert!(indicator.is_on());
        indicator.toggle().unwrap();
        assert!(!indicator.is_on());
    }

    #[test]
    fn blinking() {
        let mut blinker = Blinker::new(Box::new(LogIndicator::default()), Duration::ZERO);
        blinker.tick().unwrap();
        assert!(blinker.is_on());
        blinker.tick().unwrap();
        assert!(!blinker.is_on());

        blinker.tick().unwrap();
        blinker.switch_off().unwrap();
        assert!(!blinker.is_on());
    }

    #[test]
    fn period_is_respected() {
        let mut blinker = Blinker::new(
            Box::new(LogIndicator::default()),
            Duration::from_secs(3600),
        );
        blinker.tick().unwrap();
        assert!(!blinker.is_on());
    }
}
