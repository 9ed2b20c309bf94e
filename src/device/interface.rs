use std::io::{self, Read, Write};

use serialport::SerialPort;

/// [Interface] to the U-Blox stream
pub enum Interface {
    /// [Interface::ReadOnly] is dedicated to read only input, mainly File inputs.
    ReadOnly(Box<dyn Read + Send>),

    /// [Interface::Port] is used to connect to a physical port,
    /// and activately operate a U-Blox GNSS.
    Port(Box<dyn SerialPort>),
}

impl Interface {
    /// Creates a new [SerialPort] interface
    pub fn from_serial_port(port: Box<dyn SerialPort>) -> Self {
        Self::Port(port)
    }

    /// Creates a new Read-Only interface from any reader
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::ReadOnly(Box::new(reader))
    }

    /// Appends `reader` to a Read-Only interface: it is consumed once
    /// the current content is exhausted.
    pub fn stack<R: Read + Send + 'static>(&mut self, reader: R) {
        if let Self::ReadOnly(current) = self {
            let previous = std::mem::replace(current, Box::new(io::empty()));
            *current = Box::new(previous.chain(reader));
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly(_))
    }

    /// Updates the port baud rate. No effect on Read-Only interfaces.
    pub fn set_baud_rate(&mut self, baud: u32) -> serialport::Result<()> {
        match self {
            Self::ReadOnly(_) => Ok(()),
            Self::Port(port) => port.set_baud_rate(baud),
        }
    }
}

impl Read for Interface {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::ReadOnly(r) => r.read(buf),
            Self::Port(port) => port.read(buf),
        }
    }
}

impl Write for Interface {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::ReadOnly(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "read-only interface",
            )),
            Self::Port(port) => port.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::ReadOnly(_) => Ok(()),
            Self::Port(port) => port.flush(),
        }
    }
}
