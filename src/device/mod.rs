use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Write},
    time::{Duration, Instant},
};

use log::{debug, trace};

mod interface;

pub use interface::Interface;

use crate::{
    error::{Error, Result},
    frame::FrameReader,
    message::{self, Message, Outbound},
};

/// Serial port read timeout
const PORT_TIMEOUT: Duration = Duration::from_millis(250);

/// Frames we tolerate while waiting for an acknowledgment
const MAX_FRAMES_BEFORE_ACK: usize = 500;

/// Time we wait for an acknowledgment
const ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Waits for the receiver to acknowledge message `id`, for at most
/// `max_frames` frames and `max_wait`.
fn wait_for_ack<R: Read>(
    reader: &mut FrameReader<R>,
    id: u16,
    max_frames: usize,
    max_wait: Duration,
) -> Result<()> {
    let deadline = Instant::now() + max_wait;

    for _ in 0..max_frames {
        let frame = match reader.read_frame_until(deadline) {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(Error::Io(e)) if e.kind() == ErrorKind::TimedOut => {
                debug!("0x{:04X}: no acknowledgment within {:?}", id, max_wait);
                break;
            },
            Err(e) => return Err(e),
        };

        match message::decode(frame.id, &frame.payload) {
            Ok(Message::AckAck(ack)) if ack.acknowledged_id() == id => {
                debug!("0x{:04X} acknowledged", id);
                return Ok(());
            },
            Ok(Message::AckNak(ack)) if ack.acknowledged_id() == id => {
                return Err(Error::Nak(id));
            },
            Ok(message) => {
                trace!(
                    "{} (0x{:04X}) while waiting for acknowledgment",
                    message::name_of(message.id()).unwrap_or("unknown message"),
                    message.id()
                );
            },
            Err(e) => {
                trace!("{} while waiting for acknowledgment", e);
            },
        }
    }

    Err(Error::NoAck(id))
}

/// U-Blox receiver (or capture replay)
pub struct Device {
    reader: FrameReader<BufReader<Interface>>,
}

impl Device {
    pub fn from_interface(interface: Interface) -> Self {
        Self {
            reader: FrameReader::new(BufReader::new(interface)),
        }
    }

    /// Replays one or more capture files, one after the other.
    /// Files ending in `.gz` are decompressed on the fly.
    pub fn open_files(paths: &[String]) -> Result<Self> {
        let mut interface = Interface::from_reader(std::io::empty());

        for path in paths {
            let handle = File::open(path)?;
            debug!("replaying {}", path);

            if path.ends_with(".gz") {
                interface.stack(flate2::read::GzDecoder::new(handle));
            } else {
                interface.stack(handle);
            }
        }

        Ok(Self::from_interface(interface))
    }

    pub fn open_serial_port(port: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(port, baud).timeout(PORT_TIMEOUT).open()?;
        Ok(Self::from_interface(Interface::from_serial_port(port)))
    }

    pub fn is_read_only(&self) -> bool {
        self.reader.get_ref().get_ref().is_read_only()
    }

    /// Number of frames rejected by the checksum verification.
    pub fn rejected_frames(&self) -> usize {
        self.reader.rejected()
    }

    pub fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        let interface = self.reader.get_mut().get_mut();
        interface.write_all(data)?;
        interface.flush()
    }

    /// Sends `packet` and waits for its acknowledgment.
    pub fn configure<T: Outbound>(&mut self, packet: &T) -> Result<()> {
        self.write_all(&packet.to_frame()?)?;
        wait_for_ack(&mut self.reader, T::ID, MAX_FRAMES_BEFORE_ACK, ACK_TIMEOUT)
    }

    pub fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.reader.get_mut().get_mut().set_baud_rate(baud)?;
        debug!("baud rate set to {}", baud);
        Ok(())
    }

    /// Next message.
    ///
    /// ## Returns
    /// - Ok(Some(message)) for each valid frame
    /// - Ok(None) once a replay is exhausted
    /// - Err(Error::Malformed) when a known message is truncated,
    ///   the device remains usable
    /// - Err(e) on I/O error
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        match self.reader.read_frame()? {
            Some(frame) => message::decode(frame.id, &frame.payload).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Cursor;

    use crate::frame::encode_frame;

    const WAIT: Duration = Duration::from_secs(5);

    /// Port that never delivers anything.
    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(ErrorKind::TimedOut.into())
        }
    }

    #[test]
    fn acknowledgment() {
        let mut stream = encode_frame(0x0404, b"booting").unwrap();
        // acknowledges another message
        stream.extend(encode_frame(0x0105, &[0x06, 0x8b]).unwrap());
        stream.extend(encode_frame(0x0105, &[0x06, 0x8a]).unwrap());

        let mut reader = FrameReader::new(stream.as_slice());
        wait_for_ack(&mut reader, 0x8a06, 10, WAIT).unwrap();
    }

    #[test]
    fn rejection() {
        let stream = encode_frame(0x0005, &[0x06, 0x8a]).unwrap();
        let mut reader = FrameReader::new(stream.as_slice());
        assert!(matches!(
            wait_for_ack(&mut reader, 0x8a06, 10, WAIT),
            Err(Error::Nak(0x8a06))
        ));
    }

    #[test]
    fn no_acknowledgment() {
        let mut stream = Vec::new();
        for _ in 0..4 {
            stream.extend(encode_frame(0x0404, b"busy").unwrap());
        }
        stream.extend(encode_frame(0x0105, &[0x06, 0x8a]).unwrap());

        let mut reader = FrameReader::new(stream.as_slice());
        assert!(matches!(
            wait_for_ack(&mut reader, 0x8a06, 3, WAIT),
            Err(Error::NoAck(0x8a06))
        ));

        // end of stream
        let mut reader = FrameReader::new(&[][..]);
        assert!(matches!(
            wait_for_ack(&mut reader, 0x8a06, 3, WAIT),
            Err(Error::NoAck(_))
        ));
    }

    #[test]
    fn silent_receiver() {
        let mut reader = FrameReader::new(Silent);
        let start = Instant::now();

        assert!(matches!(
            wait_for_ack(&mut reader, 0x8a06, 500, Duration::from_millis(100)),
            Err(Error::NoAck(0x8a06))
        ));
        assert!(start.elapsed() < WAIT);
    }

    #[test]
    fn receiver_streaming_nmea_only() {
        let mut reader = FrameReader::new(std::io::repeat(b'$'));
        assert!(matches!(
            wait_for_ack(&mut reader, 0x8a06, 500, Duration::from_millis(100)),
            Err(Error::NoAck(0x8a06))
        ));
    }

    #[test]
    fn replay() {
        let mut stream = encode_frame(0x0204, b"hello").unwrap();
        stream.extend(encode_frame(0x1401, &[0x00; 10]).unwrap());
        stream.extend(encode_frame(0x0d01, &[0x01]).unwrap());

        let mut device = Device::from_interface(Interface::from_reader(Cursor::new(stream)));
        assert!(device.is_read_only());

        assert_eq!(
            device.next_message().unwrap(),
            Some(Message::InfoNotice("hello".to_string()))
        );
        assert!(matches!(
            device.next_message(),
            Err(Error::Malformed { id: 0x1401, .. })
        ));
        assert_eq!(
            device.next_message().unwrap(),
            Some(Message::Unknown {
                id: 0x0d01,
                payload: vec![0x01]
            })
        );
        assert!(device.next_message().unwrap().is_none());
        assert_eq!(device.rejected_frames(), 0);
    }

    #[test]
    fn replay_files() {
        let dir = tempfile::TempDir::new().unwrap();

        let first = dir.path().join("first.ubx");
        std::fs::write(&first, encode_frame(0x0204, b"first").unwrap()).unwrap();

        let second = dir.path().join("second.ubx");
        std::fs::write(&second, encode_frame(0x0204, b"second").unwrap()).unwrap();

        let mut device = Device::open_files(&[
            first.to_string_lossy().to_string(),
            second.to_string_lossy().to_string(),
        ])
        .unwrap();

        assert_eq!(
            device.next_message().unwrap(),
            Some(Message::InfoNotice("first".to_string()))
        );
        assert_eq!(
            device.next_message().unwrap(),
            Some(Message::InfoNotice("second".to_string()))
        );
        assert!(device.next_message().unwrap().is_none());
        assert!(device.write_all(&[0x00]).is_err());
    }
}
