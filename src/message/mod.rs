//! Typed UBX messages and the id keyed decoder registry.
mod ack;
mod cfg;
mod inf;
mod nav_hpposllh;
mod nav_time_utc;
mod rxm_rawx;

pub use ack::Ack;
pub use cfg::{
    CONFIG_KEYS, ConfigValuesGet, ConfigValuesReceived, ConfigValuesSet, Layer, ValueType,
    config_key, config_name,
};
pub(crate) use cfg::parse_int;
pub use inf::InfoLevel;
pub use nav_hpposllh::NavHpPosLlh;
pub use nav_time_utc::{NavTimeUtc, UtcStandard};
pub use rxm_rawx::{RxmRawx, SatelliteMeasurement};

use crate::{
    error::{Error, Result},
    frame::encode_frame,
};

/// Every message the acquisition loop knows about.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    TimeUTC(NavTimeUtc),
    HighPrecisionPosition(NavHpPosLlh),
    RawMeasurement(RxmRawx),
    AckAck(Ack),
    AckNak(Ack),
    ConfigValuesReceived(ConfigValuesReceived),
    InfoDebug(String),
    InfoError(String),
    InfoNotice(String),
    InfoTest(String),
    InfoWarning(String),
    /// Unregistered id, payload kept as is
    Unknown { id: u16, payload: Vec<u8> },
}

/// Registry entry
struct Decoder {
    id: u16,
    name: &'static str,
    decode: fn(&[u8]) -> Result<Message>,
}

const REGISTRY: &[Decoder] = &[
    Decoder {
        id: Ack::ACK_ID,
        name: "ACK-ACK",
        decode: |payload| Ok(Message::AckAck(Ack::decode(Ack::ACK_ID, payload)?)),
    },
    Decoder {
        id: Ack::NAK_ID,
        name: "ACK-NAK",
        decode: |payload| Ok(Message::AckNak(Ack::decode(Ack::NAK_ID, payload)?)),
    },
    Decoder {
        id: InfoLevel::Error.id(),
        name: "INF-ERROR",
        decode: |payload| Ok(Message::InfoError(inf::decode_text(payload))),
    },
    Decoder {
        id: InfoLevel::Warning.id(),
        name: "INF-WARNING",
        decode: |payload| Ok(Message::InfoWarning(inf::decode_text(payload))),
    },
    Decoder {
        id: InfoLevel::Notice.id(),
        name: "INF-NOTICE",
        decode: |payload| Ok(Message::InfoNotice(inf::decode_text(payload))),
    },
    Decoder {
        id: InfoLevel::Test.id(),
        name: "INF-TEST",
        decode: |payload| Ok(Message::InfoTest(inf::decode_text(payload))),
    },
    Decoder {
        id: InfoLevel::Debug.id(),
        name: "INF-DEBUG",
        decode: |payload| Ok(Message::InfoDebug(inf::decode_text(payload))),
    },
    Decoder {
        id: NavTimeUtc::ID,
        name: NavTimeUtc::NAME,
        decode: |payload| Ok(Message::TimeUTC(NavTimeUtc::decode(payload)?)),
    },
    Decoder {
        id: NavHpPosLlh::ID,
        name: NavHpPosLlh::NAME,
        decode: |payload| Ok(Message::HighPrecisionPosition(NavHpPosLlh::decode(payload)?)),
    },
    Decoder {
        id: RxmRawx::ID,
        name: RxmRawx::NAME,
        decode: |payload| Ok(Message::RawMeasurement(RxmRawx::decode(payload)?)),
    },
    Decoder {
        id: ConfigValuesReceived::ID,
        name: ConfigValuesReceived::NAME,
        decode: |payload| {
            Ok(Message::ConfigValuesReceived(ConfigValuesReceived::decode(
                payload,
            )?))
        },
    },
];

/// Decodes `payload` through the layout registered for `id`.
/// Unregistered ids produce [Message::Unknown].
pub fn decode(id: u16, payload: &[u8]) -> Result<Message> {
    match REGISTRY.iter().find(|decoder| decoder.id == id) {
        Some(decoder) => (decoder.decode)(payload),
        None => Ok(Message::Unknown {
            id,
            payload: payload.to_vec(),
        }),
    }
}

/// Registered name of `id`, if any.
pub fn name_of(id: u16) -> Option<&'static str> {
    REGISTRY
        .iter()
        .find(|decoder| decoder.id == id)
        .map(|decoder| decoder.name)
}

impl Message {
    pub fn id(&self) -> u16 {
        match self {
            Self::TimeUTC(_) => NavTimeUtc::ID,
            Self::HighPrecisionPosition(_) => NavHpPosLlh::ID,
            Self::RawMeasurement(_) => RxmRawx::ID,
            Self::AckAck(_) => Ack::ACK_ID,
            Self::AckNak(_) => Ack::NAK_ID,
            Self::ConfigValuesReceived(_) => ConfigValuesReceived::ID,
            Self::InfoDebug(_) => InfoLevel::Debug.id(),
            Self::InfoError(_) => InfoLevel::Error.id(),
            Self::InfoNotice(_) => InfoLevel::Notice.id(),
            Self::InfoTest(_) => InfoLevel::Test.id(),
            Self::InfoWarning(_) => InfoLevel::Warning.id(),
            Self::Unknown { id, .. } => *id,
        }
    }

    /// Text and level of INF messages.
    pub fn info(&self) -> Option<(InfoLevel, &str)> {
        match self {
            Self::InfoDebug(text) => Some((InfoLevel::Debug, text)),
            Self::InfoError(text) => Some((InfoLevel::Error, text)),
            Self::InfoNotice(text) => Some((InfoLevel::Notice, text)),
            Self::InfoTest(text) => Some((InfoLevel::Test, text)),
            Self::InfoWarning(text) => Some((InfoLevel::Warning, text)),
            _ => None,
        }
    }
}

/// Messages we send to the receiver.
pub trait Outbound {
    const ID: u16;

    fn payload(&self) -> &[u8];

    fn to_frame(&self) -> Result<Vec<u8>> {
        encode_frame(Self::ID, self.payload())
    }
}

/// Little endian field reader over a payload whose length was validated.
pub(crate) struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    /// Returns [Error::Malformed] when `buf` is shorter than `expected`.
    pub fn new(name: &'static str, id: u16, buf: &'a [u8], expected: usize) -> Result<Self> {
        if buf.len() < expected {
            return Err(Error::Malformed {
                name,
                id,
                expected,
                actual: buf.len(),
            });
        }
        Ok(Self { buf, pos: 0 })
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        bytes
    }

    pub fn skip(&mut self, size: usize) {
        self.pos += size;
    }

    pub fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn i8(&mut self) -> i8 {
        i8::from_le_bytes(self.take())
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }

    pub fn f64(&mut self) -> f64 {
        f64::from_le_bytes(self.take())
    }

    /// Remaining bytes
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unregistered_id() {
        let message = decode(0x0d01, &[1, 2, 3]).unwrap();
        assert_eq!(
            message,
            Message::Unknown {
                id: 0x0d01,
                payload: vec![1, 2, 3]
            }
        );
        assert_eq!(message.id(), 0x0d01);
        assert!(name_of(0x0d01).is_none());
    }

    #[test]
    fn registered_ids() {
        for (id, name) in [
            (0x0105, "ACK-ACK"),
            (0x0005, "ACK-NAK"),
            (0x0004, "INF-ERROR"),
            (0x0104, "INF-WARNING"),
            (0x0204, "INF-NOTICE"),
            (0x0304, "INF-TEST"),
            (0x0404, "INF-DEBUG"),
            (0x2101, "NAV-TIMEUTC"),
            (0x1401, "NAV-HPPOSLLH"),
            (0x1502, "RXM-RAWX"),
            (0x8b06, "CFG-VALGET"),
        ] {
            assert_eq!(name_of(id), Some(name), "0x{:04X}", id);
        }
    }

    #[test]
    fn ack_dispatch() {
        assert_eq!(
            decode(0x0105, &[0x06, 0x8a]).unwrap(),
            Message::AckAck(Ack {
                class: 0x06,
                msg_id: 0x8a
            })
        );

        let nak = decode(0x0005, &[0x06, 0x8a]).unwrap();
        assert_eq!(nak.id(), 0x0005);
        match nak {
            Message::AckNak(ack) => assert_eq!(ack.acknowledged_id(), 0x8a06),
            other => panic!("decoded {:?}", other),
        }
    }

    #[test]
    fn info_dispatch() {
        let message = decode(0x0104, b"antenna open\0").unwrap();
        assert_eq!(message, Message::InfoWarning("antenna open".to_string()));
        assert_eq!(message.info(), Some((InfoLevel::Warning, "antenna open")));
    }

    #[test]
    fn short_payloads_are_malformed() {
        for id in [0x0105, 0x2101, 0x1401, 0x1502, 0x8b06] {
            match decode(id, &[0x00]) {
                Err(Error::Malformed { id: failed, actual, .. }) => {
                    assert_eq!(failed, id);
                    assert_eq!(actual, 1);
                },
                other => panic!("0x{:04X} decoded {:?}", id, other),
            }
        }
    }
}
