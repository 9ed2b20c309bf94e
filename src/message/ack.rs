use crate::{error::Result, message::Fields};

/// ACK-ACK / ACK-NAK content: the message being (not) acknowledged.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ack {
    pub class: u8,
    pub msg_id: u8,
}

impl Ack {
    pub const ACK_ID: u16 = 0x0105;
    pub const NAK_ID: u16 = 0x0005;

    pub(crate) fn decode(id: u16, payload: &[u8]) -> Result<Self> {
        let name = if id == Self::ACK_ID {
            "ACK-ACK"
        } else {
            "ACK-NAK"
        };

        let mut fields = Fields::new(name, id, payload, 2)?;

        Ok(Self {
            class: fields.u8(),
            msg_id: fields.u8(),
        })
    }

    /// Id of the acknowledged message, in frame id convention.
    pub fn acknowledged_id(&self) -> u16 {
        u16::from_le_bytes([self.class, self.msg_id])
    }
}
