use hifitime::prelude::{Duration, Epoch, TimeScale};

use crate::{error::Result, message::Fields};

/// UTC standard the receiver steers to (high nibble of `valid`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UtcStandard {
    NotAvailable,
    Crl,
    Nist,
    Usno,
    Bipm,
    European,
    FormerSovietUnion,
    Ntsc,
    Npli,
    Unknown,
}

impl From<u8> for UtcStandard {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NotAvailable,
            1 => Self::Crl,
            2 => Self::Nist,
            3 => Self::Usno,
            4 => Self::Bipm,
            5 => Self::European,
            6 => Self::FormerSovietUnion,
            7 => Self::Ntsc,
            8 => Self::Npli,
            _ => Self::Unknown,
        }
    }
}

/// NAV-TIMEUTC
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NavTimeUtc {
    /// GPS time of week (ms)
    pub itow: u32,
    /// Time accuracy estimate (ns)
    pub t_acc: u32,
    /// Fraction of second, may be negative (ns)
    pub nano: i32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub valid: u8,
}

impl NavTimeUtc {
    pub const ID: u16 = 0x2101;
    pub const NAME: &'static str = "NAV-TIMEUTC";
    const LEN: usize = 20;

    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(Self::NAME, Self::ID, payload, Self::LEN)?;
        Ok(Self {
            itow: fields.u32(),
            t_acc: fields.u32(),
            nano: fields.i32(),
            year: fields.u16(),
            month: fields.u8(),
            day: fields.u8(),
            hour: fields.u8(),
            min: fields.u8(),
            sec: fields.u8(),
            valid: fields.u8(),
        })
    }

    pub fn valid_tow(&self) -> bool {
        self.valid & 0x01 > 0
    }

    pub fn valid_week(&self) -> bool {
        self.valid & 0x02 > 0
    }

    pub fn valid_utc(&self) -> bool {
        self.valid & 0x04 > 0
    }

    pub fn utc_standard(&self) -> UtcStandard {
        UtcStandard::from(self.valid >> 4)
    }

    /// Calendar timestamp, expressed in [TimeScale::UTC].
    /// A leap second (sec = 60) is folded into the preceding second.
    pub fn epoch(&self) -> Result<Epoch> {
        let t = Epoch::maybe_from_gregorian(
            self.year as i32,
            self.month,
            self.day,
            self.hour,
            self.min,
            self.sec.min(59),
            0,
            TimeScale::UTC,
        )?;
        Ok(t + Duration::from_total_nanoseconds(self.nano as i128))
    }
}
