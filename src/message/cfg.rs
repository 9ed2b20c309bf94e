use std::str::FromStr;

use crate::{
    error::{Error, Result},
    message::{Fields, Outbound},
};

/// Storage type of a configuration item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValueType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ValueType {
    /// Builds from its struct style type code (`B b H h L l f d`).
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'B' => Some(Self::U8),
            'b' => Some(Self::I8),
            'H' => Some(Self::U16),
            'h' => Some(Self::I16),
            'L' => Some(Self::U32),
            'l' => Some(Self::I32),
            'f' => Some(Self::F32),
            'd' => Some(Self::F64),
            _ => None,
        }
    }

    /// Appends `value` to `buf`, little endian.
    /// Returns None when `value` does not parse for this type.
    fn pack(&self, value: &str, buf: &mut Vec<u8>) -> Option<()> {
        match self {
            Self::U8 => buf.extend(u8::try_from(parse_int(value)?).ok()?.to_le_bytes()),
            Self::I8 => buf.extend(i8::try_from(parse_int(value)?).ok()?.to_le_bytes()),
            Self::U16 => buf.extend(u16::try_from(parse_int(value)?).ok()?.to_le_bytes()),
            Self::I16 => buf.extend(i16::try_from(parse_int(value)?).ok()?.to_le_bytes()),
            Self::U32 => buf.extend(u32::try_from(parse_int(value)?).ok()?.to_le_bytes()),
            Self::I32 => buf.extend(i32::try_from(parse_int(value)?).ok()?.to_le_bytes()),
            Self::F32 => buf.extend(value.trim().parse::<f32>().ok()?.to_le_bytes()),
            Self::F64 => buf.extend(value.trim().parse::<f64>().ok()?.to_le_bytes()),
        }
        Some(())
    }
}

/// Integer with optional sign and `0x`/`0o`/`0b` radix prefix.
pub(crate) fn parse_int(value: &str) -> Option<i64> {
    let value = value.trim();

    let (negative, digits) = match value.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };

    let prefix = digits.get(..2).map(|prefix| prefix.to_ascii_lowercase());

    let (radix, digits) = match prefix.as_deref() {
        Some("0x") => (16, &digits[2..]),
        Some("0o") => (8, &digits[2..]),
        Some("0b") => (2, &digits[2..]),
        _ => (10, digits),
    };

    let magnitude = i64::from_str_radix(&digits.replace('_', ""), radix).ok()?;

    Some(if negative { -magnitude } else { magnitude })
}

/// Known configuration items: name, key, storage type.
pub const CONFIG_KEYS: &[(&str, u32, ValueType)] = &[
    ("CFG-INFMSG-UBX_USB", 0x20920004, ValueType::U8),
    ("CFG-INFMSG-UBX_UART1", 0x20920002, ValueType::U8),
    ("CFG-MSGOUT-UBX_NAV_HPPOSLLH_USB", 0x20910036, ValueType::U8),
    ("CFG-MSGOUT-UBX_NAV_HPPOSLLH_UART1", 0x20910034, ValueType::U8),
    ("CFG-MSGOUT-UBX_NAV_TIMEUTC_UART1", 0x2091005c, ValueType::U8),
    ("CFG-MSGOUT-UBX_NAV_TIMEUTC_USB", 0x2091005e, ValueType::U8),
    ("CFG-MSGOUT-UBX_RXM_RAWX_UART1", 0x209102a5, ValueType::U8),
    ("CFG-MSGOUT-UBX_RXM_RAWX_USB", 0x209102a7, ValueType::U8),
    ("CFG-RATE-MEAS", 0x30210001, ValueType::U16),
    ("CFG-SIGNAL-BDS_B2_ENA", 0x1031000e, ValueType::U8),
    ("CFG-UART1-BAUDRATE", 0x40520001, ValueType::U32),
    ("CFG-UART1INPROT-NMEA", 0x10730002, ValueType::U8),
    ("CFG-UART1INPROT-RTCM3X", 0x10730004, ValueType::U8),
    ("CFG-UART2-ENABLED", 0x10530005, ValueType::U8),
    ("CFG-USBINPROT-NMEA", 0x10770002, ValueType::U8),
    ("CFG-USBINPROT-RTCM3X", 0x10770004, ValueType::U8),
    ("CFG-USBOUTPROT-NMEA", 0x10780002, ValueType::U8),
    ("CFG-USBOUTPROT-RTCM3X", 0x10780004, ValueType::U8),
    ("CFG-USB-ENABLED", 0x10650001, ValueType::U8),
    ("CFG-UART1-ENABLED", 0x10520005, ValueType::U8),
    ("CFG-TXREADY-ENABLED", 0x10a20001, ValueType::U8),
];

/// Case insensitive lookup in [CONFIG_KEYS].
pub fn config_key(name: &str) -> Result<(u32, ValueType)> {
    CONFIG_KEYS
        .iter()
        .find(|(known, _, _)| known.eq_ignore_ascii_case(name.trim()))
        .map(|(_, key, value_type)| (*key, *value_type))
        .ok_or_else(|| Error::UnknownConfigName(name.to_string()))
}

/// Name of a configuration `key`, if known.
pub fn config_name(key: u32) -> Option<&'static str> {
    CONFIG_KEYS
        .iter()
        .find(|(_, known, _)| *known == key)
        .map(|(name, _, _)| *name)
}

/// Configuration storage layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Layer {
    Ram,
    Bbr,
    Flash,
    Default,
}

impl Layer {
    fn value(&self) -> u8 {
        match self {
            Self::Ram => 0,
            Self::Bbr => 1,
            Self::Flash => 2,
            Self::Default => 7,
        }
    }
}

impl FromStr for Layer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ram" => Ok(Self::Ram),
            "bbr" => Ok(Self::Bbr),
            "flash" => Ok(Self::Flash),
            "default" => Ok(Self::Default),
            _ => Err(Error::InvalidLayer(s.to_string())),
        }
    }
}

/// CFG-VALSET, applied to the RAM layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValuesSet {
    payload: Vec<u8>,
    count: usize,
}

impl ConfigValuesSet {
    /// Resolves and packs every (name, value) pair.
    pub fn new<'a, I: IntoIterator<Item = (&'a str, &'a str)>>(items: I) -> Result<Self> {
        // version 0, RAM layer
        let mut payload = vec![0x00, 0x01, 0x00, 0x00];
        let mut count = 0;

        for (name, value) in items {
            let (key, value_type) = config_key(name)?;
            payload.extend(key.to_le_bytes());
            value_type
                .pack(value, &mut payload)
                .ok_or_else(|| Error::InvalidConfigValue {
                    name: name.to_string(),
                    value: value.to_string(),
                })?;
            count += 1;
        }

        Ok(Self { payload, count })
    }

    /// Number of configuration items.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Outbound for ConfigValuesSet {
    const ID: u16 = 0x8a06;

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// CFG-VALGET poll request.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValuesGet {
    payload: Vec<u8>,
}

impl ConfigValuesGet {
    pub fn new<'a, I: IntoIterator<Item = &'a str>>(names: I, layer: &str) -> Result<Self> {
        let layer = layer.parse::<Layer>()?;

        // version 0, position 0
        let mut payload = vec![0x00, layer.value(), 0x00, 0x00];

        for name in names {
            let (key, _) = config_key(name)?;
            payload.extend(key.to_le_bytes());
        }

        Ok(Self { payload })
    }
}

impl Outbound for ConfigValuesGet {
    const ID: u16 = 0x8b06;

    fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Size in bytes of the value stored under `key` (bits 28..30).
fn value_size(key: u32) -> Option<usize> {
    match (key >> 28) & 0x07 {
        // one bit, stored in a byte
        0x01 => Some(1),
        0x02 => Some(1),
        0x03 => Some(2),
        0x04 => Some(4),
        0x05 => Some(8),
        _ => None,
    }
}

/// CFG-VALGET response.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValuesReceived {
    pub version: u8,
    pub layer: u8,
    pub position: u16,
    /// Raw key/value pairs
    pub data: Vec<u8>,
}

impl ConfigValuesReceived {
    pub const ID: u16 = 0x8b06;
    pub const NAME: &'static str = "CFG-VALGET";
    const HEADER_LEN: usize = 4;

    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(Self::NAME, Self::ID, payload, Self::HEADER_LEN)?;
        Ok(Self {
            version: fields.u8(),
            layer: fields.u8(),
            position: fields.u16(),
            data: fields.rest().to_vec(),
        })
    }

    /// Iterates (key, value bytes) pairs. Stops at the first key
    /// with an unknown size or a truncated value.
    pub fn entries(&self) -> Vec<(u32, &[u8])> {
        let mut entries = Vec::new();
        let mut data = self.data.as_slice();

        while data.len() >= 4 {
            let key = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);

            let Some(size) = value_size(key) else {
                break;
            };

            if data.len() < 4 + size {
                break;
            }

            entries.push((key, &data[4..4 + size]));
            data = &data[4 + size..];
        }

        entries
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integers() {
        assert_eq!(parse_int("1000"), Some(1000));
        assert_eq!(parse_int(" 0x9600 "), Some(38_400));
        assert_eq!(parse_int("0X10"), Some(16));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("-12"), Some(-12));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("ten"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn key_lookup() {
        assert_eq!(
            config_key("cfg-uart1-baudrate").unwrap(),
            (0x40520001, ValueType::U32)
        );
        assert_eq!(config_name(0x30210001), Some("CFG-RATE-MEAS"));
        assert!(matches!(
            config_key("CFG-NAVSPG-DYNMODEL"),
            Err(Error::UnknownConfigName(name)) if name == "CFG-NAVSPG-DYNMODEL"
        ));
    }

    #[test]
    fn type_codes() {
        assert_eq!(ValueType::from_code('B'), Some(ValueType::U8));
        assert_eq!(ValueType::from_code('h'), Some(ValueType::I16));
        assert_eq!(ValueType::from_code('d'), Some(ValueType::F64));
        assert_eq!(ValueType::from_code('q'), None);
    }

    #[test]
    fn valset_payload() {
        let valset = ConfigValuesSet::new([
            ("CFG-RATE-MEAS", "1000"),
            ("cfg-uart1-baudrate", "0x9600"),
            ("CFG-USBOUTPROT-NMEA", "0"),
        ])
        .unwrap();

        assert_eq!(
            valset.payload(),
            &[
                0x00, 0x01, 0x00, 0x00, // header
                0x01, 0x00, 0x21, 0x30, 0xe8, 0x03, // rate
                0x01, 0x00, 0x52, 0x40, 0x00, 0x96, 0x00, 0x00, // baud
                0x02, 0x00, 0x78, 0x10, 0x00, // nmea
            ]
        );
        assert_eq!(valset.len(), 3);
        assert!(!valset.is_empty());

        let frame = valset.to_frame().unwrap();
        assert_eq!(&frame[..6], &[0xb5, 0x62, 0x06, 0x8a, 23, 0x00]);
    }

    #[test]
    fn valset_errors() {
        assert!(matches!(
            ConfigValuesSet::new([("CFG-RATE-MEAS", "1000"), ("CFG-UNKNOWN", "1")]),
            Err(Error::UnknownConfigName(_))
        ));

        // out of range for a u8
        assert!(matches!(
            ConfigValuesSet::new([("CFG-USB-ENABLED", "256")]),
            Err(Error::InvalidConfigValue { .. })
        ));

        assert!(matches!(
            ConfigValuesSet::new([("CFG-RATE-MEAS", "-1")]),
            Err(Error::InvalidConfigValue { .. })
        ));

        assert!(ConfigValuesSet::new([]).unwrap().is_empty());
    }

    #[test]
    fn valget_payload() {
        let valget =
            ConfigValuesGet::new(["CFG-RATE-MEAS", "CFG-UART1-BAUDRATE"], "Flash").unwrap();
        assert_eq!(
            valget.payload(),
            &[
                0x00, 0x02, 0x00, 0x00, 0x01, 0x00, 0x21, 0x30, 0x01, 0x00, 0x52, 0x40
            ]
        );

        let valget = ConfigValuesGet::new(["CFG-RATE-MEAS"], "default").unwrap();
        assert_eq!(valget.payload()[1], 7);
    }

    #[test]
    fn valget_errors() {
        assert!(matches!(
            ConfigValuesGet::new(["CFG-RATE-MEAS"], "eeprom"),
            Err(Error::InvalidLayer(layer)) if layer == "eeprom"
        ));
        assert!(matches!(
            ConfigValuesGet::new(["CFG-NOPE"], "ram"),
            Err(Error::UnknownConfigName(_))
        ));
    }

    #[test]
    fn valget_response() {
        let payload = [
            0x01, 0x00, 0x00, 0x00, // header
            0x01, 0x00, 0x21, 0x30, 0xe8, 0x03, // rate
            0x01, 0x00, 0x52, 0x40, 0x00, 0xc2, 0x01, 0x00, // baud
            0x01, 0x00, 0x65, 0x10, 0x01, // usb enabled
            0x01, 0x00, 0x52, 0x40, 0x00, // truncated
        ];

        let received = ConfigValuesReceived::decode(&payload).unwrap();
        assert_eq!(received.version, 1);
        assert_eq!(received.layer, 0);
        assert_eq!(received.position, 0);

        let entries = received.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], (0x30210001, &[0xe8, 0x03][..]));
        assert_eq!(entries[1], (0x40520001, &[0x00, 0xc2, 0x01, 0x00][..]));
        assert_eq!(entries[2], (0x10650001, &[0x01][..]));
    }
}
