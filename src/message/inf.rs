/// INF message classes, in increasing message id order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InfoLevel {
    Error,
    Warning,
    Notice,
    Test,
    Debug,
}

impl InfoLevel {
    pub const fn id(&self) -> u16 {
        let msg_id = match self {
            Self::Error => 0x00,
            Self::Warning => 0x01,
            Self::Notice => 0x02,
            Self::Test => 0x03,
            Self::Debug => 0x04,
        };
        // class 0x04
        (msg_id << 8) | 0x04
    }

    /// Log level receiver messages of this class are reported with.
    pub fn log_level(&self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warning => log::Level::Warn,
            Self::Notice => log::Level::Info,
            Self::Test => log::Level::Trace,
            Self::Debug => log::Level::Debug,
        }
    }
}

/// Receiver text, trailing NULs dropped.
pub(crate) fn decode_text(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload)
        .trim_end_matches('\0')
        .to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn message_ids() {
        assert_eq!(InfoLevel::Error.id(), 0x0004);
        assert_eq!(InfoLevel::Warning.id(), 0x0104);
        assert_eq!(InfoLevel::Notice.id(), 0x0204);
        assert_eq!(InfoLevel::Test.id(), 0x0304);
        assert_eq!(InfoLevel::Debug.id(), 0x0404);
    }

    #[test]
    fn text() {
        assert_eq!(decode_text(b"ANTSTATUS=OK"), "ANTSTATUS=OK");
        assert_eq!(decode_text(b"PROTVER=27.11\0\0"), "PROTVER=27.11");
        assert_eq!(decode_text(b""), "");
    }
}
