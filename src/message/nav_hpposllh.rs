use crate::{error::Result, message::Fields};

/// NAV-HPPOSLLH, high precision components already folded in.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NavHpPosLlh {
    pub version: u8,
    /// Set when lon/lat/height/hMSL are not valid (version 1 and later)
    pub invalid_llh: bool,
    /// GPS time of week (ms)
    pub itow: u32,
    /// Longitude (deg)
    pub lon: f64,
    /// Latitude (deg)
    pub lat: f64,
    /// Height above ellipsoid (m)
    pub height: f64,
    /// Height above mean sea level (m)
    pub h_msl: f64,
    /// Horizontal accuracy estimate (m)
    pub h_acc: f64,
    /// Vertical accuracy estimate (m)
    pub v_acc: f64,
}

impl NavHpPosLlh {
    pub const ID: u16 = 0x1401;
    pub const NAME: &'static str = "NAV-HPPOSLLH";
    const LEN: usize = 36;

    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(Self::NAME, Self::ID, payload, Self::LEN)?;

        let version = fields.u8();
        fields.skip(2);
        let flags = fields.u8();

        let itow = fields.u32();
        let lon = fields.i32();
        let lat = fields.i32();
        let height = fields.i32();
        let h_msl = fields.i32();
        let lon_hp = fields.i8();
        let lat_hp = fields.i8();
        let height_hp = fields.i8();
        let h_msl_hp = fields.i8();
        let h_acc = fields.u32();
        let v_acc = fields.u32();

        Ok(Self {
            version,
            invalid_llh: version > 0 && flags & 0x01 > 0,
            itow,
            lon: angle(lon, lon_hp),
            lat: angle(lat, lat_hp),
            height: distance(height, height_hp),
            h_msl: distance(h_msl, h_msl_hp),
            h_acc: h_acc as f64 * 0.1 / 1000.0,
            v_acc: v_acc as f64 * 0.1 / 1000.0,
        })
    }
}

/// 1e-7 deg + 1e-9 deg
fn angle(coarse: i32, hp: i8) -> f64 {
    1e-7 * (coarse as f64 + hp as f64 * 1e-2)
}

/// mm + 0.1 mm, to meters
fn distance(coarse: i32, hp: i8) -> f64 {
    (coarse as f64 + 0.1 * hp as f64) / 1000.0
}

#[cfg(test)]
mod test {
    use super::*;

    fn payload(version: u8, flags: u8) -> Vec<u8> {
        let mut payload = vec![version, 0, 0, flags];
        payload.extend(302_400_000u32.to_le_bytes());
        payload.extend((-1_052_563_210i32).to_le_bytes());
        payload.extend(400_075_432i32.to_le_bytes());
        payload.extend(1_612_345i32.to_le_bytes());
        payload.extend(1_633_000i32.to_le_bytes());
        payload.extend([(-25i8) as u8, 50, 7, (-3i8) as u8]);
        payload.extend(142u32.to_le_bytes());
        payload.extend(275u32.to_le_bytes());
        payload
    }

    #[test]
    fn decoding() {
        let pos = NavHpPosLlh::decode(&payload(0, 0)).unwrap();
        assert_eq!(pos.version, 0);
        assert!(!pos.invalid_llh);
        assert_eq!(pos.itow, 302_400_000);
        assert!((pos.lon - -105.256321025).abs() < 1e-9);
        assert!((pos.lat - 40.00754325).abs() < 1e-9);
        assert!((pos.height - 1612.3457).abs() < 1e-6);
        assert!((pos.h_msl - 1632.9997).abs() < 1e-6);
        assert!((pos.h_acc - 0.0142).abs() < 1e-9);
        assert!((pos.v_acc - 0.0275).abs() < 1e-9);
    }

    #[test]
    fn invalid_llh_flag() {
        // flag only exists since version 1
        assert!(!NavHpPosLlh::decode(&payload(0, 1)).unwrap().invalid_llh);
        assert!(NavHpPosLlh::decode(&payload(1, 1)).unwrap().invalid_llh);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut longer = payload(0, 0);
        longer.extend([0xff; 4]);
        assert_eq!(
            NavHpPosLlh::decode(&longer).unwrap(),
            NavHpPosLlh::decode(&payload(0, 0)).unwrap()
        );
    }
}
