use gnss::prelude::{Constellation, SV};

/// u-blox numbers SBAS satellites by their PRN (120..158)
const SBAS_PRN_OFFSET: u8 = 100;

/// GLONASS slot number when unknown
const GLONASS_UNKNOWN_SLOT: u8 = 255;

pub fn to_constellation(id: u8) -> Option<Constellation> {
    match id {
        0 => Some(Constellation::GPS),
        1 => Some(Constellation::SBAS),
        2 => Some(Constellation::Galileo),
        3 => Some(Constellation::BeiDou),
        5 => Some(Constellation::QZSS),
        6 => Some(Constellation::Glonass),
        _ => None,
    }
}

/// Satellite identification, as used in RINEX: `G07`, `S20`..
pub fn to_sv(gnss_id: u8, sv_id: u8) -> Option<SV> {
    let constellation = to_constellation(gnss_id)?;

    if constellation == Constellation::Glonass && sv_id == GLONASS_UNKNOWN_SLOT {
        return None;
    }

    let mut prn = sv_id;
    if constellation.is_sbas() && prn >= SBAS_PRN_OFFSET {
        prn -= SBAS_PRN_OFFSET;
    }

    Some(SV::new(constellation, prn))
}

/// Grouping key of a measurement. Unidentified satellites get an empty key.
pub fn satellite_key(gnss_id: u8, sv_id: u8) -> String {
    to_sv(gnss_id, sv_id)
        .map(|sv| sv.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn satellite_keys() {
        assert_eq!(satellite_key(0, 7), "G07");
        assert_eq!(satellite_key(0, 32), "G32");
        assert_eq!(satellite_key(1, 120), "S20");
        assert_eq!(satellite_key(2, 11), "E11");
        assert_eq!(satellite_key(3, 5), "C05");
        assert_eq!(satellite_key(5, 2), "J02");
        assert_eq!(satellite_key(6, 14), "R14");
        assert_eq!(satellite_key(6, 255), "");
    }

    #[test]
    fn unsupported_systems() {
        // IMES, NavIC
        assert_eq!(satellite_key(4, 1), "");
        assert_eq!(satellite_key(7, 1), "");
        assert!(to_sv(4, 1).is_none());
    }
}
