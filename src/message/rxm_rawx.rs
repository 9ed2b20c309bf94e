use hifitime::prelude::{Epoch, TimeScale};
use itertools::Itertools;

use crate::{error::Result, message::Fields, utils::satellite_key};

/// One tracked signal of RXM-RAWX.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteMeasurement {
    /// Pseudorange (m)
    pub pr_mes: f64,
    /// Carrier phase (cycles)
    pub cp_mes: f64,
    /// Doppler (Hz)
    pub do_mes: f32,
    pub gnss_id: u8,
    pub sv_id: u8,
    pub sig_id: u8,
    /// GLONASS frequency slot + 7
    pub freq_id: u8,
    /// Carrier phase locktime (ms)
    pub locktime: u16,
    /// C/N0 (dB.Hz)
    pub cno: u8,
    /// Pseudorange standard deviation (m)
    pub pr_stdev: f64,
    /// Carrier phase standard deviation (cycles)
    pub cp_stdev: f64,
    /// Doppler standard deviation (Hz)
    pub do_stdev: f64,
    pub pr_valid: bool,
    pub cp_valid: bool,
    pub half_cyc: bool,
    pub sub_half_cyc: bool,
    /// See [satellite_key]
    pub key: String,
}

impl SatelliteMeasurement {
    const LEN: usize = 32;

    fn decode(fields: &mut Fields) -> Self {
        let pr_mes = fields.f64();
        let cp_mes = fields.f64();
        let do_mes = fields.f32();
        let gnss_id = fields.u8();
        let sv_id = fields.u8();
        let sig_id = fields.u8();
        let freq_id = fields.u8();
        let locktime = fields.u16();
        let cno = fields.u8();
        let pr_stdev = fields.u8() & 0x0f;
        let cp_stdev = fields.u8() & 0x0f;
        let do_stdev = fields.u8() & 0x0f;
        let trk_stat = fields.u8();
        fields.skip(1);

        Self {
            pr_mes,
            cp_mes,
            do_mes,
            gnss_id,
            sv_id,
            sig_id,
            freq_id,
            locktime,
            cno,
            pr_stdev: 0.01 * 2.0_f64.powi(pr_stdev as i32),
            cp_stdev: cp_stdev as f64 * 0.004,
            do_stdev: 0.02 * 2.0_f64.powi(do_stdev as i32),
            pr_valid: trk_stat & 0x01 > 0,
            cp_valid: trk_stat & 0x02 > 0,
            half_cyc: trk_stat & 0x04 > 0,
            sub_half_cyc: trk_stat & 0x08 > 0,
            key: satellite_key(gnss_id, sv_id),
        }
    }
}

/// RXM-RAWX: one receiver epoch worth of measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct RxmRawx {
    /// Receiver local time of week (s)
    pub rcv_tow: f64,
    pub week: i16,
    /// GPS leap seconds (GPS - UTC)
    pub leap_s: i8,
    pub num_meas: u8,
    pub rec_stat: u8,
    pub version: u8,
    /// Sorted by satellite key, then signal
    pub measurements: Vec<SatelliteMeasurement>,
}

impl RxmRawx {
    pub const ID: u16 = 0x1502;
    pub const NAME: &'static str = "RXM-RAWX";
    const HEADER_LEN: usize = 16;

    pub(crate) fn decode(payload: &[u8]) -> Result<Self> {
        let mut fields = Fields::new(Self::NAME, Self::ID, payload, Self::HEADER_LEN)?;

        let rcv_tow = fields.f64();
        let week = fields.i16();
        let leap_s = fields.i8();
        let num_meas = fields.u8();
        let rec_stat = fields.u8();
        let version = fields.u8();
        fields.skip(2);

        let expected = Self::HEADER_LEN + num_meas as usize * SatelliteMeasurement::LEN;
        let mut fields = Fields::new(Self::NAME, Self::ID, payload, expected)?;
        fields.skip(Self::HEADER_LEN);

        let measurements = (0..num_meas)
            .map(|_| SatelliteMeasurement::decode(&mut fields))
            .sorted_by(|a, b| a.key.cmp(&b.key).then(a.sig_id.cmp(&b.sig_id)))
            .collect();

        Ok(Self {
            rcv_tow,
            week,
            leap_s,
            num_meas,
            rec_stat,
            version,
            measurements,
        })
    }

    pub fn leap_seconds_determined(&self) -> bool {
        self.rec_stat & 0x01 > 0
    }

    pub fn clock_reset(&self) -> bool {
        self.rec_stat & 0x02 > 0
    }

    /// Receiver time of this epoch.
    pub fn epoch(&self) -> Epoch {
        let gpst_tow_nanos = (self.rcv_tow * 1.0E9).round() as u64;
        Epoch::from_time_of_week(self.week.max(0) as u32, gpst_tow_nanos, TimeScale::GPST)
    }
}

impl std::fmt::Display for RxmRawx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "week={} tow={:.3} leap={} meas={} [{}]",
            self.week,
            self.rcv_tow,
            self.leap_s,
            self.num_meas,
            self.measurements.iter().map(|meas| &meas.key).join(","),
        )
    }
}
