//! Compact wire format of closed windows.
use itertools::Itertools;

use log::{debug, warn};

use crate::{
    collecter::Closed,
    error::{Error, Result},
    message::{NavHpPosLlh, RxmRawx, SatelliteMeasurement},
};

const MS_PER_WEEK: i64 = 7 * 86_400 * 1_000;

/// Size of one position record
pub const POSITION_RECORD_LEN: usize = 30;

/// Signal strength on 3 bits, from C/N0 in dB.Hz.
fn snr(cno: u8) -> u16 {
    let snr = (cno as f64 / 6.0).round().clamp(1.0, 9.0) as u16;
    snr & 0x07
}

/// Satellite identification packed on 16 bits:
/// gnssId(3) svId(6) sigId(3) snr(3).
pub fn pack_signal(meas: &SatelliteMeasurement) -> u16 {
    ((meas.gnss_id as u16 & 0x07) << 12)
        | ((meas.sv_id as u16 & 0x3f) << 6)
        | ((meas.sig_id as u16 & 0x07) << 3)
        | snr(meas.cno)
}

/// Encodes a raw measurement window. Each message is serialized as
/// `rcvTow:f64 week:i16 leapS:i8 numMeas:u8` followed by one
/// `prMes:f64 cpMes:f64 doMes:f32 packed:u16` record per measurement.
pub fn encode_raw(batch: &[RxmRawx]) -> Vec<u8> {
    let size = batch
        .iter()
        .map(|rawx| 12 + 22 * rawx.measurements.len())
        .sum();

    let mut buf = Vec::with_capacity(size);

    for rawx in batch {
        buf.extend(rawx.rcv_tow.to_le_bytes());
        buf.extend(rawx.week.to_le_bytes());
        buf.extend(rawx.leap_s.to_le_bytes());
        buf.push(rawx.measurements.len() as u8);

        for meas in rawx.measurements.iter() {
            buf.extend(meas.pr_mes.to_le_bytes());
            buf.extend(meas.cp_mes.to_le_bytes());
            buf.extend(meas.do_mes.to_le_bytes());
            buf.extend(pack_signal(meas).to_le_bytes());
        }
    }

    buf
}

/// Encodes a position window into a single averaged record:
/// `iTOW:u32 week:i16 lon:f64 lat:f64 height:f64`.
///
/// The time of week is corrected by the leap seconds. When the
/// correction crosses the week boundary, the record moves to the
/// previous week.
pub fn encode_position(batch: &[NavHpPosLlh], week: i16, leap_seconds: i8) -> Result<Vec<u8>> {
    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let n = batch.len() as f64;

    let (itow, lon, lat, height) = batch.iter().fold(
        (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64),
        |(itow, lon, lat, height), pos| {
            (
                itow + pos.itow as f64,
                lon + pos.lon,
                lat + pos.lat,
                height + pos.height,
            )
        },
    );

    let mut week = week;
    let mut itow = (itow / n - leap_seconds as f64 * 1000.0).round() as i64;

    if itow < 0 {
        itow += MS_PER_WEEK;
        week = week.checked_sub(1).ok_or(Error::WeekOutOfRange)?;
    } else if itow >= MS_PER_WEEK {
        itow -= MS_PER_WEEK;
        week = week.checked_add(1).ok_or(Error::WeekOutOfRange)?;
    }

    let mut buf = Vec::with_capacity(POSITION_RECORD_LEN);
    buf.extend((itow as u32).to_le_bytes());
    buf.extend(week.to_le_bytes());
    buf.extend((lon / n).to_le_bytes());
    buf.extend((lat / n).to_le_bytes());
    buf.extend((height / n).to_le_bytes());

    Ok(buf)
}

/// Encodes a closed window for its stream.
///
/// Returns `None` when there is nothing to send: the window is empty, or
/// it holds positions whose GPS week and leap seconds were never reported,
/// in which case they are withheld rather than sent with a guessed time.
pub fn encode_window(closed: &Closed) -> Result<Option<Vec<u8>>> {
    if closed.is_empty() {
        debug!("{} - empty window", closed.stream());
        return Ok(None);
    }

    match closed {
        Closed::Raw(window) => Ok(Some(encode_raw(&window.batch))),
        Closed::Position(window) => match (window.week, window.leap_seconds) {
            (Some(week), Some(leap_seconds)) => {
                encode_position(&window.batch, week, leap_seconds).map(Some)
            },
            _ => {
                warn!(
                    "{} - window withheld: {} solutions without GPS week and leap seconds",
                    closed.stream(),
                    window.batch.len()
                );
                Ok(None)
            },
        },
    }
}

/// Satellites of a raw window, for logging.
pub fn satellites(batch: &[RxmRawx]) -> String {
    batch
        .iter()
        .flat_map(|rawx| rawx.measurements.iter())
        .map(|meas| meas.key.as_str())
        .filter(|key| !key.is_empty())
        .unique()
        .sorted()
        .join(",")
}
