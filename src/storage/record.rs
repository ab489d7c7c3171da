//! Fixed-size on-disk encoding of a [`crate::bars::Bar`].

use crate::bars::bar::{Bar, BarCloseReason};
use crate::decimal::{Price, Volume};
use crate::time::TimePoint;

/// Size in bytes of one encoded bar record. Nine `i64` fields (72 bytes)
/// plus a one-byte close reason (73 bytes), a CRC32 of those bytes (4
/// bytes), and 3 bytes of unused padding out to a round, 8-byte-aligned
/// size. Implementations must agree on this value within a deployment; it
/// is not meant to be cross-version compatible.
pub const RECORD_SIZE: usize = 80;

const PAYLOAD_LEN: usize = 73;

fn reason_to_byte(reason: BarCloseReason) -> u8 {
    match reason {
        BarCloseReason::Threshold => 0,
        BarCloseReason::Gap => 1,
        BarCloseReason::Forced => 2,
        BarCloseReason::Warmup => 3,
    }
}

fn byte_to_reason(byte: u8) -> Option<BarCloseReason> {
    match byte {
        0 => Some(BarCloseReason::Threshold),
        1 => Some(BarCloseReason::Gap),
        2 => Some(BarCloseReason::Forced),
        3 => Some(BarCloseReason::Warmup),
        _ => None,
    }
}

/// Encodes `bar` into a fixed [`RECORD_SIZE`]-byte little-endian record,
/// with a CRC32 of the payload written immediately after the close-reason
/// byte.
#[must_use]
pub fn encode_bar(bar: &Bar) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    let mut w = 0;
    let mut put_i64 = |buf: &mut [u8; RECORD_SIZE], v: i64| {
        buf[w..w + 8].copy_from_slice(&v.to_le_bytes());
        w += 8;
    };
    put_i64(&mut buf, bar.open.raw());
    put_i64(&mut buf, bar.high.raw());
    put_i64(&mut buf, bar.low.raw());
    put_i64(&mut buf, bar.close.raw());
    put_i64(&mut buf, bar.volume.raw());
    put_i64(&mut buf, bar.buy_volume.raw());
    put_i64(&mut buf, bar.trade_count as i64);
    put_i64(&mut buf, bar.start_time.as_nanos());
    put_i64(&mut buf, bar.end_time.as_nanos());
    buf[w] = reason_to_byte(bar.close_reason);
    let crc = crc32fast::hash(&buf[..PAYLOAD_LEN]);
    buf[PAYLOAD_LEN..PAYLOAD_LEN + 4].copy_from_slice(&crc.to_le_bytes());
    buf
}

/// Decodes a [`RECORD_SIZE`]-byte record back into a [`Bar`]. Returns
/// `None` if the CRC does not match the payload or the close-reason byte
/// is not one of the known values.
#[must_use]
pub fn decode_bar(bytes: &[u8; RECORD_SIZE]) -> Option<Bar> {
    let stored_crc = u32::from_le_bytes(bytes[PAYLOAD_LEN..PAYLOAD_LEN + 4].try_into().unwrap());
    if crc32fast::hash(&bytes[..PAYLOAD_LEN]) != stored_crc {
        return None;
    }
    let mut r = 0;
    let mut take_i64 = |bytes: &[u8; RECORD_SIZE]| -> i64 {
        let v = i64::from_le_bytes(bytes[r..r + 8].try_into().unwrap());
        r += 8;
        v
    };
    let open = Price::from_raw(take_i64(bytes));
    let high = Price::from_raw(take_i64(bytes));
    let low = Price::from_raw(take_i64(bytes));
    let close = Price::from_raw(take_i64(bytes));
    let volume = Volume::from_raw(take_i64(bytes));
    let buy_volume = Volume::from_raw(take_i64(bytes));
    let trade_count = take_i64(bytes) as u64;
    let start_time = TimePoint::from_unix_ns(take_i64(bytes));
    let end_time = TimePoint::from_unix_ns(take_i64(bytes));
    let close_reason = byte_to_reason(bytes[r])?;
    Some(Bar {
        open,
        high,
        low,
        close,
        volume,
        buy_volume,
        trade_count,
        start_time,
        end_time,
        close_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let bar = Bar {
            open: Price::from_f64(100.0),
            high: Price::from_f64(101.5),
            low: Price::from_f64(99.5),
            close: Price::from_f64(100.5),
            volume: Volume::from_f64(1234.5),
            buy_volume: Volume::from_f64(600.0),
            trade_count: 42,
            start_time: TimePoint::from_unix_ns(1_000),
            end_time: TimePoint::from_unix_ns(2_000),
            close_reason: BarCloseReason::Forced,
        };
        let bytes = encode_bar(&bar);
        assert_eq!(decode_bar(&bytes), Some(bar));
    }

    #[test]
    fn corrupted_payload_fails_crc_check() {
        let bar = Bar {
            open: Price::from_f64(100.0),
            high: Price::from_f64(100.0),
            low: Price::from_f64(100.0),
            close: Price::from_f64(100.0),
            volume: Volume::from_f64(1.0),
            buy_volume: Volume::from_f64(1.0),
            trade_count: 1,
            start_time: TimePoint::from_unix_ns(0),
            end_time: TimePoint::from_unix_ns(1),
            close_reason: BarCloseReason::Threshold,
        };
        let mut bytes = encode_bar(&bar);
        bytes[0] ^= 0xff;
        assert_eq!(decode_bar(&bytes), None);
    }
}
