// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Native value ⇄ flat byte buffer codec.
//!
//! # Encoding Rules
//!
//! | wire type | bytes |
//! |---|---|
//! | EMPTY, NULL | none (ok) |
//! | I1, UI1, BOOL | 1 (`BOOL` as 0/1) |
//! | I2, UI2 | 2 |
//! | I4, UI4, INT, UINT, R4, ERROR | 4 |
//! | I8, UI8, R8, CY | 8 |
//! | DATE | 8, ticks since 1970 (zero for dates ≤ 0) |
//! | DECIMAL | 8, lossy `f64` |
//! | BSTR | one byte per character, no length prefix |
//! | anything else | none (not ok) |
//!
//! Numbers are copied in native byte order. Encode and decode on the same
//! platform agree; no particular endianness is promised to consumers.

mod quality;
mod timestamp;
mod value;

pub use quality::{LimitStatus, Quality, QualityStatus};
pub use timestamp::{
    datetime_to_ole_date, ole_date_to_datetime, ole_date_to_unix_ticks, unix_ticks_to_ole_date,
    FileTime, EPOCH_OFFSET_TICKS, TICKS_PER_SECOND,
};
pub use value::{DecimalValue, NativeValue, VarType, DECODE_DECIMAL_SCALE, MAX_DECIMAL_SCALE};

use serde::{Deserialize, Serialize};
use tagbridge_core::CodecError;

// =============================================================================
// EncodedValue
// =============================================================================

/// Result of [`encode`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedValue {
    /// Flat payload; empty for empty/null and for failures.
    pub bytes: Vec<u8>,
    /// `false` when the value could not be represented.
    pub ok: bool,
}

impl EncodedValue {
    fn success(bytes: Vec<u8>) -> Self {
        Self { bytes, ok: true }
    }

    fn failure() -> Self {
        Self {
            bytes: Vec::new(),
            ok: false,
        }
    }
}

// =============================================================================
// TagValue
// =============================================================================

/// A value as handed to callers: payload, timestamp, status and quality.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagValue {
    /// Encoded payload.
    pub bytes: Vec<u8>,
    /// 100 ns ticks since 1970-01-01.
    pub timestamp: u64,
    /// `false` for server-reported failures and unencodable values.
    pub ok: bool,
    /// Server quality word, passed through.
    pub quality: Quality,
}

impl TagValue {
    /// Builds a caller value from what the server reported for one item.
    ///
    /// A negative `error` is a server-side failure: the payload is dropped
    /// and `ok` is cleared without consulting the codec.
    pub fn from_server(value: &NativeValue, quality: Quality, error: i32, time: FileTime) -> Self {
        let timestamp = time.to_unix_ticks();
        if error < 0 {
            return Self {
                bytes: Vec::new(),
                timestamp,
                ok: false,
                quality,
            };
        }

        let encoded = encode(value);
        Self {
            bytes: encoded.bytes,
            timestamp,
            ok: encoded.ok,
            quality,
        }
    }

    /// Returns the payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// =============================================================================
// Encode
// =============================================================================

/// Encodes a native value into its flat byte form.
///
/// Never fails: unsupported types and unrepresentable dates yield an empty
/// buffer with `ok == false`.
pub fn encode(value: &NativeValue) -> EncodedValue {
    match value {
        NativeValue::Empty | NativeValue::Null => EncodedValue::success(Vec::new()),
        NativeValue::I1(v) => EncodedValue::success(v.to_ne_bytes().to_vec()),
        NativeValue::I2(v) => EncodedValue::success(v.to_ne_bytes().to_vec()),
        NativeValue::I4(v) | NativeValue::Int(v) | NativeValue::Error(v) => {
            EncodedValue::success(v.to_ne_bytes().to_vec())
        }
        NativeValue::I8(v) | NativeValue::Currency(v) => {
            EncodedValue::success(v.to_ne_bytes().to_vec())
        }
        NativeValue::UI1(v) => EncodedValue::success(vec![*v]),
        NativeValue::UI2(v) => EncodedValue::success(v.to_ne_bytes().to_vec()),
        NativeValue::UI4(v) | NativeValue::UInt(v) => {
            EncodedValue::success(v.to_ne_bytes().to_vec())
        }
        NativeValue::UI8(v) => EncodedValue::success(v.to_ne_bytes().to_vec()),
        NativeValue::R4(v) => EncodedValue::success(v.to_ne_bytes().to_vec()),
        NativeValue::R8(v) => EncodedValue::success(v.to_ne_bytes().to_vec()),
        NativeValue::Bool(v) => EncodedValue::success(vec![u8::from(*v)]),
        NativeValue::Date(date) => encode_date(*date),
        NativeValue::BStr(s) => EncodedValue::success(to_single_byte(s)),
        NativeValue::Decimal(d) => EncodedValue::success(d.to_f64().to_ne_bytes().to_vec()),
        NativeValue::Unsupported { vt } => {
            tracing::warn!(vt = *vt, "Unsupported wire type, value dropped");
            EncodedValue::failure()
        }
    }
}

fn encode_date(date: f64) -> EncodedValue {
    if date <= 0.0 {
        return EncodedValue::success(0u64.to_ne_bytes().to_vec());
    }
    match ole_date_to_unix_ticks(date) {
        Some(ticks) => EncodedValue::success(ticks.to_ne_bytes().to_vec()),
        None => {
            tracing::warn!(date = date, "Date outside convertible range");
            EncodedValue::failure()
        }
    }
}

fn to_single_byte(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn from_single_byte(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

// =============================================================================
// Decode
// =============================================================================

/// Decodes a flat buffer into a native value of type `target`.
///
/// Fixed-width types require the buffer to match their width exactly.
/// Decimals are rebuilt from the `f64` payload with
/// [`DECODE_DECIMAL_SCALE`] fractional digits, so they round-trip only
/// approximately.
pub fn decode(bytes: &[u8], target: VarType) -> Result<NativeValue, CodecError> {
    if let Some(width) = target.width() {
        if bytes.len() != width {
            return Err(CodecError::length_mismatch(target.name(), width, bytes.len()));
        }
    }

    let value = match target {
        VarType::Empty => NativeValue::Empty,
        VarType::Null => NativeValue::Null,
        VarType::I1 => NativeValue::I1(i8::from_ne_bytes(fixed(bytes)?)),
        VarType::I2 => NativeValue::I2(i16::from_ne_bytes(fixed(bytes)?)),
        VarType::I4 => NativeValue::I4(i32::from_ne_bytes(fixed(bytes)?)),
        VarType::I8 => NativeValue::I8(i64::from_ne_bytes(fixed(bytes)?)),
        VarType::UI1 => NativeValue::UI1(u8::from_ne_bytes(fixed(bytes)?)),
        VarType::UI2 => NativeValue::UI2(u16::from_ne_bytes(fixed(bytes)?)),
        VarType::UI4 => NativeValue::UI4(u32::from_ne_bytes(fixed(bytes)?)),
        VarType::UI8 => NativeValue::UI8(u64::from_ne_bytes(fixed(bytes)?)),
        VarType::Int => NativeValue::Int(i32::from_ne_bytes(fixed(bytes)?)),
        VarType::UInt => NativeValue::UInt(u32::from_ne_bytes(fixed(bytes)?)),
        VarType::R4 => NativeValue::R4(f32::from_ne_bytes(fixed(bytes)?)),
        VarType::R8 => NativeValue::R8(f64::from_ne_bytes(fixed(bytes)?)),
        VarType::Bool => NativeValue::Bool(bytes[0] != 0),
        VarType::Error => NativeValue::Error(i32::from_ne_bytes(fixed(bytes)?)),
        VarType::Currency => NativeValue::Currency(i64::from_ne_bytes(fixed(bytes)?)),
        VarType::Date => NativeValue::Date(decode_date(u64::from_ne_bytes(fixed(bytes)?))?),
        VarType::BStr => NativeValue::BStr(from_single_byte(bytes)),
        VarType::Decimal => {
            let raw = f64::from_ne_bytes(fixed(bytes)?);
            let decimal = DecimalValue::from_f64(raw, DECODE_DECIMAL_SCALE).ok_or_else(|| {
                CodecError::InvalidValue {
                    data_type: "DECIMAL",
                    message: format!("{raw} cannot be represented"),
                }
            })?;
            NativeValue::Decimal(decimal)
        }
        VarType::Other(vt) => return Err(CodecError::UnsupportedType { vt }),
    };

    Ok(value)
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], CodecError> {
    bytes
        .try_into()
        .map_err(|_| CodecError::length_mismatch("fixed", N, bytes.len()))
}

// Zero ticks stand for an unset date, mirroring the encode side.
fn decode_date(ticks: u64) -> Result<f64, CodecError> {
    if ticks == 0 {
        return Ok(0.0);
    }
    unix_ticks_to_ole_date(ticks).ok_or_else(|| CodecError::InvalidValue {
        data_type: "DATE",
        message: format!("{ticks} ticks out of range"),
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: NativeValue) {
        let encoded = encode(&value);
        assert!(encoded.ok, "encode failed for {value:?}");
        let decoded = decode(&encoded.bytes, value.var_type()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_integer_round_trips() {
        round_trip(NativeValue::I1(-7));
        round_trip(NativeValue::I2(i16::MIN));
        round_trip(NativeValue::I4(-123_456));
        round_trip(NativeValue::I8(i64::MAX));
        round_trip(NativeValue::UI1(250));
        round_trip(NativeValue::UI2(65_000));
        round_trip(NativeValue::UI4(u32::MAX));
        round_trip(NativeValue::UI8(1 << 60));
        round_trip(NativeValue::Int(-1));
        round_trip(NativeValue::UInt(42));
        round_trip(NativeValue::Error(0x8004_0007_u32 as i32));
        round_trip(NativeValue::Currency(-12_345_678));
    }

    #[test]
    fn test_float_and_bool_round_trips() {
        round_trip(NativeValue::R4(-3.25));
        round_trip(NativeValue::R8(std::f64::consts::PI));
        round_trip(NativeValue::Bool(true));
        round_trip(NativeValue::Bool(false));
    }

    #[test]
    fn test_native_byte_order_and_widths() {
        assert_eq!(encode(&NativeValue::I2(0x0102)).bytes, 0x0102i16.to_ne_bytes());
        assert_eq!(encode(&NativeValue::UI4(7)).bytes.len(), 4);
        assert_eq!(encode(&NativeValue::Currency(1)).bytes.len(), 8);
        assert_eq!(encode(&NativeValue::Bool(true)).bytes, vec![1]);
    }

    #[test]
    fn test_empty_and_null() {
        for value in [NativeValue::Empty, NativeValue::Null] {
            let encoded = encode(&value);
            assert!(encoded.ok);
            assert!(encoded.bytes.is_empty());
        }
        assert_eq!(decode(&[], VarType::Null).unwrap(), NativeValue::Null);
    }

    #[test]
    fn test_string_single_byte() {
        let encoded = encode(&NativeValue::BStr("Pump-1 état".to_string()));
        assert!(encoded.ok);
        assert_eq!(encoded.bytes.len(), 11);
        assert_eq!(encoded.bytes[7], 0xE9);

        round_trip(NativeValue::BStr("Tank level".to_string()));
        round_trip(NativeValue::BStr(String::new()));

        let lossy = encode(&NativeValue::BStr("温度".to_string()));
        assert_eq!(lossy.bytes, b"??");
    }

    #[test]
    fn test_date() {
        round_trip(NativeValue::Date(45_000.5));

        let encoded = encode(&NativeValue::Date(25_569.0));
        assert_eq!(encoded.bytes, 0u64.to_ne_bytes());

        let encoded = encode(&NativeValue::Date(25_570.0));
        assert_eq!(encoded.bytes, (86_400 * TICKS_PER_SECOND).to_ne_bytes());

        let encoded = encode(&NativeValue::Date(-3.0));
        assert!(encoded.ok);
        assert_eq!(encoded.bytes, 0u64.to_ne_bytes());

        assert!(!encode(&NativeValue::Date(f64::NAN)).ok);
    }

    #[test]
    fn test_decimal_is_lossy_but_close() {
        let expected = DecimalValue::new(123_456_789, 5, true);
        let encoded = encode(&NativeValue::Decimal(expected));
        assert_eq!(encoded.bytes, (-1234.56789f64).to_ne_bytes());

        let NativeValue::Decimal(decoded) = decode(&encoded.bytes, VarType::Decimal).unwrap() else {
            panic!("expected decimal");
        };
        assert_eq!(decoded.scale, DECODE_DECIMAL_SCALE);
        let relative = ((decoded.to_f64() - expected.to_f64()) / expected.to_f64()).abs();
        assert!(relative < 1e-4);
    }

    #[test]
    fn test_decimal_uses_high_bits() {
        let wide = DecimalValue::new(1u128 << 70, 0, false);
        let encoded = encode(&NativeValue::Decimal(wide));
        let value = f64::from_ne_bytes(encoded.bytes.try_into().unwrap());
        assert_eq!(value, 2f64.powi(70));
    }

    #[test]
    fn test_unsupported_type() {
        let encoded = encode(&NativeValue::Unsupported { vt: 0x2003 });
        assert!(!encoded.ok);
        assert!(encoded.bytes.is_empty());

        assert!(matches!(
            decode(&[0; 4], VarType::Other(0x2003)),
            Err(CodecError::UnsupportedType { vt: 0x2003 })
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_width() {
        let err = decode(&[1, 2], VarType::I4).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                expected: 4,
                actual: 2,
                ..
            }
        ));
        assert!(decode(&[], VarType::Bool).is_err());
        assert!(decode(&[0; 9], VarType::R8).is_err());
    }

    #[test]
    fn test_tag_value_from_server() {
        let time = FileTime::from_unix_ticks(5_000);

        let good = TagValue::from_server(&NativeValue::I2(9), Quality::GOOD, 0, time);
        assert!(good.ok);
        assert_eq!(good.bytes, 9i16.to_ne_bytes());
        assert_eq!(good.timestamp, 5_000);

        let failed = TagValue::from_server(&NativeValue::I2(9), Quality::BAD, -1, time);
        assert!(!failed.ok);
        assert!(failed.is_empty());
        assert_eq!(failed.quality, Quality::BAD);
        assert_eq!(failed.timestamp, 5_000);

        let unsupported =
            TagValue::from_server(&NativeValue::Unsupported { vt: 0x24 }, Quality::GOOD, 0, time);
        assert!(!unsupported.ok);
        assert_eq!(unsupported.len(), 0);
    }
}
