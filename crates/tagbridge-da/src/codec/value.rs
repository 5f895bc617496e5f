// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol-native scalar values.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// VarType
// =============================================================================

/// Wire type tag of a native value.
///
/// Discriminants follow the automation runtime's variant type numbering, so
/// [`VarType::from_vt`] accepts the raw tag reported by the server for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    /// No value.
    Empty,
    /// SQL-style null.
    Null,
    /// Signed 8-bit integer.
    I1,
    /// Signed 16-bit integer.
    I2,
    /// Signed 32-bit integer.
    I4,
    /// Signed 64-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    UI1,
    /// Unsigned 16-bit integer.
    UI2,
    /// Unsigned 32-bit integer.
    UI4,
    /// Unsigned 64-bit integer.
    UI8,
    /// Machine signed integer (32-bit).
    Int,
    /// Machine unsigned integer (32-bit).
    UInt,
    /// 32-bit float.
    R4,
    /// 64-bit float.
    R8,
    /// Boolean.
    Bool,
    /// Status code.
    Error,
    /// Currency, 64-bit fixed point scaled by 10 000.
    Currency,
    /// Automation date (days since 1899-12-30).
    Date,
    /// String.
    BStr,
    /// 96-bit fixed-point decimal.
    Decimal,
    /// Any tag outside the supported set.
    Other(u16),
}

impl VarType {
    /// Maps a raw variant type tag.
    pub fn from_vt(vt: u16) -> Self {
        match vt {
            0 => Self::Empty,
            1 => Self::Null,
            2 => Self::I2,
            3 => Self::I4,
            4 => Self::R4,
            5 => Self::R8,
            6 => Self::Currency,
            7 => Self::Date,
            8 => Self::BStr,
            10 => Self::Error,
            11 => Self::Bool,
            14 => Self::Decimal,
            16 => Self::I1,
            17 => Self::UI1,
            18 => Self::UI2,
            19 => Self::UI4,
            20 => Self::I8,
            21 => Self::UI8,
            22 => Self::Int,
            23 => Self::UInt,
            other => Self::Other(other),
        }
    }

    /// Returns the raw variant type tag.
    pub fn vt(&self) -> u16 {
        match self {
            Self::Empty => 0,
            Self::Null => 1,
            Self::I2 => 2,
            Self::I4 => 3,
            Self::R4 => 4,
            Self::R8 => 5,
            Self::Currency => 6,
            Self::Date => 7,
            Self::BStr => 8,
            Self::Error => 10,
            Self::Bool => 11,
            Self::Decimal => 14,
            Self::I1 => 16,
            Self::UI1 => 17,
            Self::UI2 => 18,
            Self::UI4 => 19,
            Self::I8 => 20,
            Self::UI8 => 21,
            Self::Int => 22,
            Self::UInt => 23,
            Self::Other(vt) => *vt,
        }
    }

    /// Encoded width in bytes for fixed-width types.
    ///
    /// Returns `None` for empty/null (no payload), strings (any length) and
    /// unsupported tags.
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::I1 | Self::UI1 | Self::Bool => Some(1),
            Self::I2 | Self::UI2 => Some(2),
            Self::I4 | Self::UI4 | Self::Int | Self::UInt | Self::R4 | Self::Error => Some(4),
            Self::I8 | Self::UI8 | Self::R8 | Self::Currency | Self::Date | Self::Decimal => {
                Some(8)
            }
            Self::Empty | Self::Null | Self::BStr | Self::Other(_) => None,
        }
    }

    /// Returns `true` if the codec handles this type.
    #[inline]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Returns the type name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Null => "NULL",
            Self::I1 => "I1",
            Self::I2 => "I2",
            Self::I4 => "I4",
            Self::I8 => "I8",
            Self::UI1 => "UI1",
            Self::UI2 => "UI2",
            Self::UI4 => "UI4",
            Self::UI8 => "UI8",
            Self::Int => "INT",
            Self::UInt => "UINT",
            Self::R4 => "R4",
            Self::R8 => "R8",
            Self::Bool => "BOOL",
            Self::Error => "ERROR",
            Self::Currency => "CY",
            Self::Date => "DATE",
            Self::BStr => "BSTR",
            Self::Decimal => "DECIMAL",
            Self::Other(_) => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(vt) => write!(f, "VT(0x{vt:04X})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

// =============================================================================
// DecimalValue
// =============================================================================

/// 96-bit unsigned magnitude with a decimal scale and sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DecimalValue {
    /// High 32 bits of the magnitude.
    pub hi32: u32,
    /// Low 64 bits of the magnitude.
    pub lo64: u64,
    /// Power of ten the magnitude is divided by (0..=28).
    pub scale: u8,
    /// Sign flag.
    pub negative: bool,
}

/// Largest scale a decimal may carry.
pub const MAX_DECIMAL_SCALE: u8 = 28;

/// Scale used when a float is turned back into a decimal.
pub const DECODE_DECIMAL_SCALE: u8 = 4;

impl DecimalValue {
    /// Creates a decimal from an unscaled magnitude.
    ///
    /// Bits above 96 are discarded and the scale is capped at 28.
    pub fn new(mantissa: u128, scale: u8, negative: bool) -> Self {
        Self {
            hi32: (mantissa >> 64) as u32,
            lo64: mantissa as u64,
            scale: scale.min(MAX_DECIMAL_SCALE),
            negative,
        }
    }

    /// Returns the unscaled 96-bit magnitude.
    #[inline]
    pub fn mantissa(&self) -> u128 {
        ((self.hi32 as u128) << 64) | self.lo64 as u128
    }

    /// Converts to the nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        let magnitude = self.mantissa() as f64 / 10f64.powi(i32::from(self.scale));
        if self.negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Re-scales a float into a decimal with `scale` fractional digits.
    ///
    /// Returns `None` for non-finite values and magnitudes beyond 96 bits.
    pub fn from_f64(value: f64, scale: u8) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scale = scale.min(MAX_DECIMAL_SCALE);
        let scaled = (value.abs() * 10f64.powi(i32::from(scale))).round();
        if scaled >= 2f64.powi(96) {
            return None;
        }
        Some(Self::new(scaled as u128, scale, value.is_sign_negative() && scaled > 0.0))
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

// =============================================================================
// NativeValue
// =============================================================================

/// A tagged scalar value as delivered by the automation server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum NativeValue {
    /// No value.
    Empty,
    /// SQL-style null.
    Null,
    /// Signed 8-bit integer.
    I1(i8),
    /// Signed 16-bit integer.
    I2(i16),
    /// Signed 32-bit integer.
    I4(i32),
    /// Signed 64-bit integer.
    I8(i64),
    /// Unsigned 8-bit integer.
    UI1(u8),
    /// Unsigned 16-bit integer.
    UI2(u16),
    /// Unsigned 32-bit integer.
    UI4(u32),
    /// Unsigned 64-bit integer.
    UI8(u64),
    /// Machine signed integer.
    Int(i32),
    /// Machine unsigned integer.
    UInt(u32),
    /// 32-bit float.
    R4(f32),
    /// 64-bit float.
    R8(f64),
    /// Boolean.
    Bool(bool),
    /// Status code.
    Error(i32),
    /// Currency as raw fixed point (value × 10 000).
    Currency(i64),
    /// Automation date (days since 1899-12-30, fraction is time of day).
    Date(f64),
    /// String.
    BStr(String),
    /// Fixed-point decimal.
    Decimal(DecimalValue),
    /// A value whose wire type the codec does not handle.
    Unsupported {
        /// Raw variant type tag.
        vt: u16,
    },
}

impl NativeValue {
    /// Returns the wire type tag.
    pub fn var_type(&self) -> VarType {
        match self {
            Self::Empty => VarType::Empty,
            Self::Null => VarType::Null,
            Self::I1(_) => VarType::I1,
            Self::I2(_) => VarType::I2,
            Self::I4(_) => VarType::I4,
            Self::I8(_) => VarType::I8,
            Self::UI1(_) => VarType::UI1,
            Self::UI2(_) => VarType::UI2,
            Self::UI4(_) => VarType::UI4,
            Self::UI8(_) => VarType::UI8,
            Self::Int(_) => VarType::Int,
            Self::UInt(_) => VarType::UInt,
            Self::R4(_) => VarType::R4,
            Self::R8(_) => VarType::R8,
            Self::Bool(_) => VarType::Bool,
            Self::Error(_) => VarType::Error,
            Self::Currency(_) => VarType::Currency,
            Self::Date(_) => VarType::Date,
            Self::BStr(_) => VarType::BStr,
            Self::Decimal(_) => VarType::Decimal,
            Self::Unsupported { vt } => VarType::Other(*vt),
        }
    }

    /// Returns `true` for empty and null values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty | Self::Null)
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "<empty>"),
            Self::Null => write!(f, "<null>"),
            Self::I1(v) => write!(f, "{v}"),
            Self::I2(v) => write!(f, "{v}"),
            Self::I4(v) | Self::Int(v) | Self::Error(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::UI1(v) => write!(f, "{v}"),
            Self::UI2(v) => write!(f, "{v}"),
            Self::UI4(v) | Self::UInt(v) => write!(f, "{v}"),
            Self::UI8(v) => write!(f, "{v}"),
            Self::R4(v) => write!(f, "{v}"),
            Self::R8(v) | Self::Date(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Currency(v) => write!(f, "{}", *v as f64 / 10_000.0),
            Self::BStr(v) => write!(f, "\"{v}\""),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Unsupported { vt } => write!(f, "<unsupported 0x{vt:04X}>"),
        }
    }
}
