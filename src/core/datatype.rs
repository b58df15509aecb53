// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The VM data types: sizes, operand tags, value ranges, two's-complement
//! restriction, little-endian encoding, and the binary-arithmetic merge rule.

use std::fmt;

use crate::core::error::AssemblyError;

/// Closed set of value encodings understood by the VM. The numeric types are
/// fixed singletons; strings carry their byte length (text plus one NUL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
    Str(u32),
}

/// Default type of an integer literal. s32 is the one signed width flagged
/// compressible: literal operands may shrink to the smallest fitting type.
pub const DEFAULT_LITERAL: DataType = DataType::S32;

/// Default type of a decimal-point literal.
pub const DEFAULT_FLOAT: DataType = DataType::F32;

/// Candidate order for narrowing integer constants used as instruction
/// operands. First fit wins, smallest first.
pub const OPERAND_TYPES: &[DataType] = &[DataType::S8, DataType::S16, DataType::S32];

enum TypeClass {
    Unsigned,
    Signed,
    Float,
}

impl TypeClass {
    /// Merge priority: unsigned < signed < float.
    fn priority(&self) -> u8 {
        match self {
            TypeClass::Unsigned => 0,
            TypeClass::Signed => 1,
            TypeClass::Float => 2,
        }
    }
}

impl DataType {
    pub fn from_name(name: &str) -> Option<DataType> {
        match name.to_ascii_lowercase().as_str() {
            "u8" => Some(DataType::U8),
            "u16" => Some(DataType::U16),
            "u32" => Some(DataType::U32),
            "u64" => Some(DataType::U64),
            "s8" => Some(DataType::S8),
            "s16" => Some(DataType::S16),
            "s32" => Some(DataType::S32),
            "s64" => Some(DataType::S64),
            "f32" => Some(DataType::F32),
            "f64" => Some(DataType::F64),
            "str" => Some(DataType::Str(0)),
            _ => None,
        }
    }

    pub fn byte_size(self) -> u32 {
        match self {
            DataType::U8 | DataType::S8 => 1,
            DataType::U16 | DataType::S16 => 2,
            DataType::U32 | DataType::S32 | DataType::F32 => 4,
            DataType::U64 | DataType::S64 | DataType::F64 => 8,
            DataType::Str(len) => len,
        }
    }

    pub fn bit_size(self) -> u32 {
        self.byte_size() * 8
    }

    /// Low nibble of the operand prefix byte.
    pub fn tag(self) -> u8 {
        match self {
            DataType::U8 => 0,
            DataType::U16 => 1,
            DataType::U32 => 2,
            DataType::U64 => 3,
            DataType::S8 => 4,
            DataType::S16 => 5,
            DataType::S32 => 6,
            DataType::S64 => 7,
            DataType::F32 => 8,
            DataType::F64 => 9,
            DataType::Str(_) => 10,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            DataType::S8 | DataType::S16 | DataType::S32 | DataType::S64
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_unsigned() || self.is_signed()
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(self) -> bool {
        matches!(self, DataType::Str(_))
    }

    pub fn is_compressible(self) -> bool {
        self == DEFAULT_LITERAL
    }

    /// Smallest representable value. Integer types only.
    pub fn min_value(self) -> i128 {
        match self {
            DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64 => 0,
            DataType::S8 => i8::MIN as i128,
            DataType::S16 => i16::MIN as i128,
            DataType::S32 => i32::MIN as i128,
            DataType::S64 => i64::MIN as i128,
            _ => 0,
        }
    }

    /// Largest representable value. Integer types only.
    pub fn max_value(self) -> i128 {
        match self {
            DataType::U8 => u8::MAX as i128,
            DataType::U16 => u16::MAX as i128,
            DataType::U32 => u32::MAX as i128,
            DataType::U64 => u64::MAX as i128,
            DataType::S8 => i8::MAX as i128,
            DataType::S16 => i16::MAX as i128,
            DataType::S32 => i32::MAX as i128,
            DataType::S64 => i64::MAX as i128,
            _ => 0,
        }
    }

    /// Range check for the compression pass. Always false for non-integers:
    /// float and string types never appear in a candidate list.
    pub fn contains(self, value: i128) -> bool {
        self.is_integer() && value >= self.min_value() && value <= self.max_value()
    }

    /// Wrap an integer into this type's range with two's-complement
    /// truncation: mask to the bit width, then re-bias values above the
    /// signed maximum back into the negative range.
    pub fn restrict(self, value: i128) -> i128 {
        if !self.is_integer() {
            return value;
        }
        let bits = self.bit_size();
        let mask = (1i128 << bits) - 1;
        let masked = value & mask;
        if self.is_signed() && masked > self.max_value() {
            masked - (1i128 << bits)
        } else {
            masked
        }
    }

    /// Append the little-endian encoding of an integer value, restricted to
    /// this type's range.
    pub fn encode_int(self, value: i128, out: &mut Vec<u8>) {
        let raw = self.restrict(value) as u64;
        out.extend_from_slice(&raw.to_le_bytes()[..self.byte_size() as usize]);
    }

    /// Append the little-endian encoding of a float value.
    pub fn encode_float(self, value: f64, out: &mut Vec<u8>) {
        match self {
            DataType::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            _ => out.extend_from_slice(&value.to_le_bytes()),
        }
    }

    fn class(self) -> TypeClass {
        if self.is_unsigned() {
            TypeClass::Unsigned
        } else if self.is_signed() {
            TypeClass::Signed
        } else {
            TypeClass::Float
        }
    }

    fn from_class_width(class: TypeClass, width: u32) -> Option<DataType> {
        match (class, width) {
            (TypeClass::Unsigned, 1) => Some(DataType::U8),
            (TypeClass::Unsigned, 2) => Some(DataType::U16),
            (TypeClass::Unsigned, 4) => Some(DataType::U32),
            (TypeClass::Unsigned, 8) => Some(DataType::U64),
            (TypeClass::Signed, 1) => Some(DataType::S8),
            (TypeClass::Signed, 2) => Some(DataType::S16),
            (TypeClass::Signed, 4) => Some(DataType::S32),
            (TypeClass::Signed, 8) => Some(DataType::S64),
            (TypeClass::Float, 4) => Some(DataType::F32),
            (TypeClass::Float, 8) => Some(DataType::F64),
            _ => None,
        }
    }

    /// Result type of binary arithmetic between two numeric types.
    ///
    /// Class: higher merge priority wins, ties favor the right operand.
    /// Width: larger of the two for plain integers; when exactly one float
    /// is involved the float's own width wins regardless of the integer.
    pub fn merge(self, other: DataType) -> Result<DataType, AssemblyError> {
        if !self.is_numeric() || !other.is_numeric() {
            return Err(AssemblyError::new("Expected numeric value"));
        }
        let class = if other.class().priority() >= self.class().priority() {
            other.class()
        } else {
            self.class()
        };
        let width = match (self.is_float(), other.is_float()) {
            (true, false) => self.byte_size(),
            (false, true) => other.byte_size(),
            _ => self.byte_size().max(other.byte_size()),
        };
        DataType::from_class_width(class, width).ok_or_else(|| {
            AssemblyError::new(format!("Cannot merge types {self} and {other}"))
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::U8 => write!(f, "u8"),
            DataType::U16 => write!(f, "u16"),
            DataType::U32 => write!(f, "u32"),
            DataType::U64 => write!(f, "u64"),
            DataType::S8 => write!(f, "s8"),
            DataType::S16 => write!(f, "s16"),
            DataType::S32 => write!(f, "s32"),
            DataType::S64 => write!(f, "s64"),
            DataType::F32 => write!(f, "f32"),
            DataType::F64 => write!(f, "f64"),
            DataType::Str(len) => write!(f, "str({len})"),
        }
    }
}
