// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Typed literal values.

use std::fmt;

use crate::core::datatype::{self, DataType};
use crate::core::error::AssemblyError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i128),
    Float(f64),
}

/// A numeric literal carrying its VM type.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberConstant {
    value: Number,
    dtype: DataType,
}

impl NumberConstant {
    pub fn new(value: Number, dtype: DataType) -> Self {
        Self { value, dtype }
    }

    /// Integer literal with the default compressible type; literals outside
    /// the s32 range fall back to s64.
    pub fn from_int_literal(value: i128) -> Result<Self, AssemblyError> {
        for dtype in [datatype::DEFAULT_LITERAL, DataType::S64] {
            if dtype.contains(value) {
                return Ok(Self::new(Number::Int(value), dtype));
            }
        }
        Err(AssemblyError::new(format!("Integer out of range: {value}")))
    }

    pub fn from_float_literal(value: f64) -> Self {
        Self::new(Number::Float(value), datatype::DEFAULT_FLOAT)
    }

    pub fn value(&self) -> Number {
        self.value
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn is_float(&self) -> bool {
        matches!(self.value, Number::Float(_))
    }

    pub fn int_value(&self) -> Option<i128> {
        match self.value {
            Number::Int(value) => Some(value),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self.value {
            Number::Int(value) => value as f64,
            Number::Float(value) => value,
        }
    }

    /// Change the constant's type, wrapping integer values into the new
    /// range and converting between the integer and float domains.
    pub fn retype(&self, dtype: DataType) -> Result<NumberConstant, AssemblyError> {
        if dtype.is_integer() {
            let raw = match self.value {
                Number::Int(value) => value,
                Number::Float(value) => value as i128,
            };
            Ok(NumberConstant::new(Number::Int(dtype.restrict(raw)), dtype))
        } else if dtype.is_float() {
            Ok(NumberConstant::new(Number::Float(self.as_f64()), dtype))
        } else {
            Err(AssemblyError::new(format!(
                "Cannot convert number to {dtype}"
            )))
        }
    }

    /// Replace the type with the first candidate whose range contains the
    /// value. Candidates are supplied smallest first; the value itself is
    /// untouched.
    pub fn compress(&self, candidates: &[DataType]) -> Result<NumberConstant, AssemblyError> {
        let value = match self.value {
            Number::Int(value) => value,
            Number::Float(_) => {
                return Err(AssemblyError::new("Expected integer value"));
            }
        };
        for &dtype in candidates {
            if dtype.contains(value) {
                return Ok(NumberConstant::new(self.value, dtype));
            }
        }
        Err(AssemblyError::new(format!("Integer out of range: {value}")))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self.value {
            Number::Int(value) => self.dtype.encode_int(value, out),
            Number::Float(value) => self.dtype.encode_float(value, out),
        }
    }
}

impl fmt::Display for NumberConstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Number::Int(value) => write!(f, "{value}"),
            Number::Float(value) => write!(f, "{value}"),
        }
    }
}

/// A string literal. Encodes as its bytes plus a terminating NUL, which is
/// also counted in the type's length.
#[derive(Debug, Clone, PartialEq)]
pub struct StringConstant {
    text: String,
}

impl StringConstant {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dtype(&self) -> DataType {
        DataType::Str(self.text.len() as u32 + 1)
    }

    pub fn concat(&self, other: &StringConstant) -> StringConstant {
        StringConstant::new(format!("{}{}", self.text, other.text))
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.text.as_bytes());
        out.push(0);
    }
}

/// A typed literal: number or string.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Number(NumberConstant),
    Str(StringConstant),
}

impl Constant {
    pub fn int(value: i128, dtype: DataType) -> Constant {
        Constant::Number(NumberConstant::new(Number::Int(value), dtype))
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Constant::Number(number) => number.dtype(),
            Constant::Str(string) => string.dtype(),
        }
    }

    pub fn as_number(&self) -> Option<&NumberConstant> {
        match self {
            Constant::Number(number) => Some(number),
            Constant::Str(_) => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringConstant> {
        match self {
            Constant::Str(string) => Some(string),
            Constant::Number(_) => None,
        }
    }

    pub fn int_value(&self) -> Option<i128> {
        self.as_number().and_then(NumberConstant::int_value)
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Constant::Number(number) => number.encode(out),
            Constant::Str(string) => string.encode(out),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(number) => write!(f, "{number}"),
            Constant::Str(string) => write!(f, "\"{}\"", string.text()),
        }
    }
}
