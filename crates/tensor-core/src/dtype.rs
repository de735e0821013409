// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Supported tensor element data types.

/// Enumerates the element types a [`crate::Tensor`] can hold.
///
/// The runtime uses `DType` to decide memory layout, alignment, and which
/// compute kernels to dispatch. `Unknown` is the state of a value whose
/// type has not been inferred yet; it has no size and supports no
/// operation beyond inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Placeholder for an uninferred type.
    Unknown,
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 8-bit signed integer (quantised weights/activations).
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 8-bit unsigned integer (quantised activations).
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// Boolean (one byte per element).
    Bool,
}

impl DType {
    /// Returns the size of a single element in bytes. `Unknown` has size 0.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F16 | DType::I16 | DType::U16 => 2,
            DType::I64 | DType::U64 => 8,
            DType::I8 | DType::U8 | DType::Bool => 1,
            DType::Unknown => 0,
        }
    }

    /// Returns a human-readable label for this data type.
    pub fn as_str(self) -> &'static str {
        match self {
            DType::Unknown => "unknown",
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::Bool => "bool",
        }
    }

    /// `true` for the floating-point types (`F32`, `F16`).
    pub fn is_floating(self) -> bool {
        matches!(self, DType::F32 | DType::F16)
    }

    /// `true` for the integer types (signed and unsigned, excluding
    /// `Bool`).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::I8
                | DType::I16
                | DType::I32
                | DType::I64
                | DType::U8
                | DType::U16
                | DType::U32
                | DType::U64
        )
    }

    /// `true` for the signed integer types.
    pub fn is_signed(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::I64)
    }

    /// `true` for the unsigned integer types and `Bool`.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 | DType::Bool
        )
    }

    /// `true` only for `Bool`.
    pub fn is_bool(self) -> bool {
        matches!(self, DType::Bool)
    }

    /// `true` for the quantised storage types (`I8`, `U8`).
    pub fn is_quantized(self) -> bool {
        matches!(self, DType::I8 | DType::U8)
    }

    /// `true` for every type except `Unknown`.
    pub fn is_valid(self) -> bool {
        !matches!(self, DType::Unknown)
    }

    /// Preferred allocation alignment for buffers of this type: wide
    /// enough for SIMD loads on 4-byte-and-up elements, 16 otherwise.
    pub fn alignment_requirement(self) -> usize {
        if self.size_bytes() >= 4 {
            32
        } else {
            16
        }
    }

    /// Promotion precedence. Higher wins in [`DType::promote`].
    fn precedence(self) -> u32 {
        match self {
            DType::F32 => 110,
            DType::F16 => 100,
            DType::I64 => 90,
            DType::U64 => 85,
            DType::I32 => 80,
            DType::U32 => 75,
            DType::I16 => 70,
            DType::U16 => 65,
            DType::I8 => 60,
            DType::U8 => 55,
            DType::Bool => 10,
            DType::Unknown => 0,
        }
    }

    /// Returns the common type two operands promote to.
    ///
    /// Precedence: `F32 > F16 > I64 > U64 > I32 > U32 > I16 > U16 > I8 >
    /// U8 > Bool`. Promoting with `Unknown` yields `Unknown`.
    pub fn promote(a: DType, b: DType) -> DType {
        if a == b {
            return a;
        }
        if a == DType::Unknown || b == DType::Unknown {
            return DType::Unknown;
        }
        if a.precedence() > b.precedence() {
            a
        } else {
            b
        }
    }

    /// Returns whether a cast from `from` to `to` is admissible:
    /// identity, float↔float, int↔int, float↔int, and `Bool` to or from
    /// any non-`Unknown` type.
    pub fn can_cast(from: DType, to: DType) -> bool {
        if from == to {
            return true;
        }
        if from.is_floating() && to.is_floating() {
            return true;
        }
        if from.is_integer() && to.is_integer() {
            return true;
        }
        if from.is_floating() && to.is_integer() {
            return true;
        }
        if from.is_integer() && to.is_floating() {
            return true;
        }
        if from == DType::Bool {
            return to != DType::Unknown;
        }
        if to == DType::Bool && from != DType::Unknown {
            return true;
        }
        false
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps Rust scalar types to their [`DType`], enabling typed slice access
/// on tensors.
///
/// `u16` maps to [`DType::U16`]; `F16` tensors are viewed through their
/// raw `u16` bit pattern.
pub trait Element: Copy + Default + 'static {
    /// The dtype this Rust type stores.
    const DTYPE: DType;

    /// Whether a tensor of `dtype` may be viewed as a slice of `Self`.
    fn matches(dtype: DType) -> bool {
        dtype == Self::DTYPE
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
}
impl Element for i8 {
    const DTYPE: DType = DType::I8;
}
impl Element for i16 {
    const DTYPE: DType = DType::I16;
}
impl Element for i32 {
    const DTYPE: DType = DType::I32;
}
impl Element for i64 {
    const DTYPE: DType = DType::I64;
}
impl Element for u8 {
    const DTYPE: DType = DType::U8;
}
impl Element for u16 {
    const DTYPE: DType = DType::U16;

    // F16 payloads are u16 bit patterns.
    fn matches(dtype: DType) -> bool {
        dtype == DType::U16 || dtype == DType::F16
    }
}
impl Element for u32 {
    const DTYPE: DType = DType::U32;
}
impl Element for u64 {
    const DTYPE: DType = DType::U64;
}
