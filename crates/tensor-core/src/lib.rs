// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Tensor metadata and view algebra for the inference runtime.
//!
//! This crate provides:
//! - [`DType`] — supported element types with byte sizes, trait
//!   predicates, promotion, and cast admissibility.
//! - [`Shape`] — signed-64 dimension vectors with broadcast, squeeze,
//!   reshape validation, and stride derivation.
//! - [`Tensor`] — shape + dtype + byte strides over raw storage, with
//!   non-owning slice/reshape/transpose views and allocator-backed
//!   ownership.
//! - [`QuantParams`] and the quantize/dequantize helpers behind
//!   INT8/UINT8 storage.
//!
//! # Design Goals
//! - Views are zero-copy; deep copies are explicit.
//! - Storage release always mirrors the allocation path
//!   (see [`memory_manager::Allocator`]).
//! - Clean error types via `thiserror`.

mod dtype;
mod error;
mod quant;
mod shape;
mod tensor;

pub use dtype::{DType, Element};
pub use error::TensorError;
pub use quant::{
    calculate_asymmetric_quant_params, calculate_per_channel_quant_params,
    calculate_symmetric_quant_params, dequantize_asymmetric_u8, dequantize_buffer_asymmetric_u8,
    dequantize_buffer_symmetric_i8, dequantize_symmetric_i8, quantize_asymmetric_u8,
    quantize_buffer_asymmetric_u8, quantize_buffer_symmetric_i8, quantize_symmetric_i8,
    QuantParams, QuantScheme,
};
pub use shape::Shape;
pub use tensor::Tensor;
