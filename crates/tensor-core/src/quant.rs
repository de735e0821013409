// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Quantization parameters and the numeric helpers behind INT8/UINT8
//! storage.
//!
//! Symmetric quantization maps `[-abs_max, abs_max]` onto `[-127, 127]`
//! with a zero point of 0; asymmetric quantization maps `[min, max]`
//! onto `[0, 255]` with a computed zero point. Calibration pipelines live
//! elsewhere — these are the pure numeric primitives they rely on.

use crate::{DType, TensorError};

/// Values with magnitude below this calibrate to a unit scale.
const NEAR_ZERO: f32 = 1e-8;

// ==================== Parameters ====================

/// Quantization granularity: one scale for the whole tensor, or one per
/// channel along a designated axis.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantScheme {
    /// A single scale/zero-point pair for the whole tensor.
    PerTensor { scale: f32, zero_point: i32 },
    /// Parallel scale/zero-point vectors indexed along `axis`.
    /// `zero_points` is empty for symmetric schemes.
    PerChannel {
        scales: Vec<f32>,
        zero_points: Vec<i32>,
        axis: i64,
    },
}

/// Quantization parameters attached to tensors and graph values.
///
/// The scheme is a tagged union, so [`is_per_channel`]
/// (QuantParams::is_per_channel) can never misreport regardless of
/// vector contents.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuantParams {
    scheme: QuantScheme,
    symmetric: bool,
}

impl Default for QuantParams {
    /// Unit scale, zero zero-point, asymmetric.
    fn default() -> Self {
        Self::per_tensor(1.0, 0)
    }
}

impl QuantParams {
    /// Per-tensor parameters with an explicit zero point.
    pub fn per_tensor(scale: f32, zero_point: i32) -> Self {
        Self {
            scheme: QuantScheme::PerTensor { scale, zero_point },
            symmetric: false,
        }
    }

    /// Symmetric per-tensor parameters (zero point fixed at 0).
    pub fn symmetric(scale: f32) -> Self {
        Self {
            scheme: QuantScheme::PerTensor {
                scale,
                zero_point: 0,
            },
            symmetric: true,
        }
    }

    /// Per-channel parameters.
    ///
    /// `zero_points` must parallel `scales`, except that a symmetric
    /// scheme may leave it empty.
    pub fn per_channel(
        scales: Vec<f32>,
        zero_points: Vec<i32>,
        axis: i64,
        symmetric: bool,
    ) -> Result<Self, TensorError> {
        if scales.is_empty() {
            return Err(TensorError::EmptyPerChannel);
        }
        let zero_points_ok = zero_points.len() == scales.len() || (symmetric && zero_points.is_empty());
        if !zero_points_ok {
            return Err(TensorError::LengthMismatch {
                what: "per_channel_zero_points",
                expected: scales.len(),
                actual: zero_points.len(),
            });
        }
        Ok(Self {
            scheme: QuantScheme::PerChannel {
                scales,
                zero_points,
                axis,
            },
            symmetric,
        })
    }

    /// `true` when the scheme carries per-channel vectors.
    pub fn is_per_channel(&self) -> bool {
        matches!(self.scheme, QuantScheme::PerChannel { .. })
    }

    /// Whether zero points are pinned at 0.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// The underlying scheme.
    pub fn scheme(&self) -> &QuantScheme {
        &self.scheme
    }

    /// The per-tensor scale, or the first channel's scale for
    /// per-channel schemes.
    pub fn scale(&self) -> f32 {
        match &self.scheme {
            QuantScheme::PerTensor { scale, .. } => *scale,
            QuantScheme::PerChannel { scales, .. } => scales[0],
        }
    }

    /// The per-tensor zero point, or the first channel's (0 when the
    /// per-channel vector is empty).
    pub fn zero_point(&self) -> i32 {
        match &self.scheme {
            QuantScheme::PerTensor { zero_point, .. } => *zero_point,
            QuantScheme::PerChannel { zero_points, .. } => {
                zero_points.first().copied().unwrap_or(0)
            }
        }
    }

    /// Per-channel scales, if this is a per-channel scheme.
    pub fn per_channel_scales(&self) -> Option<&[f32]> {
        match &self.scheme {
            QuantScheme::PerChannel { scales, .. } => Some(scales),
            QuantScheme::PerTensor { .. } => None,
        }
    }

    /// Per-channel zero points, if this is a per-channel scheme.
    pub fn per_channel_zero_points(&self) -> Option<&[i32]> {
        match &self.scheme {
            QuantScheme::PerChannel { zero_points, .. } => Some(zero_points),
            QuantScheme::PerTensor { .. } => None,
        }
    }

    /// Channel axis, if this is a per-channel scheme.
    pub fn axis(&self) -> Option<i64> {
        match &self.scheme {
            QuantScheme::PerChannel { axis, .. } => Some(*axis),
            QuantScheme::PerTensor { .. } => None,
        }
    }

    /// Checks the parameter invariants: every scale positive, symmetric
    /// schemes with all-zero zero points.
    pub fn validate(&self) -> Result<(), TensorError> {
        match &self.scheme {
            QuantScheme::PerTensor { scale, zero_point } => {
                if *scale <= 0.0 {
                    return Err(TensorError::NonPositiveScale { scale: *scale });
                }
                if self.symmetric && *zero_point != 0 {
                    return Err(TensorError::SymmetricZeroPoint {
                        zero_point: *zero_point,
                    });
                }
            }
            QuantScheme::PerChannel {
                scales,
                zero_points,
                ..
            } => {
                if scales.is_empty() {
                    return Err(TensorError::EmptyPerChannel);
                }
                for &scale in scales {
                    if scale <= 0.0 {
                        return Err(TensorError::NonPositiveScale { scale });
                    }
                }
                if self.symmetric {
                    if let Some(&zp) = zero_points.iter().find(|&&zp| zp != 0) {
                        return Err(TensorError::SymmetricZeroPoint { zero_point: zp });
                    }
                } else if zero_points.len() != scales.len() {
                    return Err(TensorError::LengthMismatch {
                        what: "per_channel_zero_points",
                        expected: scales.len(),
                        actual: zero_points.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

// ==================== Scalar helpers ====================

fn check_scale(scale: f32) -> Result<(), TensorError> {
    if scale <= 0.0 {
        return Err(TensorError::NonPositiveScale { scale });
    }
    Ok(())
}

/// Quantizes a float to `i8` symmetrically: `round(x / scale)` clamped
/// to `[-128, 127]`.
pub fn quantize_symmetric_i8(value: f32, scale: f32) -> Result<i8, TensorError> {
    check_scale(scale)?;
    let scaled = (value / scale).round();
    Ok(scaled.clamp(-128.0, 127.0) as i8)
}

/// Quantizes a float to `u8` asymmetrically: `round(x / scale) +
/// zero_point` clamped to `[0, 255]`.
pub fn quantize_asymmetric_u8(value: f32, scale: f32, zero_point: i32) -> Result<u8, TensorError> {
    check_scale(scale)?;
    let scaled = (value / scale).round() + zero_point as f32;
    Ok(scaled.clamp(0.0, 255.0) as u8)
}

/// Linear inverse of [`quantize_symmetric_i8`].
pub fn dequantize_symmetric_i8(value: i8, scale: f32) -> f32 {
    value as f32 * scale
}

/// Linear inverse of [`quantize_asymmetric_u8`].
pub fn dequantize_asymmetric_u8(value: u8, scale: f32, zero_point: i32) -> f32 {
    (value as f32 - zero_point as f32) * scale
}

// ==================== Buffer helpers ====================

fn check_lengths(expected: usize, actual: usize) -> Result<(), TensorError> {
    if expected != actual {
        return Err(TensorError::LengthMismatch {
            what: "output buffer",
            expected,
            actual,
        });
    }
    Ok(())
}

/// Symmetric `i8` quantization over parallel buffers. The scale is
/// checked once up front; elements cannot fail individually.
pub fn quantize_buffer_symmetric_i8(
    input: &[f32],
    output: &mut [i8],
    scale: f32,
) -> Result<(), TensorError> {
    check_scale(scale)?;
    check_lengths(input.len(), output.len())?;
    let inv_scale = 1.0 / scale;
    for (out, &x) in output.iter_mut().zip(input) {
        *out = (x * inv_scale).round().clamp(-128.0, 127.0) as i8;
    }
    Ok(())
}

/// Asymmetric `u8` quantization over parallel buffers.
pub fn quantize_buffer_asymmetric_u8(
    input: &[f32],
    output: &mut [u8],
    scale: f32,
    zero_point: i32,
) -> Result<(), TensorError> {
    check_scale(scale)?;
    check_lengths(input.len(), output.len())?;
    let inv_scale = 1.0 / scale;
    let zp = zero_point as f32;
    for (out, &x) in output.iter_mut().zip(input) {
        *out = (x * inv_scale + zp).round().clamp(0.0, 255.0) as u8;
    }
    Ok(())
}

/// Symmetric `i8` dequantization over parallel buffers.
pub fn dequantize_buffer_symmetric_i8(
    input: &[i8],
    output: &mut [f32],
    scale: f32,
) -> Result<(), TensorError> {
    check_lengths(input.len(), output.len())?;
    for (out, &q) in output.iter_mut().zip(input) {
        *out = q as f32 * scale;
    }
    Ok(())
}

/// Asymmetric `u8` dequantization over parallel buffers.
pub fn dequantize_buffer_asymmetric_u8(
    input: &[u8],
    output: &mut [f32],
    scale: f32,
    zero_point: i32,
) -> Result<(), TensorError> {
    check_lengths(input.len(), output.len())?;
    let zp = zero_point as f32;
    for (out, &q) in output.iter_mut().zip(input) {
        *out = (q as f32 - zp) * scale;
    }
    Ok(())
}

// ==================== Parameter calculation ====================

/// Calibrates symmetric parameters from an observed `[min, max]` range.
///
/// `abs_max` below `1e-8` yields a unit scale. `I8` maps to `[-127, 127]`
/// (leaving -128 unused); `U8` maps to `[0, 255]`.
pub fn calculate_symmetric_quant_params(
    min_val: f32,
    max_val: f32,
    target: DType,
) -> Result<QuantParams, TensorError> {
    if !target.is_quantized() {
        return Err(TensorError::UnsupportedDType {
            op: "symmetric quantization",
            dtype: target,
        });
    }

    let abs_max = min_val.abs().max(max_val.abs());
    if abs_max < NEAR_ZERO {
        return Ok(QuantParams::symmetric(1.0));
    }

    let scale = if target == DType::I8 {
        abs_max / 127.0
    } else {
        abs_max / 255.0
    };
    Ok(QuantParams::symmetric(scale))
}

/// Calibrates asymmetric `U8` parameters from an observed `[min, max]`
/// range, mapping it onto `[0, 255]`.
pub fn calculate_asymmetric_quant_params(
    min_val: f32,
    max_val: f32,
    target: DType,
) -> Result<QuantParams, TensorError> {
    if target != DType::U8 {
        return Err(TensorError::UnsupportedDType {
            op: "asymmetric quantization",
            dtype: target,
        });
    }
    if min_val >= max_val {
        return Err(TensorError::InvalidQuantRange {
            min: min_val,
            max: max_val,
        });
    }

    let range = max_val - min_val;
    if range < NEAR_ZERO {
        // Nearly constant values.
        return Ok(QuantParams::per_tensor(1.0, (-min_val).round() as i32));
    }

    let scale = range / 255.0;
    let zero_point = ((-min_val / scale).round() as i32).clamp(0, 255);
    Ok(QuantParams::per_tensor(scale, zero_point))
}

/// Calibrates per-channel parameters from parallel per-channel ranges.
///
/// Zero points are populated only for non-symmetric schemes.
pub fn calculate_per_channel_quant_params(
    channel_min: &[f32],
    channel_max: &[f32],
    axis: i64,
    symmetric: bool,
    target: DType,
) -> Result<QuantParams, TensorError> {
    if channel_min.len() != channel_max.len() {
        return Err(TensorError::LengthMismatch {
            what: "channel_max",
            expected: channel_min.len(),
            actual: channel_max.len(),
        });
    }
    if channel_min.is_empty() {
        return Err(TensorError::EmptyPerChannel);
    }

    let mut scales = Vec::with_capacity(channel_min.len());
    let mut zero_points = Vec::new();

    for (&min, &max) in channel_min.iter().zip(channel_max) {
        if symmetric {
            let params = calculate_symmetric_quant_params(min, max, target)?;
            scales.push(params.scale());
        } else {
            let params = calculate_asymmetric_quant_params(min, max, target)?;
            scales.push(params.scale());
            zero_points.push(params.zero_point());
        }
    }

    QuantParams::per_channel(scales, zero_points, axis, symmetric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_symmetric_basic() {
        assert_eq!(quantize_symmetric_i8(0.7, 0.5).unwrap(), 1);
        assert_eq!(quantize_symmetric_i8(0.0, 0.5).unwrap(), 0);
        assert_eq!(quantize_symmetric_i8(-0.7, 0.5).unwrap(), -1);
    }

    #[test]
    fn test_quantize_symmetric_clamps() {
        assert_eq!(quantize_symmetric_i8(1000.0, 0.5).unwrap(), 127);
        assert_eq!(quantize_symmetric_i8(-1000.0, 0.5).unwrap(), -128);
    }

    #[test]
    fn test_quantize_rejects_bad_scale() {
        assert!(quantize_symmetric_i8(1.0, 0.0).is_err());
        assert!(quantize_symmetric_i8(1.0, -0.5).is_err());
        assert!(quantize_asymmetric_u8(1.0, 0.0, 0).is_err());
    }

    #[test]
    fn test_dequantize() {
        assert_eq!(dequantize_symmetric_i8(1, 0.5), 0.5);
        assert_eq!(dequantize_symmetric_i8(-4, 0.25), -1.0);
        assert_eq!(dequantize_asymmetric_u8(128, 0.1, 128), 0.0);
    }

    #[test]
    fn test_asymmetric_roundtrip_near() {
        let scale = 0.05;
        let zp = 128;
        for &x in &[-3.0f32, -0.42, 0.0, 1.7, 3.0] {
            let q = quantize_asymmetric_u8(x, scale, zp).unwrap();
            let back = dequantize_asymmetric_u8(q, scale, zp);
            assert!((back - x).abs() <= scale / 2.0 + 1e-6, "x={x} back={back}");
        }
    }

    #[test]
    fn test_symmetric_roundtrip_near() {
        let scale = 0.02;
        for &x in &[-2.0f32, -0.013, 0.0, 0.5, 2.0] {
            let q = quantize_symmetric_i8(x, scale).unwrap();
            let back = dequantize_symmetric_i8(q, scale);
            assert!((back - x).abs() <= scale / 2.0 + 1e-6, "x={x} back={back}");
        }
    }

    #[test]
    fn test_buffer_roundtrip() {
        let input = [0.1f32, -0.5, 0.9, 0.0];
        let mut quantized = [0i8; 4];
        let mut restored = [0f32; 4];

        quantize_buffer_symmetric_i8(&input, &mut quantized, 0.01).unwrap();
        dequantize_buffer_symmetric_i8(&quantized, &mut restored, 0.01).unwrap();
        for (x, back) in input.iter().zip(&restored) {
            assert!((x - back).abs() <= 0.005 + 1e-6);
        }
    }

    #[test]
    fn test_buffer_asymmetric() {
        let input = [0.0f32, 1.0, 2.0];
        let mut quantized = [0u8; 3];
        quantize_buffer_asymmetric_u8(&input, &mut quantized, 0.5, 10).unwrap();
        assert_eq!(quantized, [10, 12, 14]);

        let mut restored = [0f32; 3];
        dequantize_buffer_asymmetric_u8(&quantized, &mut restored, 0.5, 10).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn test_buffer_length_mismatch() {
        let input = [0.0f32; 4];
        let mut output = [0i8; 3];
        assert!(quantize_buffer_symmetric_i8(&input, &mut output, 1.0).is_err());
    }

    #[test]
    fn test_calculate_symmetric_i8() {
        let params = calculate_symmetric_quant_params(-1.0, 1.0, DType::I8).unwrap();
        assert!((params.scale() - 1.0 / 127.0).abs() < 1e-9);
        assert_eq!(params.zero_point(), 0);
        assert!(params.is_symmetric());
        assert!(!params.is_per_channel());
    }

    #[test]
    fn test_calculate_symmetric_u8() {
        let params = calculate_symmetric_quant_params(-2.0, 0.5, DType::U8).unwrap();
        assert!((params.scale() - 2.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_symmetric_near_zero() {
        let params = calculate_symmetric_quant_params(-1e-9, 1e-9, DType::I8).unwrap();
        assert_eq!(params.scale(), 1.0);
    }

    #[test]
    fn test_calculate_symmetric_rejects_non_quantized() {
        assert!(calculate_symmetric_quant_params(-1.0, 1.0, DType::F32).is_err());
    }

    #[test]
    fn test_calculate_asymmetric() {
        let params = calculate_asymmetric_quant_params(-1.0, 3.0, DType::U8).unwrap();
        assert!((params.scale() - 4.0 / 255.0).abs() < 1e-9);
        assert_eq!(params.zero_point(), 64);
        assert!(!params.is_symmetric());
    }

    #[test]
    fn test_calculate_asymmetric_rejects_bad_range() {
        assert!(calculate_asymmetric_quant_params(1.0, 1.0, DType::U8).is_err());
        assert!(calculate_asymmetric_quant_params(2.0, -1.0, DType::U8).is_err());
        assert!(calculate_asymmetric_quant_params(-1.0, 1.0, DType::I8).is_err());
    }

    #[test]
    fn test_calculate_per_channel_symmetric() {
        let params = calculate_per_channel_quant_params(
            &[-1.0, -2.0, -0.5],
            &[1.0, 2.0, 0.5],
            0,
            true,
            DType::I8,
        )
        .unwrap();
        assert!(params.is_per_channel());
        assert!(params.is_symmetric());
        let scales = params.per_channel_scales().unwrap();
        assert_eq!(scales.len(), 3);
        assert!((scales[1] - 2.0 / 127.0).abs() < 1e-9);
        // Symmetric schemes leave the zero-point vector empty.
        assert!(params.per_channel_zero_points().unwrap().is_empty());
        assert_eq!(params.axis(), Some(0));
    }

    #[test]
    fn test_calculate_per_channel_asymmetric() {
        let params = calculate_per_channel_quant_params(
            &[-1.0, 0.0],
            &[1.0, 4.0],
            1,
            false,
            DType::U8,
        )
        .unwrap();
        let zps = params.per_channel_zero_points().unwrap();
        assert_eq!(zps.len(), 2);
        assert_eq!(params.per_channel_scales().unwrap().len(), 2);
    }

    #[test]
    fn test_calculate_per_channel_rejects_empty_and_mismatch() {
        assert!(calculate_per_channel_quant_params(&[], &[], 0, true, DType::I8).is_err());
        assert!(
            calculate_per_channel_quant_params(&[0.0], &[1.0, 2.0], 0, true, DType::I8).is_err()
        );
    }

    #[test]
    fn test_params_validate() {
        assert!(QuantParams::per_tensor(0.5, 3).validate().is_ok());
        assert!(QuantParams::per_tensor(0.0, 0).validate().is_err());
        assert!(QuantParams::symmetric(0.5).validate().is_ok());

        let bad = QuantParams::per_channel(vec![0.5, -0.1], vec![0, 0], 0, false).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_params_serde_roundtrip() {
        let params =
            QuantParams::per_channel(vec![0.1, 0.2], vec![1, 2], 1, false).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: QuantParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
