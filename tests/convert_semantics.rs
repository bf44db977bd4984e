//! Integration tests for conversion semantics.
//!
//! These tests pin down the observable behavior of `ArrayPool::convert`:
//! identity and type-only conversions, sub-region selection, binning as an
//! unnormalized sum, axis reversal, shape-metadata composition and the
//! ColorMode attribute rewrite.

use aperture::{ArrayPool, AttrValue, ColorMode, DataType, Dimension};

/// Fill a 4x3 UInt8 frame with `value[i0][i1] = 10*i0 + i1` (axis 0 is the
/// fastest-varying axis, so element (i0, i1) lives at `i0 + 4*i1`).
fn sample_frame(pool: &ArrayPool) -> aperture::Array {
    let mut frame = pool.alloc(&[4, 3], DataType::UInt8, 0).unwrap();
    {
        let data = frame.elements_mut::<u8>().unwrap();
        for i0 in 0..4 {
            for i1 in 0..3 {
                data[i0 + 4 * i1] = (10 * i0 + i1) as u8;
            }
        }
    }
    frame.set_unique_id(17);
    frame.set_timestamp(2.5);
    frame
}

fn identity_template(frame: &aperture::Array) -> Vec<Dimension> {
    frame.dims().iter().map(|d| Dimension::new(d.size)).collect()
}

// ============================================================================
// Identity and Type-Only Conversion
// ============================================================================

/// Converting with default descriptors and the same type is an
/// element-wise identical copy.
#[test]
fn test_identity_conversion() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);

    let out = pool
        .convert(&frame, &identity_template(&frame), DataType::UInt8)
        .unwrap();

    assert_eq!(out.unique_id(), 17);
    assert_eq!(out.timestamp(), 2.5);
    assert_eq!(out.dims(), frame.dims());
    assert_eq!(
        out.elements::<u8>().unwrap(),
        frame.elements::<u8>().unwrap()
    );
}

/// Same shape, different type: a flat per-element cast.
#[test]
fn test_type_only_conversion() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);

    let out = pool
        .convert(&frame, &identity_template(&frame), DataType::Float64)
        .unwrap();

    assert_eq!(out.data_type(), DataType::Float64);
    let expected: Vec<f64> = frame
        .elements::<u8>()
        .unwrap()
        .iter()
        .map(|&v| v as f64)
        .collect();
    assert_eq!(out.elements::<f64>().unwrap(), expected.as_slice());
}

/// Float payloads truncate toward zero when cast to integers.
#[test]
fn test_float_to_int_truncates_toward_zero() {
    let pool = ArrayPool::default();
    let mut frame = pool.alloc(&[4], DataType::Float32, 0).unwrap();
    frame
        .elements_mut::<f32>()
        .unwrap()
        .copy_from_slice(&[2.9, -2.9, 0.1, -0.1]);

    let out = pool
        .convert(&frame, &identity_template(&frame), DataType::Int32)
        .unwrap();
    assert_eq!(out.elements::<i32>().unwrap(), &[2, -2, 0, 0]);
}

// ============================================================================
// Binning / Offset / Reverse
// ============================================================================

/// Binning pairs of rows of a 4x3 frame sums adjacent elements along
/// axis 0 into a [2, 3] output.
#[test]
fn test_binning_sums_adjacent_elements() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);

    let template = [
        Dimension {
            size: 4,
            offset: 0,
            binning: 2,
            reverse: false,
        },
        Dimension::new(3),
    ];
    let out = pool.convert(&frame, &template, DataType::UInt16).unwrap();

    assert_eq!(out.dims()[0].size, 2);
    assert_eq!(out.dims()[1].size, 3);
    // Row pairs summed: [0+10, 20+30] per column.
    assert_eq!(
        out.elements::<u16>().unwrap(),
        &[10, 50, 12, 52, 14, 54]
    );
}

/// Binning accumulates as a sum, not a mean, including into floats.
#[test]
fn test_binning_is_an_unnormalized_sum() {
    let pool = ArrayPool::default();
    let mut frame = pool.alloc(&[6], DataType::UInt8, 0).unwrap();
    frame
        .elements_mut::<u8>()
        .unwrap()
        .copy_from_slice(&[1, 2, 3, 4, 5, 6]);

    let template = [Dimension {
        size: 6,
        offset: 0,
        binning: 3,
        reverse: false,
    }];
    let out = pool.convert(&frame, &template, DataType::Float32).unwrap();
    assert_eq!(out.elements::<f32>().unwrap(), &[6.0, 15.0]);
}

/// Reversing an axis flips the traversal of a 1x4 payload.
#[test]
fn test_reverse_flips_axis() {
    let pool = ArrayPool::default();
    let mut frame = pool.alloc(&[1, 4], DataType::Int8, 0).unwrap();
    frame
        .elements_mut::<i8>()
        .unwrap()
        .copy_from_slice(&[1, 2, 3, 4]);

    let template = [
        Dimension::new(1),
        Dimension {
            size: 4,
            offset: 0,
            binning: 1,
            reverse: true,
        },
    ];
    let out = pool.convert(&frame, &template, DataType::Int8).unwrap();
    assert_eq!(out.elements::<i8>().unwrap(), &[4, 3, 2, 1]);
}

/// `reverse` on axis k yields `output[.., i, ..] = input[.., size-1-i, ..]`.
#[test]
fn test_reverse_on_inner_axis_of_2d() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);

    let template = [
        Dimension {
            size: 4,
            offset: 0,
            binning: 1,
            reverse: true,
        },
        Dimension::new(3),
    ];
    let out = pool.convert(&frame, &template, DataType::UInt8).unwrap();

    let input = frame.elements::<u8>().unwrap();
    let output = out.elements::<u8>().unwrap();
    for i0 in 0..4 {
        for i1 in 0..3 {
            assert_eq!(output[i0 + 4 * i1], input[(3 - i0) + 4 * i1]);
        }
    }
}

/// `offset = o` on axis k yields `output[.., i, ..] = input[.., o+i, ..]`.
#[test]
fn test_offset_selects_sub_region() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);

    let template = [
        Dimension {
            size: 2,
            offset: 1,
            binning: 1,
            reverse: false,
        },
        Dimension::new(3),
    ];
    let out = pool.convert(&frame, &template, DataType::UInt8).unwrap();

    assert_eq!(out.dims()[0].size, 2);
    let input = frame.elements::<u8>().unwrap();
    let output = out.elements::<u8>().unwrap();
    for i0 in 0..2 {
        for i1 in 0..3 {
            assert_eq!(output[i0 + 2 * i1], input[(i0 + 1) + 4 * i1]);
        }
    }
}

// ============================================================================
// Shape Metadata Composition
// ============================================================================

/// The output's descriptors compose the input's with the template:
/// offsets add, binnings multiply, reversals XOR.
#[test]
fn test_descriptor_composition_across_conversions() {
    let pool = ArrayPool::default();
    let mut frame = pool.alloc(&[8], DataType::UInt8, 0).unwrap();
    frame
        .elements_mut::<u8>()
        .unwrap()
        .copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);

    let first = [Dimension {
        size: 6,
        offset: 1,
        binning: 2,
        reverse: false,
    }];
    let stage1 = pool.convert(&frame, &first, DataType::UInt8).unwrap();
    assert_eq!(stage1.dims()[0].size, 3);
    assert_eq!(stage1.dims()[0].offset, 1);
    assert_eq!(stage1.dims()[0].binning, 2);
    assert!(!stage1.dims()[0].reverse);
    assert_eq!(stage1.elements::<u8>().unwrap(), &[5, 9, 13]);

    let second = [Dimension {
        size: 2,
        offset: 1,
        binning: 1,
        reverse: true,
    }];
    let stage2 = pool.convert(&stage1, &second, DataType::UInt8).unwrap();
    assert_eq!(stage2.dims()[0].size, 2);
    assert_eq!(stage2.dims()[0].offset, 2);
    assert_eq!(stage2.dims()[0].binning, 2);
    assert!(stage2.dims()[0].reverse);
    assert_eq!(stage2.elements::<u8>().unwrap(), &[13, 9]);
}

// ============================================================================
// Attributes Through Conversion
// ============================================================================

/// Attributes ride along through convert, in order, values and
/// descriptions included.
#[test]
fn test_attributes_are_copied_through_convert() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);
    frame
        .attributes()
        .add_described("Exposure", "integration time", 0.05f64)
        .unwrap();
    frame.attributes().add_value("Camera", "sim-1024").unwrap();

    let out = pool
        .convert(&frame, &identity_template(&frame), DataType::UInt16)
        .unwrap();

    let attrs = out.attributes();
    let names: Vec<String> = attrs.iter().map(|a| a.name().to_string()).collect();
    assert_eq!(names, vec!["Exposure", "Camera"]);
    assert_eq!(attrs.find("exposure").unwrap().get::<f64>().unwrap(), 0.05);
    assert_eq!(
        attrs.find("exposure").unwrap().description(),
        Some("integration time")
    );
    assert_eq!(attrs.find("camera").unwrap().as_str().unwrap(), "sim-1024");
}

/// An RGB1 frame whose color axis is collapsed by the conversion becomes
/// Mono.
#[test]
fn test_color_mode_collapses_to_mono() {
    let pool = ArrayPool::default();
    let frame = pool.alloc(&[3, 4], DataType::UInt8, 0).unwrap();
    frame
        .attributes()
        .add_value("ColorMode", AttrValue::Int32(ColorMode::Rgb1.as_i32()))
        .unwrap();

    // Select a single color plane: axis 0 shrinks from 3 to 1.
    let template = [
        Dimension {
            size: 1,
            offset: 0,
            binning: 1,
            reverse: false,
        },
        Dimension::new(4),
    ];
    let out = pool.convert(&frame, &template, DataType::UInt8).unwrap();

    assert_eq!(out.dims()[0].size, 1);
    let attrs = out.attributes();
    let mode = attrs.find("ColorMode").unwrap().get::<i32>().unwrap();
    assert_eq!(ColorMode::from_i32(mode), Some(ColorMode::Mono));
}

/// A conversion that keeps the color axis at 3 samples leaves the mode
/// alone.
#[test]
fn test_color_mode_survives_when_axis_is_kept() {
    let pool = ArrayPool::default();
    let frame = pool.alloc(&[3, 4], DataType::UInt8, 0).unwrap();
    frame
        .attributes()
        .add_value("ColorMode", AttrValue::Int32(ColorMode::Rgb1.as_i32()))
        .unwrap();

    let out = pool
        .convert(&frame, &identity_template(&frame), DataType::UInt16)
        .unwrap();

    let attrs = out.attributes();
    let mode = attrs.find("ColorMode").unwrap().get::<i32>().unwrap();
    assert_eq!(ColorMode::from_i32(mode), Some(ColorMode::Rgb1));
}

// ============================================================================
// Round Trips
// ============================================================================

/// `copy` with data reproduces identity, shape, payload and attributes.
#[test]
fn test_copy_round_trip_identity() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);
    frame.attributes().add_value("gain", 4i32).unwrap();

    let copy = pool.copy(&frame, true).unwrap();

    assert_eq!(copy.unique_id(), frame.unique_id());
    assert_eq!(copy.timestamp(), frame.timestamp());
    assert_eq!(copy.data_type(), frame.data_type());
    assert_eq!(copy.dims(), frame.dims());
    assert_eq!(
        copy.elements::<u8>().unwrap(),
        frame.elements::<u8>().unwrap()
    );
    assert_eq!(
        copy.attributes().find("gain").unwrap().get::<i32>().unwrap(),
        4
    );
}

/// Conversion allocates from the same pool and participates in recycling.
#[test]
fn test_convert_output_returns_to_the_pool() {
    let pool = ArrayPool::default();
    let frame = sample_frame(&pool);

    let out = pool
        .convert(&frame, &identity_template(&frame), DataType::UInt8)
        .unwrap();
    assert_eq!(pool.stats().num_buffers, 2);

    out.release().unwrap();
    frame.release().unwrap();
    assert_eq!(pool.stats().num_free, 2);
}
