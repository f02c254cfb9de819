use rayon::prelude::*;
use yuv::{YuvPackedImage, yuyv422_to_bgra};

use super::buffer::PixelBuffer;
use crate::{
    config::{ColorConversion, InfraredTuning},
    error::FrameError,
    types::{BYTES_PER_PIXEL, ColorFormat, ColorFrame, DepthFrame, InfraredFrame},
};

/// Depth values are spread over this many gray levels.
const DEPTH_LEVELS: u16 = 256;

pub fn infrared_intensity(sample: u16, tuning: &InfraredTuning) -> u8 {
    let mut ratio = sample as f32 / tuning.source_max;
    ratio /= tuning.scene_average * tuning.scene_std_devs;
    ratio = ratio.min(tuning.output_max);
    ratio = ratio.max(tuning.output_min);
    // Truncating cast, not rounding.
    (ratio * 255.0) as u8
}

pub fn infrared_to_bgra(
    frame: &InfraredFrame,
    tuning: &InfraredTuning,
    buffer: &mut PixelBuffer,
) -> Result<(), FrameError> {
    let descriptor = buffer.descriptor();
    FrameError::check_dimensions(descriptor, frame.width, frame.height)?;
    let pixel_count = descriptor.pixel_count();
    FrameError::check_len(pixel_count, frame.samples.len())?;

    buffer
        .as_mut_slice()
        .par_chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(frame.samples.par_iter())
        .for_each(|(dst, &sample)| {
            write_gray(dst, infrared_intensity(sample, tuning));
        });

    Ok(())
}

/// Millimeters represented by one gray level, `max / 256`.
pub fn depth_per_byte(min: u16, max: u16) -> Result<u16, FrameError> {
    let per_byte = max / DEPTH_LEVELS;
    if per_byte == 0 {
        return Err(FrameError::DegenerateBounds { min, max });
    }
    Ok(per_byte)
}

pub fn depth_intensity(depth: u16, min: u16, max: u16, per_byte: u16) -> u8 {
    if per_byte == 0 || depth < min || depth > max {
        return 0;
    }
    // Samples close to `max` can exceed 255 after the integer division.
    (depth / per_byte).min(u8::MAX as u16) as u8
}

/// Renders depth as gray, near is dark. Samples outside the reliable range
/// are black. Degenerate bounds render the whole frame black instead of
/// failing.
pub fn depth_to_bgra(frame: &DepthFrame, buffer: &mut PixelBuffer) -> Result<(), FrameError> {
    let descriptor = buffer.descriptor();
    FrameError::check_dimensions(descriptor, frame.width, frame.height)?;
    let pixel_count = descriptor.pixel_count();
    FrameError::check_len(pixel_count, frame.samples.len())?;

    let min = frame.min_reliable_distance;
    let max = frame.max_reliable_distance;
    let per_byte = depth_per_byte(min, max).unwrap_or_else(|err| {
        log::warn!("rendering blank depth frame: {err}");
        0
    });

    buffer
        .as_mut_slice()
        .par_chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(frame.samples.par_iter())
        .for_each(|(dst, &depth)| {
            write_gray(dst, depth_intensity(depth, min, max, per_byte));
        });

    Ok(())
}

pub fn color_to_bgra(
    frame: &ColorFrame,
    conversion: &ColorConversion,
    buffer: &mut PixelBuffer,
) -> Result<(), FrameError> {
    let descriptor = buffer.descriptor();
    FrameError::check_dimensions(descriptor, frame.width, frame.height)?;
    FrameError::check_len(
        frame.format.frame_len(frame.width, frame.height),
        frame.data.len(),
    )?;
    let data = frame.data.as_slice();

    match frame.format {
        ColorFormat::Bgra => buffer.as_mut_slice().copy_from_slice(data),
        ColorFormat::Rgba => rgba_to_bgra(data, buffer.as_mut_slice()),
        ColorFormat::Yuy2 => yuy2_to_bgra(data, frame.width, frame.height, conversion, buffer)?,
    }

    Ok(())
}

fn rgba_to_bgra(data: &[u8], out: &mut [u8]) {
    out.par_chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(data.par_chunks_exact(BYTES_PER_PIXEL))
        .for_each(|(dst, src)| {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
            dst[3] = src[3];
        });
}

fn yuy2_to_bgra(
    data: &[u8],
    width: u32,
    height: u32,
    conversion: &ColorConversion,
    buffer: &mut PixelBuffer,
) -> Result<(), FrameError> {
    let stride = buffer.stride() as u32;
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: ColorFormat::Yuy2.row_bytes(width) as u32,
        width,
        height,
    };

    yuyv422_to_bgra(
        &packed,
        buffer.as_mut_slice(),
        stride,
        conversion.range,
        conversion.matrix,
    )
    .map_err(|err| FrameError::ColorConversion(format!("YUY2→BGRA failed: {err:?}")))
}

fn write_gray(dst: &mut [u8], intensity: u8) {
    dst[0] = intensity; // blue
    dst[1] = intensity; // green
    dst[2] = intensity; // red
    dst[3] = 255;
}
