//! Body matting: keeps the color pixels that cover a tracked body.
//!
//! Each color pixel is reprojected into depth space and looked up in the
//! body-index frame. Pixels that land on a depth pixel labelled
//! [`NO_BODY`] are cleared to transparent black. Pixels without a usable
//! reprojection (unmapped, or outside the depth frame) are kept, so the
//! matte errs towards showing too much rather than cutting into a body.

use rayon::prelude::*;

use super::{buffer::PixelBuffer, rgba_converter::color_to_bgra, source::CoordinateMapper};
use crate::{
    config::ColorConversion,
    error::FrameError,
    types::{
        BYTES_PER_PIXEL, BodyIndexFrame, ColorFrame, DepthFrame, DepthSpacePoint,
        FrameDescriptor, NO_BODY,
    },
};

/// Whether `point` hits a depth pixel that no body occupies.
pub fn is_background(point: &DepthSpacePoint, body_index: &BodyIndexFrame) -> bool {
    match point.nearest_pixel(body_index.width, body_index.height) {
        Some((x, y)) => {
            let index = y as usize * body_index.width as usize + x as usize;
            body_index.indices.get(index) == Some(&NO_BODY)
        }
        None => false,
    }
}

/// Writes the color frame into `buffer` and clears every background pixel.
///
/// `points` is scratch space for the reprojection, resized to the color
/// pixel count. Nothing is written to `buffer` unless all three frames are
/// consistent with each other and with the buffer.
pub fn composite_body_mask<M>(
    depth: &DepthFrame,
    color: &ColorFrame,
    body_index: &BodyIndexFrame,
    mapper: &M,
    conversion: &ColorConversion,
    points: &mut Vec<DepthSpacePoint>,
    buffer: &mut PixelBuffer,
) -> Result<(), FrameError>
where
    M: CoordinateMapper + ?Sized,
{
    let depth_descriptor = FrameDescriptor::new(depth.width, depth.height);
    FrameError::check_dimensions(depth_descriptor, body_index.width, body_index.height)?;
    FrameError::check_len(depth_descriptor.pixel_count(), depth.samples.len())?;
    FrameError::check_len(depth_descriptor.pixel_count(), body_index.indices.len())?;

    color_to_bgra(color, conversion, buffer)?;

    let color_descriptor = buffer.descriptor();
    points.clear();
    points.resize(color_descriptor.pixel_count(), DepthSpacePoint::UNMAPPED);
    mapper.map_color_to_depth_space(
        &depth.samples,
        color_descriptor.width,
        color_descriptor.height,
        points,
    );

    buffer
        .as_mut_slice()
        .par_chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(points.par_iter())
        .for_each(|(dst, point)| {
            if is_background(point, body_index) {
                dst.fill(0);
            }
        });

    Ok(())
}
