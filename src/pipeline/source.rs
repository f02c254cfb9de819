//! Contracts of the device collaborators consumed by the pipeline.

use crate::types::{DepthSpacePoint, FrameDescriptor, Modality};

/// Reports the frame geometry each modality is delivered in. Color and the
/// depth-derived modalities usually come from different physical sensors.
pub trait FrameSource {
    fn descriptor(&self, modality: Modality) -> FrameDescriptor;
}

/// Calibration lookup that reprojects every color pixel into depth space.
pub trait CoordinateMapper {
    /// Fills `points` (length `color_width * color_height`, row major over
    /// the color frame) with the depth-space coordinate of each color pixel,
    /// or [`DepthSpacePoint::UNMAPPED`] where there is none.
    fn map_color_to_depth_space(
        &self,
        depth: &[u16],
        color_width: u32,
        color_height: u32,
        points: &mut [DepthSpacePoint],
    );
}

impl<T: FrameSource + ?Sized> FrameSource for &T {
    fn descriptor(&self, modality: Modality) -> FrameDescriptor {
        (**self).descriptor(modality)
    }
}

impl<T: CoordinateMapper + ?Sized> CoordinateMapper for &T {
    fn map_color_to_depth_space(
        &self,
        depth: &[u16],
        color_width: u32,
        color_height: u32,
        points: &mut [DepthSpacePoint],
    ) {
        (**self).map_color_to_depth_space(depth, color_width, color_height, points)
    }
}

/// Receives each converted BGRA8 frame. The slice is only valid for the
/// duration of the call; copy it to keep it.
pub trait FrameSink {
    fn present(&mut self, stride: usize, pixels: &[u8]);
}

impl<F> FrameSink for F
where
    F: FnMut(usize, &[u8]),
{
    fn present(&mut self, stride: usize, pixels: &[u8]) {
        self(stride, pixels)
    }
}
