use thiserror::Error;

use crate::types::{FrameDescriptor, Modality};

/// Sub-frames a bundle may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubFrame {
    Infrared,
    Color,
    Depth,
    BodyIndex,
}

/// Reasons a frame is not converted. None of these escape the session as a
/// failure; they are reported as a dropped frame.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame is {actual}, expected {expected}")]
    DimensionMismatch {
        expected: FrameDescriptor,
        actual: FrameDescriptor,
    },
    #[error("bundle has no {0:?} frame")]
    MissingSubFrame(SubFrame),
    #[error("degenerate depth bounds [{min}, {max}]")]
    DegenerateBounds { min: u16, max: u16 },
    #[error("bundle was produced for {bundle}, session is in {active}")]
    ModalityMismatch { active: Modality, bundle: Modality },
    #[error("buffer holds {actual} elements, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("color conversion failed: {0}")]
    ColorConversion(String),
}

impl FrameError {
    pub fn check_dimensions(
        expected: FrameDescriptor,
        width: u32,
        height: u32,
    ) -> Result<(), FrameError> {
        let actual = FrameDescriptor::new(width, height);
        if actual != expected {
            return Err(FrameError::DimensionMismatch { expected, actual });
        }
        Ok(())
    }

    pub fn check_len(expected: usize, actual: usize) -> Result<(), FrameError> {
        if actual != expected {
            return Err(FrameError::BufferLength { expected, actual });
        }
        Ok(())
    }
}
