use crate::types::FrameDescriptor;

/// BGRA8 output buffer reused across frames.
///
/// The length is fixed at `width * height * 4` for the lifetime of the
/// buffer. Each conversion overwrites it in place, so a sink that wants to
/// keep a frame must copy it.
#[derive(Debug)]
pub struct PixelBuffer {
    descriptor: FrameDescriptor,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(descriptor: FrameDescriptor) -> Self {
        Self {
            descriptor,
            data: vec![0u8; descriptor.byte_len()],
        }
    }

    pub fn descriptor(&self) -> FrameDescriptor {
        self.descriptor
    }

    pub fn stride(&self) -> usize {
        self.descriptor.stride()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
