//! Converts raw depth-camera frames (infrared, color, depth and body index)
//! into BGRA8 pixel buffers ready for display.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use config::SessionConfig;
pub use error::FrameError;
pub use pipeline::{FrameOutcome, FrameSink, Session};
pub use types::{FrameBundle, FrameDescriptor, Modality};
