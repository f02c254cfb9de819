pub mod buffer;
pub mod compositor;
pub mod face;
pub mod rgba_converter;
pub mod sensor;
pub mod session;
pub mod source;

// Re-exports for convenience
pub use buffer::PixelBuffer;
pub use compositor::composite_body_mask;
pub use face::{FaceRotation, TrackedFace, overlay_faces, validate_face};
pub use sensor::{DEFAULT_FRAME_INTERVAL, SensorStream, SyntheticSensor, start_sensor_stream};
pub use session::{FrameOutcome, Session};
pub use source::{CoordinateMapper, FrameSink, FrameSource};
