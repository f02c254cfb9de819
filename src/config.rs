use yuv::{YuvRange, YuvStandardMatrix};

/// Tone-mapping constants for infrared frames.
///
/// The scene average and spread were picked by measuring typical indoor
/// scenes; they are fixed rather than derived from each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InfraredTuning {
    /// Largest raw sample the sensor can report.
    pub source_max: f32,
    /// Average reflectance of the scene as a fraction of `source_max`.
    pub scene_average: f32,
    /// Number of standard deviations above the average mapped to full white.
    pub scene_std_devs: f32,
    /// Lower clamp of the normalized ratio. Raising it lifts the black level.
    pub output_min: f32,
    pub output_max: f32,
}

impl Default for InfraredTuning {
    fn default() -> Self {
        Self {
            source_max: u16::MAX as f32,
            scene_average: 0.08,
            scene_std_devs: 3.0,
            output_min: 0.01,
            output_max: 1.0,
        }
    }
}

/// YUV parameters applied when a color frame is not already BGRA.
#[derive(Clone, Copy, Debug)]
pub struct ColorConversion {
    pub range: YuvRange,
    pub matrix: YuvStandardMatrix,
}

impl Default for ColorConversion {
    fn default() -> Self {
        Self {
            range: YuvRange::Limited,
            matrix: YuvStandardMatrix::Bt601,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub infrared: InfraredTuning,
    pub color: ColorConversion,
    /// Draw tracked face boxes and points onto color and body-mask frames.
    pub face_overlay: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            infrared: InfraredTuning::default(),
            color: ColorConversion::default(),
            face_overlay: true,
        }
    }
}
