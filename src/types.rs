use std::fmt;

pub const BYTES_PER_PIXEL: usize = 4;

/// Body-index value marking a depth pixel that no tracked body occupies.
pub const NO_BODY: u8 = 0xFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Modality {
    Infrared,
    Color,
    Depth,
    BodyMask,
}

impl Modality {
    pub const ALL: [Modality; 4] = [
        Modality::Infrared,
        Modality::Color,
        Modality::Depth,
        Modality::BodyMask,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Modality::Infrared => "infrared",
            Modality::Color => "color",
            Modality::Depth => "depth",
            Modality::BodyMask => "body-mask",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|modality| modality.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameDescriptor {
    pub width: u32,
    pub height: u32,
}

impl FrameDescriptor {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn byte_len(&self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL
    }
}

impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Debug)]
pub struct InfraredFrame {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
}

/// Native byte layout of a color frame as delivered by the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    Bgra,
    Rgba,
    Yuy2,
}

impl ColorFormat {
    /// Bytes in one row of `width` pixels. YUY2 packs pixel pairs into four
    /// bytes, so odd widths carry a padding pixel.
    pub fn row_bytes(&self, width: u32) -> usize {
        match self {
            ColorFormat::Bgra | ColorFormat::Rgba => width as usize * BYTES_PER_PIXEL,
            ColorFormat::Yuy2 => width.div_ceil(2) as usize * 4,
        }
    }

    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        self.row_bytes(width) * height as usize
    }
}

#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    /// Distance per pixel in millimeters.
    pub samples: Vec<u16>,
    pub min_reliable_distance: u16,
    pub max_reliable_distance: u16,
}

#[derive(Clone, Debug)]
pub struct BodyIndexFrame {
    pub width: u32,
    pub height: u32,
    pub indices: Vec<u8>,
}

/// Pixel coordinate in the color frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorSpacePoint {
    pub x: f32,
    pub y: f32,
}

/// Face rectangle in color-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceProperty {
    Happy,
    Engaged,
    WearingGlasses,
    LeftEyeClosed,
    RightEyeClosed,
    MouthOpen,
    MouthMoved,
    LookingAway,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionResult {
    Unknown,
    No,
    Maybe,
    Yes,
}

impl DetectionResult {
    /// Value shown to the user. `Maybe` reads as `No` so the displayed
    /// properties do not flicker between frames.
    pub fn reported(self) -> Self {
        match self {
            DetectionResult::Maybe => DetectionResult::No,
            other => other,
        }
    }
}

/// Face tracking output for one tracked body, in color space.
#[derive(Clone, Debug, Default)]
pub struct FaceResult {
    /// Slot of the tracked body this face belongs to.
    pub body: usize,
    pub bounding_box: Option<FaceBox>,
    pub points: Vec<ColorSpacePoint>,
    pub rotation: Option<Quaternion>,
    pub properties: Vec<(FaceProperty, DetectionResult)>,
}

/// Sub-frames captured at the same instant. Any of them may be missing.
///
/// `modality` is the selection the producer was serving when it assembled the
/// bundle; bundles tagged for a different selection than the active one are
/// stale and get dropped.
#[derive(Clone, Debug, Default)]
pub struct FrameBundle {
    pub modality: Option<Modality>,
    pub infrared: Option<InfraredFrame>,
    pub color: Option<ColorFrame>,
    pub depth: Option<DepthFrame>,
    pub body_index: Option<BodyIndexFrame>,
    /// Face results for the color frame; empty when no face is tracked.
    pub faces: Vec<FaceResult>,
}

impl FrameBundle {
    pub fn tagged(modality: Modality) -> Self {
        Self {
            modality: Some(modality),
            ..Self::default()
        }
    }
}

/// Floating point coordinate in depth space. Unmappable points carry
/// negative infinity in both components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthSpacePoint {
    pub x: f32,
    pub y: f32,
}

impl DepthSpacePoint {
    pub const UNMAPPED: DepthSpacePoint = DepthSpacePoint {
        x: f32::NEG_INFINITY,
        y: f32::NEG_INFINITY,
    };

    pub fn is_mapped(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Nearest depth pixel, rounding half up, or `None` when the point is
    /// unmapped or falls outside `width` x `height`.
    pub fn nearest_pixel(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        if !self.is_mapped() {
            return None;
        }
        let x = (self.x + 0.5).floor();
        let y = (self.y + 0.5).floor();
        if x < 0.0 || y < 0.0 || x >= width as f32 || y >= height as f32 {
            return None;
        }
        Some((x as u32, y as u32))
    }
}

impl Default for DepthSpacePoint {
    fn default() -> Self {
        Self::UNMAPPED
    }
}
