use std::fmt::Write as _;

use super::buffer::PixelBuffer;
use crate::types::{
    BYTES_PER_PIXEL, ColorSpacePoint, DetectionResult, FaceBox, FaceProperty, FaceResult,
    FrameDescriptor, Quaternion,
};

/// Head angles are reported in steps of this many degrees.
pub const FACE_ROTATION_INCREMENT_DEG: f64 = 5.0;
pub const FACE_BOX_THICKNESS: i32 = 8;
pub const FACE_POINT_RADIUS: i32 = 1;

/// Overlay color per body slot, BGRA: white, orange, green, red, light blue,
/// yellow. Slots past the palette fall back to the first entry.
pub const FACE_COLORS: [[u8; 4]; 6] = [
    [255, 255, 255, 255],
    [0, 165, 255, 255],
    [0, 128, 0, 255],
    [0, 0, 255, 255],
    [230, 216, 173, 255],
    [0, 255, 255, 255],
];

/// Head orientation in whole degrees, snapped to
/// [`FACE_ROTATION_INCREMENT_DEG`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaceRotation {
    pub pitch: i32,
    pub yaw: i32,
    pub roll: i32,
}

impl FaceRotation {
    pub fn from_quaternion(rotation: &Quaternion) -> Self {
        Self::with_increment(rotation, FACE_ROTATION_INCREMENT_DEG)
    }

    pub fn with_increment(rotation: &Quaternion, increment: f64) -> Self {
        let x = rotation.x as f64;
        let y = rotation.y as f64;
        let z = rotation.z as f64;
        let w = rotation.w as f64;

        let pitch = (2.0 * (y * z + w * x)).atan2(w * w - x * x - y * y + z * z);
        // Rounding error can push the sine just past 1 for a pure yaw.
        let yaw = (2.0 * (w * y - x * z)).clamp(-1.0, 1.0).asin();
        let roll = (2.0 * (x * y + w * z)).atan2(w * w + x * x - y * y - z * z);

        Self {
            pitch: snap(pitch.to_degrees(), increment),
            yaw: snap(yaw.to_degrees(), increment),
            roll: snap(roll.to_degrees(), increment),
        }
    }
}

fn snap(degrees: f64, increment: f64) -> i32 {
    ((degrees / increment).round() * increment) as i32
}

/// A face that passed validation, as reported to callers.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedFace {
    pub body: usize,
    pub bounding_box: Option<FaceBox>,
    pub rotation: Option<FaceRotation>,
    /// Detection results with `Maybe` already folded into `No`.
    pub properties: Vec<(FaceProperty, DetectionResult)>,
}

impl TrackedFace {
    fn from_result(face: &FaceResult) -> Self {
        Self {
            body: face.body,
            bounding_box: face.bounding_box,
            rotation: face.rotation.as_ref().map(FaceRotation::from_quaternion),
            properties: face
                .properties
                .iter()
                .map(|&(property, result)| (property, result.reported()))
                .collect(),
        }
    }

    /// One `name : value` line per property followed by the head angles.
    pub fn summary(&self) -> String {
        let mut text = String::new();
        for (property, result) in &self.properties {
            let _ = writeln!(text, "{property:?} : {result:?}");
        }
        if let Some(rotation) = self.rotation {
            let _ = writeln!(text, "FaceYaw : {}", rotation.yaw);
            let _ = writeln!(text, "FacePitch : {}", rotation.pitch);
            let _ = writeln!(text, "FaceRoll : {}", rotation.roll);
        }
        text
    }
}

/// Checks a face against the color frame it will be drawn on.
///
/// A face without a box is accepted. With a box, the box needs a positive
/// size and must end inside the frame, and every point must lie strictly
/// inside the frame.
pub fn validate_face(face: &FaceResult, bounds: FrameDescriptor) -> bool {
    let Some(face_box) = face.bounding_box else {
        return true;
    };

    let width = bounds.width as i64;
    let height = bounds.height as i64;
    let box_width = face_box.right as i64 - face_box.left as i64;
    let box_height = face_box.bottom as i64 - face_box.top as i64;
    if box_width <= 0
        || box_height <= 0
        || face_box.right as i64 > width
        || face_box.bottom as i64 > height
    {
        return false;
    }

    let (width, height) = (bounds.width as f32, bounds.height as f32);
    face.points
        .iter()
        .all(|p| p.x > 0.0 && p.y > 0.0 && p.x < width && p.y < height)
}

/// Validates each face and draws the accepted ones into `buffer` when
/// `draw` is set. Returns the accepted faces.
pub fn overlay_faces(
    buffer: &mut PixelBuffer,
    faces: &[FaceResult],
    draw: bool,
) -> Vec<TrackedFace> {
    let descriptor = buffer.descriptor();
    let mut tracked = Vec::with_capacity(faces.len());
    for face in faces {
        if !validate_face(face, descriptor) {
            log::trace!("skipping face of body {} outside {descriptor}", face.body);
            continue;
        }
        if draw {
            let color = FACE_COLORS.get(face.body).unwrap_or(&FACE_COLORS[0]);
            draw_face(buffer, face, *color);
        }
        tracked.push(TrackedFace::from_result(face));
    }
    tracked
}

/// Draws the box outline and points of `face`. Pixels outside the buffer
/// are skipped, so partially visible faces are clipped.
pub fn draw_face(buffer: &mut PixelBuffer, face: &FaceResult, color: [u8; 4]) {
    let descriptor = buffer.descriptor();
    let canvas = buffer.as_mut_slice();

    if let Some(b) = face.bounding_box {
        // Edges are axis aligned, so clamping near the canvas keeps every
        // visible pixel and bounds the line walk.
        let margin = FACE_BOX_THICKNESS;
        let clamp_x = |x: i32| x.clamp(-margin, descriptor.width as i32 + margin);
        let clamp_y = |y: i32| y.clamp(-margin, descriptor.height as i32 + margin);
        let b = FaceBox {
            left: clamp_x(b.left),
            top: clamp_y(b.top),
            right: clamp_x(b.right),
            bottom: clamp_y(b.bottom),
        };
        let corners = [
            (b.left, b.top),
            (b.right, b.top),
            (b.right, b.bottom),
            (b.left, b.bottom),
        ];
        for i in 0..corners.len() {
            let next = corners[(i + 1) % corners.len()];
            draw_line(canvas, descriptor, corners[i], next, color, FACE_BOX_THICKNESS);
        }
    }

    let radius = FACE_POINT_RADIUS + FACE_BOX_THICKNESS / 2;
    for &ColorSpacePoint { x, y } in &face.points {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        draw_circle(canvas, descriptor, (x as i32, y as i32), radius, color);
    }
}

fn draw_line(
    canvas: &mut [u8],
    descriptor: FrameDescriptor,
    p0: (i32, i32),
    p1: (i32, i32),
    color: [u8; 4],
    thickness: i32,
) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel_safe(canvas, descriptor, x0 + ox, y0 + oy, color);
                }
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(
    canvas: &mut [u8],
    descriptor: FrameDescriptor,
    center: (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                let (x, y) = (cx.saturating_add(dx), cy.saturating_add(dy));
                put_pixel_safe(canvas, descriptor, x, y, color);
            }
        }
    }
}

fn put_pixel_safe(
    canvas: &mut [u8],
    descriptor: FrameDescriptor,
    x: i32,
    y: i32,
    color: [u8; 4],
) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= descriptor.width || uy >= descriptor.height {
        return;
    }
    let offset = (uy as usize * descriptor.width as usize + ux as usize) * BYTES_PER_PIXEL;
    if let Some(px) = canvas.get_mut(offset..offset + BYTES_PER_PIXEL) {
        px.copy_from_slice(&color);
    }
}
