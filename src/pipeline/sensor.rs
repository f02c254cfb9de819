use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TrySendError};

use super::source::{CoordinateMapper, FrameSource};
use crate::types::{
    BodyIndexFrame, ColorFormat, ColorFrame, ColorSpacePoint, DepthFrame, DepthSpacePoint,
    DetectionResult, FaceBox, FaceProperty, FaceResult, FrameBundle, FrameDescriptor,
    InfraredFrame, Modality, NO_BODY, Quaternion,
};

const KINECT_COLOR: FrameDescriptor = FrameDescriptor::new(1920, 1080);
const KINECT_DEPTH: FrameDescriptor = FrameDescriptor::new(512, 424);
const KINECT_MIN_RELIABLE_MM: u16 = 500;
const KINECT_MAX_RELIABLE_MM: u16 = 4500;

const WALL_MM: u16 = 3200;
const BODY_MM: u16 = 1600;
// Columns on the left edge of the depth frame with no reading, like the
// emitter shadow of a real device.
const SHADOW_COLUMNS: u32 = 8;
const MAX_HEAD_YAW_DEG: f32 = 30.0;

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Deterministic stand-in for a depth camera.
///
/// The scene is a flat wall with one body moving across it. Color covers a
/// wider horizontal and a narrower vertical field of view than depth, so the
/// outer color columns have no depth counterpart.
#[derive(Clone, Debug)]
pub struct SyntheticSensor {
    color: FrameDescriptor,
    depth: FrameDescriptor,
    color_format: ColorFormat,
    /// Depth pixels per color pixel along each axis.
    scale: (f32, f32),
}

impl SyntheticSensor {
    pub fn kinect_v2() -> Self {
        Self::new(KINECT_COLOR, KINECT_DEPTH)
    }

    pub fn new(color: FrameDescriptor, depth: FrameDescriptor) -> Self {
        let scale_x = depth.width as f32 / color.width as f32 * 1.2;
        let scale_y = depth.height as f32 / color.height as f32 * 0.9;
        Self {
            color,
            depth,
            color_format: ColorFormat::Yuy2,
            scale: (scale_x, scale_y),
        }
    }

    pub fn with_color_format(mut self, format: ColorFormat) -> Self {
        self.color_format = format;
        self
    }

    /// Captures the sub-frames `modality` needs at time step `tick`.
    pub fn capture(&self, modality: Modality, tick: u64) -> FrameBundle {
        let mut bundle = FrameBundle::tagged(modality);
        match modality {
            Modality::Infrared => bundle.infrared = Some(self.infrared_frame(tick)),
            Modality::Color => {
                bundle.color = Some(self.color_frame(tick));
                bundle.faces = vec![self.face_result(tick)];
            }
            Modality::Depth => bundle.depth = Some(self.depth_frame(tick)),
            Modality::BodyMask => {
                bundle.depth = Some(self.depth_frame(tick));
                bundle.color = Some(self.color_frame(tick));
                bundle.body_index = Some(self.body_index_frame(tick));
                bundle.faces = vec![self.face_result(tick)];
            }
        }
        bundle
    }

    fn body_center(&self, tick: u64) -> (f32, f32) {
        let width = self.depth.width as f32;
        let travel = (tick % 120) as f32 / 120.0;
        (width * (0.2 + 0.6 * travel), self.depth.height as f32 * 0.5)
    }

    fn on_body(&self, x: u32, y: u32, tick: u64) -> bool {
        let (cx, cy) = self.body_center(tick);
        let radius = self.depth.height as f32 * 0.3;
        let (dx, dy) = (x as f32 - cx, (y as f32 - cy) * 0.6);
        dx * dx + dy * dy <= radius * radius
    }

    fn depth_at(&self, x: u32, y: u32, tick: u64) -> u16 {
        if x < SHADOW_COLUMNS {
            0
        } else if self.on_body(x, y, tick) {
            BODY_MM
        } else {
            // The wall leans away towards the bottom of the frame.
            WALL_MM + (y * 2) as u16
        }
    }

    fn depth_frame(&self, tick: u64) -> DepthFrame {
        let FrameDescriptor { width, height } = self.depth;
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| self.depth_at(x, y, tick))
            .collect();
        DepthFrame {
            width,
            height,
            samples,
            min_reliable_distance: KINECT_MIN_RELIABLE_MM,
            max_reliable_distance: KINECT_MAX_RELIABLE_MM,
        }
    }

    fn infrared_frame(&self, tick: u64) -> InfraredFrame {
        let FrameDescriptor { width, height } = self.depth;
        let samples = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| match self.depth_at(x, y, tick) {
                0 => 0,
                // Returned light falls off with the square of the distance.
                depth => {
                    let meters = depth as f32 / 1000.0;
                    (12_000.0 / (meters * meters)).min(u16::MAX as f32) as u16
                }
            })
            .collect();
        InfraredFrame {
            width,
            height,
            samples,
        }
    }

    fn body_index_frame(&self, tick: u64) -> BodyIndexFrame {
        let FrameDescriptor { width, height } = self.depth;
        let indices = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                if x >= SHADOW_COLUMNS && self.on_body(x, y, tick) {
                    0
                } else {
                    NO_BODY
                }
            })
            .collect();
        BodyIndexFrame {
            width,
            height,
            indices,
        }
    }

    fn color_frame(&self, tick: u64) -> ColorFrame {
        let FrameDescriptor { width, height } = self.color;
        let shade = |x: u32, y: u32| -> (u8, u8, u8) {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = (tick % 256) as u8;
            (r, g, b)
        };

        let data = match self.color_format {
            ColorFormat::Bgra | ColorFormat::Rgba => {
                let swap = self.color_format == ColorFormat::Rgba;
                let mut data = Vec::with_capacity(self.color.byte_len());
                for y in 0..height {
                    for x in 0..width {
                        let (r, g, b) = shade(x, y);
                        if swap {
                            data.extend_from_slice(&[r, g, b, 255]);
                        } else {
                            data.extend_from_slice(&[b, g, r, 255]);
                        }
                    }
                }
                data
            }
            ColorFormat::Yuy2 => {
                // Luma only, neutral chroma. Odd widths repeat the last pixel.
                let luma = |x: u32, y: u32| {
                    let (r, g, _) = shade(x.min(width - 1), y);
                    16 + ((r as u32 + g as u32) * 219 / 510) as u8
                };
                let mut data = Vec::with_capacity(ColorFormat::Yuy2.frame_len(width, height));
                for y in 0..height {
                    for x in (0..width).step_by(2) {
                        data.extend_from_slice(&[luma(x, y), 128, luma(x + 1, y), 128]);
                    }
                }
                data
            }
        };

        ColorFrame {
            width,
            height,
            format: self.color_format,
            data,
        }
    }

    /// Face of the moving body: a square around its head in color space
    /// that turns left and right over time.
    fn face_result(&self, tick: u64) -> FaceResult {
        let (cx, cy) = self.body_center(tick);
        let (hx, hy) = self.depth_to_color(cx, cy - self.depth.height as f32 * 0.35);
        let half = (self.color.height as f32 * 0.08).max(1.0);

        let point = |dx: f32, dy: f32| ColorSpacePoint {
            x: hx + dx * half,
            y: hy + dy * half,
        };
        let yaw = MAX_HEAD_YAW_DEG * (tick as f32 * 0.1).sin();
        let half_angle = yaw.to_radians() / 2.0;
        let happy = if (tick / 30) % 2 == 0 {
            DetectionResult::Yes
        } else {
            DetectionResult::Maybe
        };
        let looking_away = if yaw.abs() > MAX_HEAD_YAW_DEG * 0.7 {
            DetectionResult::Yes
        } else {
            DetectionResult::No
        };

        FaceResult {
            body: 0,
            bounding_box: Some(FaceBox {
                left: (hx - half) as i32,
                top: (hy - half) as i32,
                right: (hx + half) as i32,
                bottom: (hy + half) as i32,
            }),
            // Eyes, nose and mouth corners.
            points: vec![
                point(-0.4, -0.2),
                point(0.4, -0.2),
                point(0.0, 0.1),
                point(-0.3, 0.5),
                point(0.3, 0.5),
            ],
            rotation: Some(Quaternion {
                x: 0.0,
                y: half_angle.sin(),
                z: 0.0,
                w: half_angle.cos(),
            }),
            properties: vec![
                (FaceProperty::Happy, happy),
                (FaceProperty::Engaged, DetectionResult::Yes),
                (FaceProperty::WearingGlasses, DetectionResult::No),
                (FaceProperty::LookingAway, looking_away),
            ],
        }
    }

    fn depth_to_color(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.depth.width as f32 / 2.0) / self.scale.0 + self.color.width as f32 / 2.0,
            (y - self.depth.height as f32 / 2.0) / self.scale.1 + self.color.height as f32 / 2.0,
        )
    }

    fn color_to_depth(&self, x: u32, y: u32) -> (f32, f32) {
        let cx = x as f32 - self.color.width as f32 / 2.0;
        let cy = y as f32 - self.color.height as f32 / 2.0;
        (
            cx * self.scale.0 + self.depth.width as f32 / 2.0,
            cy * self.scale.1 + self.depth.height as f32 / 2.0,
        )
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::kinect_v2()
    }
}

impl FrameSource for SyntheticSensor {
    fn descriptor(&self, modality: Modality) -> FrameDescriptor {
        match modality {
            Modality::Color | Modality::BodyMask => self.color,
            Modality::Infrared | Modality::Depth => self.depth,
        }
    }
}

impl CoordinateMapper for SyntheticSensor {
    fn map_color_to_depth_space(
        &self,
        depth: &[u16],
        color_width: u32,
        color_height: u32,
        points: &mut [DepthSpacePoint],
    ) {
        let color_width = color_width.max(1);
        for (i, point) in points
            .iter_mut()
            .enumerate()
            .take((color_width * color_height) as usize)
        {
            let (x, y) = self.color_to_depth(i as u32 % color_width, i as u32 / color_width);
            let candidate = DepthSpacePoint { x, y };
            // No depth reading means no reprojection.
            let has_depth = candidate
                .nearest_pixel(self.depth.width, self.depth.height)
                .map(|(dx, dy)| (dy * self.depth.width + dx) as usize)
                .and_then(|index| depth.get(index))
                .is_none_or(|&sample| sample != 0);
            *point = if has_depth {
                candidate
            } else {
                DepthSpacePoint::UNMAPPED
            };
        }
    }
}

#[derive(Debug)]
pub struct SensorStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SensorStream {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns a producer that captures one bundle per `interval` for the
/// modality most recently received on `modality_rx`.
///
/// Bundles are dropped when the consumer has not taken the previous one yet.
pub fn start_sensor_stream(
    sensor: SyntheticSensor,
    initial: Modality,
    modality_rx: Receiver<Modality>,
    bundle_tx: Sender<FrameBundle>,
    interval: Duration,
) -> Result<SensorStream> {
    for modality in Modality::ALL {
        let descriptor = sensor.descriptor(modality);
        if descriptor.pixel_count() == 0 {
            return Err(anyhow!("sensor reports empty {modality} frames ({descriptor})"));
        }
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut modality = initial;
        let mut tick = 0u64;

        while !stop_flag.load(Ordering::Relaxed) {
            while let Ok(next) = modality_rx.try_recv() {
                modality = next;
            }

            let bundle = sensor.capture(modality, tick);
            tick = tick.wrapping_add(1);

            // Drop the bundle if the consumer is still busy with the last one.
            if let Err(TrySendError::Disconnected(_)) = bundle_tx.try_send(bundle) {
                log::debug!("frame consumer went away, stopping sensor stream");
                break;
            }

            thread::sleep(interval);
        }
    });

    Ok(SensorStream {
        stop,
        handle: Some(handle),
    })
}
