use super::{
    buffer::PixelBuffer,
    compositor::composite_body_mask,
    face::{TrackedFace, overlay_faces},
    rgba_converter::{color_to_bgra, depth_to_bgra, infrared_to_bgra},
    source::{CoordinateMapper, FrameSink, FrameSource},
};
use crate::{
    config::SessionConfig,
    error::{FrameError, SubFrame},
    types::{DepthSpacePoint, FrameBundle, FrameDescriptor, Modality},
};

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Delivered,
    Dropped(FrameError),
}

impl FrameOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, FrameOutcome::Delivered)
    }
}

/// Converts incoming bundles for the active modality and hands the result
/// to the sink.
///
/// The session owns a single output buffer that every frame overwrites.
/// `configure` and `on_frame_bundle` both take `&mut self`; when bundles are
/// delivered from another thread, wrap the session in one lock so a switch
/// never interleaves with a conversion.
pub struct Session<S, K> {
    source: S,
    sink: K,
    config: SessionConfig,
    modality: Modality,
    pixels: PixelBuffer,
    depth_points: Vec<DepthSpacePoint>,
    faces: Vec<TrackedFace>,
}

impl<S, K> Session<S, K>
where
    S: FrameSource + CoordinateMapper,
    K: FrameSink,
{
    pub fn new(source: S, sink: K, modality: Modality, config: SessionConfig) -> Self {
        let descriptor = source.descriptor(modality);
        log::debug!("session starting in {modality} at {descriptor}");
        Self {
            source,
            sink,
            config,
            modality,
            pixels: PixelBuffer::new(descriptor),
            depth_points: Vec::new(),
            faces: Vec::new(),
        }
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn descriptor(&self) -> FrameDescriptor {
        self.pixels.descriptor()
    }

    pub fn stride(&self) -> usize {
        self.pixels.stride()
    }

    /// Most recently converted frame. Contents are undefined until the first
    /// frame after a `configure` has been delivered.
    pub fn pixels(&self) -> &[u8] {
        self.pixels.as_slice()
    }

    /// Faces accepted with the most recently delivered color or body-mask
    /// frame. Empty for the other modalities.
    pub fn tracked_faces(&self) -> &[TrackedFace] {
        &self.faces
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Switches to `modality` and replaces the output buffer with one sized
    /// for it.
    pub fn configure(&mut self, modality: Modality) {
        let descriptor = self.source.descriptor(modality);
        log::debug!(
            "switching {} -> {modality} ({} -> {descriptor})",
            self.modality,
            self.pixels.descriptor()
        );
        self.modality = modality;
        self.pixels = PixelBuffer::new(descriptor);
        self.faces.clear();
        if modality != Modality::BodyMask {
            self.depth_points = Vec::new();
        }
    }

    /// Converts the sub-frames the active modality needs and presents the
    /// result. Frames that cannot be converted are dropped without touching
    /// the sink.
    pub fn on_frame_bundle(&mut self, bundle: &FrameBundle) -> FrameOutcome {
        match self.convert(bundle) {
            Ok(()) => {
                self.faces = match self.modality {
                    Modality::Color | Modality::BodyMask => overlay_faces(
                        &mut self.pixels,
                        &bundle.faces,
                        self.config.face_overlay,
                    ),
                    Modality::Infrared | Modality::Depth => Vec::new(),
                };
                self.sink
                    .present(self.pixels.stride(), self.pixels.as_slice());
                FrameOutcome::Delivered
            }
            Err(err) => {
                log::trace!("dropping {} frame: {err}", self.modality);
                FrameOutcome::Dropped(err)
            }
        }
    }

    fn convert(&mut self, bundle: &FrameBundle) -> Result<(), FrameError> {
        if let Some(tag) = bundle.modality.filter(|tag| *tag != self.modality) {
            return Err(FrameError::ModalityMismatch {
                active: self.modality,
                bundle: tag,
            });
        }

        match self.modality {
            Modality::Infrared => {
                let frame = required(bundle.infrared.as_ref(), SubFrame::Infrared)?;
                infrared_to_bgra(frame, &self.config.infrared, &mut self.pixels)
            }
            Modality::Color => {
                let frame = required(bundle.color.as_ref(), SubFrame::Color)?;
                color_to_bgra(frame, &self.config.color, &mut self.pixels)
            }
            Modality::Depth => {
                let frame = required(bundle.depth.as_ref(), SubFrame::Depth)?;
                depth_to_bgra(frame, &mut self.pixels)
            }
            Modality::BodyMask => {
                let depth = required(bundle.depth.as_ref(), SubFrame::Depth)?;
                let color = required(bundle.color.as_ref(), SubFrame::Color)?;
                let body_index = required(bundle.body_index.as_ref(), SubFrame::BodyIndex)?;
                // The mapper indexes depth with the sensor's own geometry.
                FrameError::check_dimensions(
                    self.source.descriptor(Modality::Depth),
                    depth.width,
                    depth.height,
                )?;
                composite_body_mask(
                    depth,
                    color,
                    body_index,
                    &self.source,
                    &self.config.color,
                    &mut self.depth_points,
                    &mut self.pixels,
                )
            }
        }
    }
}

fn required<T>(frame: Option<&T>, kind: SubFrame) -> Result<&T, FrameError> {
    frame.ok_or(FrameError::MissingSubFrame(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BodyIndexFrame, ColorFormat, ColorFrame, ColorSpacePoint, DepthFrame, DetectionResult,
        FaceBox, FaceProperty, FaceResult, InfraredFrame, NO_BODY, Quaternion,
    };

    const COLOR: FrameDescriptor = FrameDescriptor::new(4, 2);
    const DEPTH: FrameDescriptor = FrameDescriptor::new(2, 1);

    /// Color is twice the depth resolution; column `x` maps to depth column
    /// `x / 2` and every color row maps to depth row 0.
    struct TestSensor;

    impl FrameSource for TestSensor {
        fn descriptor(&self, modality: Modality) -> FrameDescriptor {
            match modality {
                Modality::Color | Modality::BodyMask => COLOR,
                Modality::Infrared | Modality::Depth => DEPTH,
            }
        }
    }

    impl CoordinateMapper for TestSensor {
        fn map_color_to_depth_space(
            &self,
            _depth: &[u16],
            color_width: u32,
            _color_height: u32,
            points: &mut [DepthSpacePoint],
        ) {
            for (i, point) in points.iter_mut().enumerate() {
                let x = (i as u32 % color_width / 2) as f32;
                *point = DepthSpacePoint { x, y: 0.0 };
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<(usize, Vec<u8>)>,
    }

    impl FrameSink for Recorder {
        fn present(&mut self, stride: usize, pixels: &[u8]) {
            self.frames.push((stride, pixels.to_vec()));
        }
    }

    fn session(modality: Modality) -> Session<TestSensor, Recorder> {
        Session::new(
            TestSensor,
            Recorder::default(),
            modality,
            SessionConfig::default(),
        )
    }

    fn infrared(descriptor: FrameDescriptor) -> InfraredFrame {
        InfraredFrame {
            width: descriptor.width,
            height: descriptor.height,
            samples: vec![u16::MAX; descriptor.pixel_count()],
        }
    }

    fn color(descriptor: FrameDescriptor) -> ColorFrame {
        ColorFrame {
            width: descriptor.width,
            height: descriptor.height,
            format: ColorFormat::Bgra,
            data: vec![200; descriptor.byte_len()],
        }
    }

    fn depth(descriptor: FrameDescriptor) -> DepthFrame {
        DepthFrame {
            width: descriptor.width,
            height: descriptor.height,
            samples: vec![1700; descriptor.pixel_count()],
            min_reliable_distance: 500,
            max_reliable_distance: 4500,
        }
    }

    fn full_bundle() -> FrameBundle {
        FrameBundle {
            modality: None,
            infrared: Some(infrared(DEPTH)),
            color: Some(color(COLOR)),
            depth: Some(depth(DEPTH)),
            body_index: Some(BodyIndexFrame {
                width: DEPTH.width,
                height: DEPTH.height,
                indices: vec![0, NO_BODY],
            }),
            faces: Vec::new(),
        }
    }

    fn bundle_with_face() -> FrameBundle {
        FrameBundle {
            faces: vec![FaceResult {
                body: 0,
                bounding_box: Some(FaceBox {
                    left: 0,
                    top: 0,
                    right: COLOR.width as i32,
                    bottom: COLOR.height as i32,
                }),
                points: vec![ColorSpacePoint { x: 1.5, y: 1.0 }],
                rotation: Some(Quaternion::IDENTITY),
                properties: vec![(FaceProperty::Happy, DetectionResult::Maybe)],
            }],
            ..full_bundle()
        }
    }

    #[test]
    fn stride_contract_holds_for_every_modality() {
        for modality in Modality::ALL {
            let mut session = session(modality);
            let outcome = session.on_frame_bundle(&full_bundle());
            assert_eq!(outcome, FrameOutcome::Delivered, "{modality}");

            let descriptor = TestSensor.descriptor(modality);
            let (stride, pixels) = session.sink().frames.last().unwrap();
            assert_eq!(*stride, descriptor.width as usize * 4);
            assert_eq!(pixels.len(), stride * descriptor.height as usize);
            assert_eq!(pixels.as_slice(), session.pixels());
        }
    }

    #[test]
    fn infrared_bundle_renders_white() {
        let mut session = session(Modality::Infrared);
        session.on_frame_bundle(&full_bundle());
        assert_eq!(session.pixels(), &[255; 8]);
    }

    #[test]
    fn depth_bundle_renders_gray() {
        let mut session = session(Modality::Depth);
        session.on_frame_bundle(&full_bundle());
        // 1700 mm / (4500 / 256) = 100
        assert_eq!(session.pixels(), &[100, 100, 100, 255, 100, 100, 100, 255]);
    }

    #[test]
    fn body_mask_clears_background_columns() {
        let mut session = session(Modality::BodyMask);
        assert!(session.on_frame_bundle(&full_bundle()).is_delivered());

        // Color columns 0..=1 map to depth column 0 (body), 2..=3 to column 1 (none).
        for (i, px) in session.pixels().chunks_exact(4).enumerate() {
            let column = i % COLOR.width as usize;
            if column < 2 {
                assert_eq!(px, &[200; 4], "pixel {i}");
            } else {
                assert_eq!(px, &[0; 4], "pixel {i}");
            }
        }
    }

    #[test]
    fn body_mask_requires_all_three_frames() {
        let mut session = session(Modality::BodyMask);
        for missing in [SubFrame::Depth, SubFrame::Color, SubFrame::BodyIndex] {
            let mut bundle = full_bundle();
            match missing {
                SubFrame::Depth => bundle.depth = None,
                SubFrame::Color => bundle.color = None,
                SubFrame::BodyIndex => bundle.body_index = None,
                SubFrame::Infrared => unreachable!(),
            }
            assert_eq!(
                session.on_frame_bundle(&bundle),
                FrameOutcome::Dropped(FrameError::MissingSubFrame(missing))
            );
        }
        assert!(session.sink().frames.is_empty());
    }

    #[test]
    fn body_mask_drops_depth_of_foreign_size() {
        let mut session = session(Modality::BodyMask);
        let mut bundle = full_bundle();
        bundle.depth = Some(depth(FrameDescriptor::new(3, 1)));
        bundle.body_index = Some(BodyIndexFrame {
            width: 3,
            height: 1,
            indices: vec![NO_BODY; 3],
        });

        assert_eq!(
            session.on_frame_bundle(&bundle),
            FrameOutcome::Dropped(FrameError::DimensionMismatch {
                expected: DEPTH,
                actual: FrameDescriptor::new(3, 1),
            })
        );
        assert!(session.sink().frames.is_empty());
        assert!(session.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn color_frame_carries_face_overlay() {
        let mut session = session(Modality::Color);
        assert!(session.on_frame_bundle(&bundle_with_face()).is_delivered());

        // The box outline is thicker than the whole 4x2 frame.
        assert!(session.pixels().iter().all(|&b| b == 255));
        let (_, presented) = session.sink().frames.last().unwrap();
        assert_eq!(presented.as_slice(), session.pixels());

        let faces = session.tracked_faces();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].properties, vec![(FaceProperty::Happy, DetectionResult::No)]);
    }

    #[test]
    fn body_mask_draws_faces_after_masking() {
        let mut session = session(Modality::BodyMask);
        assert!(session.on_frame_bundle(&bundle_with_face()).is_delivered());
        assert!(session.pixels().iter().all(|&b| b == 255));
        assert_eq!(session.tracked_faces().len(), 1);
    }

    #[test]
    fn face_overlay_can_be_disabled() {
        let config = SessionConfig {
            face_overlay: false,
            ..SessionConfig::default()
        };
        let mut session = Session::new(TestSensor, Recorder::default(), Modality::Color, config);
        assert!(session.on_frame_bundle(&bundle_with_face()).is_delivered());
        assert!(session.pixels().iter().all(|&b| b == 200));
        assert_eq!(session.tracked_faces().len(), 1);
    }

    #[test]
    fn faces_are_ignored_outside_color_space() {
        let mut depth_session = session(Modality::Depth);
        depth_session.on_frame_bundle(&bundle_with_face());
        assert!(depth_session.tracked_faces().is_empty());
        assert_eq!(depth_session.pixels(), &[100, 100, 100, 255, 100, 100, 100, 255]);

        let mut color_session = session(Modality::Color);
        color_session.on_frame_bundle(&bundle_with_face());
        assert_eq!(color_session.tracked_faces().len(), 1);
        color_session.configure(Modality::Infrared);
        assert!(color_session.tracked_faces().is_empty());
    }

    #[test]
    fn mismatched_frame_is_dropped_silently() {
        let mut session = session(Modality::Color);
        let bundle = FrameBundle {
            color: Some(color(DEPTH)),
            ..FrameBundle::default()
        };
        let outcome = session.on_frame_bundle(&bundle);
        assert!(matches!(
            outcome,
            FrameOutcome::Dropped(FrameError::DimensionMismatch { .. })
        ));
        assert!(session.sink().frames.is_empty());
        assert!(session.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn stale_bundle_after_switch_is_dropped() {
        let mut session = session(Modality::Color);
        session.configure(Modality::Depth);

        // Produced while the depth modality was active.
        let mut stale = full_bundle();
        stale.modality = Some(Modality::Depth);

        session.configure(Modality::Infrared);
        assert_eq!(session.pixels().len(), DEPTH.byte_len());

        assert_eq!(
            session.on_frame_bundle(&stale),
            FrameOutcome::Dropped(FrameError::ModalityMismatch {
                active: Modality::Infrared,
                bundle: Modality::Depth,
            })
        );
        assert!(session.sink().frames.is_empty());
        assert!(session.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn untagged_depth_only_bundle_is_not_written_as_infrared() {
        let mut session = session(Modality::Depth);
        session.configure(Modality::Infrared);
        let bundle = FrameBundle {
            depth: Some(depth(DEPTH)),
            ..FrameBundle::default()
        };
        assert_eq!(
            session.on_frame_bundle(&bundle),
            FrameOutcome::Dropped(FrameError::MissingSubFrame(SubFrame::Infrared))
        );
    }

    #[test]
    fn configure_resizes_buffer() {
        let mut session = session(Modality::Infrared);
        assert_eq!(session.pixels().len(), DEPTH.byte_len());
        session.configure(Modality::Color);
        assert_eq!(session.modality(), Modality::Color);
        assert_eq!(session.descriptor(), COLOR);
        assert_eq!(session.pixels().len(), COLOR.byte_len());
        assert_eq!(session.stride(), 16);
    }

    #[test]
    fn closures_work_as_sinks() {
        let mut delivered = 0;
        {
            let mut session = Session::new(
                TestSensor,
                |stride: usize, pixels: &[u8]| {
                    assert_eq!(pixels.len(), stride * DEPTH.height as usize);
                    delivered += 1;
                },
                Modality::Depth,
                SessionConfig::default(),
            );
            session.on_frame_bundle(&full_bundle());
            session.on_frame_bundle(&FrameBundle::default());
        }
        assert_eq!(delivered, 1);
    }
}
