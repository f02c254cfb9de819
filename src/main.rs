use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::bounded;
use depthview::{
    FrameOutcome, FrameSink, Modality, Session, SessionConfig,
    pipeline::{DEFAULT_FRAME_INTERVAL, SyntheticSensor, start_sensor_stream},
};
use image::RgbaImage;

const DEFAULT_FRAMES_PER_MODALITY: usize = 30;
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Keeps a copy of the last presented frame, standing in for a window.
#[derive(Default)]
struct Preview {
    stride: usize,
    pixels: Vec<u8>,
}

impl FrameSink for Preview {
    fn present(&mut self, stride: usize, pixels: &[u8]) {
        self.stride = stride;
        self.pixels.clear();
        self.pixels.extend_from_slice(pixels);
    }
}

struct Options {
    modalities: Vec<Modality>,
    frames: usize,
    output_dir: Option<PathBuf>,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let modalities = match args.next().as_deref() {
        None | Some("all") => Modality::ALL.to_vec(),
        Some(label) => vec![Modality::from_label(label).ok_or_else(|| {
            anyhow!("unknown modality {label:?}, expected infrared, color, depth, body-mask or all")
        })?],
    };

    let frames: usize = match args.next() {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid frame count {value:?}"))?,
        None => DEFAULT_FRAMES_PER_MODALITY,
    };
    if frames == 0 {
        return Err(anyhow!("frame count must be at least 1"));
    }

    Ok(Options {
        modalities,
        frames,
        output_dir: args.next().map(PathBuf::from),
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let options = parse_options(std::env::args().skip(1))?;
    let first = options.modalities[0];
    let sensor = SyntheticSensor::kinect_v2();

    let (bundle_tx, bundle_rx) = bounded(1);
    let (modality_tx, modality_rx) = bounded(Modality::ALL.len());
    let stream = start_sensor_stream(
        sensor.clone(),
        first,
        modality_rx,
        bundle_tx,
        DEFAULT_FRAME_INTERVAL,
    )
    .context("failed to start sensor stream")?;

    let mut session = Session::new(sensor, Preview::default(), first, SessionConfig::default());
    let mut snapshots = Vec::new();

    for (position, &modality) in options.modalities.iter().enumerate() {
        if position > 0 {
            session.configure(modality);
            modality_tx
                .send(modality)
                .context("sensor stream stopped")?;
        }

        let (mut delivered, mut dropped) = (0usize, 0usize);
        while delivered < options.frames {
            let bundle = bundle_rx
                .recv_timeout(FRAME_TIMEOUT)
                .with_context(|| format!("no {modality} frame within {FRAME_TIMEOUT:?}"))?;
            match session.on_frame_bundle(&bundle) {
                FrameOutcome::Delivered => delivered += 1,
                FrameOutcome::Dropped(reason) => {
                    dropped += 1;
                    log::debug!("dropped {modality} bundle: {reason}");
                }
            }
        }

        log::info!(
            "{modality}: {delivered} frames at {} ({dropped} dropped)",
            session.descriptor()
        );
        for face in session.tracked_faces() {
            log::info!("body {} face\n{}", face.body, face.summary().trim_end());
        }
        let preview = session.sink();
        snapshots.push((modality, preview.stride, preview.pixels.clone()));
    }

    stream.stop();

    if let Some(dir) = options.output_dir {
        for (modality, stride, pixels) in &snapshots {
            let path = save_png(&dir, *modality, *stride, pixels)?;
            log::info!("wrote {}", path.display());
        }
    }

    Ok(())
}

fn save_png(dir: &Path, modality: Modality, stride: usize, bgra: &[u8]) -> Result<PathBuf> {
    if stride == 0 {
        return Err(anyhow!("no {modality} frame to save"));
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let width = (stride / 4) as u32;
    let height = (bgra.len() / stride) as u32;

    // PNG wants RGBA; swap in a copy so the snapshot stays BGRA.
    let mut rgba = bgra.to_vec();
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let image = RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow!("{modality} snapshot does not fill {width}x{height}"))?;
    let path = dir.join(format!("{}.png", modality.label()));
    image
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        parse_options(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_cycle_every_modality() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.modalities, Modality::ALL.to_vec());
        assert_eq!(options.frames, DEFAULT_FRAMES_PER_MODALITY);
        assert!(options.output_dir.is_none());
    }

    #[test]
    fn single_modality_with_output() {
        let options = parse(&["depth", "5", "out"]).unwrap();
        assert_eq!(options.modalities, vec![Modality::Depth]);
        assert_eq!(options.frames, 5);
        assert_eq!(options.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn zero_frames_is_rejected() {
        assert!(parse(&["color", "0"]).is_err());
        assert!(parse(&["all", "-1"]).is_err());
        assert!(parse(&["thermal"]).is_err());
    }
}
