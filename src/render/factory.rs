//! LOD pixel production. Resampling runs on a dedicated worker thread fed
//! over a channel so the render loop never blocks on a multi-megapixel
//! convolution; the same `produce` entry point runs inline on the engine
//! thread for the bootstrap and as the fallback when the worker is gone.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use fast_image_resize as fir;
use image::RgbaImage;
use tracing::{debug, warn};

/// Resampling quality tier; full-resolution levels get the expensive kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeQuality {
    High,
    Medium,
}

impl ResizeQuality {
    fn filter(self) -> fir::FilterType {
        match self {
            ResizeQuality::High => fir::FilterType::Lanczos3,
            ResizeQuality::Medium => fir::FilterType::Bilinear,
        }
    }
}

/// A request to produce one LOD's pixels.
pub struct LodJob {
    /// Stamp of the request; stale completions are discarded by comparing it.
    pub generation: u64,
    pub level: usize,
    pub target: (u32, u32),
    pub quality: ResizeQuality,
    pub source: Arc<RgbaImage>,
}

/// Resampled pixels ready for GPU upload.
pub struct LodPixels {
    pub generation: u64,
    pub level: usize,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub enum FactoryMsg {
    Produce(LodJob),
    Quit,
}

/// Spawn the factory worker. Failed jobs are logged and dropped; the engine
/// retries on its next policy trigger.
pub fn spawn_factory(rx: Receiver<FactoryMsg>, tx: Sender<LodPixels>) {
    thread::spawn(move || {
        while let Ok(msg) = rx.recv() {
            match msg {
                FactoryMsg::Quit => break,
                FactoryMsg::Produce(job) => match produce(&job) {
                    Ok(out) => {
                        let _ = tx.send(out);
                    }
                    Err(err) => warn!("resample for LOD {} failed: {err:#}", job.level),
                },
            }
        }
        debug!("factory worker stopped");
    });
}

/// Resample the source to the job's target size. When the target equals the
/// source dimensions the pixels are handed over without resampling.
pub fn produce(job: &LodJob) -> Result<LodPixels> {
    let (width, height) = job.target;
    let pixels = if (width, height) == job.source.dimensions() {
        job.source.as_raw().clone()
    } else {
        resample(&job.source, width, height, job.quality)?
    };
    Ok(LodPixels {
        generation: job.generation,
        level: job.level,
        width,
        height,
        pixels,
    })
}

fn resample(
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
    quality: ResizeQuality,
) -> Result<Vec<u8>> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for LOD resample")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(quality.filter()));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("LOD resample failed")?;
    Ok(dst_image.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn direct_path_hands_over_source_pixels() {
        let src = source(8, 4);
        let job = LodJob {
            generation: 1,
            level: 3,
            target: (8, 4),
            quality: ResizeQuality::High,
            source: Arc::clone(&src),
        };
        let out = produce(&job).unwrap();
        assert_eq!((out.width, out.height), (8, 4));
        assert_eq!(out.pixels, *src.as_raw());
    }

    #[test]
    fn resample_produces_target_dimensions() {
        let job = LodJob {
            generation: 2,
            level: 0,
            target: (3, 2),
            quality: ResizeQuality::Medium,
            source: source(12, 8),
        };
        let out = produce(&job).unwrap();
        assert_eq!((out.width, out.height), (3, 2));
        assert_eq!(out.pixels.len(), 3 * 2 * 4);
        // A solid source stays solid through the convolution.
        assert_eq!(&out.pixels[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn worker_round_trips_jobs_and_stops_on_quit() {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (res_tx, res_rx) = crossbeam_channel::unbounded();
        spawn_factory(job_rx, res_tx);
        job_tx
            .send(FactoryMsg::Produce(LodJob {
                generation: 7,
                level: 1,
                target: (2, 2),
                quality: ResizeQuality::Medium,
                source: source(4, 4),
            }))
            .unwrap();
        let out = res_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        assert_eq!(out.generation, 7);
        assert_eq!(out.level, 1);
        job_tx.send(FactoryMsg::Quit).unwrap();
    }
}
