//! The viewer engine: public control surface, LOD policy and swap protocol,
//! animation stepping and the per-frame render tick. Lives on the event-loop
//! thread; the only other thread is the factory worker.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::animation::Animation;
use crate::clipboard;
use crate::config::{Configuration, DoubleClickMode};
use crate::decode;
use crate::error::Error;
use crate::gesture::{GestureDecoder, InputEvent, Intent};
use crate::lod::{self, LodTable};
use crate::memory::{MemoryInfo, MemoryMonitor, MemoryPressure};
use crate::render::factory::{self, FactoryMsg, LodJob, LodPixels, ResizeQuality};
use crate::render::gpu::{Gpu, GpuTexture};
use crate::transform::{Transform, ViewState};
use crate::viewport::Viewport;

/// Scales within this distance of 1.0 count as "at 1:1" for the
/// double-activation toggle.
const ONE_TO_ONE_EPSILON: f64 = 1e-6;

/// Per-frame state published when `debug` is on.
#[derive(Debug, Clone)]
pub struct DebugSnapshot {
    pub scale: f64,
    pub relative_scale: f64,
    pub tx: f64,
    pub ty: f64,
    pub current_lod: Option<usize>,
    pub lod_count: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub fit_scale: f64,
    pub effective_max_scale: f64,
    pub original_size_scale: f64,
    pub render_count: u64,
    pub fps: f64,
    pub frame_time_ms: f64,
    pub max_texture_size: u32,
    pub user_max_scale: f64,
    pub memory: MemoryInfo,
}

/// Host callbacks. All are one-way; the engine never retains host state.
#[derive(Default)]
pub struct Callbacks {
    /// (absolute scale, fit-relative scale) on every transform change.
    pub on_zoom_change: Option<Box<dyn FnMut(f64, f64)>>,
    pub on_image_copied: Option<Box<dyn FnMut()>>,
    pub on_debug_update: Option<Box<dyn FnMut(&DebugSnapshot)>>,
}

struct ImageSource {
    path: PathBuf,
    pixels: Arc<RgbaImage>,
}

struct CachedTexture {
    texture: GpuTexture,
    level: usize,
    bytes: u64,
    last_used: Instant,
}

/// FPS over a rolling one-second window plus the last frame time.
struct FrameClock {
    frames: VecDeque<Instant>,
    last: Option<Instant>,
    frame_time_ms: f64,
    render_count: u64,
}

impl FrameClock {
    fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            last: None,
            frame_time_ms: 0.0,
            render_count: 0,
        }
    }

    fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last {
            self.frame_time_ms = now.saturating_duration_since(last).as_secs_f64() * 1000.0;
        }
        self.last = Some(now);
        self.frames.push_back(now);
        let horizon = Duration::from_secs(1);
        while let Some(front) = self.frames.front()
            && now.saturating_duration_since(*front) > horizon
        {
            self.frames.pop_front();
        }
        self.render_count += 1;
    }

    fn fps(&self) -> f64 {
        self.frames.len() as f64
    }
}

pub struct ViewerEngine {
    config: Configuration,
    gpu: Gpu,
    viewport: Viewport,
    view: Option<ViewState>,
    source: Option<ImageSource>,
    gestures: GestureDecoder,
    animation: Option<Animation>,
    memory: MemoryMonitor,
    lod_table: LodTable,

    front: Option<CachedTexture>,
    back: Option<CachedTexture>,
    armed: bool,
    current_lod: Option<usize>,
    /// (generation, level) of the request the factory is working on.
    in_flight: Option<(u64, usize)>,
    generation: u64,

    job_tx: Sender<FactoryMsg>,
    result_rx: Receiver<LodPixels>,

    clock: FrameClock,
    callbacks: Callbacks,
    last_notified: Option<Transform>,
    destroyed: bool,
}

impl ViewerEngine {
    pub fn new(gpu: Gpu, config: Configuration, callbacks: Callbacks) -> Result<Self, Error> {
        let config = config.validated()?;
        let lod_table = config.lod_table()?;
        let gestures = GestureDecoder::new(config.gesture_options());
        let memory = MemoryMonitor::new(config.device_class, 1.0);

        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        factory::spawn_factory(job_rx, result_tx);

        Ok(Self {
            config,
            gpu,
            viewport: Viewport::new(1.0, 1.0, 1.0),
            view: None,
            source: None,
            gestures,
            animation: None,
            memory,
            lod_table,
            front: None,
            back: None,
            armed: false,
            current_lod: None,
            in_flight: None,
            generation: 0,
            job_tx,
            result_rx,
            clock: FrameClock::new(),
            callbacks,
            last_notified: None,
            destroyed: false,
        })
    }

    /// Decode and install an image. Decode failure leaves all prior state
    /// untouched; bootstrap texture failure surfaces as an error with no
    /// image installed.
    pub fn load(&mut self, path: &Path) -> Result<(), Error> {
        self.ensure_alive()?;
        let decoded = decode::decode_rgba8(path).map_err(Error::Decode)?;
        let (width, height) = decoded.dimensions();
        let source = Arc::new(decoded);
        info!(
            path = %path.display(),
            width,
            height,
            "image decoded"
        );

        let mut view = ViewState::new(
            width,
            height,
            self.viewport,
            self.config.min_scale,
            self.config.max_scale,
            self.config.limit_to_bounds,
        );
        let fit = view.fit_scale();
        let initial = view.bounds().clamp(fit * self.config.initial_scale);
        let (tx, ty) = if self.config.center_on_init {
            (0.0, 0.0)
        } else {
            // Anchor the image's top-left corner to the viewport's.
            (
                (initial * f64::from(width) - self.viewport.width) / 2.0,
                (initial * f64::from(height) - self.viewport.height) / 2.0,
            )
        };
        view.set_transform(Transform {
            scale: initial,
            tx,
            ty,
        });

        // Bootstrap: produce the initial LOD inline so the first frame after
        // decode is never blank.
        let pressure = self.memory.pressure();
        let level = self
            .lod_table
            .select(view.relative_scale(), pressure.lod_modifier());
        let entry = self.lod_table.level(level);
        let max_dim = pressure.max_texture_dimension(self.gpu.max_texture_dimension());
        let target = lod::target_size(
            width,
            height,
            entry.downscale,
            max_dim,
            self.memory.per_texture_byte_cap(),
        );
        self.generation += 1;
        let job = LodJob {
            generation: self.generation,
            level,
            target,
            quality: quality_for(entry.downscale),
            source: Arc::clone(&source),
        };
        let produced = factory::produce(&job)
            .map_err(|err| Error::TextureCreation(format!("bootstrap resample: {err:#}")))?;

        self.evict_textures();
        let texture = self
            .gpu
            .create_texture(&produced.pixels, produced.width, produced.height)?;
        let bytes = texture.byte_size();
        self.gpu.install(&texture);
        self.memory.set_texture_bytes(bytes);
        self.front = Some(CachedTexture {
            texture,
            level,
            bytes,
            last_used: Instant::now(),
        });
        self.current_lod = Some(level);
        self.in_flight = None;
        self.animation = None;
        self.source = Some(ImageSource {
            path: path.to_path_buf(),
            pixels: source,
        });
        self.view = Some(view);
        self.last_notified = None;
        self.emit_zoom();
        info!(level, width = target.0, height = target.1, "initial LOD installed");
        Ok(())
    }

    /// Feed one raw input event through the gesture decoder.
    pub fn handle_event(&mut self, event: InputEvent, now: Instant) {
        if self.destroyed {
            return;
        }
        for intent in self.gestures.handle(event, now) {
            match intent {
                Intent::Interrupt => self.interrupt_animation(now),
                Intent::Pan { dx, dy } => {
                    if let Some(view) = &mut self.view {
                        view.pan(dx, dy);
                    }
                    self.emit_zoom();
                }
                Intent::Zoom { x, y, factor } => self.apply_zoom(x, y, factor),
                Intent::DoubleActivate { x, y } => self.double_activate(x, y, now),
            }
        }
    }

    pub fn zoom_in(&mut self, animated: bool) {
        self.zoom_step(1.0 + self.config.wheel.step, animated);
    }

    pub fn zoom_out(&mut self, animated: bool) {
        self.zoom_step(1.0 - self.config.wheel.step, animated);
    }

    /// Ease back to the initial framing.
    pub fn reset_view(&mut self) {
        if self.destroyed {
            return;
        }
        let Some(view) = &self.view else { return };
        let target_scale = view
            .bounds()
            .clamp(view.fit_scale() * self.config.initial_scale);
        let from = view.transform();
        let target = Transform {
            scale: target_scale,
            tx: 0.0,
            ty: 0.0,
        };
        let duration = self.config.animation_duration();
        if duration.is_zero() {
            if let Some(view) = &mut self.view {
                view.set_transform(target);
            }
            self.emit_zoom();
            self.update_lod();
        } else {
            self.animation = Some(Animation::new(Instant::now(), duration, from, target));
        }
    }

    pub fn scale(&self) -> Option<f64> {
        self.view.as_ref().map(ViewState::scale)
    }

    pub fn relative_scale(&self) -> Option<f64> {
        self.view.as_ref().map(ViewState::relative_scale)
    }

    /// Copy the full-resolution source image to the system clipboard.
    pub fn copy_original_to_clipboard(&mut self) -> Result<(), Error> {
        self.ensure_alive()?;
        let Some(source) = &self.source else {
            warn!("copy requested with no image loaded");
            return Ok(());
        };
        match clipboard::copy_rgba(&source.pixels) {
            Ok(()) => {
                info!(path = %source.path.display(), "original copied to clipboard");
                if let Some(cb) = &mut self.callbacks.on_image_copied {
                    cb();
                }
                Ok(())
            }
            Err(err) => {
                warn!("clipboard write failed: {err}");
                Err(err)
            }
        }
    }

    /// Resize notification from the host.
    pub fn set_viewport(&mut self, width: f64, height: f64, device_pixel_ratio: f64) {
        if self.destroyed {
            return;
        }
        self.viewport = Viewport::new(width, height, device_pixel_ratio);
        self.memory.rebudget(device_pixel_ratio);
        let ratio = self
            .memory
            .pressure()
            .effective_pixel_ratio(device_pixel_ratio);
        let (bw, bh) = self.viewport.backing_size(ratio);
        self.gpu.resize(bw, bh);
        if let Some(view) = &mut self.view {
            view.set_viewport(self.viewport);
        }
        self.emit_zoom();
        self.update_lod();
    }

    /// One render tick: drain factory results, take an armed swap, step the
    /// animation, probe memory pressure, draw, publish debug state.
    pub fn frame(&mut self, now: Instant) {
        if self.destroyed {
            return;
        }
        self.drain_factory();
        self.swap_if_armed(now);
        self.step_animation(now);
        self.pressure_tick(now);
        if self.front.is_none() && self.in_flight.is_none() && self.source.is_some() {
            // A failed creation left the cache empty; ask again.
            self.update_lod();
        }
        self.clock.tick(now);

        let matrix = self
            .view
            .as_ref()
            .map_or([1.0, 1.0, 0.0, 0.0], ViewState::matrix);
        if let Some(front) = &mut self.front {
            front.last_used = now;
        }
        self.gpu.draw(matrix);

        if self.config.debug {
            self.publish_snapshot();
        }
    }

    /// Tear everything down. Idempotent; no operation is valid afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        // Orphan any in-flight completion so it can never mutate state.
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = None;
        let _ = self.job_tx.send(FactoryMsg::Quit);
        self.animation = None;
        self.gestures.reset();
        self.evict_textures();
        self.source = None;
        self.view = None;
        info!("viewer engine destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_alive(&self) -> Result<(), Error> {
        if self.destroyed {
            Err(Error::Destroyed)
        } else {
            Ok(())
        }
    }

    fn zoom_step(&mut self, factor: f64, animated: bool) {
        if self.destroyed {
            return;
        }
        let Some(view) = &self.view else { return };
        let cx = view.viewport().width / 2.0;
        let cy = view.viewport().height / 2.0;
        if animated {
            self.animate_zoom(cx, cy, factor, Instant::now());
        } else {
            self.apply_zoom(cx, cy, factor);
        }
    }

    fn apply_zoom(&mut self, x: f64, y: f64, factor: f64) {
        let Some(view) = &mut self.view else { return };
        if view.zoom_about(x, y, factor) {
            self.emit_zoom();
            self.update_lod();
        }
    }

    fn double_activate(&mut self, x: f64, y: f64, now: Instant) {
        let Some(view) = &self.view else { return };
        let factor = match self.config.double_click.mode {
            DoubleClickMode::Toggle => {
                let current = view.scale();
                let target = if (current - 1.0).abs() < ONE_TO_ONE_EPSILON {
                    view.fit_scale() * self.config.initial_scale
                } else {
                    1.0
                };
                view.bounds().clamp(target) / current
            }
            DoubleClickMode::Zoom => self.config.double_click.step,
        };
        self.animate_zoom(x, y, factor, now);
    }

    fn animate_zoom(&mut self, x: f64, y: f64, factor: f64, now: Instant) {
        let Some(view) = &self.view else { return };
        let Some(target) = view.zoom_target(x, y, factor) else {
            return;
        };
        let from = view.transform();
        let duration = self.config.animation_duration();
        if duration.is_zero() {
            if let Some(view) = &mut self.view {
                view.set_transform(target);
            }
            self.emit_zoom();
            self.update_lod();
        } else {
            self.animation = Some(Animation::new(now, duration, from, target));
        }
    }

    /// Freeze an in-flight ease where it currently is.
    fn interrupt_animation(&mut self, now: Instant) {
        let Some(animation) = self.animation.take() else {
            return;
        };
        let (transform, _) = animation.sample(now);
        if let Some(view) = &mut self.view {
            view.set_transform(transform);
        }
        self.emit_zoom();
        self.update_lod();
    }

    fn step_animation(&mut self, now: Instant) {
        let Some(animation) = &self.animation else {
            return;
        };
        let (transform, done) = animation.sample(now);
        if let Some(view) = &mut self.view {
            view.set_transform(transform);
        }
        self.emit_zoom();
        if done {
            self.animation = None;
            self.update_lod();
        }
    }

    fn pressure_tick(&mut self, now: Instant) {
        let Some(pressure) = self.memory.tick(now) else {
            return;
        };
        let ratio = pressure.effective_pixel_ratio(self.viewport.device_pixel_ratio);
        let (bw, bh) = self.viewport.backing_size(ratio);
        self.gpu.resize(bw, bh);
        if pressure == MemoryPressure::Critical && !self.armed {
            // Emergency cleanup: everything but the front goes. The front
            // stays visible; the pending re-selection below replaces it.
            if let Some(back) = self.back.take() {
                back.texture.destroy();
                let front_bytes = self.front.as_ref().map_or(0, |f| f.bytes);
                self.memory.set_texture_bytes(front_bytes);
            }
        }
        self.update_lod();
    }

    /// Re-select the LOD for the current transform and pressure, and request
    /// production when it differs from what is cached or in flight.
    fn update_lod(&mut self) {
        if self.destroyed {
            return;
        }
        let Some(view) = &self.view else { return };
        let Some(source) = &self.source else { return };
        let pressure = self.memory.pressure();
        let level = self
            .lod_table
            .select(view.relative_scale(), pressure.lod_modifier());
        if self.current_lod == Some(level) && self.front.is_some() {
            if let Some((_, pending)) = self.in_flight
                && pending != level
            {
                // The pending request no longer matches the policy; orphan
                // its completion.
                self.generation += 1;
                self.in_flight = None;
            }
            return;
        }
        if let Some((_, pending)) = self.in_flight
            && pending == level
        {
            // Coalesce: the factory is already on it.
            return;
        }
        let entry = self.lod_table.level(level);
        let (sw, sh) = source.pixels.dimensions();
        let max_dim = pressure.max_texture_dimension(self.gpu.max_texture_dimension());
        let target = lod::target_size(
            sw,
            sh,
            entry.downscale,
            max_dim,
            self.memory.per_texture_byte_cap(),
        );
        let source_pixels = Arc::clone(&source.pixels);

        self.generation += 1;
        self.in_flight = Some((self.generation, level));
        debug!(level, width = target.0, height = target.1, "requesting LOD");
        let job = LodJob {
            generation: self.generation,
            level,
            target,
            quality: quality_for(entry.downscale),
            source: source_pixels,
        };
        if let Err(send_err) = self.job_tx.send(FactoryMsg::Produce(job)) {
            // Worker is gone; fall back to producing inline this frame.
            let FactoryMsg::Produce(job) = send_err.0 else {
                return;
            };
            match factory::produce(&job) {
                Ok(result) => self.install_result(result),
                Err(err) => {
                    warn!("inline LOD production failed: {err:#}");
                    self.in_flight = None;
                }
            }
        }
    }

    fn drain_factory(&mut self) {
        while let Ok(result) = self.result_rx.try_recv() {
            self.install_result(result);
        }
    }

    /// Accept a finished LOD unless a newer request superseded it. The
    /// single-entry cache policy runs here: evict, then allocate, then arm
    /// the back slot for the swap at the next frame boundary.
    fn install_result(&mut self, result: LodPixels) {
        if result.generation != self.generation {
            debug!(
                level = result.level,
                generation = result.generation,
                "discarding superseded LOD result"
            );
            return;
        }
        self.in_flight = None;
        self.evict_textures();
        match self.gpu.create_texture(&result.pixels, result.width, result.height) {
            Ok(texture) => {
                let bytes = texture.byte_size();
                self.memory.set_texture_bytes(bytes);
                self.back = Some(CachedTexture {
                    texture,
                    level: result.level,
                    bytes,
                    last_used: Instant::now(),
                });
                self.armed = true;
            }
            Err(err) => {
                // Keep going with an empty cache; the frame tick re-requests.
                warn!("LOD {} upload failed: {err}", result.level);
            }
        }
    }

    /// Atomic front/back handoff, strictly between draws.
    fn swap_if_armed(&mut self, now: Instant) {
        if !self.armed {
            return;
        }
        self.armed = false;
        let Some(mut back) = self.back.take() else {
            return;
        };
        back.last_used = now;
        self.gpu.install(&back.texture);
        self.current_lod = Some(back.level);
        debug!(level = back.level, "front texture swapped");
        self.front = Some(back);
    }

    fn evict_textures(&mut self) {
        let had_any = self.front.is_some() || self.back.is_some();
        if let Some(front) = self.front.take() {
            debug!(
                level = front.level,
                bytes = front.bytes,
                idle_ms = front.last_used.elapsed().as_millis() as u64,
                "evicting front texture"
            );
            front.texture.destroy();
        }
        if let Some(back) = self.back.take() {
            back.texture.destroy();
        }
        if had_any {
            self.gpu.clear_binding();
        }
        self.armed = false;
        self.current_lod = None;
        self.memory.set_texture_bytes(0);
    }

    fn emit_zoom(&mut self) {
        let Some(view) = &self.view else { return };
        let transform = view.transform();
        if self.last_notified == Some(transform) {
            return;
        }
        let scale = view.scale();
        let relative = view.relative_scale();
        self.last_notified = Some(transform);
        if let Some(cb) = &mut self.callbacks.on_zoom_change {
            cb(scale, relative);
        }
    }

    fn publish_snapshot(&mut self) {
        if self.callbacks.on_debug_update.is_none() {
            return;
        }
        let Some(view) = &self.view else { return };
        let transform = view.transform();
        let (image_width, image_height) = view.image_size();
        let (canvas_width, canvas_height) = self.gpu.surface_size();
        let snapshot = DebugSnapshot {
            scale: transform.scale,
            relative_scale: view.relative_scale(),
            tx: transform.tx,
            ty: transform.ty,
            current_lod: self.current_lod,
            lod_count: self.lod_table.len(),
            canvas_width,
            canvas_height,
            image_width,
            image_height,
            fit_scale: view.fit_scale(),
            effective_max_scale: view.bounds().max,
            original_size_scale: 1.0,
            render_count: self.clock.render_count,
            fps: self.clock.fps(),
            frame_time_ms: self.clock.frame_time_ms,
            max_texture_size: self.gpu.max_texture_dimension(),
            user_max_scale: self.config.max_scale,
            memory: self.memory.info(),
        };
        if let Some(cb) = &mut self.callbacks.on_debug_update {
            cb(&snapshot);
        }
    }
}

impl Drop for ViewerEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn quality_for(downscale: f64) -> ResizeQuality {
    if downscale >= 1.0 {
        ResizeQuality::High
    } else {
        ResizeQuality::Medium
    }
}
