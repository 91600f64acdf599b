//! Winit host: owns the window, translates window events into engine input,
//! and drives the render tick on every redraw.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::Configuration;
use crate::engine::{Callbacks, ViewerEngine};
use crate::gesture::InputEvent;
use crate::render::gpu::Gpu;

/// Open a window on `image` and run until the user closes it.
///
/// # Errors
/// Returns an error when the event loop, GPU context or image load fails.
pub fn run_viewer(config: Configuration, image: PathBuf) -> Result<()> {
    let event_loop = EventLoop::new()?;
    let mut app = LoupeApp::new(config, image);
    event_loop.run_app(&mut app)?;
    if let Some(err) = app.failure.take() {
        return Err(err);
    }
    Ok(())
}

struct LoupeApp {
    config: Configuration,
    image: PathBuf,
    window: Option<Arc<Window>>,
    engine: Option<ViewerEngine>,
    cursor: (f64, f64),
    failure: Option<anyhow::Error>,
}

impl LoupeApp {
    fn new(config: Configuration, image: PathBuf) -> Self {
        Self {
            config,
            image,
            window: None,
            engine: None,
            cursor: (0.0, 0.0),
            failure: None,
        }
    }

    fn init_engine(&self, window: Arc<Window>) -> Result<ViewerEngine> {
        let gpu = Gpu::new(window.clone(), self.config.debug).context("GPU init")?;
        let callbacks = Callbacks {
            on_zoom_change: Some(Box::new(|absolute, relative| {
                debug!(scale = absolute, relative, "zoom changed");
            })),
            on_image_copied: Some(Box::new(|| info!("image copied to clipboard"))),
            on_debug_update: None,
        };
        let mut engine = ViewerEngine::new(gpu, self.config.clone(), callbacks)?;
        let scale_factor = window.scale_factor();
        let size = window.inner_size();
        engine.set_viewport(
            f64::from(size.width) / scale_factor,
            f64::from(size.height) / scale_factor,
            scale_factor,
        );
        engine
            .load(&self.image)
            .with_context(|| format!("loading {}", self.image.display()))?;
        Ok(engine)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("viewer startup failed: {err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for LoupeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            return;
        }
        let attrs = WindowAttributes::default().with_title("photo loupe");
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, err.into());
                return;
            }
        };
        self.window = Some(window.clone());
        match self.init_engine(window) {
            Ok(engine) => self.engine = Some(engine),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = &self.window else { return };
        if window.id() != window_id {
            return;
        }
        let scale_factor = window.scale_factor();
        let Some(engine) = &mut self.engine else {
            if matches!(event, WindowEvent::CloseRequested) {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                engine.destroy();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Released {
                    use winit::keyboard::{KeyCode, PhysicalKey};
                    match event.physical_key {
                        PhysicalKey::Code(KeyCode::Escape | KeyCode::KeyQ) => {
                            engine.destroy();
                            event_loop.exit();
                        }
                        PhysicalKey::Code(KeyCode::Equal | KeyCode::NumpadAdd) => {
                            engine.zoom_in(true);
                        }
                        PhysicalKey::Code(KeyCode::Minus | KeyCode::NumpadSubtract) => {
                            engine.zoom_out(true);
                        }
                        PhysicalKey::Code(KeyCode::Digit0) => engine.reset_view(),
                        PhysicalKey::Code(KeyCode::KeyC) => {
                            if let Err(err) = engine.copy_original_to_clipboard() {
                                error!("copy failed: {err}");
                            }
                        }
                        _ => {}
                    }
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if width > 0 && height > 0 {
                    engine.set_viewport(
                        f64::from(width) / scale_factor,
                        f64::from(height) / scale_factor,
                        scale_factor,
                    );
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = window.inner_size();
                engine.set_viewport(
                    f64::from(size.width) / scale_factor,
                    f64::from(size.height) / scale_factor,
                    scale_factor,
                );
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f64>(scale_factor);
                self.cursor = (logical.x, logical.y);
                engine.handle_event(
                    InputEvent::PointerMove {
                        x: logical.x,
                        y: logical.y,
                    },
                    Instant::now(),
                );
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let event = match state {
                    ElementState::Pressed => InputEvent::PointerDown {
                        x: self.cursor.0,
                        y: self.cursor.1,
                        primary: button == MouseButton::Left,
                    },
                    ElementState::Released => InputEvent::PointerUp,
                };
                engine.handle_event(event, Instant::now());
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // Wheel-away is positive in winit; the zoom convention wants
                // positive to mean "toward the user".
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -f64::from(y),
                    MouseScrollDelta::PixelDelta(position) => -position.y,
                };
                if delta_y != 0.0 {
                    engine.handle_event(
                        InputEvent::Wheel {
                            x: self.cursor.0,
                            y: self.cursor.1,
                            delta_y,
                        },
                        Instant::now(),
                    );
                }
            }
            WindowEvent::Touch(touch) => {
                let logical = touch.location.to_logical::<f64>(scale_factor);
                let event = match touch.phase {
                    TouchPhase::Started => InputEvent::TouchStart {
                        id: touch.id,
                        x: logical.x,
                        y: logical.y,
                    },
                    TouchPhase::Moved => InputEvent::TouchMove {
                        id: touch.id,
                        x: logical.x,
                        y: logical.y,
                    },
                    TouchPhase::Ended | TouchPhase::Cancelled => {
                        InputEvent::TouchEnd { id: touch.id }
                    }
                };
                engine.handle_event(event, Instant::now());
            }
            WindowEvent::RedrawRequested => engine.frame(Instant::now()),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
