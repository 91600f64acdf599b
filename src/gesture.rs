//! Gesture decoding: raw pointer, wheel and touch events in; pan/zoom
//! intents out. The decoder owns all gesture bookkeeping (drag state, pinch
//! distance, double-tap and double-press timing) so the engine only sees
//! intents.

use std::time::{Duration, Instant};

/// Two activations closer than this (strictly) count as a double.
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);
/// Maximum per-axis travel (strictly) between the two activations.
pub const DOUBLE_TAP_SLOP: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64, primary: bool },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Wheel { x: f64, y: f64, delta_y: f64 },
    TouchStart { id: u64, x: f64, y: f64 },
    TouchMove { id: u64, x: f64, y: f64 },
    TouchEnd { id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// A fresh press or wheel tick; preempts any in-flight animation.
    Interrupt,
    Pan { dx: f64, dy: f64 },
    Zoom { x: f64, y: f64, factor: f64 },
    DoubleActivate { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct GestureOptions {
    pub panning_disabled: bool,
    pub pinch_disabled: bool,
    pub wheel_disabled: bool,
    pub double_click_disabled: bool,
    /// Fractional zoom per wheel tick.
    pub wheel_step: f64,
}

#[derive(Debug)]
pub struct GestureDecoder {
    options: GestureOptions,
    dragging: bool,
    last_pointer: (f64, f64),
    touches: Vec<(u64, (f64, f64))>,
    pinch_distance: Option<f64>,
    last_tap: Option<(Instant, (f64, f64))>,
    last_press: Option<(Instant, (f64, f64))>,
}

impl GestureDecoder {
    pub fn new(options: GestureOptions) -> Self {
        Self {
            options,
            dragging: false,
            last_pointer: (0.0, 0.0),
            touches: Vec::with_capacity(2),
            pinch_distance: None,
            last_tap: None,
            last_press: None,
        }
    }

    /// Drop all gesture state (pointer-up equivalent plus timers).
    pub fn reset(&mut self) {
        self.dragging = false;
        self.touches.clear();
        self.pinch_distance = None;
        self.last_tap = None;
        self.last_press = None;
    }

    pub fn handle(&mut self, event: InputEvent, now: Instant) -> Vec<Intent> {
        match event {
            InputEvent::PointerDown { x, y, primary } => self.pointer_down(x, y, primary, now),
            InputEvent::PointerMove { x, y } => self.pointer_move(x, y),
            InputEvent::PointerUp => {
                self.dragging = false;
                Vec::new()
            }
            InputEvent::Wheel { x, y, delta_y } => self.wheel(x, y, delta_y),
            InputEvent::TouchStart { id, x, y } => self.touch_start(id, x, y, now),
            InputEvent::TouchMove { id, x, y } => self.touch_move(id, x, y),
            InputEvent::TouchEnd { id } => self.touch_end(id),
        }
    }

    fn pointer_down(&mut self, x: f64, y: f64, primary: bool, now: Instant) -> Vec<Intent> {
        let mut intents = vec![Intent::Interrupt];
        if !primary {
            return intents;
        }
        if !self.options.panning_disabled {
            self.dragging = true;
            self.last_pointer = (x, y);
        }
        if !self.options.double_click_disabled {
            if Self::is_double(self.last_press.take(), x, y, now) {
                intents.push(Intent::DoubleActivate { x, y });
            } else {
                self.last_press = Some((now, (x, y)));
            }
        }
        intents
    }

    fn pointer_move(&mut self, x: f64, y: f64) -> Vec<Intent> {
        if !self.dragging {
            return Vec::new();
        }
        let (lx, ly) = self.last_pointer;
        self.last_pointer = (x, y);
        vec![Intent::Pan {
            dx: x - lx,
            dy: y - ly,
        }]
    }

    fn wheel(&mut self, x: f64, y: f64, delta_y: f64) -> Vec<Intent> {
        if self.options.wheel_disabled {
            return Vec::new();
        }
        let factor = if delta_y > 0.0 {
            1.0 - self.options.wheel_step
        } else {
            1.0 + self.options.wheel_step
        };
        vec![Intent::Interrupt, Intent::Zoom { x, y, factor }]
    }

    fn touch_start(&mut self, id: u64, x: f64, y: f64, now: Instant) -> Vec<Intent> {
        let mut intents = vec![Intent::Interrupt];
        if self.touches.len() < 2 && !self.touches.iter().any(|(t, _)| *t == id) {
            self.touches.push((id, (x, y)));
        }
        match self.touches.len() {
            1 => {
                if !self.options.double_click_disabled {
                    if Self::is_double(self.last_tap.take(), x, y, now) {
                        intents.push(Intent::DoubleActivate { x, y });
                    } else {
                        self.last_tap = Some((now, (x, y)));
                    }
                }
                if !self.options.panning_disabled {
                    self.dragging = true;
                    self.last_pointer = (x, y);
                }
            }
            2 => {
                self.dragging = false;
                if !self.options.pinch_disabled {
                    self.pinch_distance = Some(self.touch_distance());
                }
            }
            _ => {}
        }
        intents
    }

    fn touch_move(&mut self, id: u64, x: f64, y: f64) -> Vec<Intent> {
        let Some(slot) = self.touches.iter_mut().find(|(t, _)| *t == id) else {
            return Vec::new();
        };
        slot.1 = (x, y);

        if self.touches.len() == 2 {
            let Some(previous) = self.pinch_distance else {
                return Vec::new();
            };
            let distance = self.touch_distance();
            if previous <= 0.0 || distance <= 0.0 {
                return Vec::new();
            }
            self.pinch_distance = Some(distance);
            let (mx, my) = self.touch_midpoint();
            return vec![Intent::Zoom {
                x: mx,
                y: my,
                factor: distance / previous,
            }];
        }

        if self.dragging {
            let (lx, ly) = self.last_pointer;
            self.last_pointer = (x, y);
            return vec![Intent::Pan {
                dx: x - lx,
                dy: y - ly,
            }];
        }
        Vec::new()
    }

    fn touch_end(&mut self, id: u64) -> Vec<Intent> {
        self.touches.retain(|(t, _)| *t != id);
        if self.touches.len() < 2 {
            self.pinch_distance = None;
        }
        match self.touches.first() {
            Some(&(_, (x, y))) if !self.options.panning_disabled => {
                // Re-anchor the drag to the remaining finger.
                self.dragging = true;
                self.last_pointer = (x, y);
            }
            _ => self.dragging = false,
        }
        Vec::new()
    }

    /// Strict window and slop: Δt < 300 ms and |Δx|, |Δy| < 50 logical
    /// units. Callers take() the slot before the check, so a fired double
    /// leaves it empty and a third activation starts a fresh window instead
    /// of cascading.
    fn is_double(previous: Option<(Instant, (f64, f64))>, x: f64, y: f64, now: Instant) -> bool {
        let Some((then, (px, py))) = previous else {
            return false;
        };
        now.saturating_duration_since(then) < DOUBLE_TAP_WINDOW
            && (x - px).abs() < DOUBLE_TAP_SLOP
            && (y - py).abs() < DOUBLE_TAP_SLOP
    }

    fn touch_distance(&self) -> f64 {
        let (_, (ax, ay)) = self.touches[0];
        let (_, (bx, by)) = self.touches[1];
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    fn touch_midpoint(&self) -> (f64, f64) {
        let (_, (ax, ay)) = self.touches[0];
        let (_, (bx, by)) = self.touches[1];
        ((ax + bx) / 2.0, (ay + by) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GestureOptions {
        GestureOptions {
            panning_disabled: false,
            pinch_disabled: false,
            wheel_disabled: false,
            double_click_disabled: false,
            wheel_step: 0.2,
        }
    }

    fn decoder() -> GestureDecoder {
        GestureDecoder::new(options())
    }

    #[test]
    fn drag_emits_pan_deltas() {
        let mut d = decoder();
        let t0 = Instant::now();
        d.handle(
            InputEvent::PointerDown {
                x: 10.0,
                y: 10.0,
                primary: true,
            },
            t0,
        );
        let intents = d.handle(InputEvent::PointerMove { x: 14.0, y: 7.0 }, t0);
        assert_eq!(
            intents,
            vec![Intent::Pan { dx: 4.0, dy: -3.0 }]
        );
        d.handle(InputEvent::PointerUp, t0);
        assert!(d.handle(InputEvent::PointerMove { x: 20.0, y: 20.0 }, t0).is_empty());
    }

    #[test]
    fn wheel_maps_sign_to_factor() {
        let mut d = decoder();
        let now = Instant::now();
        let zoom_out = d.handle(
            InputEvent::Wheel {
                x: 5.0,
                y: 5.0,
                delta_y: 3.0,
            },
            now,
        );
        assert!(zoom_out.contains(&Intent::Zoom {
            x: 5.0,
            y: 5.0,
            factor: 0.8
        }));
        let zoom_in = d.handle(
            InputEvent::Wheel {
                x: 5.0,
                y: 5.0,
                delta_y: -3.0,
            },
            now,
        );
        assert!(zoom_in.contains(&Intent::Zoom {
            x: 5.0,
            y: 5.0,
            factor: 1.2
        }));
    }

    #[test]
    fn wheel_disabled_suppresses_all_intents() {
        let mut d = GestureDecoder::new(GestureOptions {
            wheel_disabled: true,
            ..options()
        });
        assert!(d
            .handle(
                InputEvent::Wheel {
                    x: 0.0,
                    y: 0.0,
                    delta_y: 1.0
                },
                Instant::now()
            )
            .is_empty());
    }

    #[test]
    fn double_tap_requires_strict_window() {
        let mut d = decoder();
        let t0 = Instant::now();
        d.handle(
            InputEvent::TouchStart {
                id: 1,
                x: 100.0,
                y: 100.0,
            },
            t0,
        );
        d.handle(InputEvent::TouchEnd { id: 1 }, t0);
        // Exactly 300 ms later is too late: strict inequality.
        let late = d.handle(
            InputEvent::TouchStart {
                id: 2,
                x: 100.0,
                y: 100.0,
            },
            t0 + DOUBLE_TAP_WINDOW,
        );
        assert!(!late
            .iter()
            .any(|i| matches!(i, Intent::DoubleActivate { .. })));
    }

    #[test]
    fn double_tap_requires_strict_slop() {
        let mut d = decoder();
        let t0 = Instant::now();
        d.handle(
            InputEvent::TouchStart {
                id: 1,
                x: 100.0,
                y: 100.0,
            },
            t0,
        );
        d.handle(InputEvent::TouchEnd { id: 1 }, t0);
        let far = d.handle(
            InputEvent::TouchStart {
                id: 2,
                x: 150.0,
                y: 100.0,
            },
            t0 + Duration::from_millis(100),
        );
        assert!(!far
            .iter()
            .any(|i| matches!(i, Intent::DoubleActivate { .. })));
    }

    #[test]
    fn triple_tap_does_not_cascade() {
        let mut d = decoder();
        let t0 = Instant::now();
        let step = Duration::from_millis(100);
        d.handle(
            InputEvent::TouchStart {
                id: 1,
                x: 50.0,
                y: 50.0,
            },
            t0,
        );
        d.handle(InputEvent::TouchEnd { id: 1 }, t0);
        let second = d.handle(
            InputEvent::TouchStart {
                id: 2,
                x: 50.0,
                y: 50.0,
            },
            t0 + step,
        );
        assert!(second
            .iter()
            .any(|i| matches!(i, Intent::DoubleActivate { .. })));
        d.handle(InputEvent::TouchEnd { id: 2 }, t0 + step);
        // The timer was consumed by the second tap; the third starts over.
        let third = d.handle(
            InputEvent::TouchStart {
                id: 3,
                x: 50.0,
                y: 50.0,
            },
            t0 + step + step,
        );
        assert!(!third
            .iter()
            .any(|i| matches!(i, Intent::DoubleActivate { .. })));
    }

    #[test]
    fn mouse_double_press_activates() {
        let mut d = decoder();
        let t0 = Instant::now();
        d.handle(
            InputEvent::PointerDown {
                x: 10.0,
                y: 10.0,
                primary: true,
            },
            t0,
        );
        d.handle(InputEvent::PointerUp, t0);
        let second = d.handle(
            InputEvent::PointerDown {
                x: 12.0,
                y: 11.0,
                primary: true,
            },
            t0 + Duration::from_millis(120),
        );
        assert!(second.contains(&Intent::DoubleActivate { x: 12.0, y: 11.0 }));
    }

    #[test]
    fn pinch_zooms_about_midpoint_by_distance_ratio() {
        let mut d = decoder();
        let now = Instant::now();
        d.handle(
            InputEvent::TouchStart {
                id: 1,
                x: 100.0,
                y: 200.0,
            },
            now,
        );
        d.handle(
            InputEvent::TouchStart {
                id: 2,
                x: 200.0,
                y: 200.0,
            },
            now,
        );
        // Spread from 100 apart to 150 apart.
        let intents = d.handle(
            InputEvent::TouchMove {
                id: 2,
                x: 250.0,
                y: 200.0,
            },
            now,
        );
        match intents.as_slice() {
            [Intent::Zoom { x, y, factor }] => {
                assert_eq!(*x, 175.0);
                assert_eq!(*y, 200.0);
                assert!((factor - 1.5).abs() < 1e-12);
            }
            other => panic!("expected a pinch zoom, got {other:?}"),
        }
    }

    #[test]
    fn lifting_one_finger_reanchors_drag() {
        let mut d = decoder();
        let now = Instant::now();
        d.handle(
            InputEvent::TouchStart {
                id: 1,
                x: 0.0,
                y: 0.0,
            },
            now,
        );
        d.handle(
            InputEvent::TouchStart {
                id: 2,
                x: 100.0,
                y: 0.0,
            },
            now,
        );
        d.handle(InputEvent::TouchEnd { id: 1 }, now);
        let intents = d.handle(
            InputEvent::TouchMove {
                id: 2,
                x: 110.0,
                y: 5.0,
            },
            now,
        );
        assert_eq!(intents, vec![Intent::Pan { dx: 10.0, dy: 5.0 }]);
    }
}
