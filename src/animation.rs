//! Eased transform interpolation. One record exists per in-flight ease; the
//! render tick samples it and drops it on completion.

use std::time::{Duration, Instant};

use crate::transform::Transform;

/// Quartic ease-out: fast start, long settle.
pub fn ease_out_quart(progress: f64) -> f64 {
    let q = 1.0 - progress.clamp(0.0, 1.0);
    1.0 - q * q * q * q
}

fn lerp(from: f64, to: f64, p: f64) -> f64 {
    from + (to - from) * p
}

#[derive(Debug, Clone)]
pub struct Animation {
    start: Instant,
    duration: Duration,
    from: Transform,
    to: Transform,
}

impl Animation {
    /// `to` must already be constrained; sampling does not re-clamp.
    pub fn new(start: Instant, duration: Duration, from: Transform, to: Transform) -> Self {
        Self {
            start,
            duration,
            from,
            to,
        }
    }

    pub fn target(&self) -> Transform {
        self.to
    }

    /// Returns the eased transform for `now` and whether the ease finished.
    /// A zero duration completes immediately.
    pub fn sample(&self, now: Instant) -> (Transform, bool) {
        if self.duration.is_zero() {
            return (self.to, true);
        }
        let elapsed = now.saturating_duration_since(self.start).as_secs_f64();
        let p = (elapsed / self.duration.as_secs_f64()).min(1.0);
        let eased = ease_out_quart(p);
        let transform = Transform {
            scale: lerp(self.from.scale, self.to.scale, eased),
            tx: lerp(self.from.tx, self.to.tx, eased),
            ty: lerp(self.from.ty, self.to.ty, eased),
        };
        (transform, p >= 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(scale: f64, tx: f64, ty: f64) -> Transform {
        Transform { scale, tx, ty }
    }

    #[test]
    fn ease_hits_both_endpoints() {
        assert_eq!(ease_out_quart(0.0), 0.0);
        assert_eq!(ease_out_quart(1.0), 1.0);
    }

    #[test]
    fn ease_front_loads_progress() {
        // Quartic ease-out covers most of the distance in the first half.
        assert!(ease_out_quart(0.5) > 0.9);
    }

    #[test]
    fn sample_interpolates_and_finishes() {
        let start = Instant::now();
        let anim = Animation::new(
            start,
            Duration::from_millis(300),
            t(0.1, 0.0, 0.0),
            t(1.0, 100.0, -50.0),
        );
        let (mid, done) = anim.sample(start + Duration::from_millis(150));
        assert!(!done);
        assert!(mid.scale > 0.1 && mid.scale < 1.0);
        let (end, done) = anim.sample(start + Duration::from_millis(300));
        assert!(done);
        assert_eq!(end, t(1.0, 100.0, -50.0));
    }

    #[test]
    fn zero_duration_completes_immediately() {
        let start = Instant::now();
        let anim = Animation::new(start, Duration::ZERO, t(0.1, 0.0, 0.0), t(1.0, 0.0, 0.0));
        let (end, done) = anim.sample(start);
        assert!(done);
        assert_eq!(end.scale, 1.0);
    }

    #[test]
    fn sample_before_start_stays_at_origin() {
        let start = Instant::now() + Duration::from_secs(1);
        let anim = Animation::new(
            start,
            Duration::from_millis(300),
            t(0.5, 10.0, 10.0),
            t(1.0, 0.0, 0.0),
        );
        let (at, done) = anim.sample(Instant::now());
        assert!(!done);
        assert_eq!(at, t(0.5, 10.0, 10.0));
    }
}
