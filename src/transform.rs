//! View transform state: image scale and translation within the viewport,
//! fit-relative scale bounds, and the anchor-fixed zoom used by wheel, pinch
//! and double-activation.

use crate::viewport::Viewport;

/// Comparison slack for scale-bound checks; keeps exact-boundary zooms
/// (e.g. a 10x wheel chain landing precisely on the maximum) in range.
const SCALE_TOLERANCE: f64 = 1e-9;

/// (s, tx, ty): `scale` is image pixels per logical pixel; `tx`/`ty` offset
/// the image center from the viewport center, in logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub tx: f64,
    pub ty: f64,
}

/// Absolute scale bounds derived from the fit scale and the configured
/// fit-relative limits. The maximum is floored at 1.0 so 1:1 pixel parity is
/// always reachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBounds {
    pub min: f64,
    pub max: f64,
}

impl ScaleBounds {
    pub fn contains(&self, scale: f64) -> bool {
        scale >= self.min * (1.0 - SCALE_TOLERANCE) && scale <= self.max * (1.0 + SCALE_TOLERANCE)
    }

    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }
}

/// Transform state for one loaded image in one viewport.
#[derive(Debug, Clone)]
pub struct ViewState {
    image_width: u32,
    image_height: u32,
    viewport: Viewport,
    min_relative: f64,
    max_relative: f64,
    limit_to_bounds: bool,
    transform: Transform,
}

impl ViewState {
    /// Starts at the fit scale, centered.
    pub fn new(
        image_width: u32,
        image_height: u32,
        viewport: Viewport,
        min_relative: f64,
        max_relative: f64,
        limit_to_bounds: bool,
    ) -> Self {
        let mut state = Self {
            image_width: image_width.max(1),
            image_height: image_height.max(1),
            viewport,
            min_relative,
            max_relative,
            limit_to_bounds,
            transform: Transform {
                scale: 1.0,
                tx: 0.0,
                ty: 0.0,
            },
        };
        state.transform.scale = state.fit_scale();
        state.constrain();
        state
    }

    /// The scale at which the image exactly fits the viewport along its
    /// tighter axis.
    pub fn fit_scale(&self) -> f64 {
        let by_width = self.viewport.width / f64::from(self.image_width);
        let by_height = self.viewport.height / f64::from(self.image_height);
        by_width.min(by_height)
    }

    pub fn bounds(&self) -> ScaleBounds {
        let fit = self.fit_scale();
        ScaleBounds {
            min: fit * self.min_relative,
            max: (fit * self.max_relative).max(1.0),
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn scale(&self) -> f64 {
        self.transform.scale
    }

    /// s / F; 1.0 means fit.
    pub fn relative_scale(&self) -> f64 {
        self.transform.scale / self.fit_scale()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.constrain();
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.constrain();
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.transform.tx += dx;
        self.transform.ty += dy;
        self.constrain();
    }

    /// Rescale by `factor` keeping the image point under the viewport
    /// location (x, y) stationary. Returns false (leaving the transform
    /// untouched) when the resulting scale would leave the bounds.
    pub fn zoom_about(&mut self, x: f64, y: f64, factor: f64) -> bool {
        let next_scale = self.transform.scale * factor;
        if !self.bounds().contains(next_scale) {
            return false;
        }
        let half_w = self.viewport.width / 2.0;
        let half_h = self.viewport.height / 2.0;
        let t = self.transform;
        let anchor_x = (x - half_w - t.tx) / t.scale;
        let anchor_y = (y - half_h - t.ty) / t.scale;
        self.transform = Transform {
            scale: next_scale,
            tx: x - half_w - anchor_x * next_scale,
            ty: y - half_h - anchor_y * next_scale,
        };
        self.constrain();
        true
    }

    /// The transform an in-range `zoom_about` would land on, without
    /// mutating this state. Used to build animation targets.
    pub fn zoom_target(&self, x: f64, y: f64, factor: f64) -> Option<Transform> {
        let mut probe = self.clone();
        probe.zoom_about(x, y, factor).then(|| probe.transform)
    }

    /// Clamp the scale to bounds, then the translation to the pannable
    /// range. When the image does not cover the viewport the translation
    /// collapses to center. Idempotent.
    pub fn constrain(&mut self) {
        let bounds = self.bounds();
        self.transform.scale = bounds.clamp(self.transform.scale);
        if !self.limit_to_bounds {
            return;
        }
        if self.transform.scale <= self.fit_scale() {
            self.transform.tx = 0.0;
            self.transform.ty = 0.0;
        } else {
            let scaled_w = self.transform.scale * f64::from(self.image_width);
            let scaled_h = self.transform.scale * f64::from(self.image_height);
            let max_tx = ((scaled_w - self.viewport.width) / 2.0).max(0.0);
            let max_ty = ((scaled_h - self.viewport.height) / 2.0).max(0.0);
            self.transform.tx = self.transform.tx.clamp(-max_tx, max_tx);
            self.transform.ty = self.transform.ty.clamp(-max_ty, max_ty);
        }
    }

    /// Projection for a unit quad: diagonals (s·W/Vw, s·H/Vh), translation
    /// (2·tx/Vw, −2·ty/Vh). The y flip converts logical y-down into NDC y-up.
    pub fn matrix(&self) -> [f32; 4] {
        let t = self.transform;
        [
            (t.scale * f64::from(self.image_width) / self.viewport.width) as f32,
            (t.scale * f64::from(self.image_height) / self.viewport.height) as f32,
            (2.0 * t.tx / self.viewport.width) as f32,
            (-2.0 * t.ty / self.viewport.height) as f32,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> ViewState {
        ViewState::new(
            8000,
            6000,
            Viewport::new(800.0, 600.0, 1.0),
            0.1,
            10.0,
            true,
        )
    }

    // Wider relative bounds so scales past 1:1 stay reachable.
    fn wide_view() -> ViewState {
        ViewState::new(
            8000,
            6000,
            Viewport::new(800.0, 600.0, 1.0),
            0.1,
            30.0,
            true,
        )
    }

    #[test]
    fn starts_at_fit_centered() {
        let v = view();
        assert!((v.fit_scale() - 0.1).abs() < 1e-12);
        assert!((v.scale() - 0.1).abs() < 1e-12);
        assert_eq!(v.transform().tx, 0.0);
        assert_eq!(v.transform().ty, 0.0);
    }

    #[test]
    fn max_bound_is_floored_at_one() {
        let v = ViewState::new(
            8000,
            6000,
            Viewport::new(800.0, 600.0, 1.0),
            0.1,
            2.0,
            true,
        );
        // F·maxRel = 0.2, but 1:1 stays reachable.
        assert!((v.bounds().max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zoom_about_keeps_anchor_fixed() {
        let mut v = view();
        assert!(v.zoom_about(200.0, 150.0, 4.0));
        let before = v.transform();
        // Image-space point under (200, 150) before another zoom...
        let ax = (200.0 - 400.0 - before.tx) / before.scale;
        let ay = (150.0 - 300.0 - before.ty) / before.scale;
        assert!(v.zoom_about(200.0, 150.0, 1.5));
        let after = v.transform();
        // ...is still under (200, 150) afterwards.
        let ax2 = (200.0 - 400.0 - after.tx) / after.scale;
        let ay2 = (150.0 - 300.0 - after.ty) / after.scale;
        assert!((ax - ax2).abs() < 1e-9);
        assert!((ay - ay2).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_zoom_is_rejected_without_drift() {
        let mut v = view();
        let before = v.transform();
        assert!(!v.zoom_about(400.0, 300.0, 0.05)); // below F·minRel
        assert_eq!(v.transform(), before);
        assert!(!v.zoom_about(400.0, 300.0, 100.0)); // above bounds
        assert_eq!(v.transform(), before);
    }

    #[test]
    fn constrain_is_idempotent() {
        let mut v = wide_view();
        assert!(v.zoom_about(0.0, 0.0, 20.0));
        v.pan(10_000.0, -10_000.0);
        let once = v.transform();
        v.constrain();
        assert_eq!(v.transform(), once);
    }

    #[test]
    fn below_fit_forces_centering() {
        let mut v = view();
        v.set_transform(Transform {
            scale: 0.05,
            tx: 40.0,
            ty: -12.0,
        });
        assert_eq!(v.transform().tx, 0.0);
        assert_eq!(v.transform().ty, 0.0);
    }

    #[test]
    fn pan_clamps_to_covered_area() {
        let mut v = wide_view();
        assert!(v.zoom_about(400.0, 300.0, 20.0)); // s = 2.0
        v.pan(100_000.0, 100_000.0);
        let t = v.transform();
        assert!((t.tx - 7600.0).abs() < 1e-9);
        assert!((t.ty - 5700.0).abs() < 1e-9);
    }

    #[test]
    fn matrix_is_identity_at_exact_fit_cover() {
        let v = view();
        let m = v.matrix();
        assert!((m[0] - 1.0).abs() < 1e-6);
        assert!((m[1] - 1.0).abs() < 1e-6);
        assert_eq!(m[2], 0.0);
        assert_eq!(m[3], 0.0);
    }
}
