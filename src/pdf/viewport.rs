//! Zoom and pan transform for the displayed page
//!
//! The rendered bitmap is drawn at `offset` and scaled by `zoom`, so a
//! bitmap pixel `p` appears on screen at `offset + p * zoom`. Gestures edit
//! those two values. Once zoom has been idle for the debounce delay above
//! 1x, [`ViewportTransform::tick`] asks for a sharper re-render and
//! [`ViewportTransform::commit_hires`] swaps the transform over to the new
//! bitmap without moving what the user is looking at.

use std::time::{Duration, Instant};

use log::debug;

use super::gesture::{Debounce, GestureHandler};
use super::types::{Point, Rect, Size};
use crate::settings::ViewerSettings;

const ZOOM_EPSILON: f32 = 1e-4;

/// Tunables for gesture-driven zoom
#[derive(Clone, Debug, PartialEq)]
pub struct ZoomOptions {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Zoom reached by double tap from 1x
    pub tap_zoom_factor: f32,
    /// Multiplier used by zoom in/out buttons
    pub zoom_step: f32,
    /// Zoom change per unit of wheel delta
    pub wheel_zoom_step: f32,
    /// Restrict drags to their dominant axis
    pub lock_drag_axis: bool,
    /// Inactivity before a hi-res re-render
    pub hires_debounce: Duration,
}

impl Default for ZoomOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 4.0,
            tap_zoom_factor: 2.0,
            zoom_step: 1.3,
            wheel_zoom_step: 0.01,
            lock_drag_axis: false,
            hires_debounce: Duration::from_millis(300),
        }
    }
}

impl From<&ViewerSettings> for ZoomOptions {
    fn from(settings: &ViewerSettings) -> Self {
        Self {
            min_zoom: settings.min_zoom,
            max_zoom: settings.max_zoom.max(settings.min_zoom),
            tap_zoom_factor: settings.tap_zoom_factor,
            zoom_step: settings.zoom_step,
            wheel_zoom_step: settings.wheel_zoom_step,
            lock_drag_axis: settings.lock_drag_axis,
            hires_debounce: Duration::from_millis(settings.hires_debounce_ms),
        }
    }
}

/// Request for a sharper render once zoom has settled
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HiResPlan {
    /// Settled zoom factor to fold into the render scale
    pub zoom: f32,
}

/// Current zoom and pan, as applied by the host when drawing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub zoom: f32,
    pub offset: Point,
}

#[derive(Clone, Copy, Debug)]
enum Gesture {
    Idle,
    Drag { previous: Point },
    Pinch { initial_distance: f32, initial_zoom: f32 },
}

#[derive(Debug)]
pub struct ViewportTransform {
    zoom: f32,
    offset: Point,
    container: Size,
    options: ZoomOptions,
    gesture: Gesture,
    zoom_changed: bool,
    settle: Debounce,
    detached: bool,
}

impl ViewportTransform {
    #[must_use]
    pub fn new(container: Size, options: ZoomOptions) -> Self {
        let settle = Debounce::new(options.hires_debounce);
        Self {
            zoom: 1.0,
            offset: Point::default(),
            container,
            options,
            gesture: Gesture::Idle,
            zoom_changed: false,
            settle,
            detached: false,
        }
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[must_use]
    pub fn offset(&self) -> Point {
        self.offset
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform {
            zoom: self.zoom,
            offset: self.offset,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ZoomOptions {
        &self.options
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn set_container(&mut self, container: Size) {
        self.container = container;
    }

    /// Bitmap coordinates currently shown at a screen point
    #[must_use]
    pub fn to_content(&self, screen: Point) -> Point {
        (screen - self.offset) * (1.0 / self.zoom)
    }

    /// Screen position of a bitmap coordinate
    #[must_use]
    pub fn to_screen(&self, content: Point) -> Point {
        self.offset + content * self.zoom
    }

    /// Clamp factor to the configured range, handling NaN/Inf
    #[must_use]
    pub fn clamp_factor(&self, factor: f32) -> f32 {
        if factor.is_finite() {
            factor.clamp(self.options.min_zoom, self.options.max_zoom)
        } else {
            self.zoom
        }
    }

    /// Zoom to `factor`, keeping the content under `center` fixed on screen
    pub fn set_zoom(&mut self, factor: f32, center: Point) {
        if self.detached {
            return;
        }
        let new_zoom = self.clamp_factor(factor);
        self.offset = center - (center - self.offset) * (new_zoom / self.zoom);
        if (new_zoom - self.zoom).abs() > ZOOM_EPSILON {
            self.zoom_changed = true;
        }
        self.zoom = new_zoom;
    }

    pub fn set_offset(&mut self, offset: Point) {
        if !self.detached {
            self.offset = offset;
        }
    }

    /// Zoom in by one step around the container center
    pub fn zoom_in(&mut self) {
        let factor = self.zoom * self.options.zoom_step;
        self.set_zoom(factor, self.container.center());
    }

    /// Zoom out by one step around the container center
    pub fn zoom_out(&mut self) {
        let factor = self.zoom / self.options.zoom_step;
        self.set_zoom(factor, self.container.center());
    }

    /// Zoom to an absolute factor around the container center
    pub fn scale_to(&mut self, factor: f32) {
        self.set_zoom(factor, self.container.center());
    }

    /// Back to identity
    pub fn reset(&mut self) {
        if self.detached {
            return;
        }
        if (self.zoom - 1.0).abs() > ZOOM_EPSILON {
            self.zoom_changed = true;
        }
        self.zoom = 1.0;
        self.offset = Point::default();
    }

    /// Pan so `rect` (bitmap pixels) sits in the middle of the container
    pub fn center_on(&mut self, rect: &Rect) {
        if self.detached {
            return;
        }
        self.offset = self.container.center() - rect.center() * self.zoom;
    }

    /// Advance the settle timer. Returns a plan when a hi-res render is due.
    pub fn tick(&mut self, now: Instant) -> Option<HiResPlan> {
        if self.detached {
            return None;
        }
        if self.zoom_changed {
            self.zoom_changed = false;
            self.settle.arm(now);
        }
        if self.settle.fire_if_due(now) && self.zoom > 1.0 + ZOOM_EPSILON {
            debug!("Zoom settled at {:.3}, requesting hi-res render", self.zoom);
            return Some(HiResPlan { zoom: self.zoom });
        }
        None
    }

    /// Switch to a bitmap rendered at `new_scale` in place of `old_scale`.
    ///
    /// The zoom absorbed by the new scale is removed from the transform and
    /// the offset recomputed so the document point at the container center
    /// stays there.
    pub fn commit_hires(&mut self, old_scale: f32, new_scale: f32) {
        if self.detached || old_scale <= 0.0 || new_scale <= 0.0 {
            return;
        }
        let ratio = new_scale / old_scale;
        let center = self.container.center();
        let anchor = self.to_content(center) * ratio;

        let mut zoom = self.zoom / ratio;
        if (zoom - 1.0).abs() < ZOOM_EPSILON {
            zoom = 1.0;
        }
        self.zoom = zoom;
        self.offset = center - anchor * zoom;
        self.gesture = Gesture::Idle;
        self.zoom_changed = false;
        self.settle.cancel();
    }

    /// Detach from input and clear the settle timer
    pub fn destroy(&mut self) {
        self.detached = true;
        self.gesture = Gesture::Idle;
        self.zoom_changed = false;
        self.settle.cancel();
    }
}

impl GestureHandler for ViewportTransform {
    fn on_drag_start(&mut self, at: Point) {
        if !self.detached {
            self.gesture = Gesture::Drag { previous: at };
        }
    }

    fn on_drag_move(&mut self, at: Point) {
        let Gesture::Drag { previous } = self.gesture else {
            return;
        };
        let mut delta = at - previous;
        if self.options.lock_drag_axis {
            if delta.x.abs() > delta.y.abs() {
                delta.y = 0.0;
            } else {
                delta.x = 0.0;
            }
        }
        self.offset = self.offset + delta;
        self.gesture = Gesture::Drag { previous: at };
    }

    fn on_drag_end(&mut self) {
        if matches!(self.gesture, Gesture::Drag { .. }) {
            self.gesture = Gesture::Idle;
        }
    }

    fn on_pinch_start(&mut self, a: Point, b: Point) {
        if self.detached {
            return;
        }
        self.gesture = Gesture::Pinch {
            initial_distance: a.distance(b),
            initial_zoom: self.zoom,
        };
    }

    fn on_pinch_move(&mut self, a: Point, b: Point) {
        let Gesture::Pinch {
            initial_distance,
            initial_zoom,
        } = self.gesture
        else {
            return;
        };
        if initial_distance <= f32::EPSILON {
            return;
        }
        let ratio = a.distance(b) / initial_distance;
        self.set_zoom(initial_zoom * ratio, a.midpoint(b));
    }

    fn on_pinch_end(&mut self) {
        if matches!(self.gesture, Gesture::Pinch { .. }) {
            self.gesture = Gesture::Idle;
        }
    }

    fn on_wheel(&mut self, delta_y: f32, at: Point) {
        let factor = self.zoom - delta_y * self.options.wheel_zoom_step;
        self.set_zoom(factor, at);
    }

    fn on_double_tap(&mut self, at: Point) {
        self.gesture = Gesture::Idle;
        if self.zoom > 1.0 + ZOOM_EPSILON {
            self.set_zoom(1.0, at);
        } else {
            self.set_zoom(self.options.tap_zoom_factor, at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f32 = 1e-3;

    fn viewport() -> ViewportTransform {
        ViewportTransform::new(Size::new(800.0, 600.0), ZoomOptions::default())
    }

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < TOLERANCE && (a.y - b.y).abs() < TOLERANCE,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn drag_translates_by_pointer_delta() {
        let mut vp = viewport();
        vp.on_drag_start(Point::new(10.0, 10.0));
        vp.on_drag_move(Point::new(25.0, 5.0));
        vp.on_drag_move(Point::new(30.0, 0.0));
        vp.on_drag_end();
        assert_close(vp.offset(), Point::new(20.0, -10.0));

        // Moves after the drag ended are ignored
        vp.on_drag_move(Point::new(500.0, 500.0));
        assert_close(vp.offset(), Point::new(20.0, -10.0));
    }

    #[test]
    fn locked_drag_keeps_dominant_axis() {
        let options = ZoomOptions {
            lock_drag_axis: true,
            ..ZoomOptions::default()
        };
        let mut vp = ViewportTransform::new(Size::new(800.0, 600.0), options);
        vp.on_drag_start(Point::new(0.0, 0.0));
        vp.on_drag_move(Point::new(30.0, 10.0));
        assert_close(vp.offset(), Point::new(30.0, 0.0));
    }

    #[test]
    fn pinch_zoom_keeps_center_fixed() {
        let mut vp = viewport();
        vp.set_offset(Point::new(-40.0, 15.0));
        let a = Point::new(200.0, 300.0);
        let b = Point::new(300.0, 300.0);
        let center = a.midpoint(b);
        let before = vp.to_content(center);

        vp.on_pinch_start(a, b);
        // Fingers spread symmetrically: distance 100 -> 250
        vp.on_pinch_move(Point::new(125.0, 300.0), Point::new(375.0, 300.0));

        assert!((vp.zoom() - 2.5).abs() < TOLERANCE);
        assert_close(vp.to_content(center), before);
    }

    #[test]
    fn pinch_zoom_is_clamped() {
        let mut vp = viewport();
        vp.on_pinch_start(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        vp.on_pinch_move(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!((vp.zoom() - 4.0).abs() < TOLERANCE);

        vp.on_pinch_move(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        assert!((vp.zoom() - 0.5).abs() < TOLERANCE);
    }

    #[test]
    fn degenerate_pinch_is_ignored() {
        let mut vp = viewport();
        let p = Point::new(50.0, 50.0);
        vp.on_pinch_start(p, p);
        vp.on_pinch_move(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!((vp.zoom() - 1.0).abs() < TOLERANCE);
    }

    #[test]
    fn double_tap_toggles_tap_zoom() {
        let mut vp = viewport();
        let at = Point::new(100.0, 80.0);
        let before = vp.to_content(at);

        vp.on_double_tap(at);
        assert!((vp.zoom() - 2.0).abs() < TOLERANCE);
        assert_close(vp.to_content(at), before);

        vp.on_double_tap(at);
        assert!((vp.zoom() - 1.0).abs() < TOLERANCE);
        assert_close(vp.to_content(at), before);
    }

    #[test]
    fn wheel_scroll_up_zooms_in_at_cursor() {
        let mut vp = viewport();
        let at = Point::new(640.0, 120.0);
        let before = vp.to_content(at);
        vp.on_wheel(-50.0, at);
        assert!((vp.zoom() - 1.5).abs() < TOLERANCE);
        assert_close(vp.to_content(at), before);
    }

    #[test]
    fn buttons_zoom_around_container_center() {
        let mut vp = viewport();
        let center = Point::new(400.0, 300.0);
        let before = vp.to_content(center);
        vp.zoom_in();
        assert!((vp.zoom() - 1.3).abs() < TOLERANCE);
        vp.zoom_out();
        assert!((vp.zoom() - 1.0).abs() < TOLERANCE);
        assert_close(vp.to_content(center), before);

        vp.scale_to(3.0);
        vp.reset();
        assert_eq!(vp.transform().offset, Point::default());
    }

    #[test]
    fn settled_zoom_above_one_requests_hires_once() {
        let mut vp = viewport();
        let t0 = Instant::now();
        vp.scale_to(2.0);

        assert!(vp.tick(t0).is_none());
        assert!(vp.tick(t0 + Duration::from_millis(299)).is_none());
        let plan = vp.tick(t0 + Duration::from_millis(300));
        assert_eq!(plan, Some(HiResPlan { zoom: 2.0 }));
        assert!(vp.tick(t0 + Duration::from_millis(900)).is_none());
    }

    #[test]
    fn settled_zoom_at_or_below_one_does_not_request_hires() {
        let mut vp = viewport();
        let t0 = Instant::now();
        vp.scale_to(0.8);
        assert!(vp.tick(t0).is_none());
        assert!(vp.tick(t0 + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn continued_zooming_postpones_hires() {
        let mut vp = viewport();
        let t0 = Instant::now();
        vp.scale_to(1.5);
        assert!(vp.tick(t0).is_none());
        vp.scale_to(2.0);
        assert!(vp.tick(t0 + Duration::from_millis(200)).is_none());
        assert!(vp.tick(t0 + Duration::from_millis(400)).is_none());
        assert!(vp.tick(t0 + Duration::from_millis(500)).is_some());
    }

    #[test]
    fn commit_hires_resets_to_identity_and_keeps_center() {
        let mut vp = viewport();
        vp.set_zoom(2.5, Point::new(150.0, 420.0));
        let center = Point::new(400.0, 300.0);
        let base_scale = 1.2;
        let doc_before = vp.to_content(center) * (1.0 / base_scale);

        vp.commit_hires(base_scale, base_scale * 2.5);

        assert!((vp.zoom() - 1.0).abs() < f32::EPSILON);
        let doc_after = vp.to_content(center) * (1.0 / (base_scale * 2.5));
        assert_close(doc_after, doc_before);
    }

    #[test]
    fn capped_hires_keeps_residual_zoom() {
        let mut vp = viewport();
        vp.scale_to(4.0);
        let center = Point::new(400.0, 300.0);
        let doc_before = vp.to_content(center) * (1.0 / 2.0);

        // Render scale capped at 6 instead of 8
        vp.commit_hires(2.0, 6.0);

        assert!((vp.zoom() - 4.0 / 3.0).abs() < TOLERANCE);
        assert_close(vp.to_content(center) * (1.0 / 6.0), doc_before);
    }

    #[test]
    fn center_on_places_rect_mid_container() {
        let mut vp = viewport();
        vp.scale_to(2.0);
        vp.center_on(&Rect::new(100.0, 100.0, 20.0, 10.0));
        assert_close(vp.to_screen(Point::new(110.0, 105.0)), Point::new(400.0, 300.0));
    }

    #[test]
    fn destroyed_viewport_ignores_input_and_timer() {
        let mut vp = viewport();
        let t0 = Instant::now();
        vp.scale_to(2.0);
        assert!(vp.tick(t0).is_none());

        vp.destroy();
        assert!(vp.is_detached());
        assert!(vp.tick(t0 + Duration::from_secs(5)).is_none());

        vp.on_drag_start(Point::new(0.0, 0.0));
        vp.on_drag_move(Point::new(50.0, 50.0));
        vp.on_double_tap(Point::new(0.0, 0.0));
        assert!((vp.zoom() - 2.0).abs() < TOLERANCE);
    }
}
