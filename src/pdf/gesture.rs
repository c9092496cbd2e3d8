//! Gesture input abstraction
//!
//! Hosts translate their pointer/touch/wheel events into [`GestureEvent`]s
//! and hand them to a [`GestureHandler`]. Coordinates are container-relative
//! pixels.

use std::time::{Duration, Instant};

use super::types::Point;

/// Receiver of high-level gestures
pub trait GestureHandler {
    fn on_drag_start(&mut self, at: Point);
    fn on_drag_move(&mut self, at: Point);
    fn on_drag_end(&mut self);

    fn on_pinch_start(&mut self, a: Point, b: Point);
    fn on_pinch_move(&mut self, a: Point, b: Point);
    fn on_pinch_end(&mut self);

    /// Positive `delta_y` scrolls down, which zooms out
    fn on_wheel(&mut self, delta_y: f32, at: Point);

    fn on_double_tap(&mut self, at: Point);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    DragStart(Point),
    DragMove(Point),
    DragEnd,
    PinchStart(Point, Point),
    PinchMove(Point, Point),
    PinchEnd,
    Wheel { delta_y: f32, at: Point },
    DoubleTap(Point),
}

impl GestureEvent {
    /// Route this event to the matching handler method
    pub fn dispatch<H: GestureHandler + ?Sized>(self, handler: &mut H) {
        match self {
            Self::DragStart(at) => handler.on_drag_start(at),
            Self::DragMove(at) => handler.on_drag_move(at),
            Self::DragEnd => handler.on_drag_end(),
            Self::PinchStart(a, b) => handler.on_pinch_start(a, b),
            Self::PinchMove(a, b) => handler.on_pinch_move(a, b),
            Self::PinchEnd => handler.on_pinch_end(),
            Self::Wheel { delta_y, at } => handler.on_wheel(delta_y, at),
            Self::DoubleTap(at) => handler.on_double_tap(at),
        }
    }
}

/// Turns single taps into double taps for sources that only report taps
#[derive(Debug)]
pub struct TapDetector {
    window: Duration,
    last_tap: Option<Instant>,
}

impl TapDetector {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(300);

    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_tap: None,
        }
    }

    /// Record a tap. Returns a double-tap event when it completes one.
    pub fn tap(&mut self, at: Point, now: Instant) -> Option<GestureEvent> {
        match self.last_tap.take() {
            Some(prev) if now.saturating_duration_since(prev) < self.window => {
                Some(GestureEvent::DoubleTap(at))
            }
            _ => {
                self.last_tap = Some(now);
                None
            }
        }
    }
}

impl Default for TapDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

/// Inactivity timer driven by explicit timestamps
#[derive(Debug, Default)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// (Re)start the timer from `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fires at most once per arming
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<&'static str>);

    impl GestureHandler for Recorder {
        fn on_drag_start(&mut self, _: Point) {
            self.0.push("drag_start");
        }
        fn on_drag_move(&mut self, _: Point) {
            self.0.push("drag_move");
        }
        fn on_drag_end(&mut self) {
            self.0.push("drag_end");
        }
        fn on_pinch_start(&mut self, _: Point, _: Point) {
            self.0.push("pinch_start");
        }
        fn on_pinch_move(&mut self, _: Point, _: Point) {
            self.0.push("pinch_move");
        }
        fn on_pinch_end(&mut self) {
            self.0.push("pinch_end");
        }
        fn on_wheel(&mut self, _: f32, _: Point) {
            self.0.push("wheel");
        }
        fn on_double_tap(&mut self, _: Point) {
            self.0.push("double_tap");
        }
    }

    #[test]
    fn dispatch_routes_to_handler() {
        let mut rec = Recorder::default();
        let p = Point::new(1.0, 2.0);
        for event in [
            GestureEvent::DragStart(p),
            GestureEvent::DragMove(p),
            GestureEvent::DragEnd,
            GestureEvent::Wheel { delta_y: 1.0, at: p },
            GestureEvent::DoubleTap(p),
        ] {
            event.dispatch(&mut rec);
        }
        assert_eq!(
            rec.0,
            vec!["drag_start", "drag_move", "drag_end", "wheel", "double_tap"]
        );
    }

    #[test]
    fn two_quick_taps_make_a_double_tap() {
        let mut taps = TapDetector::default();
        let t0 = Instant::now();
        let p = Point::new(5.0, 5.0);

        assert!(taps.tap(p, t0).is_none());
        assert_eq!(
            taps.tap(p, t0 + Duration::from_millis(120)),
            Some(GestureEvent::DoubleTap(p))
        );
        // A third tap starts over
        assert!(taps.tap(p, t0 + Duration::from_millis(200)).is_none());
    }

    #[test]
    fn slow_taps_are_not_double() {
        let mut taps = TapDetector::default();
        let t0 = Instant::now();
        let p = Point::default();
        assert!(taps.tap(p, t0).is_none());
        assert!(taps.tap(p, t0 + Duration::from_millis(450)).is_none());
    }

    #[test]
    fn debounce_fires_once_after_delay() {
        let mut d = Debounce::new(Duration::from_millis(300));
        let t0 = Instant::now();
        d.arm(t0);
        assert!(!d.fire_if_due(t0 + Duration::from_millis(299)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(300)));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(900)));
    }

    #[test]
    fn rearming_pushes_deadline() {
        let mut d = Debounce::new(Duration::from_millis(300));
        let t0 = Instant::now();
        d.arm(t0);
        d.arm(t0 + Duration::from_millis(200));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(400)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(500)));

        d.arm(t0);
        d.cancel();
        assert!(!d.is_armed());
    }
}
