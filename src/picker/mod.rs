//! Region picker for defining the OCR area
//!
//! Touch-driven rectangle with two resize handles (top-left and
//! bottom-right) and drag-to-move inside. Every change is published as an
//! immutable snapshot that the OCR worker reads once per frame.

pub mod render;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PickerSettings;
use crate::geometry::{map_selection_to_sensor, Orientation, SelectionRect, SensorCropRect, Size};

pub use render::{draw_primitives, handle_rects, rasterize, DrawPrimitive, PixelRect};

/// Default ratio between the view's short side and the handle size
pub const DEFAULT_DIVIDER: i32 = 8;
/// Default gap kept between the rectangle and the view edges
pub const DEFAULT_PADDING: i32 = 0;

/// Initial sizing of the rectangle on first layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickerFit {
    /// Fill the whole view minus padding
    Fill,
    /// Largest square that fits
    #[default]
    Square,
}

/// Where the current gesture started relative to the rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveZone {
    #[default]
    None,
    TopLeftHandle,
    BottomRightHandle,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Down,
    Move,
    Up,
    Cancel,
}

/// Touch input in view pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub x: i32,
    pub y: i32,
}

impl TouchEvent {
    pub fn down(x: i32, y: i32) -> Self {
        Self { action: TouchAction::Down, x, y }
    }

    pub fn moved(x: i32, y: i32) -> Self {
        Self { action: TouchAction::Move, x, y }
    }

    pub fn up(x: i32, y: i32) -> Self {
        Self { action: TouchAction::Up, x, y }
    }
}

/// Selection shared with the worker; writers replace the whole rectangle
#[derive(Debug, Clone, Default)]
pub struct SelectionHandle(Arc<RwLock<SelectionRect>>);

impl SelectionHandle {
    /// Copy of the latest published rectangle
    pub fn snapshot(&self) -> SelectionRect {
        *self.0.read()
    }

    fn publish(&self, rect: SelectionRect) {
        *self.0.write() = rect;
    }
}

/// Callback fired after every change to the rectangle
pub type ResizeListener = Box<dyn FnMut(&SelectionRect) + Send>;

/// Interactive rectangle state machine
pub struct RegionPicker {
    rect: SelectionRect,
    fit: PickerFit,
    divider: i32,
    active_size: i32,
    zone: ActiveZone,
    touch_x: i32,
    touch_y: i32,
    laid_out: bool,
    redraw_requested: bool,
    shared: SelectionHandle,
    listener: Option<ResizeListener>,
}

impl RegionPicker {
    /// Create a picker; it has no geometry until `layout` is called
    pub fn new(settings: &PickerSettings) -> Self {
        Self {
            rect: SelectionRect {
                padding: settings.padding,
                ..SelectionRect::default()
            },
            fit: settings.fit,
            divider: settings.divider.max(1),
            active_size: 0,
            zone: ActiveZone::None,
            touch_x: 0,
            touch_y: 0,
            laid_out: false,
            redraw_requested: false,
            shared: SelectionHandle::default(),
            listener: None,
        }
    }

    /// Apply the host view's size.
    ///
    /// The first layout sizes the rectangle according to the fit mode. Later
    /// layouts keep the rectangle unless it no longer fits the new bounds.
    pub fn layout(&mut self, bound_width: i32, bound_height: i32) {
        self.rect.bound_width = bound_width;
        self.rect.bound_height = bound_height;
        self.active_size = bound_width.min(bound_height) / self.divider;

        debug!("Picker layout {}x{}, handle size {}", bound_width, bound_height, self.active_size);

        if !self.laid_out || !self.rect.is_valid() {
            self.laid_out = true;
            self.compute_initial_layout();
        }

        self.shared.publish(self.rect);
        self.redraw_requested = true;
    }

    fn compute_initial_layout(&mut self) {
        let padding = self.rect.padding;
        let (width, height) = match self.fit {
            PickerFit::Fill => (
                self.rect.bound_width - 2 * padding,
                self.rect.bound_height - 2 * padding,
            ),
            PickerFit::Square => {
                let side = self.rect.bound_width.min(self.rect.bound_height) - 2 * padding;
                (side, side)
            }
        };

        self.rect.x = padding;
        self.rect.y = padding;
        self.rect.width = width;
        self.rect.height = height;
    }

    /// Dispatch a raw touch event; returns true if the rectangle changed
    pub fn on_touch_event(&mut self, event: TouchEvent) -> bool {
        match event.action {
            TouchAction::Down => {
                self.on_touch_down(event.x, event.y);
                false
            }
            TouchAction::Move => self.on_touch_move(event.x, event.y),
            TouchAction::Up | TouchAction::Cancel => {
                self.on_touch_up();
                false
            }
        }
    }

    /// Classify the touch point and remember it as the gesture origin
    pub fn on_touch_down(&mut self, x: i32, y: i32) -> ActiveZone {
        self.zone = self.classify(x, y);
        self.reset_touch(x, y);
        self.zone
    }

    /// Apply the delta since the last recorded touch point
    pub fn on_touch_move(&mut self, x: i32, y: i32) -> bool {
        let dx = x - self.touch_x;
        let dy = y - self.touch_y;

        if dx == 0 && dy == 0 {
            return false;
        }

        let before = self.rect;
        match self.zone {
            ActiveZone::Inside => self.translate(dx, dy),
            ActiveZone::TopLeftHandle => self.resize_top_left(dx, dy),
            ActiveZone::BottomRightHandle => self.resize_bottom_right(dx, dy),
            ActiveZone::None => return false,
        }

        self.reset_touch(x, y);

        if self.rect == before {
            return false;
        }

        debug!("Picker {:?} moved by ({}, {}): {:?}", self.zone, dx, dy, self.rect);
        self.update_view();
        true
    }

    /// End of gesture; the zone is reclassified on the next touch-down
    pub fn on_touch_up(&mut self) {}

    /// Replace the rectangle outright. Rejected (returns false) if it would
    /// break the padding/bounds invariants.
    pub fn set_selection(&mut self, x: i32, y: i32, width: i32, height: i32) -> bool {
        let candidate = SelectionRect {
            x,
            y,
            width,
            height,
            ..self.rect
        };
        if !candidate.is_valid() {
            debug!("Rejected selection {:?}", candidate);
            return false;
        }
        if candidate != self.rect {
            self.rect = candidate;
            self.update_view();
        }
        true
    }

    /// Hit-test a point against the handles and the rectangle
    pub fn classify(&self, x: i32, y: i32) -> ActiveZone {
        let (top_left, bottom_right) = handle_rects(&self.rect, self.active_size);

        if top_left.contains(x, y) {
            ActiveZone::TopLeftHandle
        } else if bottom_right.contains(x, y) {
            ActiveZone::BottomRightHandle
        } else if self.rect.contains(x, y) {
            ActiveZone::Inside
        } else {
            ActiveZone::None
        }
    }

    fn translate(&mut self, dx: i32, dy: i32) {
        let x = self.rect.x + dx;
        if self.is_valid_left(x) && self.is_valid_right(x + self.rect.width) {
            self.rect.x = x;
        }

        let y = self.rect.y + dy;
        if self.is_valid_top(y) && self.is_valid_bottom(y + self.rect.height) {
            self.rect.y = y;
        }
    }

    fn resize_top_left(&mut self, dx: i32, dy: i32) {
        if self.is_valid_left(self.rect.x + dx) {
            self.rect.width -= dx;
            self.rect.x += dx;
        }
        if self.is_valid_top(self.rect.y + dy) {
            self.rect.height -= dy;
            self.rect.y += dy;
        }
    }

    fn resize_bottom_right(&mut self, dx: i32, dy: i32) {
        if self.is_valid_right(self.rect.right() + dx) {
            self.rect.width += dx;
        }
        if self.is_valid_bottom(self.rect.bottom() + dy) {
            self.rect.height += dy;
        }
    }

    fn is_valid_left(&self, left: i32) -> bool {
        left >= self.rect.padding && left < self.rect.right()
    }

    fn is_valid_right(&self, right: i32) -> bool {
        right <= self.rect.bound_width - self.rect.padding && right > self.rect.left()
    }

    fn is_valid_top(&self, top: i32) -> bool {
        top >= self.rect.padding && top < self.rect.bottom()
    }

    fn is_valid_bottom(&self, bottom: i32) -> bool {
        bottom <= self.rect.bound_height - self.rect.padding && bottom > self.rect.top()
    }

    fn reset_touch(&mut self, x: i32, y: i32) {
        self.touch_x = x;
        self.touch_y = y;
    }

    fn update_view(&mut self) {
        self.shared.publish(self.rect);
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.rect);
        }
        self.redraw_requested = true;
    }

    /// Register the resize callback, replacing any previous one
    pub fn set_resize_listener(&mut self, listener: ResizeListener) {
        self.listener = Some(listener);
    }

    /// Current rectangle in view pixels
    pub fn selection(&self) -> SelectionRect {
        self.rect
    }

    /// Handle for readers on other threads
    pub fn handle(&self) -> SelectionHandle {
        self.shared.clone()
    }

    pub fn active_zone(&self) -> ActiveZone {
        self.zone
    }

    pub fn active_size(&self) -> i32 {
        self.active_size
    }

    /// Returns true once per pending redraw
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    /// Primitives for the current state
    pub fn draw(&self) -> Vec<DrawPrimitive> {
        draw_primitives(&self.rect, self.active_size)
    }

    /// Selection mapped onto a sensor of `sensor` size
    pub fn sensor_rect(&self, sensor: Size, orientation: Orientation) -> SensorCropRect {
        map_selection_to_sensor(&self.rect, self.rect.bound_size(), sensor, orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(fit: PickerFit, divider: i32, padding: i32) -> PickerSettings {
        PickerSettings { divider, padding, fit }
    }

    /// Picker laid out in a 300x300 view with the given rectangle
    fn picker_with(x: i32, y: i32, width: i32, height: i32, padding: i32) -> RegionPicker {
        let mut picker = RegionPicker::new(&settings(PickerFit::Square, 15, padding));
        picker.layout(300, 300);
        picker.rect.x = x;
        picker.rect.y = y;
        picker.rect.width = width;
        picker.rect.height = height;
        picker
    }

    #[test]
    fn test_initial_layout_square() {
        let mut picker = RegionPicker::new(&settings(PickerFit::Square, 8, 10));
        picker.layout(400, 300);

        let rect = picker.selection();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (10, 10, 280, 280));
        assert_eq!(picker.active_size(), 300 / 8);
        assert!(rect.is_valid());
        assert_eq!(picker.handle().snapshot(), rect);
    }

    #[test]
    fn test_initial_layout_fill() {
        let mut picker = RegionPicker::new(&settings(PickerFit::Fill, 8, 5));
        picker.layout(400, 300);

        let rect = picker.selection();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (5, 5, 390, 290));
    }

    #[test]
    fn test_relayout_keeps_fitting_rect() {
        let mut picker = picker_with(10, 10, 50, 50, 0);
        picker.layout(200, 200);
        assert_eq!(picker.selection().x, 10);
        assert_eq!(picker.active_size(), 200 / 15);

        // Shrinking below the rectangle recomputes it
        picker.layout(40, 40);
        let rect = picker.selection();
        assert!(rect.is_valid());
        assert_eq!((rect.width, rect.height), (40, 40));
    }

    #[test]
    fn test_top_left_drag_scenario() {
        // 300 / 15 = 20 pixel handles
        let mut picker = picker_with(10, 10, 100, 100, 0);
        assert_eq!(picker.active_size(), 20);

        assert_eq!(picker.on_touch_down(10, 10), ActiveZone::TopLeftHandle);
        assert!(picker.on_touch_move(15, 15));

        let rect = picker.selection();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (15, 15, 95, 95));
    }

    #[test]
    fn test_classification() {
        let mut picker = picker_with(10, 10, 100, 100, 0);

        assert_eq!(picker.on_touch_down(30, 30), ActiveZone::TopLeftHandle);
        assert_eq!(picker.on_touch_down(31, 30), ActiveZone::Inside);
        assert_eq!(picker.on_touch_down(110, 110), ActiveZone::BottomRightHandle);
        assert_eq!(picker.on_touch_down(90, 90), ActiveZone::BottomRightHandle);
        assert_eq!(picker.on_touch_down(60, 60), ActiveZone::Inside);
        assert_eq!(picker.on_touch_down(111, 60), ActiveZone::None);
        assert_eq!(picker.on_touch_down(5, 5), ActiveZone::None);
    }

    #[test]
    fn test_move_inside_partial_axis() {
        let mut picker = picker_with(0, 50, 100, 100, 0);
        picker.on_touch_down(50, 100);

        // x would go negative, y is fine
        assert!(picker.on_touch_move(40, 110));
        let rect = picker.selection();
        assert_eq!((rect.x, rect.y), (0, 60));
        assert_eq!((rect.width, rect.height), (100, 100));
    }

    #[test]
    fn test_move_inside_blocked_at_far_edge() {
        let mut picker = picker_with(200, 200, 100, 100, 0);
        picker.on_touch_down(250, 250);
        assert!(!picker.on_touch_move(251, 251));
        assert_eq!(picker.selection().x, 200);
    }

    #[test]
    fn test_bottom_right_resize() {
        let mut picker = picker_with(10, 10, 100, 100, 0);
        assert_eq!(picker.on_touch_down(105, 105), ActiveZone::BottomRightHandle);
        assert!(picker.on_touch_move(125, 95));

        let rect = picker.selection();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (10, 10, 120, 90));
    }

    #[test]
    fn test_resize_cannot_invert() {
        let mut picker = picker_with(10, 10, 100, 100, 0);
        picker.on_touch_down(12, 12);
        // New left would equal the right edge
        assert!(!picker.on_touch_move(112, 112));
        let rect = picker.selection();
        assert_eq!((rect.width, rect.height), (100, 100));

        picker.on_touch_down(109, 109);
        // Dragging bottom-right past the left edge is rejected too
        picker.on_touch_move(0, 0);
        assert!(picker.selection().width > 0);
        assert!(picker.selection().height > 0);
    }

    #[test]
    fn test_deltas_are_incremental() {
        let mut picker = picker_with(100, 100, 50, 50, 0);
        assert_eq!(picker.on_touch_down(125, 125), ActiveZone::Inside);
        picker.on_touch_move(130, 125);
        picker.on_touch_move(135, 125);
        assert_eq!(picker.selection().x, 110);

        // Same point again: no delta, no change
        assert!(!picker.on_touch_move(135, 125));
    }

    #[test]
    fn test_none_zone_is_noop() {
        let mut picker = picker_with(100, 100, 50, 50, 0);
        picker.take_redraw_request();
        picker.on_touch_down(10, 10);
        assert!(!picker.on_touch_move(40, 40));
        assert!(!picker.take_redraw_request());
    }

    #[test]
    fn test_listener_and_redraw_on_mutation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut picker = picker_with(100, 100, 50, 50, 0);
        picker.take_redraw_request();

        let counter = calls.clone();
        picker.set_resize_listener(Box::new(move |rect| {
            assert!(rect.is_valid());
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        picker.on_touch_event(TouchEvent::down(125, 125));
        picker.on_touch_event(TouchEvent::moved(126, 125));
        picker.on_touch_event(TouchEvent::up(126, 125));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(picker.take_redraw_request());
        assert!(!picker.take_redraw_request());
        assert_eq!(picker.handle().snapshot().x, 101);
    }

    #[test]
    fn test_invariants_hold_for_random_gestures() {
        for padding in [0, 7] {
            let mut picker = RegionPicker::new(&settings(PickerFit::Square, 8, padding));
            picker.layout(320, 240);

            // Small LCG so the sequence is reproducible
            let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
            let mut next = |range: i32| {
                seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
                ((seed >> 33) % range as u64) as i32
            };

            for _ in 0..2_000 {
                let rect = picker.selection();
                // Bias touch-downs toward the handles so resizes get exercised
                let (x, y) = match next(3) {
                    0 => (rect.left() + next(10), rect.top() + next(10)),
                    1 => (rect.right() - next(10), rect.bottom() - next(10)),
                    _ => (next(340) - 10, next(260) - 10),
                };
                picker.on_touch_down(x, y);

                let (mut px, mut py) = (x, y);
                for _ in 0..5 {
                    px += next(81) - 40;
                    py += next(81) - 40;
                    picker.on_touch_move(px, py);

                    let rect = picker.selection();
                    assert!(rect.is_valid(), "invariant broken: {:?}", rect);
                    assert!(rect.x >= padding);
                    assert!(rect.right() <= rect.bound_width - padding);
                    assert!(rect.y >= padding);
                    assert!(rect.bottom() <= rect.bound_height - padding);
                }
                picker.on_touch_up();
            }
        }
    }

    #[test]
    fn test_sensor_rect_uses_view_bounds() {
        let mut picker = RegionPicker::new(&settings(PickerFit::Fill, 8, 0));
        picker.layout(480, 640);
        let crop = picker.sensor_rect(Size::new(640, 480), Orientation::Deg90);
        assert_eq!(crop, SensorCropRect { x: 0, y: 0, width: 480, height: 640 });
    }

    #[test]
    fn test_set_selection_validates() {
        let mut picker = RegionPicker::new(&settings(PickerFit::Square, 8, 5));
        picker.layout(200, 100);
        picker.take_redraw_request();

        assert!(picker.set_selection(20, 10, 100, 60));
        assert_eq!(picker.handle().snapshot().width, 100);
        assert!(picker.take_redraw_request());

        // Crosses the padded right edge
        assert!(!picker.set_selection(120, 10, 80, 60));
        assert!(!picker.set_selection(20, 10, 0, 60));
        assert_eq!(picker.selection().x, 20);
    }
}
