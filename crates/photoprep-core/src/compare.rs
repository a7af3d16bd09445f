//! Before/after comparison slider.
//!
//! The "after" image is drawn over the "before" image and clipped from the
//! right, so the part left of the handle shows the result.

/// Position used before any interaction.
pub const DEFAULT_POSITION: f64 = 50.0;

/// Horizontal extent of the comparison container, in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerBounds {
    pub left: f64,
    pub width: f64,
}

impl ContainerBounds {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// Maps a pointer x coordinate to a position in `[0, 100]`.
    ///
    /// Coordinates outside the container saturate at the nearest edge.
    /// Returns `None` when the geometry or the coordinate is unusable
    /// (zero, negative or non-finite width, non-finite input).
    pub fn position_at(&self, pointer_x: f64) -> Option<f64> {
        if !(self.width.is_finite() && self.width > 0.0)
            || !self.left.is_finite()
            || !pointer_x.is_finite()
        {
            return None;
        }
        let percent = (pointer_x - self.left) / self.width * 100.0;
        Some(clamp_position(percent))
    }
}

/// Clamps to `[0, 100]`. NaN maps to the default position.
pub fn clamp_position(position: f64) -> f64 {
    if position.is_nan() {
        return DEFAULT_POSITION;
    }
    position.clamp(0.0, 100.0)
}

/// What to draw for a given slider position.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRegion<'a> {
    pub before: &'a str,
    pub after: &'a str,
    /// Handle position, percent from the left.
    pub position: f64,
    /// How much of the "after" image is clipped from the right, percent.
    pub clip_right_percent: f64,
}

impl VisibleRegion<'_> {
    /// CSS `clip-path` value for the "after" layer.
    pub fn clip_path(&self) -> String {
        format!("inset(0 {}% 0 0)", self.clip_right_percent)
    }
}

/// Pure view of two images at `position` (clamped first).
pub fn visible_region<'a>(before: &'a str, after: &'a str, position: f64) -> VisibleRegion<'a> {
    let position = clamp_position(position);
    VisibleRegion {
        before,
        after,
        position,
        clip_right_percent: 100.0 - position,
    }
}

/// Slider state: a position and a drag flag kept apart from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonSlider {
    position: f64,
    dragging: bool,
}

impl Default for ComparisonSlider {
    fn default() -> Self {
        Self {
            position: DEFAULT_POSITION,
            dragging: false,
        }
    }
}

impl ComparisonSlider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Moves the handle directly (keyboard, programmatic reset).
    pub fn set_position(&mut self, position: f64) {
        self.position = clamp_position(position);
    }

    pub fn pointer_down(&mut self) {
        self.dragging = true;
    }

    /// Updates the position while a drag is active. Returns the position.
    pub fn pointer_move(&mut self, pointer_x: f64, bounds: ContainerBounds) -> f64 {
        if self.dragging
            && let Some(position) = bounds.position_at(pointer_x)
        {
            self.position = position;
        }
        self.position
    }

    pub fn pointer_up(&mut self) {
        self.dragging = false;
    }

    pub fn pointer_leave(&mut self) {
        self.dragging = false;
    }

    pub fn pointer_cancel(&mut self) {
        self.dragging = false;
    }

    pub fn region<'a>(&self, before: &'a str, after: &'a str) -> VisibleRegion<'a> {
        visible_region(before, after, self.position)
    }
}
