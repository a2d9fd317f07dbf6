/// Full span of the normalized output; canvas edges map to ±128.
pub const AXIS_RANGE: f64 = 256.0;

/// Default knob radius in canvas pixels.
pub const KNOB_RADIUS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedPosition {
    pub x: i32,
    pub y: i32,
}

impl NormalizedPosition {
    /// Serial wire form: "<x>,<y>\n".
    pub fn to_line(self) -> String {
        format!("{},{}\n", self.x, self.y)
    }
}

/// Map pixel coordinates on a `width` x `height` canvas to `[-128, 128]`.
///
/// Not clamped: a point outside the canvas maps outside the range.
/// `width` and `height` must be non-zero; use [`JoystickState::normalized`]
/// when the canvas may not have been laid out yet.
pub fn normalize(x: f64, y: f64, width: f64, height: f64) -> NormalizedPosition {
    let nx = ((x - width / 2.0) * AXIS_RANGE / width).floor();
    let ny = ((y - height / 2.0) * AXIS_RANGE / height).floor();
    NormalizedPosition {
        x: nx as i32,
        y: ny as i32,
    }
}

/// Knob position on the virtual canvas plus the canvas size.
///
/// The canvas has no size until its first [`resize`](Self::resize).
#[derive(Debug, Clone)]
pub struct JoystickState {
    position: Position,
    width: f64,
    height: f64,
    knob_radius: f64,
}

impl JoystickState {
    pub fn new() -> Self {
        Self {
            position: Position { x: 0.0, y: 0.0 },
            width: 0.0,
            height: 0.0,
            knob_radius: KNOB_RADIUS,
        }
    }

    pub fn knob_radius(&self) -> f64 {
        self.knob_radius
    }

    pub fn set_knob_radius(&mut self, radius: f64) {
        self.knob_radius = radius.max(0.0);
    }

    /// Bounding box of the knob: (left, top, right, bottom).
    pub fn knob_bounds(&self) -> (f64, f64, f64, f64) {
        let Position { x, y } = self.position;
        let r = self.knob_radius;
        (x - r, y - r, x + r, y + r)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn center(&self) -> Position {
        Position {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }

    /// Move the knob to raw pointer coordinates.
    pub fn drag(&mut self, x: f64, y: f64) {
        self.position = Position { x, y };
    }

    /// Limit a pointer position to one canvas size past each edge.
    ///
    /// [`drag`](Self::drag) itself never clamps; this bounds how far a
    /// relative pointer can wander off the canvas.
    pub fn within_reach(&self, x: f64, y: f64) -> Position {
        Position {
            x: x.clamp(-self.width, 2.0 * self.width),
            y: y.clamp(-self.height, 2.0 * self.height),
        }
    }

    /// Snap the knob back to the centre.
    pub fn release(&mut self) {
        self.position = self.center();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.position = self.center();
    }

    /// Current normalized position, or `None` while the canvas has a zero
    /// dimension.
    pub fn normalized(&self) -> Option<NormalizedPosition> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return None;
        }
        Some(normalize(
            self.position.x,
            self.position.y,
            self.width,
            self.height,
        ))
    }
}

impl Default for JoystickState {
    fn default() -> Self {
        Self::new()
    }
}
