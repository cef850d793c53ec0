use std::fmt;

/// Axis-aligned bounding box in work-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing every point. Returns `None` for an empty set.
    ///
    /// Width and height are inclusive of both extreme pixels, so a single
    /// point yields a 1x1 box.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut points = points.into_iter();
        let (x0, y0) = points.next()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
        for (x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    /// True when every coordinate (x, y, width, height) differs by at most `tolerance` pixels.
    pub fn within_tolerance(&self, other: &BoundingBox, tolerance: u32) -> bool {
        self.x.abs_diff(other.x) <= tolerance
            && self.y.abs_diff(other.y) <= tolerance
            && self.width.abs_diff(other.width) <= tolerance
            && self.height.abs_diff(other.height) <= tolerance
    }

    /// Clip the box to an image of the given dimensions.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<BoundingBox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.right().min(width) - self.x;
        let h = self.bottom().min(height) - self.y;
        if w == 0 || h == 0 {
            return None;
        }
        Some(BoundingBox::new(self.x, self.y, w, h))
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}
