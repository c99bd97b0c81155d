//! Planar coordinates.
//!
//! Simulator networks are stored in a projected coordinate system (metres
//! east/north), so plain Euclidean geometry is used throughout.  `f64` keeps
//! full precision for UTM-sized coordinates (values around 10⁶).

/// A point in a projected planar coordinate system.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance.  Cheaper than [`distance`](Self::distance)
    /// when only the ordering matters.
    #[inline]
    pub fn distance_2(self, other: Point2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[inline]
    pub fn distance(self, other: Point2) -> f64 {
        self.distance_2(other).sqrt()
    }

    /// Arithmetic mean of a set of points, or `None` when the set is empty.
    pub fn centroid<I: IntoIterator<Item = Point2>>(points: I) -> Option<Point2> {
        let mut n = 0usize;
        let (mut sx, mut sy) = (0.0, 0.0);
        for p in points {
            sx += p.x;
            sy += p.y;
            n += 1;
        }
        (n > 0).then(|| Point2::new(sx / n as f64, sy / n as f64))
    }
}

impl std::fmt::Display for Point2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}
