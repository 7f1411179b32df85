//! Planar points and axis-aligned rectangles.
//!
//! Both types are plain `Copy` values. A [`Rectangle`] can only be built
//! through [`Rectangle::new`], which rejects empty or inverted extents, so any
//! rectangle in hand always has a positive area.

use serde::{Deserialize, Serialize};

// =============================================================================
// Point
// =============================================================================

/// A point in some planar coordinate system.
///
/// For geographic coordinates `x` is longitude and `y` is latitude, both in
/// degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation between `self` and `other` at parameter `t`.
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Whether both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

// =============================================================================
// Rectangle
// =============================================================================

/// An axis-aligned rectangle with `min_x < max_x` and `min_y < max_y`.
///
/// Serialized as `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Rectangle {
    /// Create a rectangle, returning `None` if it would be empty, inverted or
    /// contain non-finite coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Option<Self> {
        let finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return None;
        }
        Some(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Create a rectangle from a `[min_x, min_y, max_x, max_y]` array.
    pub fn from_array(bounds: [f64; 4]) -> Option<Self> {
        Self::new(bounds[0], bounds[1], bounds[2], bounds[3])
    }

    /// Bounding rectangle of a set of points.
    ///
    /// Returns `None` for fewer than two distinct coordinates on either axis.
    pub fn bounding<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Self::new(min_x, min_y, max_x, max_y)
    }

    pub fn min_x(&self) -> f64 {
        self.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_x(&self) -> f64 {
        self.max_x
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// South-west (min x, min y) corner.
    pub fn south_west(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    /// South-east (max x, min y) corner.
    pub fn south_east(&self) -> Point {
        Point::new(self.max_x, self.min_y)
    }

    /// North-east (max x, max y) corner.
    pub fn north_east(&self) -> Point {
        Point::new(self.max_x, self.max_y)
    }

    /// North-west (min x, max y) corner.
    pub fn north_west(&self) -> Point {
        Point::new(self.min_x, self.max_y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Half-open containment: `x ∈ [min_x, max_x)` and `y ∈ [min_y, max_y)`.
    pub fn contains_half_open(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x < self.max_x && p.y >= self.min_y && p.y < self.max_y
    }

    /// Closed containment of another rectangle.
    pub fn contains_rect(&self, other: &Rectangle) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Whether the interiors of the two rectangles overlap.
    ///
    /// Rectangles that only share an edge or a corner do not overlap.
    pub fn overlaps(&self, other: &Rectangle) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Intersection with another rectangle, `None` when it has no area.
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        Rectangle::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        )
    }

    /// Grow the rectangle outward by `amount` on every side.
    ///
    /// A negative amount that would collapse the rectangle returns `None`.
    pub fn pad(&self, amount: f64) -> Option<Rectangle> {
        Rectangle::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    /// The rectangle as `[min_x, min_y, max_x, max_y]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl Serialize for Rectangle {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_array().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rectangle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bounds = <[f64; 4]>::deserialize(deserializer)?;
        Rectangle::from_array(bounds).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid bounds {:?}: expected [min_x, min_y, max_x, max_y] with min < max",
                bounds
            ))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
