//! Geometric types.

use cgmath::{Point2, Vector2};

use crate::util::Interval;

/// A 2D point
pub type Point2d = Point2<f64>;

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// An axis-aligned rectangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: Interval<f64>,
    pub y: Interval<f64>,
}

impl Rect {
    /// Returns true if the point lies inside or on the edge of the rectangle.
    pub fn contains(&self, point: Point2d) -> bool {
        self.x.contains(point.x) && self.y.contains(point.y)
    }

    /// The width along the x-axis.
    pub fn width(&self) -> f64 {
        self.x.length()
    }

    /// The height along the y-axis.
    pub fn height(&self) -> f64 {
        self.y.length()
    }
}
