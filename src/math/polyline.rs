use super::{Point2d, Vector2d};
use cgmath::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A piecewise linear curve, parameterised by distance along it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polyline2d {
    points: Vec<Point2d>,
    /// Distance from the first point to each point, in m.
    dists: Vec<f64>,
}

impl Polyline2d {
    /// Creates a polyline through the given points.
    /// Returns `None` if there are fewer than two points or the curve has no length.
    pub fn new(points: Vec<Point2d>) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let dists = std::iter::once(0.0)
            .chain(points.windows(2).scan(0.0, |total, pair| {
                *total += pair[0].distance(pair[1]);
                Some(*total)
            }))
            .collect::<Vec<_>>();
        if dists.last().copied().unwrap_or(0.0) <= 0.0 {
            return None;
        }
        Some(Self { points, dists })
    }

    /// Creates a straight line segment.
    pub fn line(start: Point2d, end: Point2d) -> Option<Self> {
        Self::new(vec![start, end])
    }

    /// The length of the polyline in m.
    pub fn length(&self) -> f64 {
        self.dists[self.dists.len() - 1]
    }

    /// The vertices of the polyline.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// Samples the polyline and returns the position and unit tangent vector.
    /// Positions outside of the curve are clamped to its ends.
    pub fn sample(&self, pos: f64) -> (Point2d, Vector2d) {
        let pos = pos.clamp(0.0, self.length());
        let idx = self
            .dists
            .partition_point(|dist| *dist <= pos)
            .clamp(1, self.points.len() - 1);
        let (a, b) = (self.points[idx - 1], self.points[idx]);
        let seg_len = self.dists[idx] - self.dists[idx - 1];
        let tan = (b - a).normalize();
        if seg_len <= 0.0 {
            return (a, tan);
        }
        let t = (pos - self.dists[idx - 1]) / seg_len;
        (a + (b - a) * t, tan)
    }
}
