use super::{lerp_point, Point2d, Vector2d};
use cgmath::prelude::*;
use itertools::Itertools;

/// Points closer together than this are merged, in m.
const MERGE_DISTANCE: f64 = 1e-9;

/// A piecewise linear curve, parameterised by arc length.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polyline {
    points: Vec<Point2d>,
    /// Cumulative length at each point; the first entry is zero.
    cumulative: Vec<f64>,
}

/// The result of sampling a [Polyline].
#[derive(Clone, Copy, Debug)]
pub struct PolylineSample {
    /// The point on the line.
    pub pos: Point2d,
    /// The unit tangent at the point.
    pub tan: Vector2d,
}

impl Polyline {
    /// Creates a polyline from a list of points, dropping consecutive duplicates.
    /// Returns `None` if no points are given.
    pub fn new(points: impl IntoIterator<Item = Point2d>) -> Option<Self> {
        let points = points
            .into_iter()
            .coalesce(|a, b| {
                if (b - a).magnitude() < MERGE_DISTANCE {
                    Ok(a)
                } else {
                    Err((a, b))
                }
            })
            .collect::<Vec<_>>();
        if points.is_empty() {
            return None;
        }
        let cumulative = std::iter::once(0.0)
            .chain(points.iter().tuple_windows().scan(0.0, |acc, (a, b)| {
                *acc += (*b - *a).magnitude();
                Some(*acc)
            }))
            .collect();
        Some(Self { points, cumulative })
    }

    /// A degenerate polyline consisting of a single point.
    pub fn point(point: Point2d) -> Self {
        Self {
            points: vec![point],
            cumulative: vec![0.0],
        }
    }

    /// The length of the line in m.
    pub fn length(&self) -> f64 {
        *self.cumulative.last().unwrap_or(&0.0)
    }

    /// The vertices of the line.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// The first vertex.
    pub fn first(&self) -> Point2d {
        self.points[0]
    }

    /// The last vertex.
    pub fn last(&self) -> Point2d {
        self.points[self.points.len() - 1]
    }

    /// Samples the line at the given distance along it. Distances outside of
    /// `[0, length]` are extrapolated along the first or last segment.
    pub fn sample(&self, pos: f64) -> PolylineSample {
        if self.points.len() < 2 {
            return PolylineSample {
                pos: self.points[0],
                tan: Vector2d::new(1.0, 0.0),
            };
        }
        let idx = self.segment_index(pos);
        let (a, b) = (self.points[idx], self.points[idx + 1]);
        let seg_len = self.cumulative[idx + 1] - self.cumulative[idx];
        let tan = (b - a) / seg_len;
        PolylineSample {
            pos: a + tan * (pos - self.cumulative[idx]),
            tan,
        }
    }

    /// Extracts the part of the line between two distances along it.
    pub fn extract(&self, from: f64, to: f64) -> Polyline {
        let from = from.clamp(0.0, self.length());
        let to = to.clamp(from, self.length());
        let start = self.sample(from).pos;
        let end = self.sample(to).pos;
        let inner = self
            .points
            .iter()
            .zip(&self.cumulative)
            .filter(|(_, s)| **s > from && **s < to)
            .map(|(p, _)| *p);
        let points = std::iter::once(start).chain(inner).chain(std::iter::once(end));
        Polyline::new(points).unwrap_or_else(|| Polyline::point(start))
    }

    /// Appends another line, skipping its first point when it coincides with our last
    /// within `tolerance`.
    pub fn concatenate(&self, other: &Polyline, tolerance: f64) -> Polyline {
        let skip = usize::from((other.first() - self.last()).magnitude() <= tolerance);
        let points = self
            .points
            .iter()
            .chain(other.points.iter().skip(skip))
            .copied();
        Polyline::new(points).unwrap_or_else(|| self.clone())
    }

    /// Extends the line straight ahead from its last point.
    pub fn extend(&self, distance: f64) -> Polyline {
        if distance <= 0.0 {
            return self.clone();
        }
        let tan = self.sample(self.length()).tan;
        let points = self
            .points
            .iter()
            .copied()
            .chain(std::iter::once(self.last() + tan * distance));
        Polyline::new(points).unwrap_or_else(|| self.clone())
    }

    /// Builds a line whose points are a blend between two lines of
    /// (approximately) equal parameterisation, with blend factors `f(fraction)`.
    pub fn blend(from: &Polyline, to: &Polyline, steps: usize, f: impl Fn(f64) -> f64) -> Polyline {
        let steps = steps.max(1);
        let points = (0..=steps).map(|i| {
            let frac = i as f64 / steps as f64;
            let a = from.sample(frac * from.length()).pos;
            let b = to.sample(frac * to.length()).pos;
            lerp_point(a, b, f(frac))
        });
        Polyline::new(points).unwrap_or_else(|| from.clone())
    }

    /// Finds the index of the segment containing `pos`.
    fn segment_index(&self, pos: f64) -> usize {
        let last = self.points.len() - 2;
        match self.cumulative.binary_search_by(|s| s.total_cmp(&pos)) {
            Ok(idx) => usize::min(idx, last),
            Err(idx) => usize::min(idx.saturating_sub(1), last),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn l_shape() -> Polyline {
        Polyline::new([
            Point2d::new(0.0, 0.0),
            Point2d::new(10.0, 0.0),
            Point2d::new(10.0, 10.0),
        ])
        .unwrap()
    }

    #[test]
    fn sample_is_arclength_parameterised() {
        let line = l_shape();
        assert_approx_eq!(line.length(), 20.0);
        let p = line.sample(15.0).pos;
        assert_approx_eq!(p.x, 10.0);
        assert_approx_eq!(p.y, 5.0);
    }

    #[test]
    fn extract_keeps_inner_vertices() {
        let part = l_shape().extract(5.0, 15.0);
        assert_eq!(part.points().len(), 3);
        assert_approx_eq!(part.length(), 10.0);
    }

    #[test]
    fn concatenate_merges_shared_point() {
        let a = Polyline::new([Point2d::new(0.0, 0.0), Point2d::new(10.0, 0.0)]).unwrap();
        let b = Polyline::new([Point2d::new(10.0, 0.0), Point2d::new(20.0, 0.0)]).unwrap();
        let c = a.concatenate(&b, 0.1);
        assert_eq!(c.points().len(), 3);
        assert_approx_eq!(c.length(), 20.0);
    }
}
