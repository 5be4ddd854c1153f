use super::{Point2d, Vector2d};
use crate::util::Interval;
use cgmath::prelude::*;

/// A parametric curve in 2D space.
pub trait ParametricCurve2d {
    /// Samples the parametric curve.
    fn sample(&self, t: f64) -> Point2d;

    /// Returns the minimum and maximum t-values that define the bounds of the curve.
    fn bounds(&self) -> Interval<f64>;

    /// Samples the derivative of the parametric curve.
    ///
    /// The default implementation approximates the derivative by sampling
    /// two very nearby points along the curve.
    fn sample_dt(&self, t: f64) -> Vector2d {
        let delta = self.bounds().length() * 0.0001;
        let p1 = self.sample(t);
        let p2 = self.sample(t + delta);
        (p2 - p1) / delta
    }

    /// Approximates the curve by subdividing it until no chord is longer than `max_length`.
    fn subdivide(&self, max_length: f64) -> Vec<Point2d> {
        let Interval { min, max } = self.bounds();
        let length2 = max_length.powi(2);
        let mut stack = vec![(max, self.sample(max))];
        let mut points = vec![self.sample(min)];
        let mut t1 = min;
        while let Some((t2, p2)) = stack.last().copied() {
            let p1 = *points.last().unwrap_or(&p2);
            if (p2 - p1).magnitude2() > length2 && (t2 - t1) > 1e-9 {
                let mid = 0.5 * (t1 + t2);
                stack.push((mid, self.sample(mid)));
            } else {
                stack.pop();
                points.push(p2);
                t1 = t2;
            }
        }
        points
    }
}

impl<T: ParametricCurve2d + ?Sized> ParametricCurve2d for &T {
    fn sample(&self, t: f64) -> Point2d {
        (**self).sample(t)
    }

    fn bounds(&self) -> Interval<f64> {
        (**self).bounds()
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        (**self).sample_dt(t)
    }
}

/// A straight line between two points.
#[derive(Clone, Copy, Debug)]
pub struct LineSegment2d {
    start: Point2d,
    end: Point2d,
}

impl LineSegment2d {
    /// Creates a line segment from its two end points.
    pub const fn from_ends(start: Point2d, end: Point2d) -> Self {
        Self { start, end }
    }
}

impl ParametricCurve2d for LineSegment2d {
    fn sample(&self, t: f64) -> Point2d {
        super::lerp_point(self.start, self.end, t)
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }

    fn sample_dt(&self, _t: f64) -> Vector2d {
        self.end - self.start
    }

    fn subdivide(&self, _max_length: f64) -> Vec<Point2d> {
        vec![self.start, self.end]
    }
}

/// A circular arc, parameterised by angle in radians.
#[derive(Clone, Copy, Debug)]
pub struct CircularArc2d {
    centre: Point2d,
    radius: f64,
    angles: Interval<f64>,
}

impl CircularArc2d {
    /// Creates an arc around `centre`, sweeping from `start_angle` to `end_angle`.
    /// A decreasing angle sweeps clockwise.
    pub fn new(centre: Point2d, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            centre,
            radius,
            angles: Interval::new(start_angle, end_angle),
        }
    }
}

impl ParametricCurve2d for CircularArc2d {
    fn sample(&self, t: f64) -> Point2d {
        let angle = self.angles.lerp(t);
        self.centre + self.radius * Vector2d::new(angle.cos(), angle.sin())
    }

    fn bounds(&self) -> Interval<f64> {
        Interval::new(0.0, 1.0)
    }

    fn sample_dt(&self, t: f64) -> Vector2d {
        let angle = self.angles.lerp(t);
        let sweep = self.angles.length();
        self.radius * sweep * Vector2d::new(-angle.sin(), angle.cos())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn line_is_not_subdivided() {
        let line = LineSegment2d::from_ends(Point2d::new(0.0, 0.0), Point2d::new(100.0, 0.0));
        assert_eq!(line.subdivide(1.0).len(), 2);
    }

    #[test]
    fn arc_chords_are_bounded() {
        let arc = CircularArc2d::new(Point2d::new(0.0, 0.0), 50.0, 0.0, std::f64::consts::PI);
        let points = arc.subdivide(2.0);
        for pair in points.windows(2) {
            assert!((pair[1] - pair[0]).magnitude() <= 2.0 + 1e-9);
        }
        let last = points.last().unwrap();
        assert_approx_eq!(last.x, -50.0, 1e-9);
        assert_approx_eq!(last.y, 0.0, 1e-9);
    }
}
