use super::Point2d;
use cgmath::prelude::*;

/// Linearly interpolates between two points.
pub fn lerp_point(a: Point2d, b: Point2d, t: f64) -> Point2d {
    Point2d::from_vec(a.to_vec().lerp(b.to_vec(), t))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn lerp_halfway() {
        let p = lerp_point(Point2d::new(0.0, 2.0), Point2d::new(10.0, 4.0), 0.5);
        assert_approx_eq!(p.x, 5.0);
        assert_approx_eq!(p.y, 3.0);
    }
}
