use super::landmark::Landmark;

/// Angle at `vertex` formed by `first`–`vertex`–`last`, in degrees (0..=180)
///
/// Computed in the image plane; z from monocular models is too noisy to
/// help here. Returns `None` when either limb has zero length.
pub fn joint_angle(first: &Landmark, vertex: &Landmark, last: &Landmark) -> Option<f32> {
    let (ax, ay) = (first.x - vertex.x, first.y - vertex.y);
    let (cx, cy) = (last.x - vertex.x, last.y - vertex.y);
    let la = (ax * ax + ay * ay).sqrt();
    let lc = (cx * cx + cy * cy).sqrt();
    if la <= f32::EPSILON || lc <= f32::EPSILON {
        return None;
    }
    let cos = ((ax * cx + ay * cy) / (la * lc)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Lean of the segment `lower → upper` away from vertical, in degrees
///
/// 0 means `upper` sits straight above `lower`; 90 means horizontal.
pub fn lean_from_vertical(lower: &Landmark, upper: &Landmark) -> Option<f32> {
    let dx = upper.x - lower.x;
    // image y grows downwards
    let dy = lower.y - upper.y;
    if dx.abs() <= f32::EPSILON && dy.abs() <= f32::EPSILON {
        return None;
    }
    Some(dx.abs().atan2(dy).to_degrees())
}

/// Signed perpendicular offset of `point` from the line `start → end`,
/// normalized by the line length. Positive means above the line in image space.
pub fn offset_from_line(start: &Landmark, end: &Landmark, point: &Landmark) -> Option<f32> {
    let (lx, ly) = (end.x - start.x, end.y - start.y);
    let len = (lx * lx + ly * ly).sqrt();
    if len <= f32::EPSILON {
        return None;
    }
    // interpolate the line's y at point.x; fall back to cross product for vertical lines
    if lx.abs() > f32::EPSILON {
        let t = (point.x - start.x) / lx;
        let line_y = start.y + t * ly;
        Some((line_y - point.y) / len)
    } else {
        let cross = lx * (point.y - start.y) - ly * (point.x - start.x);
        Some(cross / (len * len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y, 0.0, 1.0)
    }

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_straight_joint_is_180() {
        let angle = joint_angle(&lm(0.5, 0.2), &lm(0.5, 0.5), &lm(0.5, 0.8)).unwrap();
        assert!(approx_eq(angle, 180.0, 1e-3), "angle={}", angle);
    }

    #[test]
    fn test_right_angle() {
        let angle = joint_angle(&lm(0.5, 0.2), &lm(0.5, 0.5), &lm(0.8, 0.5)).unwrap();
        assert!(approx_eq(angle, 90.0, 1e-3), "angle={}", angle);
    }

    #[test]
    fn test_degenerate_limb() {
        assert!(joint_angle(&lm(0.5, 0.5), &lm(0.5, 0.5), &lm(0.8, 0.5)).is_none());
    }

    #[test]
    fn test_lean_from_vertical() {
        let upright = lean_from_vertical(&lm(0.5, 0.6), &lm(0.5, 0.3)).unwrap();
        assert!(approx_eq(upright, 0.0, 1e-3));
        let diagonal = lean_from_vertical(&lm(0.5, 0.6), &lm(0.8, 0.3)).unwrap();
        assert!(approx_eq(diagonal, 45.0, 1e-3));
    }

    #[test]
    fn test_offset_from_line_sign() {
        let start = lm(0.2, 0.5);
        let end = lm(0.8, 0.5);
        let above = offset_from_line(&start, &end, &lm(0.5, 0.4)).unwrap();
        let below = offset_from_line(&start, &end, &lm(0.5, 0.6)).unwrap();
        assert!(above > 0.0);
        assert!(below < 0.0);
    }
}
