use nalgebra::{Point2, Rotation2, Vector2};
use std::f64::consts::{PI, TAU};

/// Lengths below this are treated as zero.
pub const EPSILON: f64 = 1e-9;

/// Normalizes `v`, or returns `None` for a degenerate vector.
pub fn try_normalize(v: &Vector2<f64>) -> Option<Vector2<f64>> {
    let norm = v.norm();
    if norm < EPSILON { None } else { Some(v / norm) }
}

/// Polar angle of `v` in `(-PI, PI]`.
pub fn angle_of(v: &Vector2<f64>) -> f64 {
    v.y.atan2(v.x)
}

/// Maps an angle into `[0, TAU)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a >= TAU { 0.0 } else { a }
}

/// Unit vector at polar angle `angle`.
pub fn direction(angle: f64) -> Vector2<f64> {
    Vector2::new(angle.cos(), angle.sin())
}

pub fn rotate_about(p: &Point2<f64>, center: &Point2<f64>, angle: f64) -> Point2<f64> {
    center + Rotation2::new(angle) * (p - center)
}

/// Mirror image of `p` across the line through `a` and `b`. Returns `p`
/// unchanged if the line is degenerate.
pub fn reflect_across_line(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    let Some(dir) = try_normalize(&(b - a)) else {
        return *p;
    };
    let rel = p - a;
    let along = dir * rel.dot(&dir);
    a + along * 2.0 - rel
}

fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Proper intersection test for segments `p1-p2` and `q1-q2`.
///
/// Touching at an endpoint or overlapping collinearly does not count.
pub fn segments_intersect(
    p1: &Point2<f64>,
    p2: &Point2<f64>,
    q1: &Point2<f64>,
    q2: &Point2<f64>,
) -> bool {
    let d1 = cross(&(p2 - p1), &(q1 - p1));
    let d2 = cross(&(p2 - p1), &(q2 - p1));
    let d3 = cross(&(q2 - q1), &(p1 - q1));
    let d4 = cross(&(q2 - q1), &(p2 - q1));
    d1 * d2 < -EPSILON && d3 * d4 < -EPSILON
}

/// Axis-aligned bounding box as `(min, max)`.
pub fn bounding_box<'a>(
    points: impl IntoIterator<Item = &'a Point2<f64>>,
) -> Option<(Point2<f64>, Point2<f64>)> {
    points.into_iter().fold(None, |acc, p| match acc {
        None => Some((*p, *p)),
        Some((min, max)) => Some((
            Point2::new(min.x.min(p.x), min.y.min(p.y)),
            Point2::new(max.x.max(p.x), max.y.max(p.y)),
        )),
    })
}

pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Point2<f64>>) -> Option<Point2<f64>> {
    let mut sum = Vector2::zeros();
    let mut count = 0usize;
    for p in points {
        sum += p.coords;
        count += 1;
    }
    (count > 0).then(|| Point2::from(sum / count as f64))
}

/// Circumradius of a regular `n`-gon with side length `side`.
pub fn circumradius(n: usize, side: f64) -> f64 {
    side / (2.0 * (PI / n as f64).sin())
}

/// Vertices of a regular `n`-gon centred at the origin, counter-clockwise.
///
/// The first two vertices are symmetric about the downward axis, so the first
/// side is horizontal and below the centre.
pub fn regular_polygon(n: usize, side: f64) -> Vec<Point2<f64>> {
    if n < 3 {
        return Vec::new();
    }
    let radius = circumradius(n, side);
    let step = TAU / n as f64;
    let first = -PI / 2.0 - PI / n as f64;
    (0..n)
        .map(|i| Point2::from(direction(first + step * i as f64) * radius))
        .collect()
}

/// Bisector of the widest empty angular sector around `center`.
///
/// With no occupied directions the result points along `+x`; with one, it
/// points straight away from it.
pub fn largest_gap_direction(center: &Point2<f64>, occupied: &[Point2<f64>]) -> Vector2<f64> {
    let mut angles: Vec<f64> = occupied
        .iter()
        .filter_map(|p| try_normalize(&(p - center)))
        .map(|d| normalize_angle(angle_of(&d)))
        .collect();
    if angles.is_empty() {
        return Vector2::new(1.0, 0.0);
    }
    angles.sort_by(f64::total_cmp);

    let mut best = (TAU, angles[0]);
    if angles.len() > 1 {
        best = (f64::NEG_INFINITY, angles[0]);
        for (i, &a) in angles.iter().enumerate() {
            let next = if i + 1 < angles.len() { angles[i + 1] } else { angles[0] + TAU };
            let gap = next - a;
            if gap > best.0 + EPSILON {
                best = (gap, a);
            }
        }
    }
    direction(best.1 + best.0 / 2.0)
}

/// Root-mean-square distance between paired points.
pub fn calculate_rmsd(coords1: &[Point2<f64>], coords2: &[Point2<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// A rotation with optional mirror, mapping one centroid onto another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform2 {
    pub reflect: bool,
    pub rotation: Rotation2<f64>,
    pub src_centroid: Point2<f64>,
    pub dst_centroid: Point2<f64>,
}

impl RigidTransform2 {
    pub fn identity() -> Self {
        Self {
            reflect: false,
            rotation: Rotation2::identity(),
            src_centroid: Point2::origin(),
            dst_centroid: Point2::origin(),
        }
    }

    pub fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        let mut rel = p - self.src_centroid;
        if self.reflect {
            rel.y = -rel.y;
        }
        self.dst_centroid + self.rotation * rel
    }
}

/// Least-squares rigid superposition of `src` onto `dst` in the plane.
///
/// With `allow_reflection`, the mirrored fit is also tried and kept if it has
/// the lower residual. Returns `None` for empty or mismatched inputs.
pub fn best_fit_transform(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    allow_reflection: bool,
) -> Option<RigidTransform2> {
    if src.len() != dst.len() || src.is_empty() {
        return None;
    }
    let src_centroid = centroid(src)?;
    let dst_centroid = centroid(dst)?;

    let fit = |reflect: bool| {
        let (mut dot, mut crs) = (0.0, 0.0);
        for (s, d) in src.iter().zip(dst) {
            let mut a = s - src_centroid;
            if reflect {
                a.y = -a.y;
            }
            let b = d - dst_centroid;
            dot += a.dot(&b);
            crs += cross(&a, &b);
        }
        let transform = RigidTransform2 {
            reflect,
            rotation: Rotation2::new(crs.atan2(dot)),
            src_centroid,
            dst_centroid,
        };
        let moved: Vec<Point2<f64>> = src.iter().map(|p| transform.apply(p)).collect();
        let rmsd = calculate_rmsd(&moved, dst).unwrap_or(f64::INFINITY);
        (transform, rmsd)
    };

    let (direct, direct_rmsd) = fit(false);
    if !allow_reflection {
        return Some(direct);
    }
    let (mirrored, mirrored_rmsd) = fit(true);
    Some(if mirrored_rmsd + EPSILON < direct_rmsd {
        mirrored
    } else {
        direct
    })
}
