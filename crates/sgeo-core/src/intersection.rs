//! 交点引擎
//!
//! 计算任意两个一维球面对象的候选交点。直线和线段都是角半径为 π/2、
//! 以法向量为中心的圆，因此统一按球面圆-圆求交：
//!
//! 1. 规范化为 `(中心, 角半径)`，半径不超过 π/2；
//! 2. 中心距 `d` 与两半径满足严格三角不等式时才相交；
//! 3. 用半周长 `s` 和半角正切公式求中心2处的角 `A`，再由直角球面三角形
//!    求出垂距 `a` 与沿中心连线的距离 `b`；
//! 4. 两个候选点为 `cos(a)·proj ± sin(a)·n`。
//!
//! 候选 0 总是 `+` 分支。交换参数顺序会交换两个候选，所以调用方必须按
//! 创建顺序传入参数。

use crate::config::Settings;
use crate::geometry::{Curve, SegmentArc, SphereCircle, SphereEllipse};
use crate::math::{normalize, tangent_toward, zero, Vector3};
use std::f64::consts::PI;

/// 单个候选交点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub position: Vector3,
    pub exists: bool,
}

impl Candidate {
    pub fn missing() -> Self {
        Self {
            position: zero(),
            exists: false,
        }
    }

    pub fn at(position: Vector3) -> Self {
        Self {
            position,
            exists: true,
        }
    }
}

/// 圆族对象之间的候选数
pub const CIRCLE_SLOTS: usize = 2;

/// 涉及椭圆时的候选数
pub const ELLIPSE_SLOTS: usize = 4;

/// 一对对象的候选槽位数
pub fn slot_count(first_is_ellipse: bool, second_is_ellipse: bool) -> usize {
    if first_is_ellipse || second_is_ellipse {
        ELLIPSE_SLOTS
    } else {
        CIRCLE_SLOTS
    }
}

/// 计算两条曲线的候选交点（顺序即交点索引）
pub fn intersect(first: &Curve, second: &Curve, settings: &Settings) -> Vec<Candidate> {
    let tolerance = settings.tolerance;
    match (first, second) {
        (Curve::Ellipse(ellipse), other) => {
            ellipse_intersections(ellipse, other, settings.ellipse_samples, tolerance)
        }
        (other, Curve::Ellipse(ellipse)) => {
            ellipse_intersections(ellipse, other, settings.ellipse_samples, tolerance)
        }
        _ => {
            let (c1, arc1) = circle_of(first);
            let (c2, arc2) = circle_of(second);
            circle_circle(&c1, &c2, tolerance)
                .into_iter()
                .map(|candidate| filter_arcs(candidate, [arc1, arc2], tolerance))
                .collect()
        }
    }
}

/// 圆族曲线的载体圆，以及线段需要的弧过滤
fn circle_of(curve: &Curve) -> (SphereCircle, Option<SegmentArc>) {
    match curve {
        Curve::Circle(circle) => (*circle, None),
        Curve::Segment(arc) => (arc.carrier(), Some(*arc)),
        Curve::Ellipse(_) => unreachable!("ellipse pairs are handled numerically"),
    }
}

fn filter_arcs(candidate: Candidate, arcs: [Option<SegmentArc>; 2], tolerance: f64) -> Candidate {
    let outside = arcs
        .iter()
        .flatten()
        .any(|arc| !arc.contains(&candidate.position, tolerance.sqrt()));
    if candidate.exists && outside {
        Candidate {
            exists: false,
            ..candidate
        }
    } else {
        candidate
    }
}

/// 球面圆-圆交点
pub fn circle_circle(first: &SphereCircle, second: &SphereCircle, tolerance: f64) -> [Candidate; 2] {
    let missing = [Candidate::missing(), Candidate::missing()];
    let c1 = first.normalized();
    let c2 = second.normalized();

    // 中心重合或对径：交集为空或无穷
    let Some(normal) = normalize(&c1.center.cross(&c2.center), tolerance) else {
        return missing;
    };

    let d = crate::math::angle_between(&c1.center, &c2.center);
    let (r1, r2) = (c1.radius, c2.radius);
    if !(d < r1 + r2 && r1 < d + r2 && r2 < d + r1) {
        return missing;
    }

    // 中心2处的角 A，对边为 r1
    let s = (d + r1 + r2) / 2.0;
    let numerator = (s - r2).sin() * (s - d).sin();
    let denominator = s.sin() * (s - r1).sin();
    if denominator <= tolerance {
        return missing;
    }
    let half_angle = (numerator / denominator).max(0.0).sqrt().atan();
    let angle = 2.0 * half_angle;

    // sin a = sin r2·sin A，tan b = tan r2·cos A
    let a = (r2.sin() * angle.sin()).atan2(r2.cos().hypot(r2.sin() * angle.cos()));
    let b = (r2.sin() * angle.cos()).atan2(r2.cos());

    let Some(toward) = tangent_toward(&c2.center, &c1.center, tolerance) else {
        return missing;
    };
    let proj = c2.center * b.cos() + toward * b.sin();

    [
        Candidate::at((proj * a.cos() + normal * a.sin()).normalize()),
        Candidate::at((proj * a.cos() - normal * a.sin()).normalize()),
    ]
}

/// 椭圆与其他曲线的数值求交
///
/// 沿椭圆参数采样另一条曲线的有符号距离，变号区间二分细化，按参数排序。
fn ellipse_intersections(
    ellipse: &SphereEllipse,
    other: &Curve,
    samples: usize,
    tolerance: f64,
) -> Vec<Candidate> {
    let signed = |p: &Vector3| match other {
        Curve::Circle(circle) => circle.signed_distance(p),
        Curve::Segment(arc) => arc.carrier().signed_distance(p),
        Curve::Ellipse(e) => e.signed_distance(p),
    };
    let f = |theta: f64| signed(&ellipse.point_at(theta));

    let samples = samples.max(16);
    let step = 2.0 * PI / samples as f64;
    let mut roots = Vec::new();
    let mut prev_theta = 0.0;
    let mut prev_value = f(prev_theta);
    for i in 1..=samples {
        let theta = i as f64 * step;
        let value = f(theta);
        if prev_value == 0.0 {
            roots.push(prev_theta);
        } else if prev_value * value < 0.0 {
            roots.push(bisect(&f, prev_theta, theta, prev_value));
        }
        prev_theta = theta;
        prev_value = value;
    }

    let mut candidates: Vec<Candidate> = roots
        .into_iter()
        .map(|theta| ellipse.point_at(theta))
        .filter(|p| match other {
            Curve::Segment(arc) => arc.contains(p, tolerance.sqrt()),
            _ => true,
        })
        .take(ELLIPSE_SLOTS)
        .map(Candidate::at)
        .collect();
    candidates.resize(ELLIPSE_SLOTS, Candidate::missing());
    candidates
}

fn bisect(f: &impl Fn(f64) -> f64, mut lo: f64, mut hi: f64, mut lo_value: f64) -> f64 {
    for _ in 0..80 {
        let mid = (lo + hi) / 2.0;
        let value = f(mid);
        if value == 0.0 {
            return mid;
        }
        if lo_value * value < 0.0 {
            hi = mid;
        } else {
            lo = mid;
            lo_value = value;
        }
    }
    (lo + hi) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::angle_between;
    use std::f64::consts::FRAC_PI_2;

    fn v(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3::new(x, y, z).normalize()
    }

    fn settings() -> Settings {
        Settings::default()
    }

    /// 简单的确定性伪随机序列（线性同余）
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> f64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }

        fn unit(&mut self) -> Vector3 {
            loop {
                let p = Vector3::new(
                    self.next() * 2.0 - 1.0,
                    self.next() * 2.0 - 1.0,
                    self.next() * 2.0 - 1.0,
                );
                if p.norm() > 0.1 && p.norm() < 1.0 {
                    return p.normalize();
                }
            }
        }
    }

    #[test]
    fn test_two_great_circles() {
        let l1 = SphereCircle::great_circle(Vector3::z());
        let l2 = SphereCircle::great_circle(Vector3::x());
        let [p0, p1] = circle_circle(&l1, &l2, 1e-10);
        assert!(p0.exists && p1.exists);
        assert!((p0.position + p1.position).norm() < 1e-9, "line pairs are antipodal");
        assert!(p0.position.dot(&Vector3::z()).abs() < 1e-9);
        assert!(p0.position.dot(&Vector3::x()).abs() < 1e-9);
    }

    #[test]
    fn test_positive_branch_is_index_zero() {
        let c1 = SphereCircle::new(v(1.0, 0.0, 1.0), 0.6);
        let c2 = SphereCircle::new(v(-1.0, 0.0, 1.0), 0.9);
        let [p0, p1] = circle_circle(&c1, &c2, 1e-10);
        let normal = c1.center.cross(&c2.center).normalize();
        assert!(p0.position.dot(&normal) > 0.0);
        assert!(p1.position.dot(&normal) < 0.0);

        // 交换顺序交换索引
        let [q0, q1] = circle_circle(&c2, &c1, 1e-10);
        assert!((q0.position - p1.position).norm() < 1e-9);
        assert!((q1.position - p0.position).norm() < 1e-9);
    }

    #[test]
    fn test_existence_matches_triangle_inequality() {
        let mut rng = Lcg(7);
        for _ in 0..2000 {
            let c1 = SphereCircle::new(rng.unit(), rng.next() * PI);
            let c2 = SphereCircle::new(rng.unit(), rng.next() * PI);
            let n1 = c1.normalized();
            let n2 = c2.normalized();
            let d = angle_between(&n1.center, &n2.center);
            let (r1, r2) = (n1.radius, n2.radius);
            let expected = d < r1 + r2 && r1 < d + r2 && r2 < d + r1;

            let [p0, p1] = circle_circle(&c1, &c2, 1e-10);
            assert_eq!(p0.exists, expected);
            assert_eq!(p1.exists, expected);
            if expected {
                for p in [p0, p1] {
                    assert!((angle_between(&p.position, &c1.center) - c1.radius).abs() < 1e-9);
                    assert!((angle_between(&p.position, &c2.center) - c2.radius).abs() < 1e-9);
                }
            } else {
                assert_eq!(p0.position, zero());
            }
        }
    }

    #[test]
    fn test_concentric_and_antipodal_centers() {
        let c1 = SphereCircle::new(Vector3::z(), 0.5);
        let c2 = SphereCircle::new(Vector3::z(), 0.7);
        assert!(circle_circle(&c1, &c2, 1e-10).iter().all(|c| !c.exists));

        let c3 = SphereCircle::new(-Vector3::z(), PI - 0.5);
        assert!(circle_circle(&c1, &c3, 1e-10).iter().all(|c| !c.exists));
    }

    #[test]
    fn test_segment_filter() {
        let segment = SegmentArc::from_endpoints(v(1.0, -0.2, 0.0), v(1.0, 0.2, 0.0), false, 1e-10)
            .unwrap();
        let line = SphereCircle::great_circle(Vector3::y());
        let result = intersect(&Curve::Segment(segment), &Curve::Circle(line), &settings());
        assert_eq!(result.len(), 2);
        let inside: Vec<_> = result.iter().filter(|c| c.exists).collect();
        assert_eq!(inside.len(), 1);
        assert!((inside[0].position - Vector3::x()).norm() < 1e-9);
    }

    #[test]
    fn test_line_through_circle() {
        let circle = SphereCircle::new(Vector3::z(), FRAC_PI_2 / 2.0);
        let line = SphereCircle::great_circle(Vector3::x());
        let result = intersect(&Curve::Circle(line), &Curve::Circle(circle), &settings());
        assert!(result.iter().all(|c| c.exists));
        for c in &result {
            assert!(c.position.x.abs() < 1e-9);
            assert!((angle_between(&c.position, &Vector3::z()) - FRAC_PI_2 / 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ellipse_and_great_circle() {
        let ellipse = SphereEllipse::new(v(0.3, 0.0, 1.0), v(-0.3, 0.0, 1.0), 0.6, 1e-10).unwrap();
        let line = SphereCircle::great_circle(Vector3::x());
        let result = intersect(&Curve::Ellipse(ellipse), &Curve::Circle(line), &settings());
        assert_eq!(result.len(), ELLIPSE_SLOTS);
        let found: Vec<_> = result.iter().filter(|c| c.exists).collect();
        assert_eq!(found.len(), 2);
        for c in found {
            assert!(c.position.x.abs() < 1e-9);
            assert!(ellipse.signed_distance(&c.position).abs() < 1e-9);
        }
    }

    #[test]
    fn test_ellipse_order_is_stable() {
        let ellipse = SphereEllipse::new(v(0.3, 0.0, 1.0), v(-0.3, 0.0, 1.0), 0.6, 1e-10).unwrap();
        let circle = SphereCircle::new(v(0.5, 0.0, 1.0), 0.4);
        let a = intersect(&Curve::Ellipse(ellipse), &Curve::Circle(circle), &settings());
        let b = intersect(&Curve::Circle(circle), &Curve::Ellipse(ellipse), &settings());
        assert_eq!(a, b);
    }

    #[test]
    fn test_slot_count() {
        assert_eq!(slot_count(false, false), 2);
        assert_eq!(slot_count(true, false), 4);
        assert_eq!(slot_count(false, true), 4);
    }
}
