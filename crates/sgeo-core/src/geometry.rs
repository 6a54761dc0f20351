//! 球面几何图元
//!
//! 支持的一维对象：
//! - 小圆/大圆 (SphereCircle)，直线即半径为 π/2 的大圆
//! - 线段 (SegmentArc)，大圆上的一段弧
//! - 椭圆 (SphereEllipse)，到两个焦点的球面距离之和为常数的点集
//!
//! `Geometry` 是节点在每次更新后缓存的派生状态。

use crate::math::{
    angle_between, any_perpendicular, directed_angle, is_parallel, normalize, tangent_toward,
    Vector3,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// 节点的派生几何状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// 尚未计算
    None,
    Point(Vector3),
    Line { normal: Vector3 },
    Segment(SegmentArc),
    Circle(SphereCircle),
    Ellipse(SphereEllipse),
    /// 度量值；`None` 表示求值哨兵（定义域错误等）
    Value(Option<f64>),
    /// 标签文本
    Text(String),
}

impl Geometry {
    /// 获取类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::None => "None",
            Geometry::Point(_) => "Point",
            Geometry::Line { .. } => "Line",
            Geometry::Segment(_) => "Segment",
            Geometry::Circle(_) => "Circle",
            Geometry::Ellipse(_) => "Ellipse",
            Geometry::Value(_) => "Value",
            Geometry::Text(_) => "Text",
        }
    }

    pub fn as_point(&self) -> Option<Vector3> {
        match self {
            Geometry::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<f64> {
        match self {
            Geometry::Value(v) => *v,
            _ => None,
        }
    }

    /// 一维对象的曲线表示
    pub fn as_curve(&self) -> Option<Curve> {
        match self {
            Geometry::Line { normal } => Some(Curve::Circle(SphereCircle::great_circle(*normal))),
            Geometry::Segment(arc) => Some(Curve::Segment(*arc)),
            Geometry::Circle(circle) => Some(Curve::Circle(*circle)),
            Geometry::Ellipse(ellipse) => Some(Curve::Ellipse(*ellipse)),
            _ => None,
        }
    }
}

/// 一维曲线（交点引擎和对象上的点使用）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Circle(SphereCircle),
    Segment(SegmentArc),
    Ellipse(SphereEllipse),
}

impl Curve {
    /// 曲线上离 `p` 最近的点
    pub fn closest_point(&self, p: &Vector3, tolerance: f64) -> Vector3 {
        match self {
            Curve::Circle(circle) => circle.closest_point(p, tolerance),
            Curve::Segment(arc) => arc.closest_point(p, tolerance),
            Curve::Ellipse(ellipse) => ellipse.closest_point(p, ELLIPSE_PROJECTION_SAMPLES),
        }
    }
}

const ELLIPSE_PROJECTION_SAMPLES: usize = 180;

/// 球面圆：中心 + 角半径
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereCircle {
    pub center: Vector3,
    /// 角半径（弧度），范围 (0, π)
    pub radius: f64,
}

impl SphereCircle {
    pub fn new(center: Vector3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 以法向量为中心的大圆
    pub fn great_circle(normal: Vector3) -> Self {
        Self::new(normal, FRAC_PI_2)
    }

    /// 由中心和圆上一点构造
    pub fn through(center: Vector3, point: &Vector3) -> Self {
        Self::new(center, angle_between(&center, point))
    }

    /// 规范化：半径大于 π/2 时取对径中心和补半径，同一点集
    pub fn normalized(&self) -> Self {
        if self.radius > FRAC_PI_2 {
            Self::new(-self.center, PI - self.radius)
        } else {
            *self
        }
    }

    /// 有符号距离：圆外为正，圆内为负
    pub fn signed_distance(&self, p: &Vector3) -> f64 {
        angle_between(&self.center, p) - self.radius
    }

    /// 圆上离 `p` 最近的点
    pub fn closest_point(&self, p: &Vector3, tolerance: f64) -> Vector3 {
        let direction = tangent_toward(&self.center, p, tolerance)
            .unwrap_or_else(|| any_perpendicular(&self.center));
        self.center * self.radius.cos() + direction * self.radius.sin()
    }

    /// 周长
    pub fn circumference(&self) -> f64 {
        2.0 * PI * self.radius.sin()
    }
}

/// 线段：大圆上从起点绕法向量逆时针到终点的弧
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentArc {
    pub start: Vector3,
    pub end: Vector3,
    pub normal: Vector3,
    /// 弧长（弧度），范围 (0, 2π)
    pub arc_length: f64,
}

impl SegmentArc {
    /// 由端点构造；`long_arc` 选择大于 π 的那段弧
    ///
    /// 端点重合或对径时法向量不唯一，返回 `None`。
    pub fn from_endpoints(
        start: Vector3,
        end: Vector3,
        long_arc: bool,
        tolerance: f64,
    ) -> Option<Self> {
        let normal = normalize(&start.cross(&end), tolerance)?;
        let short = angle_between(&start, &end);
        Some(if long_arc {
            Self {
                start,
                end,
                normal: -normal,
                arc_length: 2.0 * PI - short,
            }
        } else {
            Self {
                start,
                end,
                normal,
                arc_length: short,
            }
        })
    }

    /// 所在大圆
    pub fn carrier(&self) -> SphereCircle {
        SphereCircle::great_circle(self.normal)
    }

    /// 大圆上的点是否落在弧内
    pub fn contains(&self, p: &Vector3, tolerance: f64) -> bool {
        let angle = directed_angle(&self.start, p, &self.normal);
        angle <= self.arc_length + tolerance || angle >= 2.0 * PI - tolerance
    }

    /// 弧上离 `p` 最近的点
    pub fn closest_point(&self, p: &Vector3, tolerance: f64) -> Vector3 {
        let projected = self.carrier().closest_point(p, tolerance);
        if self.contains(&projected, tolerance) {
            projected
        } else if angle_between(p, &self.start) <= angle_between(p, &self.end) {
            self.start
        } else {
            self.end
        }
    }

    /// 弧中点
    pub fn midpoint(&self) -> Vector3 {
        crate::math::rotation(&self.normal, self.arc_length / 2.0) * self.start
    }
}

/// 球面椭圆：到两焦点距离之和为 `2a`
///
/// 局部坐标系以两焦点的中点 `m` 为极点，`u` 为长轴方向，`w = m × u`。
/// 焦点位于 `(±sin c, 0, cos c)`，曲线满足
/// `x²·sin²c / sin²a + z²·cos²c / cos²a = 1`，参数化为
/// `x = sin a·cos θ`，`y = k·sin θ`，其中 `k² = 1 - cos²a / cos²c`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereEllipse {
    pub focus1: Vector3,
    pub focus2: Vector3,
    /// 半长轴角（弧度），范围 (c, π/2)
    pub semi_major: f64,
    center: Vector3,
    major_axis: Vector3,
    minor_axis: Vector3,
    minor_coefficient: f64,
}

impl SphereEllipse {
    /// 由焦点和半长轴构造
    ///
    /// 焦点对径、`a ≤ c` 或 `a ≥ π/2` 时没有合法椭圆。
    pub fn new(focus1: Vector3, focus2: Vector3, semi_major: f64, tolerance: f64) -> Option<Self> {
        let center = normalize(&(focus1 + focus2), tolerance)?;
        let focal = angle_between(&focus1, &focus2) / 2.0;
        if semi_major <= focal + tolerance || semi_major >= FRAC_PI_2 - tolerance {
            return None;
        }
        let major_axis = normalize(&(focus1 - focus2), tolerance)
            .map(|u| (u - center * center.dot(&u)).normalize())
            .unwrap_or_else(|| any_perpendicular(&center));
        let minor_axis = center.cross(&major_axis);
        let ratio = semi_major.cos() / focal.cos();
        let minor_coefficient = (1.0 - ratio * ratio).max(0.0).sqrt();
        Some(Self {
            focus1,
            focus2,
            semi_major,
            center,
            major_axis,
            minor_axis,
            minor_coefficient,
        })
    }

    /// 由两焦点和椭圆上一点构造
    pub fn through(focus1: Vector3, focus2: Vector3, point: &Vector3, tolerance: f64) -> Option<Self> {
        let sum = angle_between(point, &focus1) + angle_between(point, &focus2);
        Self::new(focus1, focus2, sum / 2.0, tolerance)
    }

    /// 参数 θ 处的点
    pub fn point_at(&self, theta: f64) -> Vector3 {
        let x = self.semi_major.sin() * theta.cos();
        let y = self.minor_coefficient * theta.sin();
        let z = (1.0 - x * x - y * y).max(0.0).sqrt();
        (self.major_axis * x + self.minor_axis * y + self.center * z).normalize()
    }

    /// 有符号距离：`d1 + d2 - 2a`，椭圆外为正
    pub fn signed_distance(&self, p: &Vector3) -> f64 {
        angle_between(p, &self.focus1) + angle_between(p, &self.focus2) - 2.0 * self.semi_major
    }

    /// 椭圆上离 `p` 最近的点（采样后黄金分割细化）
    pub fn closest_point(&self, p: &Vector3, samples: usize) -> Vector3 {
        let samples = samples.max(8);
        let step = 2.0 * PI / samples as f64;
        let distance = |theta: f64| angle_between(p, &self.point_at(theta));

        let best = (0..samples)
            .map(|i| i as f64 * step)
            .min_by(|a, b| distance(*a).total_cmp(&distance(*b)))
            .unwrap_or(0.0);

        let (mut lo, mut hi) = (best - step, best + step);
        let ratio = (5.0_f64.sqrt() - 1.0) / 2.0;
        for _ in 0..60 {
            let m1 = hi - ratio * (hi - lo);
            let m2 = lo + ratio * (hi - lo);
            if distance(m1) < distance(m2) {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        self.point_at((lo + hi) / 2.0)
    }

    /// 焦点是否重合（退化为圆）
    pub fn is_circle(&self, tolerance: f64) -> bool {
        is_parallel(&self.focus1, &self.focus2, tolerance)
    }
}
