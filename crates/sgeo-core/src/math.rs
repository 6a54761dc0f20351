//! 球面数学工具
//!
//! 所有位置都是单位球面上的向量。角度一律使用弧度。

use std::f64::consts::PI;

pub use nalgebra::{Rotation3, Unit};

/// 三维向量
pub type Vector3 = nalgebra::Vector3<f64>;

/// 默认数值容差
pub const EPSILON: f64 = 1e-10;

/// 零向量（不存在的交点使用）
pub fn zero() -> Vector3 {
    Vector3::zeros()
}

/// 归一化；长度过小时返回 `None`
pub fn normalize(v: &Vector3, tolerance: f64) -> Option<Vector3> {
    let norm = v.norm();
    if norm < tolerance {
        None
    } else {
        Some(v / norm)
    }
}

/// 两个单位向量之间的夹角（大圆距离），范围 [0, π]
///
/// 使用 atan2 形式，在角度接近 0 或 π 时比 acos 稳定。
pub fn angle_between(a: &Vector3, b: &Vector3) -> f64 {
    a.cross(b).norm().atan2(a.dot(b))
}

/// 两个向量是否相等或互为对径点
pub fn is_parallel(a: &Vector3, b: &Vector3, tolerance: f64) -> bool {
    a.cross(b).norm() < tolerance
}

/// 从 `from` 出发、以 `normal` 为旋转轴逆时针量到 `to` 的角度，范围 [0, 2π)
pub fn directed_angle(from: &Vector3, to: &Vector3, normal: &Vector3) -> f64 {
    let angle = from.cross(to).dot(normal).atan2(from.dot(to));
    if angle < 0.0 {
        angle + 2.0 * PI
    } else {
        angle
    }
}

/// 在 `from` 处指向 `toward` 的单位切向量
///
/// 两点重合或对径时没有唯一方向，返回 `None`。
pub fn tangent_toward(from: &Vector3, toward: &Vector3, tolerance: f64) -> Option<Vector3> {
    normalize(&(toward - from * from.dot(toward)), tolerance)
}

/// 与 `v` 垂直的任意单位向量
pub fn any_perpendicular(v: &Vector3) -> Vector3 {
    let axis = if v.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    v.cross(&axis).normalize()
}

/// 绕单位轴旋转
pub fn rotation(axis: &Vector3, angle: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle)
}

/// 将角度规约到 [0, 2π)
pub fn wrap_angle(angle: f64) -> f64 {
    angle.rem_euclid(2.0 * PI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_between() {
        let a = Vector3::x();
        let b = Vector3::y();
        assert!((angle_between(&a, &b) - PI / 2.0).abs() < EPSILON);
        assert!((angle_between(&a, &(-a)) - PI).abs() < EPSILON);
        assert!(angle_between(&a, &a).abs() < EPSILON);
    }

    #[test]
    fn test_directed_angle_wraps() {
        let n = Vector3::z();
        let a = Vector3::x();
        assert!((directed_angle(&a, &Vector3::y(), &n) - PI / 2.0).abs() < EPSILON);
        assert!((directed_angle(&a, &(-Vector3::y()), &n) - 1.5 * PI).abs() < EPSILON);
    }

    #[test]
    fn test_tangent_toward() {
        let t = tangent_toward(&Vector3::z(), &Vector3::new(1.0, 0.0, 1.0).normalize(), EPSILON)
            .unwrap();
        assert!((t - Vector3::x()).norm() < EPSILON);
        assert!(tangent_toward(&Vector3::z(), &(-Vector3::z()), EPSILON).is_none());
    }

    #[test]
    fn test_any_perpendicular() {
        for v in [Vector3::x(), Vector3::y(), Vector3::new(1.0, 2.0, 3.0).normalize()] {
            let p = any_perpendicular(&v);
            assert!(p.dot(&v).abs() < EPSILON);
            assert!((p.norm() - 1.0).abs() < EPSILON);
        }
    }
}
