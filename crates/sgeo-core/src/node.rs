//! 构造节点
//!
//! 每个节点由通用字段（标识、名称、存在/显示标志、父子链接）和一个
//! 具体类型 [`NodeKind`] 组成。派生状态缓存在 [`Geometry`] 中。

use crate::expression::Expr;
use crate::geometry::Geometry;
use crate::math::Vector3;
use crate::properties::Style;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 节点ID（竞技场下标，单调分配，永不复用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }

    pub fn component(self, v: &Vector3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }
}

/// 用户计算
#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    /// 源文本
    pub source: String,
    /// 语法树
    pub expr: Expr,
    /// 引用的度量节点
    pub references: Vec<NodeId>,
}

/// 度量规则
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureRule {
    /// 线段长度
    SegmentLength { segment: NodeId },
    /// 两点球面距离
    Distance { first: NodeId, second: NodeId },
    /// 顶点处两点所成的角
    Angle {
        first: NodeId,
        vertex: NodeId,
        second: NodeId,
    },
    /// 两条直线的夹角，范围 [0, π/2]
    LineAngle { first: NodeId, second: NodeId },
    /// 圆的角半径
    CircleRadius { circle: NodeId },
    /// 点的坐标分量
    Coordinate { point: NodeId, axis: Axis },
    /// 用户计算
    Calculation(Calculation),
}

impl MeasureRule {
    /// 规则依赖的节点
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            MeasureRule::SegmentLength { segment } => vec![*segment],
            MeasureRule::Distance { first, second } => vec![*first, *second],
            MeasureRule::Angle {
                first,
                vertex,
                second,
            } => vec![*first, *vertex, *second],
            MeasureRule::LineAngle { first, second } => vec![*first, *second],
            MeasureRule::CircleRadius { circle } => vec![*circle],
            MeasureRule::Coordinate { point, .. } => vec![*point],
            MeasureRule::Calculation(calc) => calc.references.clone(),
        }
    }

    /// 判断两个规则是否度量同一个量（距离与对称角不区分顺序）
    pub fn same_quantity(&self, other: &MeasureRule) -> bool {
        use MeasureRule::*;
        match (self, other) {
            (Distance { first: a, second: b }, Distance { first: c, second: d })
            | (LineAngle { first: a, second: b }, LineAngle { first: c, second: d }) => {
                (a == c && b == d) || (a == d && b == c)
            }
            (
                Angle {
                    first: a,
                    vertex: v,
                    second: b,
                },
                Angle {
                    first: c,
                    vertex: w,
                    second: d,
                },
            ) => v == w && ((a == c && b == d) || (a == d && b == c)),
            (Calculation(a), Calculation(b)) => a.source.trim() == b.source.trim(),
            _ => self == other,
        }
    }
}

/// 节点类型
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// 自由点
    FreePoint { position: Vector3 },
    /// 对象上的点：位置投影到对象上
    PointOnObject { object: NodeId, position: Vector3 },
    /// 交点
    Intersection {
        first: NodeId,
        second: NodeId,
        index: u8,
        user_created: bool,
    },
    /// 对径点
    Antipode { source: NodeId },
    /// 过两点的直线（大圆）
    Line { first: NodeId, second: NodeId },
    /// 线段
    Segment {
        start: NodeId,
        end: NodeId,
        long_arc: bool,
    },
    /// 圆：圆心 + 圆上一点
    Circle { center: NodeId, through: NodeId },
    /// 椭圆：两焦点 + 椭圆上一点
    Ellipse {
        focus1: NodeId,
        focus2: NodeId,
        through: NodeId,
    },
    /// 度量/计算
    Measurement { token: String, rule: MeasureRule },
    /// 标签
    Label { target: NodeId },
}

impl NodeKind {
    /// 获取类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::FreePoint { .. } => "Point",
            NodeKind::PointOnObject { .. } => "PointOnObject",
            NodeKind::Intersection { .. } => "IntersectionPoint",
            NodeKind::Antipode { .. } => "AntipodalPoint",
            NodeKind::Line { .. } => "Line",
            NodeKind::Segment { .. } => "Segment",
            NodeKind::Circle { .. } => "Circle",
            NodeKind::Ellipse { .. } => "Ellipse",
            NodeKind::Measurement {
                rule: MeasureRule::Calculation(_),
                ..
            } => "Calculation",
            NodeKind::Measurement { .. } => "Measurement",
            NodeKind::Label { .. } => "Label",
        }
    }

    /// 自动命名前缀
    pub fn name_prefix(&self) -> &'static str {
        match self {
            NodeKind::FreePoint { .. }
            | NodeKind::PointOnObject { .. }
            | NodeKind::Intersection { .. }
            | NodeKind::Antipode { .. } => "P",
            NodeKind::Line { .. } => "L",
            NodeKind::Segment { .. } => "Ls",
            NodeKind::Circle { .. } => "C",
            NodeKind::Ellipse { .. } => "E",
            NodeKind::Measurement { .. } => "M",
            NodeKind::Label { .. } => "Lb",
        }
    }

    /// 结构父节点（依赖），顺序固定
    pub fn dependencies(&self) -> Vec<NodeId> {
        match self {
            NodeKind::FreePoint { .. } => vec![],
            NodeKind::PointOnObject { object, .. } => vec![*object],
            NodeKind::Intersection { first, second, .. } => vec![*first, *second],
            NodeKind::Antipode { source } => vec![*source],
            NodeKind::Line { first, second } => vec![*first, *second],
            NodeKind::Segment { start, end, .. } => vec![*start, *end],
            NodeKind::Circle { center, through } => vec![*center, *through],
            NodeKind::Ellipse {
                focus1,
                focus2,
                through,
            } => vec![*focus1, *focus2, *through],
            NodeKind::Measurement { rule, .. } => rule.operands(),
            NodeKind::Label { target } => vec![*target],
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(
            self,
            NodeKind::FreePoint { .. }
                | NodeKind::PointOnObject { .. }
                | NodeKind::Intersection { .. }
                | NodeKind::Antipode { .. }
        )
    }

    /// 一维对象（参与求交）
    pub fn is_one_dimensional(&self) -> bool {
        matches!(
            self,
            NodeKind::Line { .. }
                | NodeKind::Segment { .. }
                | NodeKind::Circle { .. }
                | NodeKind::Ellipse { .. }
        )
    }

    pub fn is_ellipse(&self) -> bool {
        matches!(self, NodeKind::Ellipse { .. })
    }

    /// 可以直接移动（位置由用户给定）
    pub fn is_free(&self) -> bool {
        matches!(
            self,
            NodeKind::FreePoint { .. } | NodeKind::PointOnObject { .. }
        )
    }

    /// 有球面位置或文本，需要绘制句柄
    pub fn is_displayable(&self) -> bool {
        !matches!(self, NodeKind::Measurement { .. })
    }

    /// 度量标记
    pub fn token(&self) -> Option<&str> {
        match self {
            NodeKind::Measurement { token, .. } => Some(token),
            _ => None,
        }
    }
}

/// 图中的节点
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub geometry: Geometry,
    pub style: Style,
    /// 派生：父节点都存在且几何不退化
    pub exists: bool,
    /// 用户控制的可见性
    pub showing: bool,
    pub(crate) stale: bool,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, kind: NodeKind, style: Style) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            geometry: Geometry::None,
            style,
            exists: true,
            showing: true,
            stale: true,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_showing(mut self, showing: bool) -> Self {
        self.showing = showing;
        self
    }

    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// 在显示层可见
    pub fn is_visible(&self) -> bool {
        self.showing && self.exists
    }

    /// 球面位置（点）
    pub fn position(&self) -> Option<Vector3> {
        self.geometry.as_point()
    }

    /// 度量值
    pub fn value(&self) -> Option<f64> {
        self.geometry.as_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_order() {
        let kind = NodeKind::Ellipse {
            focus1: NodeId(1),
            focus2: NodeId(2),
            through: NodeId(3),
        };
        assert_eq!(kind.dependencies(), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(kind.is_one_dimensional());
        assert!(kind.is_ellipse());
        assert_eq!(kind.name_prefix(), "E");
    }

    #[test]
    fn test_same_quantity_ignores_operand_order() {
        let a = MeasureRule::Distance {
            first: NodeId(1),
            second: NodeId(2),
        };
        let b = MeasureRule::Distance {
            first: NodeId(2),
            second: NodeId(1),
        };
        assert!(a.same_quantity(&b));

        let angle1 = MeasureRule::Angle {
            first: NodeId(1),
            vertex: NodeId(2),
            second: NodeId(3),
        };
        let angle2 = MeasureRule::Angle {
            first: NodeId(3),
            vertex: NodeId(2),
            second: NodeId(1),
        };
        let angle3 = MeasureRule::Angle {
            first: NodeId(2),
            vertex: NodeId(1),
            second: NodeId(3),
        };
        assert!(angle1.same_quantity(&angle2));
        assert!(!angle1.same_quantity(&angle3));
    }

    #[test]
    fn test_free_kinds() {
        assert!(NodeKind::FreePoint {
            position: Vector3::z()
        }
        .is_free());
        assert!(!NodeKind::Antipode { source: NodeId(0) }.is_free());
        assert!(!NodeKind::Measurement {
            token: "M1".to_string(),
            rule: MeasureRule::CircleRadius { circle: NodeId(0) },
        }
        .is_displayable());
    }
}
