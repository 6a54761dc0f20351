//! SGEO 球面作图核心
//!
//! 在单位球面上构造点、直线（大圆）、线段、圆、椭圆、度量和计算表达式，
//! 拖动或旋转时自动传播更新。
//!
//! # 架构设计
//!
//! - `Graph`: 节点竞技场 + 父子依赖（有向无环图）
//! - `update`: 按拓扑序重算过期节点
//! - `intersection`: 一维球面对象两两求交
//! - `command`: 可撤销命令、撤销/重做日志、操作码脚本
//! - `expression`: 计算表达式的解析与求值
//! - `Construction`: 图 + 日志的上下文，对交互层提供构建方法
//!
//! # 示例
//!
//! ```rust
//! use sgeo_core::prelude::*;
//!
//! let mut construction = Construction::default();
//! let a = construction.add_point(Vector3::x()).unwrap();
//! let b = construction.add_point(Vector3::y()).unwrap();
//! let m = construction
//!     .measure(MeasureRule::Distance { first: a, second: b })
//!     .unwrap();
//!
//! let value = construction.graph().node(m).unwrap().value().unwrap();
//! assert!((value - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
//! ```

pub mod command;
pub mod config;
pub mod construction;
pub mod error;
pub mod expression;
pub mod geometry;
pub mod graph;
pub mod intersection;
pub mod math;
pub mod node;
pub mod plottable;
pub mod properties;
pub mod update;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::command::{Command, CommandGroup, CommandLog};
    pub use crate::config::Settings;
    pub use crate::construction::{Construction, ConstructionResult};
    pub use crate::error::{Alert, CommandError, ConstructionError, GraphError, OpcodeError};
    pub use crate::expression::{Expr, ExprError};
    pub use crate::geometry::{Geometry, SegmentArc, SphereCircle, SphereEllipse};
    pub use crate::graph::Graph;
    pub use crate::math::Vector3;
    pub use crate::node::{Axis, MeasureRule, Node, NodeId, NodeKind};
    pub use crate::plottable::{Plottable, PlottableFactory};
    pub use crate::properties::{Color, Style};
    pub use crate::update::{UpdateMode, UpdateReport};
}
