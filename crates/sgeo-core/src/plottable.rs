//! 渲染接口
//!
//! 核心不直接绘制。每个几何节点和标签节点持有一个 [`Plottable`] 句柄，
//! 由注入到图中的 [`PlottableFactory`] 创建；更新引擎在重算后推送状态。

use crate::geometry::Geometry;
use crate::node::{Node, NodeId};
use crate::properties::Style;

/// 显示句柄
pub trait Plottable {
    fn set_visible(&mut self, visible: bool);
    fn set_geometry(&mut self, geometry: &Geometry);
    fn set_style(&mut self, style: &Style);
    fn set_text(&mut self, text: &str);
    fn add_to_display(&mut self);
    fn remove_from_display(&mut self);
}

/// 句柄工厂
pub trait PlottableFactory {
    fn create(&mut self, node: &Node) -> Box<dyn Plottable>;
}

/// 不绘制任何东西
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlottable;

impl Plottable for NullPlottable {
    fn set_visible(&mut self, _visible: bool) {}
    fn set_geometry(&mut self, _geometry: &Geometry) {}
    fn set_style(&mut self, _style: &Style) {}
    fn set_text(&mut self, _text: &str) {}
    fn add_to_display(&mut self) {}
    fn remove_from_display(&mut self) {}
}

/// 默认工厂
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFactory;

impl PlottableFactory for NullFactory {
    fn create(&mut self, _node: &Node) -> Box<dyn Plottable> {
        Box::new(NullPlottable)
    }
}
