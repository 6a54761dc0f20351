//! 构造配置

use crate::properties::{Color, Style};
use serde::{Deserialize, Serialize};

/// 构造引擎配置
///
/// 所有字段都有默认值，JSON 配置文件中可以只写需要覆盖的字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 数值容差（弧度）
    pub tolerance: f64,

    /// 椭圆数值求交的采样数
    pub ellipse_samples: usize,

    /// 标签中数值的小数位数
    pub label_precision: usize,

    /// 新建点的默认样式
    pub point_style: Style,

    /// 新建曲线的默认样式
    pub curve_style: Style,

    /// 新建标签的默认样式
    pub label_style: Style,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tolerance: crate::math::EPSILON,
            ellipse_samples: 360,
            label_precision: 3,
            point_style: Style::default()
                .with_stroke_width(1.0)
                .with_fill(Some(Color::WHITE)),
            curve_style: Style::default().with_stroke(Color::BLUE),
            label_style: Style::default().with_stroke_width(0.0),
        }
    }
}

impl Settings {
    /// 从 JSON 文本加载
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
