//! 样式与可见性命令

use super::opcode::{Opcode, OpcodeWriter};
use crate::error::{GraphResult, OpcodeError};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::properties::{Color, Style};

#[derive(Debug, Clone, PartialEq)]
pub struct SetStyle {
    id: NodeId,
    old: Option<Style>,
    new: Style,
}

impl SetStyle {
    pub fn new(id: NodeId, style: Style) -> Self {
        Self {
            id,
            old: None,
            new: style,
        }
    }

    pub fn save_state(&mut self, graph: &Graph) -> GraphResult<()> {
        self.old = Some(graph.node(self.id)?.style);
        Ok(())
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        graph.set_style(self.id, self.new)
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        match self.old {
            Some(old) => graph.set_style(self.id, old),
            None => Ok(()),
        }
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        let w = OpcodeWriter::new("SetStyle").node("name", graph, self.id);
        write_style(w, &self.new).finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        Ok(Self::new(op.node("name", graph)?, parse_style(op)?))
    }
}

/// 写入 `stroke` `width` `dashed` 以及可选的 `fill`
pub(super) fn write_style(w: OpcodeWriter, style: &Style) -> OpcodeWriter {
    let w = w
        .text("stroke", &style.stroke.to_string())
        .number("width", f64::from(style.stroke_width))
        .flag("dashed", style.dashed);
    match style.fill {
        Some(fill) => w.text("fill", &fill.to_string()),
        None => w,
    }
}

pub(super) fn parse_style(op: &Opcode) -> Result<Style, OpcodeError> {
    let color = |key: &str, text: String| {
        text.parse::<Color>().map_err(|_| OpcodeError::BadValue {
            key: key.to_string(),
            value: text.clone(),
        })
    };
    Ok(Style {
        stroke: color("stroke", op.text("stroke")?)?,
        stroke_width: op.number("width")? as f32,
        fill: op
            .optional_text("fill")?
            .map(|text| color("fill", text))
            .transpose()?,
        dashed: op.flag("dashed")?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetVisibility {
    id: NodeId,
    old: Option<bool>,
    showing: bool,
}

impl SetVisibility {
    pub fn new(id: NodeId, showing: bool) -> Self {
        Self {
            id,
            old: None,
            showing,
        }
    }

    pub fn save_state(&mut self, graph: &Graph) -> GraphResult<()> {
        self.old = Some(graph.node(self.id)?.showing);
        Ok(())
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        graph.set_showing(self.id, self.showing)
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        match self.old {
            Some(old) => graph.set_showing(self.id, old),
            None => Ok(()),
        }
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        OpcodeWriter::new("SetVisibility")
            .node("name", graph, self.id)
            .flag("showing", self.showing)
            .finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        Ok(Self::new(op.node("name", graph)?, op.flag("showing")?))
    }
}
