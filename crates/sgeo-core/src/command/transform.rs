//! 移动与旋转命令
//!
//! 只有自由点（自由点、对象上的点）保存用户给定的位置，其余节点的位置
//! 都由更新引擎从父节点派生。

use super::opcode::{Opcode, OpcodeWriter};
use crate::error::{GraphResult, OpcodeError};
use crate::graph::Graph;
use crate::math::{rotation, Vector3};
use crate::node::{NodeId, NodeKind};

/// 读取自由点保存的位置
pub fn stored_position(graph: &Graph, id: NodeId) -> GraphResult<Option<Vector3>> {
    Ok(match &graph.node(id)?.kind {
        NodeKind::FreePoint { position } | NodeKind::PointOnObject { position, .. } => {
            Some(*position)
        }
        _ => None,
    })
}

/// 写入自由点位置并标记后代过期
pub fn set_stored_position(graph: &mut Graph, id: NodeId, to: Vector3) -> GraphResult<()> {
    match &mut graph.node_mut(id)?.kind {
        NodeKind::FreePoint { position } | NodeKind::PointOnObject { position, .. } => {
            *position = to;
        }
        _ => return Ok(()),
    }
    graph.mark_kids_out_of_date(id);
    Ok(())
}

/// 移动单个自由点
#[derive(Debug, Clone, PartialEq)]
pub struct MoveNode {
    id: NodeId,
    from: Option<Vector3>,
    to: Vector3,
}

impl MoveNode {
    pub fn new(id: NodeId, to: Vector3) -> Self {
        Self { id, from: None, to }
    }

    /// 拖动结束时提交：起点是拖动开始前的位置
    pub fn from_to(id: NodeId, from: Vector3, to: Vector3) -> Self {
        Self {
            id,
            from: Some(from),
            to,
        }
    }

    pub fn save_state(&mut self, graph: &Graph) -> GraphResult<()> {
        if self.from.is_none() {
            self.from = stored_position(graph, self.id)?;
        }
        Ok(())
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        set_stored_position(graph, self.id, self.to)
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        match self.from {
            Some(from) => set_stored_position(graph, self.id, from),
            None => Ok(()),
        }
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        OpcodeWriter::new("Move")
            .node("name", graph, self.id)
            .vector("to", &self.to)
            .finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        Ok(Self::new(op.node("name", graph)?, op.vector("to")?))
    }
}

/// 绕过球心的轴旋转一组自由点
#[derive(Debug, Clone, PartialEq)]
pub struct RotateNodes {
    axis: Vector3,
    angle: f64,
    ids: Vec<NodeId>,
    saved: Vec<Vector3>,
}

impl RotateNodes {
    pub fn new(axis: Vector3, angle: f64, ids: Vec<NodeId>) -> Self {
        Self {
            axis,
            angle,
            ids,
            saved: Vec::new(),
        }
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn save_state(&mut self, graph: &Graph) -> GraphResult<()> {
        self.saved = self
            .ids
            .iter()
            .map(|id| Ok(stored_position(graph, *id)?.unwrap_or_else(Vector3::zeros)))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(())
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        let rot = rotation(&self.axis, self.angle);
        for (id, position) in self.ids.iter().zip(&self.saved) {
            set_stored_position(graph, *id, rot * *position)?;
        }
        Ok(())
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        for (id, position) in self.ids.iter().zip(&self.saved) {
            set_stored_position(graph, *id, *position)?;
        }
        Ok(())
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        OpcodeWriter::new("Rotate")
            .vector("axis", &self.axis)
            .number("angle", self.angle)
            .nodes("nodes", graph, &self.ids)
            .finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        Ok(Self::new(
            op.vector("axis")?,
            op.number("angle")?,
            op.nodes("nodes", graph)?,
        ))
    }
}
