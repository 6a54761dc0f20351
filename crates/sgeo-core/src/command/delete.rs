//! 删除节点命令

use super::opcode::{Opcode, OpcodeWriter};
use crate::error::{GraphResult, OpcodeError};
use crate::graph::Graph;
use crate::node::{Node, NodeId};

/// 删除单个没有子节点的节点；级联删除由命令组完成
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteNode {
    id: NodeId,
    removed: Option<Node>,
}

impl DeleteNode {
    pub fn new(id: NodeId) -> Self {
        Self { id, removed: None }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        self.removed = Some(graph.remove(self.id)?);
        Ok(())
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        if let Some(node) = self.removed.take() {
            graph.insert(node)?;
            graph.mark_kids_out_of_date(self.id);
        }
        Ok(())
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        OpcodeWriter::new("Delete")
            .node("name", graph, self.id)
            .finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        Ok(Self::new(op.node("name", graph)?))
    }
}
