//! 提升交点命令
//!
//! 把自动创建的隐藏交点变为用户交点并显示；如果该点还没有对径点，
//! 同时创建一个隐藏的对径点。

use super::create::CreateNode;
use super::opcode::{Opcode, OpcodeWriter};
use crate::error::{GraphResult, OpcodeError};
use crate::graph::Graph;
use crate::node::{NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq)]
pub struct PromoteIntersection {
    id: NodeId,
    /// (showing, user_created)
    old: Option<(bool, bool)>,
    antipode: Option<CreateNode>,
    created_antipode: bool,
}

impl PromoteIntersection {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            old: None,
            antipode: None,
            created_antipode: false,
        }
    }

    /// 随命令创建的对径点
    pub fn antipode(&self) -> Option<NodeId> {
        self.antipode.as_ref().and_then(CreateNode::id)
    }

    pub fn save_state(&mut self, graph: &Graph) -> GraphResult<()> {
        let node = graph.node(self.id)?;
        let user_created = matches!(
            node.kind,
            NodeKind::Intersection {
                user_created: true,
                ..
            }
        );
        self.old = Some((node.showing, user_created));
        Ok(())
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        set_user_created(graph, self.id, true)?;
        graph.set_showing(self.id, true)?;

        self.created_antipode = false;
        if graph.antipode_of(self.id).is_none() {
            let id = self.id;
            let create = self
                .antipode
                .get_or_insert_with(|| CreateNode::new(NodeKind::Antipode { source: id }).hidden());
            create.perform(graph)?;
            self.created_antipode = true;
        }
        Ok(())
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        if self.created_antipode {
            if let Some(create) = &mut self.antipode {
                create.restore_state(graph)?;
            }
            self.created_antipode = false;
        }
        if let Some((showing, user_created)) = self.old {
            set_user_created(graph, self.id, user_created)?;
            graph.set_showing(self.id, showing)?;
        }
        Ok(())
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        let w = OpcodeWriter::new("Promote").node("name", graph, self.id);
        let w = match self.antipode.as_ref().and_then(CreateNode::name) {
            Some(name) => w.text("antipode", name),
            None => w,
        };
        w.finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        let id = op.node("name", graph)?;
        let mut promote = Self::new(id);
        if let Some(name) = op.optional_text("antipode")? {
            promote.antipode =
                Some(CreateNode::new(NodeKind::Antipode { source: id }).hidden().with_name(name));
        }
        Ok(promote)
    }
}

fn set_user_created(graph: &mut Graph, id: NodeId, value: bool) -> GraphResult<()> {
    if let NodeKind::Intersection { user_created, .. } = &mut graph.node_mut(id)?.kind {
        *user_created = value;
    }
    Ok(())
}
