//! 可撤销命令
//!
//! 每个命令保存足够的状态来撤销自己：
//! - `save_state`：执行前记录旧状态
//! - `perform`：修改图
//! - `restore_state`：恢复旧状态
//! - `to_opcode` / `parse`：与文本操作码互相转换
//!
//! 命令组按顺序执行、逆序撤销。

mod create;
mod delete;
pub mod log;
pub mod opcode;
mod promote;
mod style;
mod transform;

pub use create::CreateNode;
pub use delete::DeleteNode;
pub use log::CommandLog;
pub use opcode::{escape, unescape, Opcode, OpcodeWriter};
pub use promote::PromoteIntersection;
pub use style::{SetStyle, SetVisibility};
pub use transform::{set_stored_position, stored_position, MoveNode, RotateNodes};

use crate::error::{GraphResult, OpcodeError};
use crate::graph::Graph;
use tracing::warn;

/// 命令组
#[derive(Debug, Clone, PartialEq)]
pub struct CommandGroup {
    label: String,
    commands: Vec<Command>,
}

impl CommandGroup {
    pub fn new(label: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            label: label.into(),
            commands,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// 按顺序执行；某个子命令失败时逆序撤销已完成的部分
    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        for done in 0..self.commands.len() {
            let command = &mut self.commands[done];
            let result = command
                .save_state(graph)
                .and_then(|_| command.perform(graph));
            if let Err(err) = result {
                for command in self.commands[..done].iter_mut().rev() {
                    if let Err(undo_err) = command.restore_state(graph) {
                        warn!("rollback of {} failed: {}", command.description(), undo_err);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        for command in self.commands.iter_mut().rev() {
            command.restore_state(graph)?;
        }
        Ok(())
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        let inner: Vec<String> = self.commands.iter().map(|c| c.to_opcode(graph)).collect();
        OpcodeWriter::new("Group")
            .text("label", &self.label)
            .list("cmds", &inner)
            .finish()
    }

    pub fn parse(op: &Opcode, graph: &Graph) -> Result<Self, OpcodeError> {
        let commands = op
            .list("cmds")?
            .iter()
            .map(|inner| Command::parse(inner, graph))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(op.optional_text("label")?.unwrap_or_default(), commands))
    }
}

/// 命令（封闭集合）
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create(CreateNode),
    Delete(DeleteNode),
    Move(MoveNode),
    Rotate(RotateNodes),
    SetStyle(SetStyle),
    SetVisibility(SetVisibility),
    Promote(PromoteIntersection),
    Group(CommandGroup),
}

impl Command {
    /// 简短描述（日志用）
    pub fn description(&self) -> &'static str {
        match self {
            Command::Create(_) => "Create",
            Command::Delete(_) => "Delete",
            Command::Move(_) => "Move",
            Command::Rotate(_) => "Rotate",
            Command::SetStyle(_) => "SetStyle",
            Command::SetVisibility(_) => "SetVisibility",
            Command::Promote(_) => "Promote",
            Command::Group(_) => "Group",
        }
    }

    pub fn save_state(&mut self, graph: &Graph) -> GraphResult<()> {
        match self {
            Command::Move(c) => c.save_state(graph),
            Command::Rotate(c) => c.save_state(graph),
            Command::SetStyle(c) => c.save_state(graph),
            Command::SetVisibility(c) => c.save_state(graph),
            Command::Promote(c) => c.save_state(graph),
            Command::Create(_) | Command::Delete(_) | Command::Group(_) => Ok(()),
        }
    }

    pub fn perform(&mut self, graph: &mut Graph) -> GraphResult<()> {
        match self {
            Command::Create(c) => c.perform(graph),
            Command::Delete(c) => c.perform(graph),
            Command::Move(c) => c.perform(graph),
            Command::Rotate(c) => c.perform(graph),
            Command::SetStyle(c) => c.perform(graph),
            Command::SetVisibility(c) => c.perform(graph),
            Command::Promote(c) => c.perform(graph),
            Command::Group(c) => c.perform(graph),
        }
    }

    pub fn restore_state(&mut self, graph: &mut Graph) -> GraphResult<()> {
        match self {
            Command::Create(c) => c.restore_state(graph),
            Command::Delete(c) => c.restore_state(graph),
            Command::Move(c) => c.restore_state(graph),
            Command::Rotate(c) => c.restore_state(graph),
            Command::SetStyle(c) => c.restore_state(graph),
            Command::SetVisibility(c) => c.restore_state(graph),
            Command::Promote(c) => c.restore_state(graph),
            Command::Group(c) => c.restore_state(graph),
        }
    }

    pub fn to_opcode(&self, graph: &Graph) -> String {
        match self {
            Command::Create(c) => c.to_opcode(graph),
            Command::Delete(c) => c.to_opcode(graph),
            Command::Move(c) => c.to_opcode(graph),
            Command::Rotate(c) => c.to_opcode(graph),
            Command::SetStyle(c) => c.to_opcode(graph),
            Command::SetVisibility(c) => c.to_opcode(graph),
            Command::Promote(c) => c.to_opcode(graph),
            Command::Group(c) => c.to_opcode(graph),
        }
    }

    /// 解析操作码，名称在图的存活名称表中解析
    pub fn parse(token: &str, graph: &Graph) -> Result<Self, OpcodeError> {
        let op = Opcode::parse(token)?;
        Ok(match op.name.as_str() {
            "Create" => Command::Create(CreateNode::parse(&op, graph)?),
            "Delete" => Command::Delete(DeleteNode::parse(&op, graph)?),
            "Move" => Command::Move(MoveNode::parse(&op, graph)?),
            "Rotate" => Command::Rotate(RotateNodes::parse(&op, graph)?),
            "SetStyle" => Command::SetStyle(SetStyle::parse(&op, graph)?),
            "SetVisibility" => Command::SetVisibility(SetVisibility::parse(&op, graph)?),
            "Promote" => Command::Promote(PromoteIntersection::parse(&op, graph)?),
            "Group" => Command::Group(CommandGroup::parse(&op, graph)?),
            other => return Err(OpcodeError::UnknownOpcode(other.to_string())),
        })
    }

    /// 创建命令产生的节点
    pub fn created_id(&self) -> Option<crate::node::NodeId> {
        match self {
            Command::Create(c) => c.id(),
            Command::Promote(c) => c.antipode(),
            _ => None,
        }
    }
}

impl From<CreateNode> for Command {
    fn from(c: CreateNode) -> Self {
        Command::Create(c)
    }
}

impl From<DeleteNode> for Command {
    fn from(c: DeleteNode) -> Self {
        Command::Delete(c)
    }
}

impl From<MoveNode> for Command {
    fn from(c: MoveNode) -> Self {
        Command::Move(c)
    }
}

impl From<RotateNodes> for Command {
    fn from(c: RotateNodes) -> Self {
        Command::Rotate(c)
    }
}

impl From<SetStyle> for Command {
    fn from(c: SetStyle) -> Self {
        Command::SetStyle(c)
    }
}

impl From<SetVisibility> for Command {
    fn from(c: SetVisibility) -> Self {
        Command::SetVisibility(c)
    }
}

impl From<PromoteIntersection> for Command {
    fn from(c: PromoteIntersection) -> Self {
        Command::Promote(c)
    }
}

impl From<CommandGroup> for Command {
    fn from(c: CommandGroup) -> Self {
        Command::Group(c)
    }
}
